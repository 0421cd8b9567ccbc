//! voxgate - speaker enrollment and trial verification from the command line.

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{
    ClustersCommand, ConfigCommand, EnrollCommand, FeaturesCommand, PromptsCommand, RefitCommand,
    SpeakersCommand, VerifyCommand,
};

/// voxgate - speaker enrollment and verification.
///
/// Embeddings are read from precomputed sidecar files: for `x.wav` the
/// extractor output is expected in `x.json` as
/// `{"voiceprint": [...], "prosody": [...]}`.
///
/// Configuration is stored in ~/.voxgate/config.yaml.
#[derive(Parser)]
#[command(name = "voxgate")]
#[command(about = "Speaker enrollment and verification tool")]
#[command(version)]
pub struct Cli {
    /// Config file (default is ~/.voxgate/config.yaml)
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Output file (default: stdout)
    #[arg(short = 'o', long, global = true)]
    pub output: Option<String>,

    /// Output as JSON (for piping)
    #[arg(long, global = true)]
    pub json: bool,

    /// Verbose output
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Enroll a speaker from a manifest of recordings
    Enroll(EnrollCommand),
    /// Verify a trial recording against an enrolled speaker
    Verify(VerifyCommand),
    /// Print the raw trial feature vector
    Features(FeaturesCommand),
    /// Rebuild the cluster model from stored utterances
    Refit(RefitCommand),
    /// List enrolled speakers
    Speakers(SpeakersCommand),
    /// Show the cluster model
    Clusters(ClustersCommand),
    /// Show the enrollment prompts
    Prompts(PromptsCommand),
    /// Show the effective configuration
    Config(ConfigCommand),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match &cli.command {
        Commands::Enroll(cmd) => cmd.run(&cli),
        Commands::Verify(cmd) => cmd.run(&cli),
        Commands::Features(cmd) => cmd.run(&cli),
        Commands::Refit(cmd) => cmd.run(&cli),
        Commands::Speakers(cmd) => cmd.run(&cli),
        Commands::Clusters(cmd) => cmd.run(&cli),
        Commands::Prompts(cmd) => cmd.run(&cli),
        Commands::Config(cmd) => cmd.run(&cli),
    }
}
