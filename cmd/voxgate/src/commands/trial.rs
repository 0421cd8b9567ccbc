//! Trial commands.

use clap::Args;
use serde::Serialize;

use super::{build_verifier, output, trial_recording};
use crate::Cli;

/// Trial arguments shared by `verify` and `features`.
#[derive(Args)]
pub struct TrialArgs {
    /// Claimed speaker id
    #[arg(long)]
    speaker: String,

    /// Trial audio file
    #[arg(long)]
    audio: String,

    /// Text spoken in the trial
    #[arg(long)]
    text: Option<String>,
}

/// Verify a trial recording against an enrolled speaker.
#[derive(Args)]
pub struct VerifyCommand {
    #[command(flatten)]
    trial: TrialArgs,
}

impl VerifyCommand {
    pub fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let (_, verifier) = build_verifier(cli)?;
        let t = &self.trial;
        let recording = trial_recording(&t.audio, t.text.as_deref());
        let verdict = verifier.validate_trial(&t.speaker, &recording)?;

        if cli.json || cli.output.is_some() {
            return output(cli).write(&verdict);
        }
        if verdict.verified {
            println!("{}: verified", t.speaker);
        } else {
            println!("{}: not verified", t.speaker);
        }
        Ok(())
    }
}

/// Print the raw trial feature vector.
#[derive(Args)]
pub struct FeaturesCommand {
    #[command(flatten)]
    trial: TrialArgs,
}

#[derive(Serialize)]
struct NamedFeature {
    name: &'static str,
    value: f64,
}

impl FeaturesCommand {
    pub fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let (_, verifier) = build_verifier(cli)?;
        let t = &self.trial;
        let recording = trial_recording(&t.audio, t.text.as_deref());
        let features = verifier.features(&t.speaker, &recording)?;
        let named: Vec<NamedFeature> = features
            .named()
            .map(|(name, value)| NamedFeature { name, value })
            .collect();
        output(cli).write(&named)
    }
}
