//! Enrollment commands.

use std::path::{Path, PathBuf};

use clap::Args;
use serde::Serialize;

use super::{build_verifier, load_request, output, Manifest};
use crate::Cli;

/// Enroll (or re-enroll) a speaker.
///
/// The manifest lists the reference recordings:
///
///   recordings:
///     - audio: alice-000.wav
///       text: "optional; defaults to the configured prompt"
#[derive(Args)]
pub struct EnrollCommand {
    /// Speaker id
    #[arg(long)]
    speaker: String,

    /// Manifest file (YAML or JSON)
    #[arg(long)]
    manifest: PathBuf,
}

impl EnrollCommand {
    pub fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let (cfg, verifier) = build_verifier(cli)?;
        let manifest: Manifest = load_request(&self.manifest)?;
        let base = self.manifest.parent().unwrap_or(Path::new("."));
        let recordings = manifest.recordings(base, &cfg)?;

        let report = verifier.enroll(&self.speaker, &recordings)?;
        output(cli).write(&report)
    }
}

/// Rebuild the cluster model from stored utterances.
#[derive(Args)]
pub struct RefitCommand {}

#[derive(Serialize)]
struct RefitReport {
    version: u64,
    clusters: usize,
    speakers: usize,
}

impl RefitCommand {
    pub fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let (_, verifier) = build_verifier(cli)?;
        let model = verifier.refit()?;
        output(cli).write(&RefitReport {
            version: model.version(),
            clusters: model.table().centroids().len(),
            speakers: model.table().speakers().len(),
        })
    }
}
