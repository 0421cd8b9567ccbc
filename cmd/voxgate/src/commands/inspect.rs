//! Read-only inspection commands.

use clap::Args;
use serde::Serialize;

use super::{build_verifier, get_config, output};
use crate::Cli;

/// List enrolled speakers and their majority cluster.
#[derive(Args)]
pub struct SpeakersCommand {}

#[derive(Serialize)]
struct SpeakerRow {
    speaker: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    cluster: Option<i32>,
}

impl SpeakersCommand {
    pub fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let (_, verifier) = build_verifier(cli)?;
        let model = verifier.cluster_model();
        let rows: Vec<SpeakerRow> = verifier
            .speakers()?
            .into_iter()
            .map(|speaker| {
                let cluster = model
                    .as_ref()
                    .and_then(|m| m.table().speaker_cluster(&speaker));
                SpeakerRow { speaker, cluster }
            })
            .collect();
        output(cli).write(&rows)
    }
}

/// Show the cluster model: version, centroids, and speaker mapping.
#[derive(Args)]
pub struct ClustersCommand {}

impl ClustersCommand {
    pub fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let (_, verifier) = build_verifier(cli)?;
        let Some(model) = verifier.cluster_model() else {
            anyhow::bail!("no cluster model yet; enroll a speaker or run 'voxgate refit'");
        };
        output(cli).write(&serde_json::json!({
            "version": model.version(),
            "dimension": model.dimension(),
            "points": model.projection().len(),
            "centroids": model.table().centroids(),
            "speakers": model.table().speakers(),
        }))
    }
}

/// Show the enrollment prompts.
#[derive(Args)]
pub struct PromptsCommand {}

impl PromptsCommand {
    pub fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let cfg = get_config(cli)?;
        if cfg.prompts.len() != cfg.batch_size {
            tracing::warn!(
                prompts = cfg.prompts.len(),
                batch_size = cfg.batch_size,
                "prompt count differs from enrollment batch size"
            );
        }
        output(cli).write(&cfg.prompts)
    }
}

/// Show the effective configuration.
#[derive(Args)]
pub struct ConfigCommand {}

impl ConfigCommand {
    pub fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let cfg = get_config(cli)?;
        eprintln!("# {}", cfg.path().display());
        output(cli).write(&cfg)
    }
}
