//! Utility functions for CLI commands.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;
use voxgate_cli::{load_config, Config, Output, OutputFormat};
use voxgate_embedstore::FileStore;
use voxgate_verify::{DecisionEngine, LogisticClassifier, Recording, StandardScaler, Verifier};

use super::SidecarExtractor;
use crate::Cli;

/// Gets the configuration.
pub fn get_config(cli: &Cli) -> anyhow::Result<Config> {
    load_config(cli.config.as_deref().map(Path::new))
}

/// Output settings from the global flags.
pub fn output(cli: &Cli) -> Output {
    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Yaml
    };
    Output::new(format, cli.output.clone())
}

/// Loads whichever decision stages are configured. Missing stages surface
/// as errors only when a trial is scored.
pub fn load_decision(cfg: &Config) -> anyhow::Result<DecisionEngine> {
    let mut engine = DecisionEngine::empty();
    if let Some(path) = &cfg.scaler {
        let scaler = StandardScaler::from_json(&mut open(path)?)?;
        engine = engine.with_scaler(Arc::new(scaler));
    }
    if let Some(path) = &cfg.classifier {
        let clf = LogisticClassifier::from_json(&mut open(path)?)?;
        engine = engine.with_classifier(Arc::new(clf));
    }
    Ok(engine)
}

fn open(path: &Path) -> anyhow::Result<File> {
    File::open(path).map_err(|e| anyhow::anyhow!("open {}: {e}", path.display()))
}

/// Builds a verifier over the configured data directory.
pub fn build_verifier(cli: &Cli) -> anyhow::Result<(Config, Verifier)> {
    let cfg = get_config(cli)?;
    let data_dir = cfg.data_dir()?;
    let store = Arc::new(FileStore::open(&data_dir)?);
    let extractor = Arc::new(SidecarExtractor);
    let verifier = Verifier::new(
        cfg.verifier_config()?,
        store,
        extractor.clone(),
        extractor,
        load_decision(&cfg)?,
    )?;
    tracing::debug!(data_dir = %data_dir.display(), "opened verifier");
    Ok((cfg, verifier))
}

/// Enrollment manifest (YAML or JSON).
#[derive(Debug, Deserialize)]
pub struct Manifest {
    pub recordings: Vec<ManifestEntry>,
}

#[derive(Debug, Deserialize)]
pub struct ManifestEntry {
    pub audio: PathBuf,
    #[serde(default)]
    pub text: Option<String>,
}

/// Loads a request from a YAML or JSON file.
pub fn load_request<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("read {}: {e}", path.display()))?;
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("yaml");

    let result = match ext.to_lowercase().as_str() {
        "json" => serde_json::from_str(&content)?,
        _ => serde_yaml::from_str(&content)?,
    };
    Ok(result)
}

impl Manifest {
    /// Resolves the manifest into recordings. Relative audio paths are taken
    /// relative to `base`; entries without text use the configured prompt at
    /// the same index.
    pub fn recordings(&self, base: &Path, cfg: &Config) -> anyhow::Result<Vec<Recording>> {
        self.recordings
            .iter()
            .enumerate()
            .map(|(i, entry)| {
                let audio = if entry.audio.is_absolute() {
                    entry.audio.clone()
                } else {
                    base.join(&entry.audio)
                };
                let text = match (&entry.text, cfg.prompt(i)) {
                    (Some(t), _) => t.clone(),
                    (None, Some(p)) => p.to_string(),
                    (None, None) => anyhow::bail!(
                        "recording {i} ({}) has no text and no prompt is configured",
                        entry.audio.display()
                    ),
                };
                Ok(Recording { audio, text })
            })
            .collect()
    }
}

/// Builds a trial recording, defaulting the text to an empty string.
pub fn trial_recording(audio: &str, text: Option<&str>) -> Recording {
    Recording::new(audio, text.unwrap_or_default())
}
