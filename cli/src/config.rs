//! Configuration management for the voxgate CLI.
//!
//! Configuration is stored in ~/.voxgate/config.yaml. Every field is
//! optional; a missing file is created with the defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use voxgate_verify::{ClusterConfig, VerifierConfig, DEFAULT_BATCH_SIZE};

use crate::paths::Paths;

/// Lock file name under the data directory.
const ENROLL_LOCK: &str = ".enroll.lock";

/// CLI configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Embedding store root (default ~/.voxgate/data).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,

    /// Cluster artifact file (default ~/.voxgate/models/cluster.json).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact: Option<PathBuf>,

    /// Scaler export (JSON `{mean, scale}`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scaler: Option<PathBuf>,

    /// Classifier export (JSON `{coef, intercept, threshold}`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classifier: Option<PathBuf>,

    /// Recordings required per enrollment.
    pub batch_size: usize,

    /// Cluster model hyperparameters.
    pub cluster: ClusterConfig,

    /// Enrollment prompts, one per recording. A manifest entry without text
    /// uses the prompt at its index.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub prompts: Vec<String>,

    /// Path to the config file (not serialized).
    #[serde(skip)]
    config_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: None,
            artifact: None,
            scaler: None,
            classifier: None,
            batch_size: DEFAULT_BATCH_SIZE,
            cluster: ClusterConfig::default(),
            prompts: Vec::new(),
            config_path: PathBuf::new(),
        }
    }
}

impl Config {
    /// Returns the config file path.
    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// Embedding store root, falling back to ~/.voxgate/data.
    pub fn data_dir(&self) -> anyhow::Result<PathBuf> {
        match &self.data_dir {
            Some(p) => Ok(p.clone()),
            None => Ok(Paths::new()?.data_dir()),
        }
    }

    /// Cluster artifact path, falling back to ~/.voxgate/models/cluster.json.
    pub fn artifact(&self) -> anyhow::Result<PathBuf> {
        match &self.artifact {
            Some(p) => Ok(p.clone()),
            None => Ok(Paths::new()?.artifact_file()),
        }
    }

    /// Prompt for the recording at `index`, if configured.
    pub fn prompt(&self, index: usize) -> Option<&str> {
        self.prompts.get(index).map(|s| s.as_str())
    }

    /// Builds the verifier settings from this configuration.
    ///
    /// Every CLI process shares the data directory, so enrollments take a
    /// lock file inside it.
    pub fn verifier_config(&self) -> anyhow::Result<VerifierConfig> {
        Ok(VerifierConfig {
            batch_size: self.batch_size,
            cluster: self.cluster.clone(),
            artifact_path: Some(self.artifact()?),
            lock_path: Some(self.data_dir()?.join(ENROLL_LOCK)),
            ..VerifierConfig::default()
        })
    }

    /// Saves the configuration to disk.
    pub fn save(&self) -> anyhow::Result<()> {
        save_config(self, Some(self.config_path.as_path()))
    }
}

/// Loads the configuration, creating the file with defaults if it is
/// missing.
pub fn load_config(custom_path: Option<&Path>) -> anyhow::Result<Config> {
    let config_path = match custom_path {
        Some(p) => p.to_path_buf(),
        None => Paths::new()?.config_file(),
    };

    let mut cfg = if config_path.exists() {
        let content = std::fs::read_to_string(&config_path)?;
        if content.trim().is_empty() {
            Config::default()
        } else {
            serde_yaml::from_str(&content)?
        }
    } else {
        let cfg = Config::default();
        save_config(&cfg, Some(config_path.as_path()))?;
        cfg
    };

    cfg.config_path = config_path;
    Ok(cfg)
}

/// Saves configuration to the given path, or the default location.
pub fn save_config(config: &Config, custom_path: Option<&Path>) -> anyhow::Result<()> {
    let config_path = match custom_path {
        Some(p) => p.to_path_buf(),
        None => Paths::new()?.config_file(),
    };

    if let Some(parent) = config_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let content = serde_yaml::to_string(config)?;
    std::fs::write(&config_path, content)?;
    Ok(())
}
