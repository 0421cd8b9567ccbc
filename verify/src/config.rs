use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use voxgate_cluster::ClusterConfig;

/// Recordings required per enrollment.
pub const DEFAULT_BATCH_SIZE: usize = 20;

/// How long an enrollment waits for another process's lock.
pub const DEFAULT_LOCK_WAIT_MS: u64 = 30_000;

/// Verifier settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifierConfig {
    /// Exact number of recordings an enrollment must supply. Default: 20.
    pub batch_size: usize,

    /// Cluster model hyperparameters used on every refit.
    pub cluster: ClusterConfig,

    /// Where the cluster artifact is persisted. `None` keeps it in memory
    /// only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact_path: Option<PathBuf>,

    /// Lock file taken for the whole of an enrollment or refit commit. Set
    /// it when several processes share one store.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lock_path: Option<PathBuf>,

    /// Milliseconds to wait for `lock_path` before giving up.
    pub lock_wait_ms: u64,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            cluster: ClusterConfig::default(),
            artifact_path: None,
            lock_path: None,
            lock_wait_ms: DEFAULT_LOCK_WAIT_MS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_uses_defaults() {
        let cfg: VerifierConfig =
            serde_json::from_str(r#"{"cluster":{"min_cluster_size":3}}"#).unwrap();
        assert_eq!(cfg.batch_size, 20);
        assert_eq!(cfg.cluster.min_cluster_size, 3);
        assert_eq!(cfg.cluster.min_samples, 5);
        assert_eq!(cfg.cluster.projection.seed, 42);
        assert!(cfg.artifact_path.is_none());
        assert!(cfg.lock_path.is_none());
        assert_eq!(cfg.lock_wait_ms, 30_000);
    }
}
