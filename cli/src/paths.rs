//! Default locations under `~/.voxgate`.

use std::io;
use std::path::PathBuf;

/// Default base directory name.
pub const DEFAULT_BASE_DIR: &str = ".voxgate";

/// Default configuration filename.
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";

/// Default cluster artifact filename.
pub const DEFAULT_ARTIFACT_FILE: &str = "cluster.json";

/// Provides access to the voxgate directory structure.
#[derive(Debug, Clone)]
pub struct Paths {
    /// User's home directory.
    pub home_dir: PathBuf,
}

impl Paths {
    pub fn new() -> io::Result<Self> {
        let home_dir = dirs::home_dir().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, "could not find home directory")
        })?;
        Ok(Self { home_dir })
    }

    /// Returns the base directory (~/.voxgate).
    pub fn base_dir(&self) -> PathBuf {
        self.home_dir.join(DEFAULT_BASE_DIR)
    }

    /// Returns the config file path (~/.voxgate/config.yaml).
    pub fn config_file(&self) -> PathBuf {
        self.base_dir().join(DEFAULT_CONFIG_FILE)
    }

    /// Returns the embedding store root (~/.voxgate/data).
    pub fn data_dir(&self) -> PathBuf {
        self.base_dir().join("data")
    }

    /// Returns the model artifacts directory (~/.voxgate/models).
    pub fn models_dir(&self) -> PathBuf {
        self.base_dir().join("models")
    }

    /// Returns the cluster artifact path (~/.voxgate/models/cluster.json).
    pub fn artifact_file(&self) -> PathBuf {
        self.models_dir().join(DEFAULT_ARTIFACT_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_structure() {
        let paths = Paths {
            home_dir: PathBuf::from("/home/test"),
        };

        assert_eq!(paths.base_dir(), PathBuf::from("/home/test/.voxgate"));
        assert!(paths.config_file().ends_with(".voxgate/config.yaml"));
        assert!(paths.data_dir().ends_with(".voxgate/data"));
        assert!(paths.artifact_file().ends_with("models/cluster.json"));
    }
}
