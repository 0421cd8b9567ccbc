use std::path::{Path, PathBuf};

use thiserror::Error;

/// Error reported by an embedding extractor.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct ExtractError(pub String);

impl ExtractError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// One reference or trial utterance: an audio file and the text spoken in it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recording {
    pub audio: PathBuf,
    pub text: String,
}

impl Recording {
    pub fn new(audio: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        Self {
            audio: audio.into(),
            text: text.into(),
        }
    }
}

/// Computes a speaker-identity embedding from an audio file.
///
/// Implementations must be safe for concurrent use and must return vectors
/// of one fixed dimensionality.
pub trait VoiceprintExtractor: Send + Sync {
    fn extract(&self, audio: &Path) -> Result<Vec<f32>, ExtractError>;
}

/// Computes a speaking-style embedding from an audio file and the text
/// spoken in it.
///
/// Implementations must be safe for concurrent use and must return vectors
/// of one fixed dimensionality.
pub trait ProsodyExtractor: Send + Sync {
    fn extract(&self, audio: &Path, text: &str) -> Result<Vec<f32>, ExtractError>;
}
