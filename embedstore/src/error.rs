use thiserror::Error;

use crate::Modality;

/// Errors returned by embedding store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("embedstore: no {modality} embedding for {entity_id:?}")]
    NotFound { entity_id: String, modality: Modality },

    #[error("embedstore: no embeddings found for {entity_id:?}")]
    NoEmbeddingsFound { entity_id: String },

    #[error("embedstore: dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("embedstore: invalid entity id {0:?}")]
    InvalidEntityId(String),

    #[error("embedstore: {0}")]
    Io(String),

    #[error("embedstore: invalid format: {0}")]
    InvalidFormat(String),
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::Io(e.to_string())
    }
}
