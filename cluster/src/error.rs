use thiserror::Error;

/// Errors returned by cluster model operations.
#[derive(Debug, Error)]
pub enum ClusterError {
    #[error("cluster: no input vectors")]
    EmptyInput,

    #[error("cluster: {vectors} vectors but {labels} labels")]
    LabelCountMismatch { vectors: usize, labels: usize },

    #[error("cluster: dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("cluster: no clusters fitted")]
    NoClusters,

    #[error("cluster: {0}")]
    Io(String),

    #[error("cluster: invalid format: {0}")]
    InvalidFormat(String),
}

impl From<std::io::Error> for ClusterError {
    fn from(e: std::io::Error) -> Self {
        ClusterError::Io(e.to_string())
    }
}
