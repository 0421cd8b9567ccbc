use std::path::PathBuf;

use thiserror::Error;
use voxgate_cluster::ClusterError;
use voxgate_embedstore::{Modality, StoreError};

/// Errors returned by enrollment and trial verification.
#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("verify: enrollment needs exactly {expected} recordings, got {got}")]
    InvalidBatchSize { expected: usize, got: usize },

    #[error("verify: extraction failed for recording {index}: {reason}")]
    ExtractionFailed { index: usize, reason: String },

    #[error("verify: speaker {0:?} is not enrolled")]
    SpeakerNotEnrolled(String),

    #[error("verify: {modality} dimension mismatch: enrolled {expected}, trial {got}")]
    DimensionMismatch {
        modality: Modality,
        expected: usize,
        got: usize,
    },

    #[error("verify: scaler not loaded")]
    ScalerNotLoaded,

    #[error("verify: classifier not loaded")]
    ClassifierNotLoaded,

    #[error("verify: expected {expected} features, got {got}")]
    FeatureLength { expected: usize, got: usize },

    #[error("verify: enrollment lock {} is held by another process", .0.display())]
    EnrollmentLocked(PathBuf),

    #[error("verify: corrupt model artifact: {0}")]
    ArtifactCorrupt(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Cluster(#[from] ClusterError),
}
