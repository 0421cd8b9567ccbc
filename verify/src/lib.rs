//! Speaker enrollment and trial verification.
//!
//! A speaker enrolls with a fixed batch of recordings. Each recording yields a
//! voiceprint and a prosody embedding; the batch is averaged into one
//! aggregate per modality and the speaker population is re-clustered.
//!
//! A trial recording is compared against the claimed speaker's aggregates
//! and reduced to a six-feature vector (see [`FEATURE_NAMES`]), which a
//! pre-trained scaler and classifier turn into a verdict.
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use voxgate_embedstore::FileStore;
//! use voxgate_verify::{
//!     DecisionEngine, LogisticClassifier, ProsodyExtractor, Recording, StandardScaler,
//!     Verifier, VerifierConfig, VoiceprintExtractor,
//! };
//!
//! # fn run(
//! #     vp: Arc<dyn VoiceprintExtractor>,
//! #     pr: Arc<dyn ProsodyExtractor>,
//! #     recordings: Vec<Recording>,
//! # ) -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(FileStore::open("/var/lib/voxgate")?);
//! let scaler = StandardScaler::from_json(&mut std::fs::File::open("scaler.json")?)?;
//! let clf = LogisticClassifier::from_json(&mut std::fs::File::open("classifier.json")?)?;
//! let engine = DecisionEngine::new(Arc::new(scaler), Arc::new(clf));
//!
//! let verifier = Verifier::new(VerifierConfig::default(), store, vp, pr, engine)?;
//! verifier.enroll("alice", &recordings)?;
//!
//! let verdict = verifier.validate_trial("alice", &Recording::new("trial.wav", "hello"))?;
//! println!("verified: {}", verdict.verified);
//! # Ok(())
//! # }
//! ```

mod config;
mod decision;
mod enroll;
mod error;
mod extract;
mod features;
mod verifier;

pub use config::{VerifierConfig, DEFAULT_BATCH_SIZE, DEFAULT_LOCK_WAIT_MS};
pub use decision::{Classifier, DecisionEngine, LogisticClassifier, Scaler, StandardScaler};
pub use enroll::{AggregatedEnrollment, Enrollment};
pub use error::VerifyError;
pub use extract::{ExtractError, ProsodyExtractor, Recording, VoiceprintExtractor};
pub use features::{
    build_feature_vector, manhattan, prod_diff, FeatureVector, FEATURE_COUNT, FEATURE_NAMES,
};
pub use verifier::{EnrollReport, Verdict, Verifier};
pub use voxgate_cluster::ClusterConfig;
