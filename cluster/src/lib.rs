//! Speaker cluster model for verification.
//!
//! Every enrolled per-utterance voiceprint is projected to 2D with a seeded
//! neighbourhood-preserving reducer, the projection is density-clustered with
//! HDBSCAN, and each speaker is mapped to the cluster holding most of its
//! utterances. At trial time a voiceprint is projected with the same fit and
//! assigned to the centroid with the highest cosine similarity, which yields
//! the binary cluster-match signal.
//!
//! # Usage
//!
//! ```
//! use voxgate_cluster::{ClusterConfig, ClusterModel};
//!
//! let vectors = vec![vec![1.0, 0.0], vec![0.0, 1.0]];
//! let labels = vec!["alice".to_string(), "bob".to_string()];
//! let model = ClusterModel::fit(&vectors, &labels, &ClusterConfig::default()).unwrap();
//!
//! // Two points are too few to form a cluster: nobody matches.
//! assert!(!model.cluster_match("alice", &[1.0, 0.0]).unwrap());
//! ```
//!
//! # Design
//!
//! A [`ClusterModel`] is an immutable value. Refitting builds a new model
//! with the next [`version`](ClusterModel::version), which callers swap in
//! whole; trials always see one consistent projection and table.

mod error;
mod hdbscan;
mod io;
mod math;
mod model;
mod projection;

pub use error::ClusterError;
pub use hdbscan::NOISE;
pub use math::Point2;
pub use model::{Centroid, ClusterConfig, ClusterModel, ClusterTable};
pub use projection::{Projection, ProjectionConfig};
