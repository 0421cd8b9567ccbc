//! Per-speaker embedding storage for enrollment and trial scoring.
//!
//! A speaker owns one aggregate vector per [`Modality`], the elementwise mean
//! of the per-utterance vectors collected at enrollment (see [`aggregate`]).
//! The per-utterance batches are kept as well, because the cluster refit runs
//! over every enrolled utterance, not just the aggregates.
//!
//! # Usage
//!
//! ```
//! use voxgate_embedstore::{aggregate, EmbeddingStore, MemoryStore, Modality};
//!
//! let store = MemoryStore::new();
//! let batch = vec![vec![1.0, 0.0], vec![0.0, 1.0]];
//! let mean = aggregate("alice", &batch).unwrap();
//! store.save("alice", Modality::Voiceprint, &mean).unwrap();
//! assert_eq!(store.load("alice", Modality::Voiceprint).unwrap(), vec![0.5, 0.5]);
//! ```

mod aggregate;
pub mod codec;
mod error;
mod file;
pub mod fsutil;
mod memory;
mod modality;
mod store;

pub use aggregate::aggregate;
pub use error::StoreError;
pub use file::FileStore;
pub use fsutil::{write_atomic, LockFile};
pub use memory::MemoryStore;
pub use modality::Modality;
pub use store::{validate_entity_id, EmbeddingStore};
