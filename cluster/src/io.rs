//! Cluster artifact persistence.
//!
//! The artifact is a single JSON document:
//!
//! ```json
//! { "format": "voxgate.cluster", "format_version": 1, "model": { ... } }
//! ```
//!
//! The model carries its projection training set, so a loaded artifact
//! assigns trials exactly like the one that was saved.

use std::io::{Read, Write};

use serde::{Deserialize, Serialize};

use crate::{ClusterError, ClusterModel};

const FORMAT: &str = "voxgate.cluster";
const FORMAT_VERSION: u32 = 1;

#[derive(Serialize)]
struct EnvelopeRef<'a> {
    format: &'a str,
    format_version: u32,
    model: &'a ClusterModel,
}

#[derive(Deserialize)]
struct Envelope {
    format: String,
    format_version: u32,
    model: ClusterModel,
}

impl ClusterModel {
    /// Serializes the artifact to `w`.
    pub fn save(&self, w: &mut dyn Write) -> Result<(), ClusterError> {
        let env = EnvelopeRef {
            format: FORMAT,
            format_version: FORMAT_VERSION,
            model: self,
        };
        serde_json::to_writer(&mut *w, &env)
            .map_err(|e| ClusterError::Io(format!("encode artifact: {e}")))?;
        w.flush()?;
        Ok(())
    }

    /// Reads an artifact written by [`ClusterModel::save`].
    pub fn load(r: &mut dyn Read) -> Result<Self, ClusterError> {
        let env: Envelope = serde_json::from_reader(r).map_err(|e| {
            if e.is_io() {
                ClusterError::Io(e.to_string())
            } else {
                ClusterError::InvalidFormat(e.to_string())
            }
        })?;
        if env.format != FORMAT {
            return Err(ClusterError::InvalidFormat(format!(
                "unexpected format {:?}",
                env.format
            )));
        }
        if env.format_version != FORMAT_VERSION {
            return Err(ClusterError::InvalidFormat(format!(
                "unsupported format version {}",
                env.format_version
            )));
        }
        env.model.validate()?;
        Ok(env.model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ClusterConfig;

    fn speaker_batch(axis: usize, n: usize, seed: u64) -> Vec<Vec<f32>> {
        let mut state = seed;
        (0..n)
            .map(|_| {
                (0..16)
                    .map(|d| {
                        state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
                        let r = ((state >> 33) as f32) / (u32::MAX as f32) - 0.25;
                        if d == axis { 4.0 + r } else { r * 0.5 }
                    })
                    .collect()
            })
            .collect()
    }

    fn fitted() -> ClusterModel {
        let mut vectors = Vec::new();
        let mut labels = Vec::new();
        for (i, id) in ["alice", "bob", "carol"].iter().enumerate() {
            for v in speaker_batch(i, 20, i as u64 + 1) {
                vectors.push(v);
                labels.push(id.to_string());
            }
        }
        ClusterModel::fit(&vectors, &labels, &ClusterConfig::default()).unwrap()
    }

    #[test]
    fn speakers_get_distinct_clusters() {
        let model = fitted();
        let table = model.table();
        let a = table.speaker_cluster("alice").unwrap();
        let b = table.speaker_cluster("bob").unwrap();
        let c = table.speaker_cluster("carol").unwrap();
        assert!(a != b && b != c && a != c, "{a} {b} {c}");

        let trial = &speaker_batch(0, 1, 99)[0];
        let label = model.assign_trial(trial).unwrap();
        assert!(table.centroids().iter().any(|c| c.label == label));
        assert_eq!(model.assign_trial(trial).unwrap(), label);
    }

    #[test]
    fn genuine_trials_match_their_speaker() {
        let model = fitted();
        for (i, id) in ["alice", "bob", "carol"].iter().enumerate() {
            for trial in speaker_batch(i, 4, 500 + i as u64) {
                assert!(model.cluster_match(id, &trial).unwrap(), "{id} should match");
                let other = ["alice", "bob", "carol"][(i + 1) % 3];
                assert!(!model.cluster_match(other, &trial).unwrap(), "{other} should not match");
            }
        }
    }

    #[test]
    fn unknown_speaker_never_matches() {
        let model = fitted();
        assert!(!model.table().is_empty());
        let trial = &speaker_batch(0, 1, 77)[0];
        assert!(!model.cluster_match("dave", trial).unwrap());
    }

    #[test]
    fn roundtrip_preserves_table_and_assignments() {
        let model = fitted().with_version(7);
        let mut buf = Vec::new();
        model.save(&mut buf).unwrap();

        let loaded = ClusterModel::load(&mut buf.as_slice()).unwrap();
        assert_eq!(loaded.version(), 7);
        assert_eq!(loaded.table().centroids(), model.table().centroids());
        assert_eq!(loaded.table().speakers(), model.table().speakers());

        let trial = &speaker_batch(1, 1, 1234)[0];
        assert_eq!(
            loaded.assign_trial(trial).unwrap(),
            model.assign_trial(trial).unwrap()
        );
        assert_eq!(
            loaded.cluster_match("bob", trial).unwrap(),
            model.cluster_match("bob", trial).unwrap()
        );
    }

    #[test]
    fn rejects_foreign_documents() {
        let err = ClusterModel::load(&mut &b"{\"format\":\"other\",\"format_version\":1}"[..])
            .unwrap_err();
        assert!(matches!(err, ClusterError::InvalidFormat(_)));

        let err = ClusterModel::load(&mut &b"not json"[..]).unwrap_err();
        assert!(matches!(err, ClusterError::InvalidFormat(_)));
    }

    #[test]
    fn rejects_wrong_version() {
        let model = fitted();
        let json = serde_json::to_value(EnvelopeRef {
            format: FORMAT,
            format_version: 99,
            model: &model,
        })
        .unwrap();
        let bytes = serde_json::to_vec(&json).unwrap();
        let err = ClusterModel::load(&mut bytes.as_slice()).unwrap_err();
        assert!(matches!(err, ClusterError::InvalidFormat(_)));
    }
}
