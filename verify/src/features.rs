//! Trial feature engineering.
//!
//! A trial is compared against a speaker's enrolled aggregates and reduced
//! to six numbers in a fixed order. The order is part of the trained
//! classifier's contract.

use serde::Serialize;
use tracing::debug;
use voxgate_cluster::ClusterModel;
use voxgate_embedstore::{EmbeddingStore, Modality, StoreError};

use crate::VerifyError;

/// Number of features in a [`FeatureVector`].
pub const FEATURE_COUNT: usize = 6;

/// Feature names, in vector order.
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "voiceprint_dot_product_sum",
    "voiceprint_abs_diff_sum",
    "prosody_dot_product_sum",
    "prosody_abs_diff_sum",
    "voiceprint_manhattan_distance",
    "cluster_match_indicator",
];

/// Raw, unnormalised trial features.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FeatureVector(pub [f64; FEATURE_COUNT]);

impl FeatureVector {
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn voiceprint_prod(&self) -> f64 {
        self.0[0]
    }

    pub fn voiceprint_diff(&self) -> f64 {
        self.0[1]
    }

    pub fn prosody_prod(&self) -> f64 {
        self.0[2]
    }

    pub fn prosody_diff(&self) -> f64 {
        self.0[3]
    }

    pub fn voiceprint_manhattan(&self) -> f64 {
        self.0[4]
    }

    pub fn cluster_match(&self) -> bool {
        self.0[5] != 0.0
    }

    /// (name, value) pairs in vector order.
    pub fn named(&self) -> impl Iterator<Item = (&'static str, f64)> + '_ {
        FEATURE_NAMES.iter().copied().zip(self.0.iter().copied())
    }
}

/// Dot product and sum of absolute differences, accumulated in f64.
pub fn prod_diff(enrolled: &[f32], trial: &[f32]) -> (f64, f64) {
    let mut prod = 0.0f64;
    let mut diff = 0.0f64;
    for (&e, &t) in enrolled.iter().zip(trial) {
        let e = e as f64;
        let t = t as f64;
        prod += e * t;
        diff += (e - t).abs();
    }
    (prod, diff)
}

/// L1 distance, accumulated in f64.
pub fn manhattan(a: &[f32], b: &[f32]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(&x, &y)| (x as f64 - y as f64).abs())
        .sum()
}

fn load_enrolled(
    store: &dyn EmbeddingStore,
    speaker_id: &str,
    modality: Modality,
) -> Result<Vec<f32>, VerifyError> {
    match store.load(speaker_id, modality) {
        Ok(v) => Ok(v),
        Err(StoreError::NotFound { .. } | StoreError::InvalidEntityId(_)) => {
            Err(VerifyError::SpeakerNotEnrolled(speaker_id.into()))
        }
        Err(e) => Err(e.into()),
    }
}

/// The stored aggregates of one enrolled speaker.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Enrolled {
    pub voiceprint: Vec<f32>,
    pub prosody: Vec<f32>,
}

impl Enrolled {
    /// Loads both aggregates; a speaker missing either is not enrolled.
    pub fn load(store: &dyn EmbeddingStore, speaker_id: &str) -> Result<Self, VerifyError> {
        Ok(Self {
            voiceprint: load_enrolled(store, speaker_id, Modality::Voiceprint)?,
            prosody: load_enrolled(store, speaker_id, Modality::Prosody)?,
        })
    }

    /// Compares trial embeddings against these aggregates.
    pub fn features(
        &self,
        cluster: Option<&ClusterModel>,
        speaker_id: &str,
        trial_voiceprint: &[f32],
        trial_prosody: &[f32],
    ) -> Result<FeatureVector, VerifyError> {
        let (vp, pr) = (&self.voiceprint, &self.prosody);
        for (modality, enrolled, trial) in [
            (Modality::Voiceprint, vp, trial_voiceprint),
            (Modality::Prosody, pr, trial_prosody),
        ] {
            if enrolled.len() != trial.len() {
                return Err(VerifyError::DimensionMismatch {
                    modality,
                    expected: enrolled.len(),
                    got: trial.len(),
                });
            }
        }

        let (vp_prod, vp_diff) = prod_diff(vp, trial_voiceprint);
        let (pr_prod, pr_diff) = prod_diff(pr, trial_prosody);
        let vp_manhattan = manhattan(vp, trial_voiceprint);

        let matched = match cluster {
            Some(model) => model.cluster_match(speaker_id, trial_voiceprint)?,
            None => false,
        };

        let features = FeatureVector([
            vp_prod,
            vp_diff,
            pr_prod,
            pr_diff,
            vp_manhattan,
            if matched { 1.0 } else { 0.0 },
        ]);
        debug!(speaker_id, features = ?features.0, "built trial features");
        Ok(features)
    }
}

/// Builds the feature vector of a trial against an enrolled speaker.
///
/// Without a fitted cluster model the cluster feature is 0.
pub fn build_feature_vector(
    store: &dyn EmbeddingStore,
    cluster: Option<&ClusterModel>,
    speaker_id: &str,
    trial_voiceprint: &[f32],
    trial_prosody: &[f32],
) -> Result<FeatureVector, VerifyError> {
    let enrolled = Enrolled::load(store, speaker_id)?;
    enrolled.features(cluster, speaker_id, trial_voiceprint, trial_prosody)
}

#[cfg(test)]
mod tests {
    use super::*;
    use voxgate_embedstore::{FileStore, MemoryStore};

    fn enrolled(vp: &[f32], pr: &[f32]) -> MemoryStore {
        let store = MemoryStore::new();
        store.save("s", Modality::Voiceprint, vp).unwrap();
        store.save("s", Modality::Prosody, pr).unwrap();
        store
    }

    #[test]
    fn identical_ones() {
        let store = enrolled(&[1.0, 1.0, 1.0], &[1.0, 1.0, 1.0]);
        let f =
            build_feature_vector(&store, None, "s", &[1.0, 1.0, 1.0], &[1.0, 1.0, 1.0]).unwrap();
        assert_eq!(f.voiceprint_prod(), 3.0);
        assert_eq!(f.voiceprint_diff(), 0.0);
        assert_eq!(f.voiceprint_manhattan(), 0.0);
        assert_eq!(f.prosody_prod(), 3.0);
        assert_eq!(f.prosody_diff(), 0.0);
        assert!(!f.cluster_match());
    }

    #[test]
    fn orthogonal_units() {
        let store = enrolled(&[1.0, 0.0, 0.0], &[1.0, 0.0, 0.0]);
        let f =
            build_feature_vector(&store, None, "s", &[0.0, 1.0, 0.0], &[0.0, 1.0, 0.0]).unwrap();
        assert_eq!(f.0, [0.0, 2.0, 0.0, 2.0, 2.0, 0.0]);
    }

    #[test]
    fn manhattan_mirrors_voiceprint_diff() {
        let store = enrolled(&[0.3, -1.2, 2.5], &[0.0]);
        let f = build_feature_vector(&store, None, "s", &[1.0, 0.5, -0.5], &[0.0]).unwrap();
        assert_eq!(f.voiceprint_diff(), f.voiceprint_manhattan());
    }

    #[test]
    fn unenrolled_speaker() {
        let store = MemoryStore::new();
        store.save("half", Modality::Voiceprint, &[1.0]).unwrap();
        for id in ["ghost", "half"] {
            let err = build_feature_vector(&store, None, id, &[1.0], &[1.0]).unwrap_err();
            assert!(matches!(err, VerifyError::SpeakerNotEnrolled(ref s) if s == id));
            assert!(matches!(
                Enrolled::load(&store, id),
                Err(VerifyError::SpeakerNotEnrolled(_))
            ));
        }
    }

    #[test]
    fn unusable_id_is_not_enrolled() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        for id in ["../x", "", "a/b"] {
            let err = build_feature_vector(&store, None, id, &[1.0], &[1.0]).unwrap_err();
            assert!(matches!(err, VerifyError::SpeakerNotEnrolled(ref s) if s == id));
        }
    }

    #[test]
    fn trial_dimension_mismatch() {
        let store = enrolled(&[1.0, 1.0], &[1.0, 1.0]);
        let err = build_feature_vector(&store, None, "s", &[1.0, 1.0], &[1.0]).unwrap_err();
        assert!(matches!(
            err,
            VerifyError::DimensionMismatch {
                modality: Modality::Prosody,
                expected: 2,
                got: 1
            }
        ));
    }

    #[test]
    fn names_follow_vector_order() {
        let f = FeatureVector([1.0, 2.0, 3.0, 4.0, 5.0, 1.0]);
        let named: Vec<_> = f.named().collect();
        assert_eq!(named[0], ("voiceprint_dot_product_sum", 1.0));
        assert_eq!(named[5], ("cluster_match_indicator", 1.0));
    }
}
