//! Enrollment state: utterance embeddings are collected, then reduced to one
//! aggregate per modality.
//!
//! [`Enrollment`] is the collecting state and only turns into an
//! [`AggregatedEnrollment`] when it holds exactly the expected batch. Neither
//! touches storage; the [`Verifier`](crate::Verifier) commits the result.

use tracing::debug;
use voxgate_embedstore::{aggregate, validate_entity_id, Modality};

use crate::extract::{ProsodyExtractor, Recording, VoiceprintExtractor};
use crate::VerifyError;

/// Utterance embeddings collected for one speaker.
#[derive(Debug, Clone)]
pub struct Enrollment {
    speaker_id: String,
    batch_size: usize,
    voiceprints: Vec<Vec<f32>>,
    prosody: Vec<Vec<f32>>,
}

impl Enrollment {
    pub fn new(speaker_id: &str, batch_size: usize) -> Result<Self, VerifyError> {
        validate_entity_id(speaker_id)?;
        Ok(Self {
            speaker_id: speaker_id.to_string(),
            batch_size,
            voiceprints: Vec::with_capacity(batch_size),
            prosody: Vec::with_capacity(batch_size),
        })
    }

    /// Extracts both embeddings of every recording, in order.
    ///
    /// The batch size is checked before any extraction. The first failing
    /// recording aborts the whole collection.
    pub fn collect(
        speaker_id: &str,
        batch_size: usize,
        recordings: &[Recording],
        voiceprint: &dyn VoiceprintExtractor,
        prosody: &dyn ProsodyExtractor,
    ) -> Result<Self, VerifyError> {
        if recordings.len() != batch_size {
            return Err(VerifyError::InvalidBatchSize {
                expected: batch_size,
                got: recordings.len(),
            });
        }
        let mut enrollment = Self::new(speaker_id, batch_size)?;
        for (index, rec) in recordings.iter().enumerate() {
            let vp = voiceprint
                .extract(&rec.audio)
                .map_err(|e| VerifyError::ExtractionFailed {
                    index,
                    reason: format!("voiceprint {}: {e}", rec.audio.display()),
                })?;
            let pr = prosody
                .extract(&rec.audio, &rec.text)
                .map_err(|e| VerifyError::ExtractionFailed {
                    index,
                    reason: format!("prosody {}: {e}", rec.audio.display()),
                })?;
            enrollment.push(vp, pr);
        }
        debug!(speaker_id, count = enrollment.len(), "collected utterance embeddings");
        Ok(enrollment)
    }

    pub fn push(&mut self, voiceprint: Vec<f32>, prosody: Vec<f32>) {
        self.voiceprints.push(voiceprint);
        self.prosody.push(prosody);
    }

    pub fn len(&self) -> usize {
        self.voiceprints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voiceprints.is_empty()
    }

    pub fn speaker_id(&self) -> &str {
        &self.speaker_id
    }

    /// Reduces the batch to per-modality means.
    pub fn aggregate(self) -> Result<AggregatedEnrollment, VerifyError> {
        if self.len() != self.batch_size {
            return Err(VerifyError::InvalidBatchSize {
                expected: self.batch_size,
                got: self.len(),
            });
        }
        let voiceprint_mean = aggregate(&self.speaker_id, &self.voiceprints)?;
        let prosody_mean = aggregate(&self.speaker_id, &self.prosody)?;
        Ok(AggregatedEnrollment {
            speaker_id: self.speaker_id,
            voiceprints: self.voiceprints,
            prosody: self.prosody,
            voiceprint_mean,
            prosody_mean,
        })
    }
}

/// A complete enrollment ready to be committed.
#[derive(Debug, Clone)]
pub struct AggregatedEnrollment {
    speaker_id: String,
    voiceprints: Vec<Vec<f32>>,
    prosody: Vec<Vec<f32>>,
    voiceprint_mean: Vec<f32>,
    prosody_mean: Vec<f32>,
}

impl AggregatedEnrollment {
    pub fn speaker_id(&self) -> &str {
        &self.speaker_id
    }

    /// Per-utterance embeddings of a modality, in recording order.
    pub fn utterances(&self, modality: Modality) -> &[Vec<f32>] {
        match modality {
            Modality::Voiceprint => &self.voiceprints,
            Modality::Prosody => &self.prosody,
        }
    }

    /// The aggregate embedding of a modality.
    pub fn mean(&self, modality: Modality) -> &[f32] {
        match modality {
            Modality::Voiceprint => &self.voiceprint_mean,
            Modality::Prosody => &self.prosody_mean,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::extract::ExtractError;

    struct Echo;

    impl VoiceprintExtractor for Echo {
        fn extract(&self, audio: &Path) -> Result<Vec<f32>, ExtractError> {
            let n: f32 = audio
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| s.parse().ok())
                .ok_or_else(|| ExtractError::new("bad name"))?;
            Ok(vec![n, 1.0])
        }
    }

    impl ProsodyExtractor for Echo {
        fn extract(&self, _audio: &Path, text: &str) -> Result<Vec<f32>, ExtractError> {
            Ok(vec![text.len() as f32])
        }
    }

    fn recordings(names: &[&str]) -> Vec<Recording> {
        names
            .iter()
            .map(|n| Recording::new(format!("{n}.wav"), "ab"))
            .collect()
    }

    #[test]
    fn collect_and_aggregate() {
        let recs = recordings(&["1", "2", "3", "6"]);
        let e = Enrollment::collect("alice", 4, &recs, &Echo, &Echo).unwrap();
        assert_eq!(e.len(), 4);
        let agg = e.aggregate().unwrap();
        assert_eq!(agg.speaker_id(), "alice");
        assert_eq!(agg.mean(Modality::Voiceprint).to_vec(), vec![3.0, 1.0]);
        assert_eq!(agg.mean(Modality::Prosody).to_vec(), vec![2.0]);
        assert_eq!(agg.utterances(Modality::Voiceprint)[3], vec![6.0, 1.0]);
    }

    #[test]
    fn wrong_batch_size() {
        let recs = recordings(&["1", "2"]);
        assert!(matches!(
            Enrollment::collect("alice", 3, &recs, &Echo, &Echo),
            Err(VerifyError::InvalidBatchSize { expected: 3, got: 2 })
        ));

        let mut e = Enrollment::new("alice", 2).unwrap();
        e.push(vec![1.0], vec![1.0]);
        assert!(matches!(
            e.aggregate(),
            Err(VerifyError::InvalidBatchSize { expected: 2, got: 1 })
        ));
    }

    #[test]
    fn extraction_failure_reports_index() {
        let recs = recordings(&["1", "x", "3"]);
        let err = Enrollment::collect("alice", 3, &recs, &Echo, &Echo).unwrap_err();
        assert!(matches!(err, VerifyError::ExtractionFailed { index: 1, .. }));
    }

    #[test]
    fn ragged_batch_is_rejected() {
        let mut e = Enrollment::new("alice", 2).unwrap();
        e.push(vec![1.0, 2.0], vec![1.0]);
        e.push(vec![1.0], vec![1.0]);
        assert!(matches!(e.aggregate(), Err(VerifyError::Store(_))));
    }

    #[test]
    fn invalid_speaker_id() {
        assert!(matches!(Enrollment::new("../etc", 20), Err(VerifyError::Store(_))));
    }
}
