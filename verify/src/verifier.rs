use std::fs::File;
use std::io::ErrorKind;
use std::path::Path;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, error, info, warn};
use voxgate_cluster::{ClusterError, ClusterModel};
use voxgate_embedstore::{write_atomic, EmbeddingStore, LockFile, Modality, StoreError};

use crate::decision::DecisionEngine;
use crate::enroll::{AggregatedEnrollment, Enrollment};
use crate::extract::{ExtractError, ProsodyExtractor, Recording, VoiceprintExtractor};
use crate::features::{Enrolled, FeatureVector};
use crate::{VerifierConfig, VerifyError};

/// Outcome of a trial.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Verdict {
    pub verified: bool,
    pub features: FeatureVector,
}

/// Summary of a committed enrollment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrollReport {
    pub speaker_id: String,
    /// Recordings consumed.
    pub utterances: usize,
    /// Version of the cluster artifact fitted during this enrollment.
    pub cluster_version: u64,
    /// Clusters found over the whole population.
    pub clusters: usize,
    /// Majority cluster of the enrolled speaker, if any.
    pub speaker_cluster: Option<i32>,
}

/// Enrollment and trial verification over an embedding store.
///
/// Enrollments (and refits) are serialised by an internal lock and, when
/// [`VerifierConfig::lock_path`] is set, by a lock file shared with other
/// processes. Trials never wait on a fit: they load the speaker's aggregates
/// and the cluster snapshot together under a read guard, and an enrollment
/// holds the write guard only while it commits.
pub struct Verifier {
    config: VerifierConfig,
    store: Arc<dyn EmbeddingStore>,
    voiceprint: Arc<dyn VoiceprintExtractor>,
    prosody: Arc<dyn ProsodyExtractor>,
    decision: DecisionEngine,
    /// Current cluster snapshot. The write guard also covers the aggregate
    /// writes of an enrollment commit.
    published: RwLock<Option<Arc<ClusterModel>>>,
    enroll_lock: Mutex<()>,
}

impl Verifier {
    /// Creates a verifier. If the configured artifact file exists it is
    /// loaded as the initial cluster snapshot.
    pub fn new(
        config: VerifierConfig,
        store: Arc<dyn EmbeddingStore>,
        voiceprint: Arc<dyn VoiceprintExtractor>,
        prosody: Arc<dyn ProsodyExtractor>,
        decision: DecisionEngine,
    ) -> Result<Self, VerifyError> {
        let cluster = match &config.artifact_path {
            Some(path) => load_artifact(path)?.map(Arc::new),
            None => None,
        };
        if let Some(model) = &cluster {
            info!(
                version = model.version(),
                clusters = model.table().centroids().len(),
                "loaded cluster artifact"
            );
        }
        Ok(Self {
            config,
            store,
            voiceprint,
            prosody,
            decision,
            published: RwLock::new(cluster),
            enroll_lock: Mutex::new(()),
        })
    }

    pub fn config(&self) -> &VerifierConfig {
        &self.config
    }

    /// Current cluster snapshot, if one has been fitted or loaded.
    pub fn cluster_model(&self) -> Option<Arc<ClusterModel>> {
        self.published.read().unwrap().clone()
    }

    /// Ids with both aggregates, sorted.
    pub fn speakers(&self) -> Result<Vec<String>, VerifyError> {
        Ok(self.store.speakers()?)
    }

    /// Enrolls (or re-enrolls) a speaker from exactly `batch_size`
    /// recordings.
    ///
    /// Every recording is extracted and the cluster model is refitted before
    /// anything is written. Then utterance batches, aggregates, and the
    /// artifact file are committed in that order, and the new cluster
    /// snapshot is published. If any write fails, the speaker's prior
    /// batches and aggregates are put back.
    pub fn enroll(
        &self,
        speaker_id: &str,
        recordings: &[Recording],
    ) -> Result<EnrollReport, VerifyError> {
        let _guard = self.enroll_lock.lock().unwrap();

        let enrollment = Enrollment::collect(
            speaker_id,
            self.config.batch_size,
            recordings,
            self.voiceprint.as_ref(),
            self.prosody.as_ref(),
        )?
        .aggregate()?;

        let _file_lock = self.lock_file()?;
        self.sync_artifact()?;

        let (vectors, labels) = self.population(Some(&enrollment))?;
        let model = self.fit(&vectors, &labels)?;
        let prior = Prior::capture(self.store.as_ref(), speaker_id)?;

        let mut published = self.published.write().unwrap();
        if let Err(e) = self.commit(&enrollment, &model) {
            warn!(speaker_id, error = %e, "enrollment commit failed; restoring prior state");
            prior.restore(self.store.as_ref(), speaker_id);
            return Err(e);
        }
        let model = Arc::new(model);
        *published = Some(model.clone());
        drop(published);

        let report = EnrollReport {
            speaker_id: speaker_id.to_string(),
            utterances: recordings.len(),
            cluster_version: model.version(),
            clusters: model.table().centroids().len(),
            speaker_cluster: model.table().speaker_cluster(speaker_id),
        };
        info!(
            speaker_id,
            cluster_version = report.cluster_version,
            clusters = report.clusters,
            speaker_cluster = ?report.speaker_cluster,
            "enrolled speaker"
        );
        Ok(report)
    }

    /// Rebuilds the cluster artifact from the stored utterances.
    pub fn refit(&self) -> Result<Arc<ClusterModel>, VerifyError> {
        let _guard = self.enroll_lock.lock().unwrap();
        let _file_lock = self.lock_file()?;
        self.sync_artifact()?;

        let (vectors, labels) = self.population(None)?;
        let model = self.fit(&vectors, &labels)?;
        self.write_artifact(&model)?;
        let model = Arc::new(model);
        *self.published.write().unwrap() = Some(model.clone());
        info!(
            version = model.version(),
            clusters = model.table().centroids().len(),
            "refitted cluster model"
        );
        Ok(model)
    }

    /// Computes trial features against an enrolled speaker.
    pub fn features(
        &self,
        speaker_id: &str,
        recording: &Recording,
    ) -> Result<FeatureVector, VerifyError> {
        let (enrolled, cluster) = self.snapshot(speaker_id)?;
        self.trial_features(speaker_id, recording, &enrolled, cluster.as_deref())
    }

    /// Scores a trial recording against an enrolled speaker.
    ///
    /// Unknown speakers and missing decision stages are rejected before the
    /// recording is read.
    pub fn validate_trial(
        &self,
        speaker_id: &str,
        recording: &Recording,
    ) -> Result<Verdict, VerifyError> {
        let (enrolled, cluster) = self.snapshot(speaker_id)?;
        self.decision.ensure_ready()?;

        let features = self.trial_features(speaker_id, recording, &enrolled, cluster.as_deref())?;
        let verified = self.decision.score(&features)?;
        info!(speaker_id, verified, "scored trial");
        Ok(Verdict { verified, features })
    }

    /// Loads the speaker's aggregates and the cluster snapshot as one
    /// consistent view.
    fn snapshot(
        &self,
        speaker_id: &str,
    ) -> Result<(Enrolled, Option<Arc<ClusterModel>>), VerifyError> {
        let published = self.published.read().unwrap();
        let enrolled = Enrolled::load(self.store.as_ref(), speaker_id)?;
        Ok((enrolled, published.clone()))
    }

    fn trial_features(
        &self,
        speaker_id: &str,
        recording: &Recording,
        enrolled: &Enrolled,
        cluster: Option<&ClusterModel>,
    ) -> Result<FeatureVector, VerifyError> {
        let extraction = |stage: &str, e: ExtractError| VerifyError::ExtractionFailed {
            index: 0,
            reason: format!("{stage} {}: {e}", recording.audio.display()),
        };
        let vp = self
            .voiceprint
            .extract(&recording.audio)
            .map_err(|e| extraction("voiceprint", e))?;
        let pr = self
            .prosody
            .extract(&recording.audio, &recording.text)
            .map_err(|e| extraction("prosody", e))?;

        if cluster.is_none() {
            warn!(speaker_id, "no cluster model; cluster feature is 0");
        }
        enrolled.features(cluster, speaker_id, &vp, &pr)
    }

    /// Every stored voiceprint utterance with its speaker, optionally with a
    /// pending enrollment substituted for that speaker's stored batch.
    /// Ordered by speaker id, then utterance order.
    fn population(
        &self,
        pending: Option<&AggregatedEnrollment>,
    ) -> Result<(Vec<Vec<f32>>, Vec<String>), VerifyError> {
        let mut rows = self.store.utterances(Modality::Voiceprint)?;
        if let Some(e) = pending {
            rows.retain(|(id, _)| id != e.speaker_id());
            rows.extend(
                e.utterances(Modality::Voiceprint)
                    .iter()
                    .map(|v| (e.speaker_id().to_string(), v.clone())),
            );
            rows.sort_by(|a, b| a.0.cmp(&b.0));
        }
        Ok(rows.into_iter().map(|(id, v)| (v, id)).unzip())
    }

    fn fit(&self, vectors: &[Vec<f32>], labels: &[String]) -> Result<ClusterModel, VerifyError> {
        let version = self.cluster_model().map(|m| m.version() + 1).unwrap_or(1);
        let model = ClusterModel::fit(vectors, labels, &self.config.cluster)?.with_version(version);
        debug!(
            version,
            points = vectors.len(),
            clusters = model.table().centroids().len(),
            "fitted population"
        );
        Ok(model)
    }

    /// Writes batches, aggregates, and the artifact, in that order.
    fn commit(
        &self,
        enrollment: &AggregatedEnrollment,
        model: &ClusterModel,
    ) -> Result<(), VerifyError> {
        let speaker_id = enrollment.speaker_id();
        for m in Modality::ALL {
            self.store
                .save_utterances(speaker_id, m, enrollment.utterances(m))?;
        }
        for m in Modality::ALL {
            self.store.save(speaker_id, m, enrollment.mean(m))?;
        }
        self.write_artifact(model)
    }

    fn write_artifact(&self, model: &ClusterModel) -> Result<(), VerifyError> {
        if let Some(path) = &self.config.artifact_path {
            write_atomic(path, |w| model.save(w))?;
            debug!(path = %path.display(), version = model.version(), "wrote cluster artifact");
        }
        Ok(())
    }

    fn lock_file(&self) -> Result<Option<LockFile>, VerifyError> {
        let Some(path) = &self.config.lock_path else {
            return Ok(None);
        };
        let wait = Duration::from_millis(self.config.lock_wait_ms);
        match LockFile::acquire(path, wait) {
            Ok(lock) => Ok(Some(lock)),
            Err(e) if e.kind() == ErrorKind::WouldBlock => {
                Err(VerifyError::EnrollmentLocked(path.clone()))
            }
            Err(e) => Err(StoreError::from(e).into()),
        }
    }

    /// Adopts an artifact written by another process since this one loaded.
    fn sync_artifact(&self) -> Result<(), VerifyError> {
        let Some(path) = &self.config.artifact_path else {
            return Ok(());
        };
        let Some(on_disk) = load_artifact(path)? else {
            return Ok(());
        };
        let current = self.cluster_model().map(|m| m.version()).unwrap_or(0);
        if on_disk.version() > current {
            debug!(version = on_disk.version(), "adopted newer cluster artifact");
            *self.published.write().unwrap() = Some(Arc::new(on_disk));
        }
        Ok(())
    }
}

/// A speaker's stored state before an enrollment commit.
struct Prior {
    aggregates: Vec<(Modality, Option<Vec<f32>>)>,
    utterances: Vec<(Modality, Option<Vec<Vec<f32>>>)>,
}

impl Prior {
    fn capture(store: &dyn EmbeddingStore, speaker_id: &str) -> Result<Self, VerifyError> {
        let mut prior = Self {
            aggregates: Vec::new(),
            utterances: Vec::new(),
        };
        for m in Modality::ALL {
            prior
                .aggregates
                .push((m, optional(store.load(speaker_id, m))?));
            prior
                .utterances
                .push((m, optional(store.load_utterances(speaker_id, m))?));
        }
        Ok(prior)
    }

    /// Best effort: every key is attempted even if an earlier one fails.
    fn restore(&self, store: &dyn EmbeddingStore, speaker_id: &str) {
        for (m, batch) in &self.utterances {
            let res = match batch {
                Some(b) => store.save_utterances(speaker_id, *m, b),
                None => store.remove_utterances(speaker_id, *m),
            };
            if let Err(e) = res {
                error!(speaker_id, modality = %m, error = %e, "failed to restore utterances");
            }
        }
        for (m, vector) in &self.aggregates {
            let res = match vector {
                Some(v) => store.save(speaker_id, *m, v),
                None => store.remove(speaker_id, *m),
            };
            if let Err(e) = res {
                error!(speaker_id, modality = %m, error = %e, "failed to restore aggregate");
            }
        }
    }
}

fn optional<T>(res: Result<T, StoreError>) -> Result<Option<T>, StoreError> {
    match res {
        Ok(v) => Ok(Some(v)),
        Err(StoreError::NotFound { .. }) => Ok(None),
        Err(e) => Err(e),
    }
}

fn load_artifact(path: &Path) -> Result<Option<ClusterModel>, VerifyError> {
    let mut file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(ClusterError::from(e).into()),
    };
    Ok(Some(ClusterModel::load(&mut file)?))
}
