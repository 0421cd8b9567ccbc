use crate::{Modality, StoreError};

/// Persists speaker aggregates and the per-utterance batches they were
/// computed from.
///
/// Aggregates are keyed by (entity id, modality); saving overwrites any prior
/// aggregate for the same key. Utterance batches are replaced wholesale per
/// (entity id, modality) and are what the cluster refit reads back.
///
/// Implementations must be safe for concurrent use.
pub trait EmbeddingStore: Send + Sync {
    /// Returns the aggregate embedding for `entity_id`.
    fn load(&self, entity_id: &str, modality: Modality) -> Result<Vec<f32>, StoreError>;

    /// Stores the aggregate embedding for `entity_id`, replacing any prior one.
    fn save(&self, entity_id: &str, modality: Modality, vector: &[f32]) -> Result<(), StoreError>;

    /// Replaces the per-utterance batch for `entity_id`.
    fn save_utterances(
        &self,
        entity_id: &str,
        modality: Modality,
        batch: &[Vec<f32>],
    ) -> Result<(), StoreError>;

    /// Returns the per-utterance batch saved for `entity_id`.
    fn load_utterances(
        &self,
        entity_id: &str,
        modality: Modality,
    ) -> Result<Vec<Vec<f32>>, StoreError>;

    /// Deletes the aggregate for the key. Missing keys are not an error.
    fn remove(&self, entity_id: &str, modality: Modality) -> Result<(), StoreError>;

    /// Deletes the per-utterance batch for the key. Missing keys are not an
    /// error.
    fn remove_utterances(&self, entity_id: &str, modality: Modality) -> Result<(), StoreError>;

    /// Returns every stored per-utterance vector of `modality` together with
    /// the entity it belongs to. Entities are returned in ascending id order,
    /// utterances in the order they were saved.
    fn utterances(&self, modality: Modality) -> Result<Vec<(String, Vec<f32>)>, StoreError>;

    /// Returns the ids that have an aggregate in every modality, sorted.
    fn speakers(&self) -> Result<Vec<String>, StoreError>;

    /// Reports whether an aggregate exists for the key.
    fn contains(&self, entity_id: &str, modality: Modality) -> Result<bool, StoreError> {
        match self.load(entity_id, modality) {
            Ok(_) => Ok(true),
            Err(StoreError::NotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

/// Rejects ids that cannot be used as a file stem.
pub fn validate_entity_id(entity_id: &str) -> Result<(), StoreError> {
    let bad = entity_id.is_empty()
        || entity_id == "."
        || entity_id.contains("..")
        || entity_id
            .chars()
            .any(|c| c == '/' || c == '\\' || c.is_control());
    if bad {
        return Err(StoreError::InvalidEntityId(entity_id.to_string()));
    }
    Ok(())
}
