use std::collections::BTreeMap;
use std::sync::RwLock;

use crate::store::{validate_entity_id, EmbeddingStore};
use crate::{Modality, StoreError};

/// In-memory [`EmbeddingStore`]. Data is lost on restart.
/// Suitable for testing or ephemeral use.
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
}

#[derive(Default)]
struct MemoryStoreInner {
    aggregates: BTreeMap<(String, Modality), Vec<f32>>,
    utterances: BTreeMap<(String, Modality), Vec<Vec<f32>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryStoreInner::default()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl EmbeddingStore for MemoryStore {
    fn load(&self, entity_id: &str, modality: Modality) -> Result<Vec<f32>, StoreError> {
        let inner = self.inner.read().unwrap();
        inner
            .aggregates
            .get(&(entity_id.to_string(), modality))
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                entity_id: entity_id.to_string(),
                modality,
            })
    }

    fn save(&self, entity_id: &str, modality: Modality, vector: &[f32]) -> Result<(), StoreError> {
        validate_entity_id(entity_id)?;
        let mut inner = self.inner.write().unwrap();
        inner
            .aggregates
            .insert((entity_id.to_string(), modality), vector.to_vec());
        Ok(())
    }

    fn save_utterances(
        &self,
        entity_id: &str,
        modality: Modality,
        batch: &[Vec<f32>],
    ) -> Result<(), StoreError> {
        validate_entity_id(entity_id)?;
        let mut inner = self.inner.write().unwrap();
        inner
            .utterances
            .insert((entity_id.to_string(), modality), batch.to_vec());
        Ok(())
    }

    fn load_utterances(
        &self,
        entity_id: &str,
        modality: Modality,
    ) -> Result<Vec<Vec<f32>>, StoreError> {
        let inner = self.inner.read().unwrap();
        inner
            .utterances
            .get(&(entity_id.to_string(), modality))
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                entity_id: entity_id.to_string(),
                modality,
            })
    }

    fn remove(&self, entity_id: &str, modality: Modality) -> Result<(), StoreError> {
        let mut inner = self.inner.write().unwrap();
        inner.aggregates.remove(&(entity_id.to_string(), modality));
        Ok(())
    }

    fn remove_utterances(&self, entity_id: &str, modality: Modality) -> Result<(), StoreError> {
        let mut inner = self.inner.write().unwrap();
        inner.utterances.remove(&(entity_id.to_string(), modality));
        Ok(())
    }

    fn utterances(&self, modality: Modality) -> Result<Vec<(String, Vec<f32>)>, StoreError> {
        let inner = self.inner.read().unwrap();
        let mut out = Vec::new();
        for ((id, m), batch) in &inner.utterances {
            if *m != modality {
                continue;
            }
            out.extend(batch.iter().map(|v| (id.clone(), v.clone())));
        }
        Ok(out)
    }

    fn speakers(&self) -> Result<Vec<String>, StoreError> {
        let inner = self.inner.read().unwrap();
        let mut ids: Vec<String> = inner
            .aggregates
            .keys()
            .filter(|(_, m)| *m == Modality::Voiceprint)
            .map(|(id, _)| id.clone())
            .filter(|id| {
                inner
                    .aggregates
                    .contains_key(&(id.clone(), Modality::Prosody))
            })
            .collect();
        ids.sort();
        Ok(ids)
    }
}
