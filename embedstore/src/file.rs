use std::fs::{self, File};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::codec::{read_vectors, write_vectors};
use crate::fsutil::write_atomic;
use crate::store::{validate_entity_id, EmbeddingStore};
use crate::{Modality, StoreError};

const VEC_EXT: &str = "vec";

/// Directory-backed [`EmbeddingStore`].
///
/// Layout under the root directory:
///
/// ```text
/// speakers/<modality>/<entity>.vec     aggregate (batch of one)
/// utterances/<modality>/<entity>.vec   per-utterance batch
/// ```
///
/// Every file is replaced atomically, so concurrent readers never observe a
/// partial vector.
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Opens (and creates, if missing) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        for m in Modality::ALL {
            fs::create_dir_all(root.join("speakers").join(m.as_str()))?;
            fs::create_dir_all(root.join("utterances").join(m.as_str()))?;
        }
        Ok(Self { root })
    }

    /// Returns the root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn aggregate_path(&self, entity_id: &str, modality: Modality) -> PathBuf {
        self.root
            .join("speakers")
            .join(modality.as_str())
            .join(format!("{entity_id}.{VEC_EXT}"))
    }

    fn utterance_path(&self, entity_id: &str, modality: Modality) -> PathBuf {
        self.root
            .join("utterances")
            .join(modality.as_str())
            .join(format!("{entity_id}.{VEC_EXT}"))
    }

    /// Lists entity ids with a `.vec` file in `dir`, sorted.
    fn list_ids(dir: &Path) -> Result<Vec<String>, StoreError> {
        let entries = match fs::read_dir(dir) {
            Ok(e) => e,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut ids = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(VEC_EXT) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                ids.push(stem.to_string());
            }
        }
        ids.sort();
        Ok(ids)
    }
}

impl EmbeddingStore for FileStore {
    fn load(&self, entity_id: &str, modality: Modality) -> Result<Vec<f32>, StoreError> {
        validate_entity_id(entity_id)?;
        let path = self.aggregate_path(entity_id, modality);
        let mut file = match File::open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StoreError::NotFound {
                    entity_id: entity_id.to_string(),
                    modality,
                });
            }
            Err(e) => return Err(e.into()),
        };
        let mut batch = read_vectors(&mut file)?;
        if batch.len() != 1 {
            return Err(StoreError::InvalidFormat(format!(
                "{}: expected 1 vector, found {}",
                path.display(),
                batch.len()
            )));
        }
        Ok(batch.remove(0))
    }

    fn save(&self, entity_id: &str, modality: Modality, vector: &[f32]) -> Result<(), StoreError> {
        validate_entity_id(entity_id)?;
        let path = self.aggregate_path(entity_id, modality);
        write_atomic(&path, |w| write_vectors(w, &[vector]))?;
        debug!(entity_id, %modality, dim = vector.len(), "saved aggregate");
        Ok(())
    }

    fn save_utterances(
        &self,
        entity_id: &str,
        modality: Modality,
        batch: &[Vec<f32>],
    ) -> Result<(), StoreError> {
        validate_entity_id(entity_id)?;
        let path = self.utterance_path(entity_id, modality);
        write_atomic(&path, |w| write_vectors(w, batch))?;
        debug!(entity_id, %modality, count = batch.len(), "saved utterances");
        Ok(())
    }

    fn load_utterances(
        &self,
        entity_id: &str,
        modality: Modality,
    ) -> Result<Vec<Vec<f32>>, StoreError> {
        validate_entity_id(entity_id)?;
        let mut file = match File::open(self.utterance_path(entity_id, modality)) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StoreError::NotFound {
                    entity_id: entity_id.to_string(),
                    modality,
                });
            }
            Err(e) => return Err(e.into()),
        };
        read_vectors(&mut file)
    }

    fn remove(&self, entity_id: &str, modality: Modality) -> Result<(), StoreError> {
        validate_entity_id(entity_id)?;
        remove_if_exists(&self.aggregate_path(entity_id, modality))?;
        debug!(entity_id, %modality, "removed aggregate");
        Ok(())
    }

    fn remove_utterances(&self, entity_id: &str, modality: Modality) -> Result<(), StoreError> {
        validate_entity_id(entity_id)?;
        remove_if_exists(&self.utterance_path(entity_id, modality))?;
        debug!(entity_id, %modality, "removed utterances");
        Ok(())
    }

    fn utterances(&self, modality: Modality) -> Result<Vec<(String, Vec<f32>)>, StoreError> {
        let dir = self.root.join("utterances").join(modality.as_str());
        let mut out = Vec::new();
        for id in Self::list_ids(&dir)? {
            let mut file = File::open(self.utterance_path(&id, modality))?;
            for v in read_vectors(&mut file)? {
                out.push((id.clone(), v));
            }
        }
        Ok(out)
    }

    fn speakers(&self) -> Result<Vec<String>, StoreError> {
        let vp = Self::list_ids(&self.root.join("speakers").join(Modality::Voiceprint.as_str()))?;
        let pr = Self::list_ids(&self.root.join("speakers").join(Modality::Prosody.as_str()))?;
        Ok(vp.into_iter().filter(|id| pr.binary_search(id).is_ok()).collect())
    }
}

fn remove_if_exists(path: &Path) -> Result<(), StoreError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregate_roundtrip_and_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();

        store.save("alice", Modality::Voiceprint, &[1.0, 2.0, 3.0]).unwrap();
        assert_eq!(
            store.load("alice", Modality::Voiceprint).unwrap(),
            vec![1.0, 2.0, 3.0]
        );

        store.save("alice", Modality::Voiceprint, &[4.0, 5.0, 6.0]).unwrap();
        assert_eq!(
            store.load("alice", Modality::Voiceprint).unwrap(),
            vec![4.0, 5.0, 6.0]
        );
    }

    #[test]
    fn missing_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        assert!(matches!(
            store.load("ghost", Modality::Prosody),
            Err(StoreError::NotFound { .. })
        ));
    }

    #[test]
    fn survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = FileStore::open(dir.path()).unwrap();
            store.save("bob", Modality::Voiceprint, &[0.5]).unwrap();
            store.save("bob", Modality::Prosody, &[0.25]).unwrap();
            store
                .save_utterances("bob", Modality::Voiceprint, &[vec![0.4], vec![0.6]])
                .unwrap();
        }
        let store = FileStore::open(dir.path()).unwrap();
        assert_eq!(store.speakers().unwrap(), vec!["bob".to_string()]);
        assert_eq!(
            store.utterances(Modality::Voiceprint).unwrap(),
            vec![("bob".to_string(), vec![0.4]), ("bob".to_string(), vec![0.6])]
        );
        assert!(store.utterances(Modality::Prosody).unwrap().is_empty());
    }

    #[test]
    fn speakers_sorted_and_complete_only() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        for id in ["carol", "alice"] {
            store.save(id, Modality::Voiceprint, &[1.0]).unwrap();
            store.save(id, Modality::Prosody, &[1.0]).unwrap();
        }
        store.save("dave", Modality::Voiceprint, &[1.0]).unwrap();
        assert_eq!(
            store.speakers().unwrap(),
            vec!["alice".to_string(), "carol".to_string()]
        );
    }

    #[test]
    fn utterances_load_and_remove() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        store
            .save_utterances("bob", Modality::Prosody, &[vec![0.1, 0.2], vec![0.3, 0.4]])
            .unwrap();
        store.save("bob", Modality::Prosody, &[0.2, 0.3]).unwrap();
        assert_eq!(
            store.load_utterances("bob", Modality::Prosody).unwrap(),
            vec![vec![0.1, 0.2], vec![0.3, 0.4]]
        );

        store.remove_utterances("bob", Modality::Prosody).unwrap();
        store.remove("bob", Modality::Prosody).unwrap();
        store.remove("bob", Modality::Prosody).unwrap();
        assert!(matches!(
            store.load_utterances("bob", Modality::Prosody),
            Err(StoreError::NotFound { .. })
        ));
        assert!(store.utterances(Modality::Prosody).unwrap().is_empty());
        assert!(!store.contains("bob", Modality::Prosody).unwrap());
    }

    #[test]
    fn corrupt_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        fs::write(store.aggregate_path("eve", Modality::Voiceprint), b"garbage!").unwrap();
        assert!(matches!(
            store.load("eve", Modality::Voiceprint),
            Err(StoreError::InvalidFormat(_))
        ));

        // A header claiming ~100 GB must fail cleanly, not abort.
        let mut huge = b"VGEM".to_vec();
        huge.extend_from_slice(&1u32.to_le_bytes());
        huge.extend_from_slice(&u32::MAX.to_le_bytes());
        huge.extend_from_slice(&u32::MAX.to_le_bytes());
        fs::write(store.utterance_path("eve", Modality::Voiceprint), &huge).unwrap();
        assert!(matches!(
            store.utterances(Modality::Voiceprint),
            Err(StoreError::InvalidFormat(_))
        ));
    }
}
