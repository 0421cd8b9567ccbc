//! Extractor backed by precomputed embedding files.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use voxgate_verify::{ExtractError, ProsodyExtractor, VoiceprintExtractor};

#[derive(Deserialize)]
struct Sidecar {
    voiceprint: Vec<f32>,
    prosody: Vec<f32>,
}

/// Reads the embeddings of `x.wav` from `x.json`.
///
/// The external prosody model has already consumed the reference text when
/// the sidecar was written, so the text is not used here.
pub struct SidecarExtractor;

impl SidecarExtractor {
    pub fn sidecar_path(audio: &Path) -> PathBuf {
        audio.with_extension("json")
    }

    fn read(&self, audio: &Path) -> Result<Sidecar, ExtractError> {
        let path = Self::sidecar_path(audio);
        let content = fs::read_to_string(&path)
            .map_err(|e| ExtractError::new(format!("read {}: {e}", path.display())))?;
        let sidecar: Sidecar = serde_json::from_str(&content)
            .map_err(|e| ExtractError::new(format!("parse {}: {e}", path.display())))?;
        if sidecar.voiceprint.is_empty() || sidecar.prosody.is_empty() {
            return Err(ExtractError::new(format!("{}: empty embedding", path.display())));
        }
        Ok(sidecar)
    }
}

impl VoiceprintExtractor for SidecarExtractor {
    fn extract(&self, audio: &Path) -> Result<Vec<f32>, ExtractError> {
        Ok(self.read(audio)?.voiceprint)
    }
}

impl ProsodyExtractor for SidecarExtractor {
    fn extract(&self, audio: &Path, _text: &str) -> Result<Vec<f32>, ExtractError> {
        Ok(self.read(audio)?.prosody)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_both_modalities() {
        let dir = tempfile::tempdir().unwrap();
        let audio = dir.path().join("alice-000.wav");
        fs::write(
            dir.path().join("alice-000.json"),
            r#"{"voiceprint":[1.0,2.0],"prosody":[0.5]}"#,
        )
        .unwrap();

        let ex = SidecarExtractor;
        assert_eq!(VoiceprintExtractor::extract(&ex, &audio).unwrap(), vec![1.0, 2.0]);
        assert_eq!(ProsodyExtractor::extract(&ex, &audio, "hi").unwrap(), vec![0.5]);
    }

    #[test]
    fn missing_or_bad_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        let ex = SidecarExtractor;
        assert!(VoiceprintExtractor::extract(&ex, &dir.path().join("none.wav")).is_err());

        fs::write(dir.path().join("bad.json"), r#"{"voiceprint":[]}"#).unwrap();
        assert!(VoiceprintExtractor::extract(&ex, &dir.path().join("bad.wav")).is_err());

        fs::write(dir.path().join("empty.json"), r#"{"voiceprint":[],"prosody":[1]}"#).unwrap();
        assert!(VoiceprintExtractor::extract(&ex, &dir.path().join("empty.wav")).is_err());
    }
}
