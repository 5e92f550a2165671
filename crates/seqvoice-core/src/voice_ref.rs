//! Voice reference lookup and upload storage.

use crate::error::{SeqVoiceError, SeqVoiceResult};
use std::path::{Path, PathBuf};
use tracing::info;

/// Resolve a caller-supplied reference to an existing file.
///
/// The path is used as given when it exists; otherwise its file name is looked up in
/// `storage_dir`, where uploads land.
pub fn resolve_voice_reference(reference: &str, storage_dir: &Path) -> SeqVoiceResult<PathBuf> {
    let reference = reference.trim();
    if reference.is_empty() {
        return Err(SeqVoiceError::Validation(
            "voice reference must not be empty".to_string(),
        ));
    }

    let direct = PathBuf::from(reference);
    if direct.is_file() {
        return Ok(direct);
    }

    if let Some(name) = direct.file_name() {
        let stored = storage_dir.join(name);
        if stored.is_file() {
            return Ok(stored);
        }
    }

    Err(SeqVoiceError::VoiceReferenceNotFound(reference.to_string()))
}

/// Store an uploaded reference as `{stem}_{8 hex}.wav` and return its path.
pub async fn store_reference_upload(
    storage_dir: &Path,
    filename: &str,
    bytes: &[u8],
) -> SeqVoiceResult<PathBuf> {
    let original = Path::new(filename);
    let is_wav = original
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("wav"));
    if !is_wav {
        return Err(SeqVoiceError::Validation(
            "only .wav reference files are accepted".to_string(),
        ));
    }
    if bytes.is_empty() {
        return Err(SeqVoiceError::Validation("uploaded file is empty".to_string()));
    }

    let stem = original
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("reference");
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    let stored_name = format!("{}_{}.wav", stem, &suffix[..8]);

    tokio::fs::create_dir_all(storage_dir).await?;
    let path = storage_dir.join(&stored_name);
    tokio::fs::write(&path, bytes).await?;
    info!(
        target: "seqvoice::voice_ref",
        file = %stored_name,
        size = bytes.len(),
        "Stored voice reference upload"
    );
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn existing_path_resolves_directly() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("ref.wav");
        std::fs::write(&file, b"RIFF").unwrap();
        let resolved = resolve_voice_reference(file.to_str().unwrap(), Path::new("/nowhere")).unwrap();
        assert_eq!(resolved, file);
    }

    #[test]
    fn bare_name_falls_back_to_storage_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("speaker.wav"), b"RIFF").unwrap();
        let resolved = resolve_voice_reference("/client/side/speaker.wav", dir.path()).unwrap();
        assert_eq!(resolved, dir.path().join("speaker.wav"));
    }

    #[test]
    fn missing_and_empty_references_fail() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            resolve_voice_reference("ghost.wav", dir.path()),
            Err(SeqVoiceError::VoiceReferenceNotFound(_))
        ));
        assert!(matches!(
            resolve_voice_reference("  ", dir.path()),
            Err(SeqVoiceError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn upload_gets_a_unique_name() {
        let dir = tempfile::tempdir().unwrap();
        let a = store_reference_upload(dir.path(), "voice.WAV", b"RIFF").await.unwrap();
        let b = store_reference_upload(dir.path(), "voice.wav", b"RIFF").await.unwrap();
        assert_ne!(a, b);

        let name = a.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("voice_"));
        assert!(name.ends_with(".wav"));
        assert_eq!(name.len(), "voice_".len() + 8 + ".wav".len());
        assert!(a.is_file());
    }

    #[tokio::test]
    async fn upload_rejects_non_wav() {
        let dir = tempfile::tempdir().unwrap();
        assert!(store_reference_upload(dir.path(), "voice.mp3", b"ID3").await.is_err());
        assert!(store_reference_upload(dir.path(), "voice.wav", b"").await.is_err());
    }
}
