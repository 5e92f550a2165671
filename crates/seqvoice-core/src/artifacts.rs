//! Where synthesized audio lives once a sentence completes.
//!
//! The worker lane hands raw bytes to an [`ArtifactStore`] and records the returned
//! [`ArtifactHandle`] in the task. Fetching goes back through the same store.

use crate::error::{SeqVoiceError, SeqVoiceResult};
use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Reference to one stored sentence artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactHandle {
    /// File name, unique per (task, sentence). Used in fetch URLs.
    pub filename: String,
    pub path: PathBuf,
    /// Size in bytes.
    pub size: u64,
}

/// `output_{task_id}_s{slot}.{extension}`
pub fn artifact_filename(task_id: &str, slot: usize, extension: &str) -> String {
    format!("output_{}_s{}.{}", task_id, slot, extension)
}

#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Persist audio for sentence `slot` (0-based) of `task_id`.
    async fn put(&self, task_id: &str, slot: usize, audio: &[u8]) -> SeqVoiceResult<ArtifactHandle>;

    /// Read back the bytes behind a handle.
    async fn read(&self, handle: &ArtifactHandle) -> SeqVoiceResult<Vec<u8>>;
}

/// Writes artifacts as files under one directory.
#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    dir: PathBuf,
    extension: String,
}

impl FsArtifactStore {
    pub fn new(dir: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            extension: extension.into(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl ArtifactStore for FsArtifactStore {
    async fn put(&self, task_id: &str, slot: usize, audio: &[u8]) -> SeqVoiceResult<ArtifactHandle> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let filename = artifact_filename(task_id, slot, &self.extension);
        let path = self.dir.join(&filename);
        tokio::fs::write(&path, audio).await?;
        Ok(ArtifactHandle {
            filename,
            path,
            size: audio.len() as u64,
        })
    }

    async fn read(&self, handle: &ArtifactHandle) -> SeqVoiceResult<Vec<u8>> {
        match tokio::fs::read(&handle.path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(SeqVoiceError::ArtifactNotFound {
                    task_id: String::new(),
                    what: handle.filename.clone(),
                })
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Keeps artifacts in memory. Handy for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryArtifactStore {
    blobs: DashMap<String, Vec<u8>>,
}

impl MemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }
}

#[async_trait]
impl ArtifactStore for MemoryArtifactStore {
    async fn put(&self, task_id: &str, slot: usize, audio: &[u8]) -> SeqVoiceResult<ArtifactHandle> {
        let filename = artifact_filename(task_id, slot, "wav");
        self.blobs.insert(filename.clone(), audio.to_vec());
        Ok(ArtifactHandle {
            path: PathBuf::from(&filename),
            filename,
            size: audio.len() as u64,
        })
    }

    async fn read(&self, handle: &ArtifactHandle) -> SeqVoiceResult<Vec<u8>> {
        self.blobs
            .get(&handle.filename)
            .map(|b| b.value().clone())
            .ok_or_else(|| SeqVoiceError::ArtifactNotFound {
                task_id: String::new(),
                what: handle.filename.clone(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filename_is_unique_per_slot() {
        assert_eq!(artifact_filename("task_ab12cd34", 3, "wav"), "output_task_ab12cd34_s3.wav");
        assert_ne!(
            artifact_filename("task_a", 1, "wav"),
            artifact_filename("task_a", 2, "wav")
        );
    }

    #[tokio::test]
    async fn fs_store_writes_and_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsArtifactStore::new(dir.path().join("out"), "wav");

        let handle = store.put("task_x", 0, b"RIFFdata").await.unwrap();
        assert_eq!(handle.filename, "output_task_x_s0.wav");
        assert_eq!(handle.size, 8);
        assert!(handle.path.exists());
        assert_eq!(store.read(&handle).await.unwrap(), b"RIFFdata");
    }

    #[tokio::test]
    async fn fs_store_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsArtifactStore::new(dir.path(), "wav");
        let handle = ArtifactHandle {
            filename: "gone.wav".into(),
            path: dir.path().join("gone.wav"),
            size: 0,
        };
        assert!(matches!(
            store.read(&handle).await,
            Err(SeqVoiceError::ArtifactNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn memory_store_round_trip() {
        let store = MemoryArtifactStore::new();
        let handle = store.put("task_m", 2, &[1, 2, 3]).await.unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.read(&handle).await.unwrap(), vec![1, 2, 3]);
    }
}
