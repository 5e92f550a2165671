//! Task Registry: concurrency-safe map from task id to [`TaskRecord`].
//!
//! Every mutation happens under the entry's shard lock, so a reader's clone is never a
//! half-applied update. Guards are dropped before returning; callers never hold one
//! across an `.await`.

use crate::artifacts::ArtifactHandle;
use crate::error::{SeqVoiceError, SeqVoiceResult};
use crate::task::{SentenceStatus, TaskRecord, TaskStatusView};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::path::PathBuf;

#[derive(Debug, Default)]
pub struct TaskRegistry {
    tasks: DashMap<String, TaskRecord>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a fresh record with every sentence `waiting`.
    pub fn create(
        &self,
        task_id: &str,
        sentences: Vec<String>,
        voice_reference: impl Into<PathBuf>,
    ) -> SeqVoiceResult<TaskRecord> {
        match self.tasks.entry(task_id.to_string()) {
            Entry::Occupied(_) => Err(SeqVoiceError::DuplicateTask(task_id.to_string())),
            Entry::Vacant(slot) => {
                let record = TaskRecord::new(task_id, sentences, voice_reference);
                slot.insert(record.clone());
                Ok(record)
            }
        }
    }

    /// Consistent snapshot of the record.
    pub fn get(&self, task_id: &str) -> SeqVoiceResult<TaskRecord> {
        self.tasks
            .get(task_id)
            .map(|r| r.value().clone())
            .ok_or_else(|| SeqVoiceError::TaskNotFound(task_id.to_string()))
    }

    pub fn status(&self, task_id: &str) -> SeqVoiceResult<TaskStatusView> {
        self.tasks
            .get(task_id)
            .map(|r| r.status_view())
            .ok_or_else(|| SeqVoiceError::TaskNotFound(task_id.to_string()))
    }

    pub fn contains(&self, task_id: &str) -> bool {
        self.tasks.contains_key(task_id)
    }

    /// Apply one sentence transition. `artifact` is required for `completed` and ignored
    /// otherwise. Illegal transitions leave the record untouched.
    pub fn update_sentence(
        &self,
        task_id: &str,
        slot: usize,
        status: SentenceStatus,
        artifact: Option<ArtifactHandle>,
    ) -> SeqVoiceResult<()> {
        self.with_record(task_id, |record| match status {
            SentenceStatus::Processing => record.begin_sentence(slot),
            SentenceStatus::Completed => {
                let artifact = artifact.ok_or_else(|| {
                    SeqVoiceError::OrchestrationFault(format!(
                        "{}: sentence {} completed without an artifact",
                        task_id, slot
                    ))
                })?;
                record.complete_sentence(slot, artifact)
            }
            SentenceStatus::Error => record.fail_sentence(slot),
            SentenceStatus::Waiting => Err(SeqVoiceError::OrchestrationFault(format!(
                "{}: sentence {} cannot return to waiting",
                task_id, slot
            ))),
        })
    }

    /// Mark the task `completed`. Every sentence must already be terminal.
    pub fn finish(&self, task_id: &str) -> SeqVoiceResult<()> {
        self.with_record(task_id, TaskRecord::finish)
    }

    /// Mark the task `failed`, keeping whatever partial state was recorded.
    pub fn mark_failed(&self, task_id: &str, reason: &str) -> SeqVoiceResult<()> {
        self.with_record(task_id, |record| record.mark_failed(reason))
    }

    /// Drop the record, returning it if it existed.
    pub fn remove(&self, task_id: &str) -> Option<TaskRecord> {
        self.tasks.remove(task_id).map(|(_, record)| record)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn task_ids(&self) -> Vec<String> {
        self.tasks.iter().map(|r| r.key().clone()).collect()
    }

    fn with_record<F>(&self, task_id: &str, f: F) -> SeqVoiceResult<()>
    where
        F: FnOnce(&mut TaskRecord) -> SeqVoiceResult<()>,
    {
        let mut entry = self
            .tasks
            .get_mut(task_id)
            .ok_or_else(|| SeqVoiceError::TaskNotFound(task_id.to_string()))?;
        f(entry.value_mut())
    }
}
