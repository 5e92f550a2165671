//! Task Record: one submitted synthesis job and its per-sentence state machine.
//!
//! A sentence moves `waiting -> processing -> completed | error`, one step at a time and
//! only in slot order. The task moves `processing -> completed | failed` and is frozen once
//! terminal. Every mutator checks its transition and returns
//! [`SeqVoiceError::OrchestrationFault`] for anything else.

use crate::artifacts::ArtifactHandle;
use crate::error::{SeqVoiceError, SeqVoiceResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Aggregate task status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Processing,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, TaskStatus::Processing)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Processing => "processing",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }
}

/// Status of one sentence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentenceStatus {
    Waiting,
    Processing,
    Completed,
    Error,
}

impl SentenceStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, SentenceStatus::Completed | SentenceStatus::Error)
    }

    /// The only legal single-step transitions.
    pub fn can_transition_to(self, next: SentenceStatus) -> bool {
        matches!(
            (self, next),
            (SentenceStatus::Waiting, SentenceStatus::Processing)
                | (SentenceStatus::Processing, SentenceStatus::Completed)
                | (SentenceStatus::Processing, SentenceStatus::Error)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SentenceStatus::Waiting => "waiting",
            SentenceStatus::Processing => "processing",
            SentenceStatus::Completed => "completed",
            SentenceStatus::Error => "error",
        }
    }
}

/// One sentence unit of a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sentence {
    /// 1-based position within the task.
    pub index: usize,
    pub text: String,
}

impl Sentence {
    /// 0-based slot used by the status and artifact arrays.
    pub fn slot(&self) -> usize {
        self.index - 1
    }
}

/// Full state of one task. Owned by the registry; readers get clones.
#[derive(Debug, Clone)]
pub struct TaskRecord {
    task_id: String,
    sentences: Vec<Sentence>,
    voice_reference: PathBuf,
    status: TaskStatus,
    sentence_statuses: Vec<SentenceStatus>,
    artifacts: Vec<Option<ArtifactHandle>>,
    completed_count: usize,
    current_index: usize,
    created_at: DateTime<Utc>,
    started: Instant,
    failure: Option<String>,
}

impl TaskRecord {
    pub fn new(task_id: impl Into<String>, sentences: Vec<String>, voice_reference: impl Into<PathBuf>) -> Self {
        let count = sentences.len();
        let sentences = sentences
            .into_iter()
            .enumerate()
            .map(|(i, text)| Sentence { index: i + 1, text })
            .collect();
        Self {
            task_id: task_id.into(),
            sentences,
            voice_reference: voice_reference.into(),
            status: TaskStatus::Processing,
            sentence_statuses: vec![SentenceStatus::Waiting; count],
            artifacts: vec![None; count],
            completed_count: 0,
            current_index: 0,
            created_at: Utc::now(),
            started: Instant::now(),
            failure: None,
        }
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    pub fn sentences(&self) -> &[Sentence] {
        &self.sentences
    }

    pub fn voice_reference(&self) -> &Path {
        &self.voice_reference
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    pub fn sentence_statuses(&self) -> &[SentenceStatus] {
        &self.sentence_statuses
    }

    pub fn artifacts(&self) -> &[Option<ArtifactHandle>] {
        &self.artifacts
    }

    pub fn artifact(&self, slot: usize) -> Option<&ArtifactHandle> {
        self.artifacts.get(slot).and_then(Option::as_ref)
    }

    pub fn completed_count(&self) -> usize {
        self.completed_count
    }

    pub fn error_count(&self) -> usize {
        self.sentence_statuses
            .iter()
            .filter(|s| **s == SentenceStatus::Error)
            .count()
    }

    /// Number of sentences that have reached a terminal state.
    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }

    /// Reason recorded when the task faulted.
    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    pub fn len(&self) -> usize {
        self.sentences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sentences.is_empty()
    }

    /// `waiting -> processing` for the next slot in order.
    pub(crate) fn begin_sentence(&mut self, slot: usize) -> SeqVoiceResult<()> {
        if slot != self.current_index {
            return Err(self.fault(format!(
                "sentence {} started out of order (next is {})",
                slot, self.current_index
            )));
        }
        self.transition(slot, SentenceStatus::Processing)
    }

    /// `processing -> completed` with its artifact.
    pub(crate) fn complete_sentence(&mut self, slot: usize, artifact: ArtifactHandle) -> SeqVoiceResult<()> {
        self.transition(slot, SentenceStatus::Completed)?;
        self.artifacts[slot] = Some(artifact);
        self.completed_count += 1;
        self.current_index = slot + 1;
        Ok(())
    }

    /// `processing -> error`. The artifact slot stays empty.
    pub(crate) fn fail_sentence(&mut self, slot: usize) -> SeqVoiceResult<()> {
        self.transition(slot, SentenceStatus::Error)?;
        self.current_index = slot + 1;
        Ok(())
    }

    /// `processing -> completed`, regardless of how many sentences errored.
    pub(crate) fn finish(&mut self) -> SeqVoiceResult<()> {
        self.ensure_open()?;
        if let Some(slot) = self.sentence_statuses.iter().position(|s| !s.is_terminal()) {
            return Err(self.fault(format!("cannot complete: sentence {} is not terminal", slot)));
        }
        self.status = TaskStatus::Completed;
        Ok(())
    }

    /// `processing -> failed`. Partial state stays as recorded.
    pub(crate) fn mark_failed(&mut self, reason: impl Into<String>) -> SeqVoiceResult<()> {
        self.ensure_open()?;
        self.status = TaskStatus::Failed;
        self.failure = Some(reason.into());
        Ok(())
    }

    fn transition(&mut self, slot: usize, next: SentenceStatus) -> SeqVoiceResult<()> {
        self.ensure_open()?;
        let current = *self
            .sentence_statuses
            .get(slot)
            .ok_or_else(|| self.fault(format!("sentence {} out of range ({} sentences)", slot, self.len())))?;
        if !current.can_transition_to(next) {
            return Err(self.fault(format!(
                "illegal transition for sentence {}: {} -> {}",
                slot,
                current.as_str(),
                next.as_str()
            )));
        }
        self.sentence_statuses[slot] = next;
        Ok(())
    }

    fn ensure_open(&self) -> SeqVoiceResult<()> {
        if self.status.is_terminal() {
            return Err(self.fault(format!("task is already {}", self.status.as_str())));
        }
        Ok(())
    }

    fn fault(&self, msg: String) -> SeqVoiceError {
        SeqVoiceError::OrchestrationFault(format!("{}: {}", self.task_id, msg))
    }

    /// Snapshot for pollers, computed from current state.
    pub fn status_view(&self) -> TaskStatusView {
        TaskStatusView {
            task_id: self.task_id.clone(),
            status: self.status,
            total_sentences: self.len(),
            completed_count: self.completed_count,
            error_count: self.error_count(),
            current_index: self.current_index,
            elapsed_secs: self.elapsed_secs(),
            created_at: self.created_at,
            failure: self.failure.clone(),
            sentence_statuses: self.sentence_statuses.clone(),
            sentences: self.sentences.iter().map(|s| s.text.clone()).collect(),
            audio_files: self
                .artifacts
                .iter()
                .enumerate()
                .filter_map(|(slot, artifact)| {
                    artifact.as_ref().map(|a| AudioFileView {
                        sentence_index: slot,
                        filename: a.filename.clone(),
                        file_path: a.path.clone(),
                        file_size: a.size,
                        status: self.sentence_statuses[slot],
                    })
                })
                .collect(),
        }
    }
}

/// Derived status returned to pollers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskStatusView {
    pub task_id: String,
    pub status: TaskStatus,
    pub total_sentences: usize,
    pub completed_count: usize,
    pub error_count: usize,
    pub current_index: usize,
    pub elapsed_secs: f64,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
    pub sentence_statuses: Vec<SentenceStatus>,
    pub sentences: Vec<String>,
    pub audio_files: Vec<AudioFileView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioFileView {
    /// 0-based slot.
    pub sentence_index: usize,
    pub filename: String,
    pub file_path: PathBuf,
    pub file_size: u64,
    pub status: SentenceStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(n: usize) -> TaskRecord {
        let sentences = (0..n).map(|i| format!("Sentence number {}.", i)).collect();
        TaskRecord::new("task_test", sentences, "/tmp/ref.wav")
    }

    fn handle(slot: usize) -> ArtifactHandle {
        ArtifactHandle {
            filename: format!("output_task_test_s{}.wav", slot),
            path: PathBuf::from(format!("/tmp/output_task_test_s{}.wav", slot)),
            size: 44,
        }
    }

    #[test]
    fn new_record_is_all_waiting() {
        let r = record(3);
        assert_eq!(r.status(), TaskStatus::Processing);
        assert_eq!(r.sentence_statuses(), &[SentenceStatus::Waiting; 3]);
        assert_eq!(r.artifacts().len(), 3);
        assert_eq!(r.sentences()[0].index, 1);
        assert_eq!(r.sentences()[2].slot(), 2);
        assert_eq!(r.current_index(), 0);
    }

    #[test]
    fn sentence_lifecycle_advances_current_index() {
        let mut r = record(2);
        r.begin_sentence(0).unwrap();
        assert_eq!(r.current_index(), 0);
        r.complete_sentence(0, handle(0)).unwrap();
        assert_eq!(r.current_index(), 1);
        assert_eq!(r.completed_count(), 1);

        r.begin_sentence(1).unwrap();
        r.fail_sentence(1).unwrap();
        assert_eq!(r.current_index(), 2);
        assert_eq!(r.error_count(), 1);
        assert!(r.artifact(1).is_none());

        r.finish().unwrap();
        assert_eq!(r.status(), TaskStatus::Completed);
    }

    #[test]
    fn out_of_order_start_is_a_fault() {
        let mut r = record(3);
        let err = r.begin_sentence(1).unwrap_err();
        assert!(matches!(err, SeqVoiceError::OrchestrationFault(_)));
    }

    #[test]
    fn skipping_processing_is_rejected() {
        let mut r = record(1);
        assert!(r.complete_sentence(0, handle(0)).is_err());
        assert!(r.fail_sentence(0).is_err());
        assert_eq!(r.sentence_statuses()[0], SentenceStatus::Waiting);
    }

    #[test]
    fn no_backward_transitions() {
        let mut r = record(1);
        r.begin_sentence(0).unwrap();
        r.complete_sentence(0, handle(0)).unwrap();
        assert!(r.fail_sentence(0).is_err());
        assert!(r.begin_sentence(0).is_err());
    }

    #[test]
    fn finish_requires_every_sentence_terminal() {
        let mut r = record(2);
        r.begin_sentence(0).unwrap();
        r.fail_sentence(0).unwrap();
        assert!(r.finish().is_err());
        assert_eq!(r.status(), TaskStatus::Processing);
    }

    #[test]
    fn terminal_task_is_frozen() {
        let mut r = record(2);
        r.begin_sentence(0).unwrap();
        r.mark_failed("lane panicked").unwrap();
        assert_eq!(r.status(), TaskStatus::Failed);
        assert_eq!(r.failure(), Some("lane panicked"));
        assert!(r.complete_sentence(0, handle(0)).is_err());
        assert!(r.finish().is_err());
        assert!(r.mark_failed("again").is_err());
    }

    #[test]
    fn empty_task_can_finish_immediately() {
        let mut r = record(0);
        r.finish().unwrap();
        assert_eq!(r.status(), TaskStatus::Completed);
        assert_eq!(r.completed_count(), 0);
    }

    #[test]
    fn status_view_lists_only_completed_artifacts() {
        let mut r = record(3);
        r.begin_sentence(0).unwrap();
        r.complete_sentence(0, handle(0)).unwrap();
        r.begin_sentence(1).unwrap();
        r.fail_sentence(1).unwrap();

        let view = r.status_view();
        assert_eq!(view.total_sentences, 3);
        assert_eq!(view.completed_count, 1);
        assert_eq!(view.error_count, 1);
        assert_eq!(view.current_index, 2);
        assert_eq!(view.audio_files.len(), 1);
        assert_eq!(view.audio_files[0].sentence_index, 0);
        assert_eq!(
            view.sentence_statuses,
            vec![SentenceStatus::Completed, SentenceStatus::Error, SentenceStatus::Waiting]
        );

        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["status"], "processing");
        assert_eq!(json["sentence_statuses"][1], "error");
        assert!(json.get("failure").is_none());
    }
}
