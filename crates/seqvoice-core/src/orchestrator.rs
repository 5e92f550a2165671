//! Sequential Orchestrator: one worker lane per submitted task.
//!
//! `submit` validates, splits, registers the task and spawns a lane, then returns without
//! waiting on synthesis. The lane walks the sentences strictly in order; sentence `i + 1`
//! leaves `waiting` only after sentence `i` is terminal. Lanes of different tasks run in
//! parallel.
//!
//! Sentence failures (backend error, timeout, empty audio, storage) are recorded as the
//! sentence's `error` state and the lane moves on. A failure of the lane itself, including a
//! panic inside the backend, marks the whole task `failed` and keeps the partial state.

use crate::artifacts::{ArtifactHandle, ArtifactStore};
use crate::config::SeqVoiceConfig;
use crate::error::{SeqVoiceError, SeqVoiceResult, SynthesisError};
use crate::merge::SentenceSplitter;
use crate::registry::TaskRegistry;
use crate::synthesis::{SynthesisBackend, SynthesisDefaults, SynthesisRequest};
use crate::task::{Sentence, SentenceStatus, TaskStatusView};
use crate::voice_ref::resolve_voice_reference;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

const PREVIEW_CHARS: usize = 50;

/// Knobs the orchestrator needs from the service configuration.
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub short_fragment_threshold: usize,
    /// Ceiling for one synthesis call.
    pub sentence_timeout: Duration,
    /// Fallback directory for voice reference lookup.
    pub storage_dir: PathBuf,
    pub synthesis_defaults: SynthesisDefaults,
}

impl OrchestratorSettings {
    pub fn from_config(config: &SeqVoiceConfig) -> Self {
        Self {
            short_fragment_threshold: config.segmenter.short_fragment_threshold,
            sentence_timeout: config.sentence_timeout(),
            storage_dir: config.storage_dir.clone(),
            synthesis_defaults: config.synthesis.defaults.clone(),
        }
    }
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self::from_config(&SeqVoiceConfig::default())
    }
}

/// What the submitter gets back immediately.
#[derive(Debug, Clone, Serialize)]
pub struct Submission {
    pub task_id: String,
    pub sentences: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// How a caller names one artifact of a task.
#[derive(Debug, Clone, Copy)]
pub enum ArtifactLookup<'a> {
    /// 0-based sentence slot.
    Index(usize),
    Filename(&'a str),
}

pub struct SequentialOrchestrator {
    registry: Arc<TaskRegistry>,
    backend: Arc<dyn SynthesisBackend>,
    store: Arc<dyn ArtifactStore>,
    settings: OrchestratorSettings,
    splitter: SentenceSplitter,
    lanes: DashMap<String, JoinHandle<()>>,
}

impl SequentialOrchestrator {
    pub fn new(
        registry: Arc<TaskRegistry>,
        backend: Arc<dyn SynthesisBackend>,
        store: Arc<dyn ArtifactStore>,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            splitter: SentenceSplitter::new(settings.short_fragment_threshold),
            registry,
            backend,
            store,
            settings,
            lanes: DashMap::new(),
        }
    }

    pub fn registry(&self) -> &Arc<TaskRegistry> {
        &self.registry
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    /// Submit with the configured languages. Must be called inside a Tokio runtime.
    pub fn submit(&self, text: &str, voice_reference: &str) -> SeqVoiceResult<Submission> {
        self.submit_with_language(text, voice_reference, None)
    }

    /// Submit, overriding the text and prompt language for this task only.
    pub fn submit_with_language(
        &self,
        text: &str,
        voice_reference: &str,
        language: Option<&str>,
    ) -> SeqVoiceResult<Submission> {
        let text = text.trim();
        if text.is_empty() {
            return Err(SeqVoiceError::Validation("text must not be empty".to_string()));
        }
        let reference = resolve_voice_reference(voice_reference, &self.settings.storage_dir)?;

        let sentences = self.splitter.split(text);
        let task_id = new_task_id();
        info!(
            target: "seqvoice::orchestrator",
            task_id = %task_id,
            sentences = sentences.len(),
            "Text split into sentences"
        );
        for (i, sentence) in sentences.iter().enumerate() {
            debug!(
                target: "seqvoice::orchestrator",
                task_id = %task_id,
                index = i,
                preview = %preview(sentence),
                "Sentence"
            );
        }

        let record = self.registry.create(&task_id, sentences.clone(), reference.clone())?;
        let submission = Submission {
            task_id: task_id.clone(),
            sentences,
            created_at: record.created_at(),
        };

        if record.is_empty() {
            self.registry.finish(&task_id)?;
            info!(target: "seqvoice::orchestrator", task_id = %task_id, "Nothing to synthesize; task completed");
            return Ok(submission);
        }

        let lane = WorkerLane {
            task_id: task_id.clone(),
            sentences: record.sentences().to_vec(),
            reference,
            language: language.map(str::to_string),
            registry: Arc::clone(&self.registry),
            backend: Arc::clone(&self.backend),
            store: Arc::clone(&self.store),
            timeout: self.settings.sentence_timeout,
            defaults: self.settings.synthesis_defaults.clone(),
        };
        let handle = tokio::spawn(supervise(lane));

        self.lanes.retain(|_, h| !h.is_finished());
        self.lanes.insert(task_id, handle);
        Ok(submission)
    }

    /// Wait until the task's lane has finished. Returns at once for tasks without a live lane.
    pub async fn join(&self, task_id: &str) -> SeqVoiceResult<()> {
        if let Some((_, handle)) = self.lanes.remove(task_id) {
            handle
                .await
                .map_err(|e| SeqVoiceError::OrchestrationFault(format!("{}: supervisor lost: {}", task_id, e)))?;
            return Ok(());
        }
        if self.registry.contains(task_id) {
            Ok(())
        } else {
            Err(SeqVoiceError::TaskNotFound(task_id.to_string()))
        }
    }

    pub fn status(&self, task_id: &str) -> SeqVoiceResult<TaskStatusView> {
        self.registry.status(task_id)
    }

    /// Handle and bytes of a completed sentence.
    pub async fn fetch_artifact(
        &self,
        task_id: &str,
        lookup: ArtifactLookup<'_>,
    ) -> SeqVoiceResult<(ArtifactHandle, Vec<u8>)> {
        let record = self.registry.get(task_id)?;
        let handle = match lookup {
            ArtifactLookup::Index(slot) => record.artifact(slot).cloned(),
            ArtifactLookup::Filename(name) => record
                .artifacts()
                .iter()
                .flatten()
                .find(|a| a.filename == name)
                .cloned(),
        };
        let handle = handle.ok_or_else(|| SeqVoiceError::ArtifactNotFound {
            task_id: task_id.to_string(),
            what: match lookup {
                ArtifactLookup::Index(slot) => format!("sentence {}", slot),
                ArtifactLookup::Filename(name) => name.to_string(),
            },
        })?;

        let bytes = self.store.read(&handle).await.map_err(|e| match e {
            SeqVoiceError::ArtifactNotFound { what, .. } => SeqVoiceError::ArtifactNotFound {
                task_id: task_id.to_string(),
                what,
            },
            other => other,
        })?;
        Ok((handle, bytes))
    }

    /// Evict the task. A lane still running stops at its next state update.
    pub fn cleanup(&self, task_id: &str) -> SeqVoiceResult<()> {
        self.lanes.remove(task_id);
        self.registry
            .remove(task_id)
            .map(|_| {
                info!(target: "seqvoice::orchestrator", task_id = %task_id, "Task removed");
            })
            .ok_or_else(|| SeqVoiceError::TaskNotFound(task_id.to_string()))
    }
}

/// `task_` + 8 hex chars.
pub fn new_task_id() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("task_{}", &id[..8])
}

fn preview(sentence: &str) -> String {
    if sentence.chars().count() > PREVIEW_CHARS {
        let head: String = sentence.chars().take(PREVIEW_CHARS).collect();
        format!("{}...", head)
    } else {
        sentence.to_string()
    }
}

/// Runs the lane on its own task so a panic is caught as a `JoinError` and turned into a
/// `failed` task instead of a silently dead lane.
async fn supervise(lane: WorkerLane) {
    let task_id = lane.task_id.clone();
    let registry = Arc::clone(&lane.registry);

    let reason = match tokio::spawn(lane.run()).await {
        Ok(Ok(())) => return,
        Ok(Err(fault)) => fault.to_string(),
        Err(join_err) if join_err.is_panic() => "worker lane panicked".to_string(),
        Err(join_err) => format!("worker lane aborted: {}", join_err),
    };

    error!(target: "seqvoice::orchestrator", task_id = %task_id, reason = %reason, "Task failed");
    if let Err(e) = registry.mark_failed(&task_id, &reason) {
        warn!(target: "seqvoice::orchestrator", task_id = %task_id, error = %e, "Could not mark task failed");
    }
}

struct WorkerLane {
    task_id: String,
    sentences: Vec<Sentence>,
    reference: PathBuf,
    language: Option<String>,
    registry: Arc<TaskRegistry>,
    backend: Arc<dyn SynthesisBackend>,
    store: Arc<dyn ArtifactStore>,
    timeout: Duration,
    defaults: SynthesisDefaults,
}

impl WorkerLane {
    async fn run(self) -> SeqVoiceResult<()> {
        let total = self.sentences.len();
        let started = Instant::now();
        info!(target: "seqvoice::orchestrator", task_id = %self.task_id, total, "Worker lane started");

        for sentence in &self.sentences {
            let slot = sentence.slot();
            self.registry
                .update_sentence(&self.task_id, slot, SentenceStatus::Processing, None)?;
            info!(
                target: "seqvoice::orchestrator",
                task_id = %self.task_id,
                index = slot,
                progress = %format!("{:.1}%", slot as f64 * 100.0 / total as f64),
                chars = sentence.text.chars().count(),
                "Synthesizing sentence"
            );

            let sentence_started = Instant::now();
            match self.synthesize(sentence).await {
                Ok(handle) => {
                    info!(
                        target: "seqvoice::orchestrator",
                        task_id = %self.task_id,
                        index = slot,
                        bytes = handle.size,
                        elapsed_ms = sentence_started.elapsed().as_millis() as u64,
                        "Sentence completed"
                    );
                    self.registry
                        .update_sentence(&self.task_id, slot, SentenceStatus::Completed, Some(handle))?;
                }
                Err(e) => {
                    warn!(
                        target: "seqvoice::orchestrator",
                        task_id = %self.task_id,
                        index = slot,
                        error = %e,
                        elapsed_ms = sentence_started.elapsed().as_millis() as u64,
                        "Sentence failed"
                    );
                    self.registry
                        .update_sentence(&self.task_id, slot, SentenceStatus::Error, None)?;
                }
            }
        }

        self.registry.finish(&self.task_id)?;
        let elapsed = started.elapsed();
        info!(
            target: "seqvoice::orchestrator",
            task_id = %self.task_id,
            total,
            elapsed_ms = elapsed.as_millis() as u64,
            mean_ms = (elapsed.as_millis() / total as u128) as u64,
            "Task completed"
        );
        Ok(())
    }

    async fn synthesize(&self, sentence: &Sentence) -> Result<ArtifactHandle, SynthesisError> {
        let request = SynthesisRequest::from_defaults(
            sentence.text.clone(),
            self.reference.clone(),
            &self.defaults,
            self.language.as_deref(),
        );

        let audio = tokio::time::timeout(self.timeout, self.backend.synthesize(&request))
            .await
            .map_err(|_| SynthesisError::Timeout(self.timeout))??;
        if audio.is_empty() {
            return Err(SynthesisError::EmptyAudio);
        }

        self.store
            .put(&self.task_id, sentence.slot(), &audio)
            .await
            .map_err(|e| SynthesisError::Storage(e.to_string()))
    }
}
