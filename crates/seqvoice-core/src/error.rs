//! Error types for the SeqVoice core.
//!
//! Two layers: [`SeqVoiceError`] is what callers of the orchestrator and registry see,
//! [`SynthesisError`] is the per-sentence failure that the worker lane records as the
//! sentence's `error` state and never propagates further.

use std::time::Duration;
use thiserror::Error;

/// Result type alias for core operations
pub type SeqVoiceResult<T> = Result<T, SeqVoiceError>;

/// Errors surfaced to submitters, pollers and the gateway
#[derive(Error, Debug)]
pub enum SeqVoiceError {
    /// Empty text or otherwise unusable submission. The task is never created.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The voice reference did not resolve to an existing audio file. Also a validation failure.
    #[error("Voice reference not found: {0}")]
    VoiceReferenceNotFound(String),

    #[error("Task already exists: {0}")]
    DuplicateTask(String),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Artifact not found for task {task_id}: {what}")]
    ArtifactNotFound { task_id: String, what: String },

    /// Failure of the worker lane itself, not attributable to a single sentence.
    #[error("Orchestration fault: {0}")]
    OrchestrationFault(String),

    #[error("Synthesis error: {0}")]
    Synthesis(#[from] SynthesisError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SeqVoiceError {
    /// True for errors raised synchronously by `submit` before a task exists.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            SeqVoiceError::Validation(_) | SeqVoiceError::VoiceReferenceNotFound(_)
        )
    }
}

impl From<config::ConfigError> for SeqVoiceError {
    fn from(err: config::ConfigError) -> Self {
        SeqVoiceError::Config(err.to_string())
    }
}

/// Why a single sentence could not be synthesized
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SynthesisError {
    #[error("synthesis timed out after {0:?}")]
    Timeout(Duration),

    /// Non-success response from the backend.
    #[error("backend returned HTTP {status}: {message}")]
    Backend { status: u16, message: String },

    #[error("request failed: {0}")]
    Transport(String),

    /// Success response that carried no audio.
    #[error("backend returned no audio")]
    EmptyAudio,

    #[error("artifact could not be stored: {0}")]
    Storage(String),
}

impl From<reqwest::Error> for SynthesisError {
    fn from(err: reqwest::Error) -> Self {
        SynthesisError::Transport(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_are_classified() {
        assert!(SeqVoiceError::Validation("empty".into()).is_validation());
        assert!(SeqVoiceError::VoiceReferenceNotFound("a.wav".into()).is_validation());
        assert!(!SeqVoiceError::TaskNotFound("task_1".into()).is_validation());
    }

    #[test]
    fn synthesis_error_wraps_into_core_error() {
        let err: SeqVoiceError = SynthesisError::EmptyAudio.into();
        assert_eq!(err.to_string(), "Synthesis error: backend returned no audio");
    }
}
