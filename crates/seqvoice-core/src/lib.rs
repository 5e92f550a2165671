//! # SeqVoice Core - Sentence-Ordered Speech Synthesis
//!
//! Splits long mixed Chinese/English text into sentences and synthesizes them one at a
//! time, strictly in order, against an external TTS backend. Each submission becomes a
//! task whose per-sentence progress can be polled while it runs.
//!
//! ## Pipeline
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    Sequential Orchestrator                   │
//! │  ┌────────────┐   ┌────────────┐   ┌──────────────────────┐  │
//! │  │  Segmenter │ → │   Merger   │ → │  Task Registry       │  │
//! │  │ (heuristic)│   │ (<10 chars)│   │  (all `waiting`)     │  │
//! │  └────────────┘   └────────────┘   └──────────────────────┘  │
//! │                                             ↓                │
//! │  ┌────────────┐   ┌────────────┐   ┌──────────────────────┐  │
//! │  │  Artifact  │ ← │ Synthesis  │ ← │  Worker lane         │  │
//! │  │   store    │   │  backend   │   │  (one per task)      │  │
//! │  └────────────┘   └────────────┘   └──────────────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```

pub mod artifacts;
pub mod config;
pub mod error;
pub mod merge;
pub mod orchestrator;
pub mod registry;
pub mod segment;
pub mod synthesis;
pub mod task;
pub mod voice_ref;

pub use artifacts::{artifact_filename, ArtifactHandle, ArtifactStore, FsArtifactStore, MemoryArtifactStore};
pub use config::{SeqVoiceConfig, SynthesisMode, SynthesisSettings};
pub use error::{SeqVoiceError, SeqVoiceResult, SynthesisError};
pub use merge::{merge, merge_with_threshold, SentenceSplitter, DEFAULT_SHORT_FRAGMENT_THRESHOLD};
pub use orchestrator::{new_task_id, ArtifactLookup, OrchestratorSettings, SequentialOrchestrator, Submission};
pub use registry::TaskRegistry;
pub use segment::{is_terminator, segment, TERMINATORS};
pub use synthesis::{
    HttpSynthesisClient, MediaFormat, PlaceholderSynthesis, SamplingParams, SynthesisBackend,
    SynthesisDefaults, SynthesisRequest,
};
pub use task::{AudioFileView, Sentence, SentenceStatus, TaskRecord, TaskStatus, TaskStatusView};
pub use voice_ref::{resolve_voice_reference, store_reference_upload};
