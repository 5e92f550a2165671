//! SeqVoice Gateway: HTTP surface over the sequential synthesis core.
//!
//! POST /process submits text and returns the sentence list at once.
//! GET /task/:id/status and /task/:id/audios poll progress while the worker lane runs.
//! GET /audio/:id/:filename and /task/:id/audio/:index serve finished sentences.
//! POST /upload stores a reference voice; DELETE /task/:id evicts a task.

pub mod error;
pub mod logging;
pub mod routes;

use axum::extract::DefaultBodyLimit;
use axum::http::Method;
use axum::routing::{delete, get, post};
use axum::Router;
use seqvoice_core::{
    ArtifactStore, OrchestratorSettings, SeqVoiceConfig, SequentialOrchestrator, SynthesisBackend,
    TaskRegistry,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

/// Reference uploads are whole WAV files; allow well past axum's 2 MB default.
const UPLOAD_BODY_LIMIT: usize = 64 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<SeqVoiceConfig>,
    pub orchestrator: Arc<SequentialOrchestrator>,
}

impl AppState {
    /// Fresh registry and orchestrator over the given backend and store.
    pub fn new(
        config: SeqVoiceConfig,
        backend: Arc<dyn SynthesisBackend>,
        store: Arc<dyn ArtifactStore>,
    ) -> Self {
        let registry = Arc::new(TaskRegistry::new());
        let orchestrator = SequentialOrchestrator::new(
            registry,
            backend,
            store,
            OrchestratorSettings::from_config(&config),
        );
        Self {
            config: Arc::new(config),
            orchestrator: Arc::new(orchestrator),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/", get(routes::root))
        .route("/health", get(routes::health))
        .route("/process", post(routes::process))
        .route("/task/:task_id", delete(routes::delete_task))
        .route("/task/:task_id/status", get(routes::task_status))
        .route("/task/:task_id/audios", get(routes::task_audios))
        .route("/task/:task_id/audio/:index", get(routes::audio_by_index))
        .route("/audio/:task_id/:filename", get(routes::audio_file))
        .route(
            "/upload",
            post(routes::upload).layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .layer(cors)
        .with_state(state)
}
