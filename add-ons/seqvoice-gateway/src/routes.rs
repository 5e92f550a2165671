//! Route handlers.

use crate::error::ApiError;
use crate::AppState;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use seqvoice_core::{store_reference_upload, ArtifactLookup, SeqVoiceError};
use serde::Deserialize;
use serde_json::json;

pub async fn root() -> Json<serde_json::Value> {
    Json(json!({
        "message": "SeqVoice sequential speech synthesis API",
        "version": env!("CARGO_PKG_VERSION"),
        "features": [
            "sentence segmentation",
            "short fragment merging",
            "strictly ordered synthesis",
            "per-sentence progress"
        ],
        "status": "ready",
    }))
}

pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

#[derive(Debug, Deserialize)]
pub struct ProcessRequest {
    pub text: String,
    pub ref_audio_path: String,
    /// Overrides the configured text and prompt language for this task.
    #[serde(default)]
    pub language: Option<String>,
}

pub async fn process(
    State(state): State<AppState>,
    Json(req): Json<ProcessRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    tracing::info!(
        target: "seqvoice::gateway",
        chars = req.text.chars().count(),
        reference = %req.ref_audio_path,
        "Process request received"
    );
    let submission = state.orchestrator.submit_with_language(
        &req.text,
        &req.ref_audio_path,
        req.language.as_deref(),
    )?;

    Ok(Json(json!({
        "task_id": submission.task_id,
        "status": "started",
        "sentences_count": submission.sentences.len(),
        "sentences": submission.sentences,
        "mode": "sequential",
        "created_at": submission.created_at,
    })))
}

/// Unknown tasks answer 200 with `status: "not_found"` so pollers can stop cleanly.
pub async fn task_status(State(state): State<AppState>, Path(task_id): Path<String>) -> Response {
    match state.orchestrator.status(&task_id) {
        Ok(view) => Json(view).into_response(),
        Err(SeqVoiceError::TaskNotFound(_)) => Json(json!({
            "task_id": task_id,
            "status": "not_found",
            "message": "task does not exist or was removed",
        }))
        .into_response(),
        Err(e) => ApiError(e).into_response(),
    }
}

pub async fn task_audios(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let record = state.orchestrator.registry().get(&task_id)?;

    let audio_files: Vec<serde_json::Value> = record
        .artifacts()
        .iter()
        .enumerate()
        .filter_map(|(slot, artifact)| {
            artifact.as_ref().map(|a| {
                json!({
                    "sentence_index": slot,
                    "filename": a.filename,
                    "sentence_text": record.sentences()[slot].text,
                    "status": record.sentence_statuses()[slot],
                    "url": format!("/audio/{}/{}", task_id, a.filename),
                    "file_size": a.size,
                })
            })
        })
        .collect();

    Ok(Json(json!({
        "task_id": task_id,
        "total_sentences": record.len(),
        "completed_count": record.completed_count(),
        "status": record.status(),
        "audio_files": audio_files,
    })))
}

pub async fn audio_file(
    State(state): State<AppState>,
    Path((task_id, filename)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let (handle, bytes) = state
        .orchestrator
        .fetch_artifact(&task_id, ArtifactLookup::Filename(&filename))
        .await?;
    Ok(wav_response(&handle.filename, bytes))
}

/// `index` is the 0-based sentence slot, as listed by `/task/:id/audios`.
pub async fn audio_by_index(
    State(state): State<AppState>,
    Path((task_id, index)): Path<(String, usize)>,
) -> Result<Response, ApiError> {
    let (handle, bytes) = state
        .orchestrator
        .fetch_artifact(&task_id, ArtifactLookup::Index(index))
        .await?;
    Ok(wav_response(&handle.filename, bytes))
}

fn wav_response(filename: &str, bytes: Vec<u8>) -> Response {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "audio/wav".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("inline; filename=\"{}\"", filename),
            ),
        ],
        bytes,
    )
        .into_response()
}

#[derive(Debug, Deserialize)]
pub struct UploadParams {
    pub filename: String,
}

pub async fn upload(
    State(state): State<AppState>,
    Query(params): Query<UploadParams>,
    body: Bytes,
) -> Result<Json<serde_json::Value>, ApiError> {
    let path = store_reference_upload(&state.config.storage_dir, &params.filename, &body).await?;
    let stored_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let original_name = std::path::Path::new(&params.filename)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    Ok(Json(json!({
        "filename": stored_name,
        "original_name": original_name,
        "output_path": path.display().to_string(),
        "file_size": body.len(),
        "created_at": chrono::Utc::now(),
    })))
}

pub async fn delete_task(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.orchestrator.cleanup(&task_id)?;
    Ok(Json(json!({ "task_id": task_id, "status": "removed" })))
}

#[cfg(test)]
mod tests {
    use crate::{build_router, AppState};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::Router;
    use seqvoice_core::{MemoryArtifactStore, PlaceholderSynthesis, SeqVoiceConfig, SynthesisMode};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn test_state(dir: &std::path::Path) -> AppState {
        let mut config = SeqVoiceConfig::default();
        config.storage_dir = dir.to_path_buf();
        config.synthesis.mode = SynthesisMode::Placeholder;
        AppState::new(
            config,
            Arc::new(PlaceholderSynthesis::default()),
            Arc::new(MemoryArtifactStore::new()),
        )
    }

    async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Vec<u8>) {
        let res = app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        (status, bytes.to_vec())
    }

    async fn get_json(app: &Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let (status, bytes) = send(app, req).await;
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn process_request(body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/process")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn banner_and_health() {
        let dir = tempfile::tempdir().unwrap();
        let app = build_router(test_state(dir.path()));

        let (status, json) = get_json(&app, "/").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "ready");

        let (status, json) = get_json(&app, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn process_then_poll_and_fetch_audio() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("ref.wav"), b"RIFF").unwrap();
        let state = test_state(dir.path());
        let app = build_router(state.clone());

        let req = process_request(serde_json::json!({
            "text": "你好，欢迎使用。今天天气很好！我们出去走走吧？",
            "ref_audio_path": "ref.wav",
        }));
        let (status, bytes) = send(&app, req).await;
        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["status"], "started");
        assert_eq!(json["mode"], "sequential");
        assert_eq!(json["sentences_count"], 3);
        let task_id = json["task_id"].as_str().unwrap().to_string();

        state.orchestrator.join(&task_id).await.unwrap();

        let (status, view) = get_json(&app, &format!("/task/{}/status", task_id)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(view["status"], "completed");
        assert_eq!(view["completed_count"], 3);
        assert_eq!(view["sentence_statuses"][2], "completed");

        let (status, audios) = get_json(&app, &format!("/task/{}/audios", task_id)).await;
        assert_eq!(status, StatusCode::OK);
        let files = audios["audio_files"].as_array().unwrap();
        assert_eq!(files.len(), 3);
        assert_eq!(files[0]["sentence_text"], "你好，欢迎使用。");
        let url = files[1]["url"].as_str().unwrap().to_string();

        let req = Request::builder().uri(&url).body(Body::empty()).unwrap();
        let res = app.clone().oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.headers()["content-type"], "audio/wav");
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..4], b"RIFF");

        let req = Request::builder()
            .uri(format!("/task/{}/audio/0", task_id))
            .body(Body::empty())
            .unwrap();
        let (status, bytes) = send(&app, req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(&bytes[..4], b"RIFF");

        let req = Request::builder()
            .uri(format!("/task/{}/audio/9", task_id))
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(&app, req).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn process_rejects_bad_input() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("ref.wav"), b"RIFF").unwrap();
        let app = build_router(test_state(dir.path()));

        let (status, bytes) = send(
            &app,
            process_request(serde_json::json!({ "text": "   ", "ref_audio_path": "ref.wav" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert!(json["error"].as_str().unwrap().contains("empty"));

        let (status, _) = send(
            &app,
            process_request(serde_json::json!({ "text": "Hello there.", "ref_audio_path": "ghost.wav" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn unknown_task_status_is_not_found_payload() {
        let dir = tempfile::tempdir().unwrap();
        let app = build_router(test_state(dir.path()));

        let (status, json) = get_json(&app, "/task/task_deadbeef/status").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "not_found");

        let (status, _) = get_json(&app, "/task/task_deadbeef/audios").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn upload_then_reference_by_name() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path());
        let app = build_router(state.clone());

        let req = Request::builder()
            .method("POST")
            .uri("/upload?filename=speaker.wav")
            .body(Body::from(b"RIFFfake".to_vec()))
            .unwrap();
        let (status, bytes) = send(&app, req).await;
        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["original_name"], "speaker");
        assert_eq!(json["file_size"], 8);
        let stored = json["filename"].as_str().unwrap().to_string();
        assert!(stored.starts_with("speaker_") && stored.ends_with(".wav"));

        let (status, bytes) = send(
            &app,
            process_request(serde_json::json!({
                "text": "The uploaded voice works fine.",
                "ref_audio_path": stored,
                "language": "en",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        state
            .orchestrator
            .join(json["task_id"].as_str().unwrap())
            .await
            .unwrap();

        let req = Request::builder()
            .method("POST")
            .uri("/upload?filename=speaker.mp3")
            .body(Body::from(b"ID3".to_vec()))
            .unwrap();
        let (status, _) = send(&app, req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn delete_removes_the_task() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("ref.wav"), b"RIFF").unwrap();
        let state = test_state(dir.path());
        let app = build_router(state.clone());

        let (_, bytes) = send(
            &app,
            process_request(serde_json::json!({ "text": "Short and sweet.", "ref_audio_path": "ref.wav" })),
        )
        .await;
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        let task_id = json["task_id"].as_str().unwrap().to_string();
        state.orchestrator.join(&task_id).await.unwrap();

        let delete = |id: &str| {
            Request::builder()
                .method("DELETE")
                .uri(format!("/task/{}", id))
                .body(Body::empty())
                .unwrap()
        };
        let (status, _) = send(&app, delete(&task_id)).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = send(&app, delete(&task_id)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (_, json) = get_json(&app, &format!("/task/{}/status", task_id)).await;
        assert_eq!(json["status"], "not_found");
    }
}
