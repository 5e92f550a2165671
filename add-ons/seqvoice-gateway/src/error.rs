//! Core errors as HTTP responses: `{"error": message}` with a mapped status code.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use seqvoice_core::SeqVoiceError;

#[derive(Debug)]
pub struct ApiError(pub SeqVoiceError);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            SeqVoiceError::Validation(_) => StatusCode::BAD_REQUEST,
            SeqVoiceError::VoiceReferenceNotFound(_)
            | SeqVoiceError::TaskNotFound(_)
            | SeqVoiceError::ArtifactNotFound { .. } => StatusCode::NOT_FOUND,
            SeqVoiceError::DuplicateTask(_) => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<SeqVoiceError> for ApiError {
    fn from(err: SeqVoiceError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(target: "seqvoice::gateway", error = %self.0, "Request failed");
        }
        (status, Json(serde_json::json!({ "error": self.0.to_string() }))).into_response()
    }
}
