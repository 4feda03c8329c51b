use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OcrError {
    #[error("Failed to initialize OCR engine: {0}")]
    InitializationError(String),

    #[error("Failed to process image: {0}")]
    ProcessingError(String),

    #[error("Failed to decode image: {0}")]
    DecodeError(String),

    #[error("No OCR engine available")]
    EngineUnavailable,

    #[error("Worker {stage} failed: {message}")]
    WorkerError { stage: &'static str, message: String },

    #[error("Strategy '{strategy}' timed out after {seconds}s")]
    Timeout { strategy: &'static str, seconds: u64 },

    #[error("Strategy '{0}' produced no text")]
    EmptyText(&'static str),

    #[error("Image too large: {size} bytes (max: {max} bytes)")]
    ImageTooLarge { size: usize, max: usize },

    #[error("Too many pages: {count} (max: {max})")]
    TooManyPages { count: usize, max: usize },

    #[error("Missing file in request")]
    MissingFile,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl OcrError {
    pub(crate) fn worker(stage: &'static str, err: impl std::fmt::Display) -> Self {
        OcrError::WorkerError {
            stage,
            message: err.to_string(),
        }
    }
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl IntoResponse for OcrError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            OcrError::InitializationError(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INIT_ERROR"),
            OcrError::ProcessingError(_) => (StatusCode::INTERNAL_SERVER_ERROR, "PROCESSING_ERROR"),
            OcrError::DecodeError(_) => (StatusCode::UNPROCESSABLE_ENTITY, "DECODE_ERROR"),
            OcrError::EngineUnavailable => (StatusCode::SERVICE_UNAVAILABLE, "ENGINE_UNAVAILABLE"),
            OcrError::WorkerError { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "WORKER_ERROR"),
            OcrError::Timeout { .. } => (StatusCode::GATEWAY_TIMEOUT, "TIMEOUT"),
            OcrError::EmptyText(_) => (StatusCode::UNPROCESSABLE_ENTITY, "EMPTY_TEXT"),
            OcrError::ImageTooLarge { .. } => (StatusCode::PAYLOAD_TOO_LARGE, "IMAGE_TOO_LARGE"),
            OcrError::TooManyPages { .. } => (StatusCode::PAYLOAD_TOO_LARGE, "TOO_MANY_PAGES"),
            OcrError::MissingFile => (StatusCode::BAD_REQUEST, "MISSING_FILE"),
            OcrError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "INVALID_REQUEST"),
            OcrError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };

        let body = Json(ErrorResponse {
            error: self.to_string(),
            code: code.to_string(),
        });

        (status, body).into_response()
    }
}
