use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::error;

use crate::config::ConfigError;
use crate::marketplace::DirectoryError;
use crate::telemetry::TelemetryError;

/// Failures surfaced by the service process: startup, serving, or a marketplace operation
/// run outside a request (bootstrap, demo).
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("telemetry error: {0}")]
    Telemetry(#[from] TelemetryError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("server error: {0}")]
    Server(#[from] axum::Error),
    #[error("directory error: {0}")]
    Directory(#[from] DirectoryError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let AppError::Directory(err) = self {
            return err.into_response();
        }
        error!(error = %self, "service failure");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": self.to_string() })),
        )
            .into_response()
    }
}
