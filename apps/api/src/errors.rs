use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
///
/// Wire shapes are part of the service contract: `{"error": ...}` for client
/// errors, `{"error": ..., "details": ...}` for server-side failures.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    /// Could not reach the generation API, or it did not answer in time.
    /// Transient — callers may retry.
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// The generation API answered, but not with the JSON it was asked for.
    /// Not retryable without changing the prompt.
    #[error("Upstream returned malformed output: {details}")]
    UpstreamMalformedOutput {
        details: String,
        /// Sanitized model text that failed to parse. Kept in the response
        /// body only when diagnostic mode is enabled.
        raw: Option<String>,
    },

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Strips the raw upstream text unless diagnostic mode is enabled.
    /// The parser diagnostic always survives.
    pub fn redact_upstream(self, debug_upstream: bool) -> Self {
        match self {
            AppError::UpstreamMalformedOutput { details, raw } => {
                AppError::UpstreamMalformedOutput {
                    details,
                    raw: raw.filter(|_| debug_upstream),
                }
            }
            other => other,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "error": msg }))).into_response()
            }
            AppError::UpstreamUnavailable(msg) => {
                tracing::error!("Upstream unavailable: {msg}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({
                        "error": "Generation service unavailable",
                        "details": msg
                    })),
                )
                    .into_response()
            }
            AppError::UpstreamMalformedOutput { details, raw } => {
                tracing::error!("Upstream returned invalid JSON: {details}");
                let details = match raw {
                    Some(raw) => format!("{details}; raw output: {raw}"),
                    None => details,
                };
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({
                        "error": "AI returned invalid JSON",
                        "details": details
                    })),
                )
                    .into_response()
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({
                        "error": "Server Error",
                        "details": "An internal server error occurred"
                    })),
                )
                    .into_response()
            }
        }
    }
}
