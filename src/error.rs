use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use opentelemetry::trace::TraceContextExt;
use serde_json::json;
use thiserror::Error;
use tracing::Span;
use tracing_opentelemetry::OpenTelemetrySpanExt;

pub const MISSING_CREDENTIAL_MESSAGE: &str =
    "⚠️ Please provide your Google API Key to generate a briefing.";

pub const OVERLOADED_MESSAGE: &str =
    "⚠️ **High Traffic:** every available model is busy or cooling down your key. Wait a moment and try again.";

/// Terminal failures of one briefing request. Each maps to a fixed user-facing string;
/// none of them is ever surfaced to a caller as a raw error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BriefingError {
    #[error("no credential supplied")]
    MissingCredential,

    #[error("model discovery failed: {0}")]
    Discovery(String),

    #[error("fallback chain exhausted")]
    Overloaded,
}

impl BriefingError {
    pub fn user_message(&self) -> String {
        match self {
            BriefingError::MissingCredential => MISSING_CREDENTIAL_MESSAGE.to_string(),
            BriefingError::Discovery(reason) => format!("❌ Model Discovery Failed: {reason}"),
            BriefingError::Overloaded => OVERLOADED_MESSAGE.to_string(),
        }
    }

    pub fn outcome(&self) -> &'static str {
        match self {
            BriefingError::MissingCredential => "missing_credential",
            BriefingError::Discovery(_) => "discovery_failed",
            BriefingError::Overloaded => "overloaded",
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{reason}")]
pub struct DiscoveryError {
    pub reason: String,
}

impl DiscoveryError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl From<DiscoveryError> for BriefingError {
    fn from(err: DiscoveryError) -> Self {
        BriefingError::Discovery(err.reason)
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Missing credential: {0}")]
    Unauthorized(String),

    #[error("Upstream error: {0}")]
    Upstream(String),
}

impl From<DiscoveryError> for AppError {
    fn from(err: DiscoveryError) -> Self {
        AppError::Upstream(err.reason)
    }
}

fn get_trace_id() -> Option<String> {
    let span = Span::current();
    let context = span.context();
    let span_ref = context.span();
    let span_context = span_ref.span_context();

    if span_context.is_valid() {
        Some(span_context.trace_id().to_string())
    } else {
        None
    }
}

impl AppError {
    fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Unauthorized(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Upstream(msg) => {
                tracing::warn!(error = %msg, "Upstream error");
                (StatusCode::BAD_GATEWAY, msg.clone())
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = self.status_and_message();

        let body = if let Some(trace_id) = get_trace_id() {
            json!({
                "error": error_message,
                "status": status.as_u16(),
                "trace_id": trace_id,
            })
        } else {
            json!({
                "error": error_message,
                "status": status.as_u16(),
            })
        };

        (status, Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
