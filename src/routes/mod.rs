pub mod briefings;
pub mod context;
pub mod health;
pub mod models;

use axum::Router;
use axum::http::HeaderMap;
use axum::routing::{get, post};

use crate::AppState;

pub const API_KEY_HEADER: &str = "x-goog-api-key";

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health::health))
        .route("/api/models", get(models::list_models))
        .route("/api/briefings", post(briefings::create_briefing))
        .route("/api/context", get(context::get_context))
        .with_state(state)
}

/// Header value when present and non-blank, else the configured default key.
pub fn request_api_key(headers: &HeaderMap, state: &AppState) -> Option<String> {
    headers
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
        .or_else(|| state.default_api_key.clone())
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::{Body, to_bytes};
    use axum::http::Response;

    use crate::AppState;
    use crate::llm::RetryPolicy;
    use crate::llm::testing::ScriptedBackend;
    use crate::news::StaticContext;
    use crate::pipeline::{GeneratorSettings, ReportGenerator};

    pub fn state(backend: &Arc<ScriptedBackend>, default_api_key: Option<&str>) -> AppState {
        let settings = GeneratorSettings {
            preferred_models: vec!["gemini-1.5-flash".to_string(), "gemini-pro".to_string()],
            retry: RetryPolicy {
                attempts_per_model: 2,
                backoff: vec![Duration::ZERO],
                transient_pause: Duration::ZERO,
            },
            ..Default::default()
        };

        AppState {
            generator: Arc::new(ReportGenerator::new(backend.clone(), settings)),
            news: Arc::new(StaticContext("- Headline one (Mon)\n".to_string())),
            default_api_key: default_api_key.map(String::from),
        }
    }

    pub async fn json_body(response: Response<Body>) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }
}
