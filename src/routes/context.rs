use axum::{
    Json,
    extract::{Query, State},
};
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::pipeline::ReportMode;
use crate::pipeline::retrieve::retrieve;

#[derive(Debug, Default, Deserialize)]
pub struct ContextQuery {
    pub query: Option<String>,
    pub mode: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ContextResponse {
    pub query: Option<String>,
    pub context: String,
}

/// The headline block a briefing would be built from, without generating it.
pub async fn get_context(
    State(state): State<AppState>,
    Query(params): Query<ContextQuery>,
) -> AppResult<Json<ContextResponse>> {
    let mode = match params.mode.as_deref() {
        Some(raw) => raw.parse().map_err(AppError::Validation)?,
        None => ReportMode::Global,
    };

    let result = retrieve(state.news.as_ref(), mode, None, params.query.as_deref()).await;

    Ok(Json(ContextResponse {
        query: result.query,
        context: result.context,
    }))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use crate::llm::testing::ScriptedBackend;
    use crate::routes::router;
    use crate::routes::test_support::{json_body, state};

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_context_for_mode_default_query() {
        let backend = Arc::new(ScriptedBackend::new());
        let app = router(state(&backend, None));

        let response = app.oneshot(get("/api/context?mode=BTC")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = json_body(response).await;
        assert_eq!(json["query"], "Bitcoin crypto");
        assert_eq!(json["context"], "- Headline one (Mon)\n");
    }

    #[tokio::test]
    async fn test_context_custom_query() {
        let backend = Arc::new(ScriptedBackend::new());
        let app = router(state(&backend, None));

        let response = app
            .oneshot(get("/api/context?query=oil%20prices"))
            .await
            .unwrap();
        let json = json_body(response).await;
        assert_eq!(json["query"], "oil prices");
    }

    #[tokio::test]
    async fn test_context_unknown_mode() {
        let backend = Arc::new(ScriptedBackend::new());
        let app = router(state(&backend, None));

        let response = app.oneshot(get("/api/context?mode=crypto")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
