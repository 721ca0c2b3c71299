use axum::{
    Json,
    extract::{Query, State},
    http::HeaderMap,
};
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::error::{AppError, AppResult, MISSING_CREDENTIAL_MESSAGE};
use crate::llm::{Credential, choose};

use super::request_api_key;

#[derive(Debug, Default, Deserialize)]
pub struct ModelsQuery {
    #[serde(default)]
    pub refresh: bool,
}

#[derive(Debug, Serialize)]
pub struct ModelsResponse {
    pub models: Vec<String>,
    pub selected: Option<String>,
}

pub async fn list_models(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ModelsQuery>,
) -> AppResult<Json<ModelsResponse>> {
    let credential = Credential::parse(request_api_key(&headers, &state).as_deref())
        .ok_or_else(|| AppError::Unauthorized(MISSING_CREDENTIAL_MESSAGE.to_string()))?;

    let resolver = state.generator.resolver();
    let models = resolver
        .discover_cached(&credential, query.refresh)
        .await?;
    let selected = choose(&models, resolver.preferred_models());

    Ok(Json(ModelsResponse { models, selected }))
}
