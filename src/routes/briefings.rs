use axum::{Json, extract::State, http::HeaderMap};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::llm::is_valid_model_name;
use crate::pipeline::ReportMode;
use crate::pipeline::retrieve::retrieve;

use super::request_api_key;

#[derive(Debug, Deserialize)]
pub struct CreateBriefingBody {
    pub mode: String,
    pub context: Option<String>,
    pub query: Option<String>,
    pub model: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BriefingResponse {
    pub mode: ReportMode,
    pub report: String,
    pub query: Option<String>,
    pub generated_at: DateTime<Utc>,
}

pub async fn create_briefing(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<CreateBriefingBody>,
) -> AppResult<Json<BriefingResponse>> {
    let mode: ReportMode = body.mode.parse().map_err(AppError::Validation)?;
    let model = body.model.as_deref().map(str::trim).filter(|m| !m.is_empty());
    if let Some(name) = model
        && !is_valid_model_name(name)
    {
        return Err(AppError::Validation(format!("invalid model name '{name}'")));
    }
    let api_key = request_api_key(&headers, &state);

    // No key means the generator answers with its guidance text; skip the news fetch too.
    let retrieved = match api_key {
        Some(_) => Some(
            retrieve(
                state.news.as_ref(),
                mode,
                body.context,
                body.query.as_deref(),
            )
            .await,
        ),
        None => None,
    };

    let (context, query) = retrieved
        .map(|r| (r.context, r.query))
        .unwrap_or_default();

    let report = state
        .generator
        .generate(mode, &context, api_key.as_deref(), model)
        .await;

    Ok(Json(BriefingResponse {
        mode,
        report,
        query,
        generated_at: Utc::now(),
    }))
}
