use std::time::Duration;

use reqwest::Url;
use serde::{Deserialize, Serialize};

use super::{Backend, Credential, GenerateOutcome, GenerateRequest, GenerateResponse, ModelDescriptor};

const GENERATE_METHOD: &str = "generateContent";
const MODEL_PREFIX: &str = "models/";

const LIST_PAGE_SIZE: &str = "1000";
const MAX_LIST_PAGES: usize = 10;

pub struct GeminiBackend {
    client: reqwest::Client,
    base_url: Url,
    server_address: String,
}

impl GeminiBackend {
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        let base_url = Url::parse(base_url.trim_end_matches('/'))?;
        if base_url.cannot_be_a_base() {
            anyhow::bail!("Gemini base URL cannot carry a path: {base_url}");
        }
        let server_address = base_url.host_str().unwrap_or("unknown").to_string();

        Ok(Self {
            client,
            base_url,
            server_address,
        })
    }

    /// Appends path segments to the base URL. Each segment is percent-encoded, so a
    /// model name can never add segments, a query or a fragment.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn generate_url(&self, model: &str) -> Url {
        let segment = format!("{model}:{GENERATE_METHOD}");
        self.endpoint(&["models", segment.as_str()])
    }

    async fn list_page(
        &self,
        credential: &Credential,
        page_token: Option<&str>,
    ) -> anyhow::Result<ModelPage> {
        let mut request = self
            .client
            .get(self.endpoint(&["models"]))
            .query(&[("key", credential.expose()), ("pageSize", LIST_PAGE_SIZE)]);
        if let Some(token) = page_token {
            request = request.query(&[("pageToken", token)]);
        }

        let body = request
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("model listing request failed: {}", e.without_url()))?
            .text()
            .await
            .map_err(|e| anyhow::anyhow!("model listing body unreadable: {}", e.without_url()))?;

        parse_model_list(&body)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest<'a> {
    contents: Vec<GeminiContent<'a>>,
    safety_settings: Vec<SafetySetting>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct GeminiContent<'a> {
    parts: Vec<GeminiPart<'a>>,
}

#[derive(Serialize)]
struct GeminiPart<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct SafetySetting {
    category: &'static str,
    threshold: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    max_output_tokens: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    usage_metadata: Option<UsageMetadata>,
    model_version: Option<String>,
    error: Option<GeminiErrorDetail>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
}

#[derive(Deserialize)]
struct GeminiErrorDetail {
    code: Option<u16>,
    message: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModelListResponse {
    #[serde(default)]
    models: Vec<ModelEntry>,
    next_page_token: Option<String>,
    error: Option<GeminiErrorDetail>,
}

struct ModelPage {
    models: Vec<ModelDescriptor>,
    next_page_token: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModelEntry {
    name: String,
    #[serde(default)]
    supported_generation_methods: Vec<String>,
}

fn request_body(req: &GenerateRequest) -> GeminiRequest<'_> {
    GeminiRequest {
        contents: vec![GeminiContent {
            parts: vec![GeminiPart { text: &req.prompt }],
        }],
        safety_settings: vec![SafetySetting {
            category: "HARM_CATEGORY_HARASSMENT",
            threshold: "BLOCK_ONLY_HIGH",
        }],
        generation_config: GenerationConfig {
            max_output_tokens: req.max_output_tokens,
        },
    }
}

fn parse_model_list(body: &str) -> anyhow::Result<ModelPage> {
    let listing: ModelListResponse = serde_json::from_str(body)
        .map_err(|e| anyhow::anyhow!("malformed model listing: {e}"))?;

    if let Some(err) = listing.error {
        return Err(anyhow::anyhow!(
            "{}",
            err.message
                .unwrap_or_else(|| format!("model listing failed ({})", err.code.unwrap_or(0)))
        ));
    }

    let models = listing
        .models
        .into_iter()
        .map(|m| ModelDescriptor {
            name: m
                .name
                .strip_prefix(MODEL_PREFIX)
                .unwrap_or(&m.name)
                .to_string(),
            supports_generation: m
                .supported_generation_methods
                .iter()
                .any(|method| method == GENERATE_METHOD),
        })
        .collect();

    Ok(ModelPage {
        models,
        next_page_token: listing.next_page_token.filter(|t| !t.is_empty()),
    })
}

fn decode_generation(status: u16, body: &str, requested_model: &str) -> GenerateOutcome {
    let resp: GeminiResponse = match serde_json::from_str(body) {
        Ok(resp) => resp,
        Err(e) if (200..300).contains(&status) => {
            return GenerateOutcome::Transport(format!("malformed response: {e}"));
        }
        Err(_) => {
            return GenerateOutcome::Failure {
                code: status,
                message: body.chars().take(500).collect(),
            };
        }
    };

    if let Some(err) = resp.error {
        return GenerateOutcome::Failure {
            code: err.code.unwrap_or(status),
            message: err.message.unwrap_or_default(),
        };
    }

    if !(200..300).contains(&status) {
        return GenerateOutcome::Failure {
            code: status,
            message: body.chars().take(500).collect(),
        };
    }

    let Some(candidate) = resp.candidates.into_iter().next() else {
        return GenerateOutcome::Transport("response contained no candidates".to_string());
    };

    let text = candidate
        .content
        .and_then(|c| c.parts.into_iter().find_map(|p| p.text));

    let Some(content) = text else {
        return GenerateOutcome::Transport(format!(
            "candidate has no text (finish reason: {})",
            candidate.finish_reason.as_deref().unwrap_or("unknown")
        ));
    };

    let (input_tokens, output_tokens) = resp
        .usage_metadata
        .map(|u| (u.prompt_token_count, u.candidates_token_count))
        .unwrap_or((0, 0));

    GenerateOutcome::Success(GenerateResponse {
        content,
        model: resp
            .model_version
            .unwrap_or_else(|| requested_model.to_string()),
        input_tokens,
        output_tokens,
        finish_reason: candidate.finish_reason.unwrap_or_default(),
    })
}

#[async_trait::async_trait]
impl Backend for GeminiBackend {
    async fn list_models(&self, credential: &Credential) -> anyhow::Result<Vec<ModelDescriptor>> {
        let mut models = Vec::new();
        let mut page_token: Option<String> = None;

        for _ in 0..MAX_LIST_PAGES {
            let page = self.list_page(credential, page_token.as_deref()).await?;
            models.extend(page.models);

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => return Ok(models),
            }
        }

        tracing::warn!(pages = MAX_LIST_PAGES, "Model listing truncated");
        Ok(models)
    }

    async fn generate(&self, credential: &Credential, req: &GenerateRequest) -> GenerateOutcome {
        let response = match self
            .client
            .post(self.generate_url(&req.model))
            .query(&[("key", credential.expose())])
            .json(&request_body(req))
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return GenerateOutcome::Transport(e.without_url().to_string()),
        };

        let status = response.status().as_u16();
        match response.text().await {
            Ok(body) => decode_generation(status, &body, &req.model),
            Err(e) => GenerateOutcome::Transport(e.without_url().to_string()),
        }
    }

    fn name(&self) -> &str {
        "gemini"
    }

    fn server_address(&self) -> &str {
        &self.server_address
    }
}
