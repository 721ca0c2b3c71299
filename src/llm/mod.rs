pub mod client;
pub mod gemini;
pub mod resolver;

#[cfg(test)]
pub(crate) mod testing;

use std::fmt;

use sha2::{Digest, Sha256};

pub use client::{LlmClient, RetryPolicy};
pub use resolver::{ModelResolver, choose};

/// A trimmed, non-empty API key. Only its fingerprint may be logged or hashed into keys.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Returns `None` when the raw value is absent or blank after trimming.
    pub fn parse(raw: Option<&str>) -> Option<Self> {
        let trimmed = raw?.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(self.0.as_bytes());
        hex::encode(&digest[..8])
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Credential({})", self.fingerprint())
    }
}

/// Model ids are bare names such as `gemini-1.5-flash`, without the `models/` prefix.
pub fn is_valid_model_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelDescriptor {
    pub name: String,
    pub supports_generation: bool,
}

#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub model: String,
    pub prompt: String,
    pub max_output_tokens: u32,
    pub mode: String,
}

#[derive(Debug, Clone)]
pub struct GenerateResponse {
    pub content: String,
    pub model: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub finish_reason: String,
}

/// A generation call decoded once at the network boundary.
#[derive(Debug, Clone)]
pub enum GenerateOutcome {
    Success(GenerateResponse),
    /// The backend answered with an error status or an `error` object.
    Failure { code: u16, message: String },
    /// No usable answer: connection failure, timeout, malformed body, no candidates.
    Transport(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    RateLimited,
    Permanent,
    Transient,
}

impl FailureKind {
    pub fn from_status(code: u16) -> Self {
        match code {
            429 | 503 => FailureKind::RateLimited,
            400..=499 => FailureKind::Permanent,
            _ => FailureKind::Transient,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::RateLimited => "rate_limit",
            FailureKind::Permanent => "invalid_model",
            FailureKind::Transient => "transient",
        }
    }
}

#[async_trait::async_trait]
pub trait Backend: Send + Sync {
    async fn list_models(&self, credential: &Credential) -> anyhow::Result<Vec<ModelDescriptor>>;
    async fn generate(&self, credential: &Credential, req: &GenerateRequest) -> GenerateOutcome;
    fn name(&self) -> &str;
    fn server_address(&self) -> &str;
}
