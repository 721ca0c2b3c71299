use std::sync::Arc;
use std::time::{Duration, Instant};

use opentelemetry::KeyValue;

use crate::config::Config;
use crate::error::BriefingError;
use crate::llm::{Backend, Credential, GenerateRequest, LlmClient, ModelResolver, RetryPolicy};
use crate::telemetry::metrics::{
    BRIEFING_CACHE_HITS, BRIEFING_GENERATION_DURATION, BRIEFING_OUTCOME_COUNT,
};

use super::cache::{TtlCache, report_key};
use super::format::normalize_report;
use super::mode::ReportMode;
use super::prompt::{DEFAULT_CONTEXT_BUDGET, build_prompt, clamp_context};

#[derive(Debug, Clone)]
pub struct GeneratorSettings {
    pub preferred_models: Vec<String>,
    pub context_budget: usize,
    pub max_output_tokens: u32,
    pub retry: RetryPolicy,
    pub cache_ttl: Duration,
    pub cache_capacity: usize,
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        Self {
            preferred_models: vec![
                "gemini-2.0-flash".to_string(),
                "gemini-1.5-flash".to_string(),
                "gemini-1.0-pro".to_string(),
                "gemini-pro".to_string(),
            ],
            context_budget: DEFAULT_CONTEXT_BUDGET,
            max_output_tokens: 2500,
            retry: RetryPolicy::default(),
            cache_ttl: Duration::from_secs(3600),
            cache_capacity: 256,
        }
    }
}

impl From<&Config> for GeneratorSettings {
    fn from(config: &Config) -> Self {
        Self {
            preferred_models: config.preferred_models.clone(),
            context_budget: config.context_budget,
            max_output_tokens: config.max_output_tokens,
            retry: RetryPolicy {
                attempts_per_model: config.attempts_per_model,
                backoff: config.retry_backoff.clone(),
                transient_pause: config.transient_pause,
            },
            cache_ttl: config.report_cache_ttl,
            cache_capacity: config.report_cache_capacity,
        }
    }
}

pub struct ReportGenerator {
    resolver: ModelResolver,
    llm_client: LlmClient,
    cache: TtlCache<String>,
    context_budget: usize,
    max_output_tokens: u32,
}

impl ReportGenerator {
    pub fn new(backend: Arc<dyn Backend>, settings: GeneratorSettings) -> Self {
        Self {
            resolver: ModelResolver::new(backend.clone(), settings.preferred_models),
            llm_client: LlmClient::new(backend, settings.retry),
            cache: TtlCache::new(settings.cache_ttl, settings.cache_capacity),
            context_budget: settings.context_budget,
            max_output_tokens: settings.max_output_tokens,
        }
    }

    pub fn resolver(&self) -> &ModelResolver {
        &self.resolver
    }

    /// Produces a briefing or a user-facing status string. Never fails.
    #[tracing::instrument(
        name = "briefing generate",
        skip(self, context, credential),
        fields(
            briefing.mode = %mode,
            briefing.context_chars,
            briefing.model,
            briefing.cache_hit,
            briefing.outcome,
        )
    )]
    pub async fn generate(
        &self,
        mode: ReportMode,
        context: &str,
        credential: Option<&str>,
        explicit_model: Option<&str>,
    ) -> String {
        let start = Instant::now();
        let span = tracing::Span::current();

        let (report, outcome) = match self
            .try_generate(mode, context, credential, explicit_model)
            .await
        {
            Ok(report) => (report, "ok"),
            Err(err) => {
                if err != BriefingError::MissingCredential {
                    tracing::warn!(error = %err, "Briefing not generated");
                }
                (err.user_message(), err.outcome())
            }
        };

        span.record("briefing.outcome", outcome);

        let mode_kv = KeyValue::new("briefing.mode", mode.as_str());
        BRIEFING_OUTCOME_COUNT.add(
            1,
            &[mode_kv.clone(), KeyValue::new("briefing.outcome", outcome)],
        );
        BRIEFING_GENERATION_DURATION.record(start.elapsed().as_secs_f64(), &[mode_kv]);

        report
    }

    async fn try_generate(
        &self,
        mode: ReportMode,
        context: &str,
        credential: Option<&str>,
        explicit_model: Option<&str>,
    ) -> Result<String, BriefingError> {
        let credential = Credential::parse(credential).ok_or(BriefingError::MissingCredential)?;
        let explicit_model = explicit_model.map(str::trim).filter(|m| !m.is_empty());

        let span = tracing::Span::current();

        let context = clamp_context(context, self.context_budget);
        span.record("briefing.context_chars", context.chars().count());

        let key = report_key(mode, context, &credential, explicit_model);
        if let Some(cached) = self.cache.get(&key) {
            span.record("briefing.cache_hit", true);
            BRIEFING_CACHE_HITS.add(1, &[KeyValue::new("briefing.mode", mode.as_str())]);
            return Ok(cached);
        }
        span.record("briefing.cache_hit", false);

        let chain = match explicit_model {
            Some(model) => self.resolver.explicit_chain(model),
            None => {
                let (chosen, discovered) = self.resolver.resolve(&credential, false).await?;
                self.resolver.discovered_chain(&chosen, &discovered)
            }
        };

        let req = GenerateRequest {
            model: chain.first().cloned().unwrap_or_default(),
            prompt: build_prompt(mode, context),
            max_output_tokens: self.max_output_tokens,
            mode: mode.as_str().to_string(),
        };

        let resp = self
            .llm_client
            .generate(&credential, &chain, &req)
            .await
            .ok_or(BriefingError::Overloaded)?;

        span.record("briefing.model", resp.model.as_str());

        let report = normalize_report(&resp.content);
        self.cache.insert(key, report.clone());

        Ok(report)
    }
}
