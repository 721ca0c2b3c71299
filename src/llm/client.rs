use std::sync::Arc;
use std::time::{Duration, Instant};

use opentelemetry::KeyValue;
use tracing::Instrument;
use tracing_opentelemetry::OpenTelemetrySpanExt;

use super::{Backend, Credential, FailureKind, GenerateOutcome, GenerateRequest, GenerateResponse};
use crate::telemetry::metrics::{
    GEN_AI_ERROR_COUNT, GEN_AI_FALLBACK_COUNT, GEN_AI_OPERATION_DURATION, GEN_AI_RETRY_COUNT,
    GEN_AI_TOKEN_USAGE,
};

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub attempts_per_model: u32,
    /// Wait before the next attempt after a rate-limited one; the last value repeats.
    pub backoff: Vec<Duration>,
    pub transient_pause: Duration,
}

impl RetryPolicy {
    fn backoff_for(&self, attempt: u32) -> Duration {
        let base = self
            .backoff
            .get(attempt as usize)
            .or_else(|| self.backoff.last())
            .copied()
            .unwrap_or_default();
        // up to 25% jitter
        let jitter_ms = fastrand::u64(0..=base.as_millis() as u64 / 4);
        base + Duration::from_millis(jitter_ms)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts_per_model: 2,
            backoff: vec![Duration::from_secs(5), Duration::from_secs(10)],
            transient_pause: Duration::from_secs(1),
        }
    }
}

pub struct LlmClient {
    pub backend: Arc<dyn Backend>,
    pub retry: RetryPolicy,
}

impl LlmClient {
    pub fn new(backend: Arc<dyn Backend>, retry: RetryPolicy) -> Self {
        Self { backend, retry }
    }

    pub async fn generate_once(
        &self,
        credential: &Credential,
        req: &GenerateRequest,
    ) -> GenerateOutcome {
        let provider_name = self.backend.name();
        let span_display_name = format!("gen_ai.chat {}", req.model);
        let start = Instant::now();

        let span = tracing::info_span!(
            "gen_ai.chat",
            otel.name = %span_display_name,
            gen_ai.operation.name = "chat",
            gen_ai.provider.name = %provider_name,
            gen_ai.request.model = %req.model,
            server.address = %self.backend.server_address(),
            server.port = 443_i64,
            gen_ai.request.max_tokens = req.max_output_tokens as i64,
            gen_ai.response.model = tracing::field::Empty,
            gen_ai.usage.input_tokens = tracing::field::Empty,
            gen_ai.usage.output_tokens = tracing::field::Empty,
            gen_ai.response.finish_reasons = tracing::field::Empty,
            briefing.mode = %req.mode,
            otel.status_code = tracing::field::Empty,
            error.type = tracing::field::Empty,
        );

        span.add_event(
            "gen_ai.user.message",
            vec![KeyValue::new("gen_ai.prompt", truncate(&req.prompt, 1000))],
        );

        let outcome = self
            .backend
            .generate(credential, req)
            .instrument(span.clone())
            .await;

        let duration = start.elapsed().as_secs_f64();

        let op_kv = KeyValue::new("gen_ai.operation.name", "chat");
        let provider_kv = KeyValue::new("gen_ai.provider.name", provider_name.to_string());
        let model_kv = KeyValue::new("gen_ai.request.model", req.model.clone());

        GEN_AI_OPERATION_DURATION.record(
            duration,
            &[op_kv.clone(), provider_kv.clone(), model_kv.clone()],
        );

        match &outcome {
            GenerateOutcome::Success(resp) => {
                span.record("gen_ai.response.model", resp.model.as_str());
                span.record("gen_ai.usage.input_tokens", resp.input_tokens as i64);
                span.record("gen_ai.usage.output_tokens", resp.output_tokens as i64);
                if !resp.finish_reason.is_empty() {
                    span.record(
                        "gen_ai.response.finish_reasons",
                        resp.finish_reason.as_str(),
                    );
                }

                span.add_event(
                    "gen_ai.assistant.message",
                    vec![KeyValue::new(
                        "gen_ai.completion",
                        truncate(&resp.content, 2000),
                    )],
                );

                GEN_AI_TOKEN_USAGE.record(
                    f64::from(resp.input_tokens),
                    &[
                        KeyValue::new("gen_ai.token.type", "input"),
                        op_kv.clone(),
                        provider_kv.clone(),
                        model_kv.clone(),
                    ],
                );
                GEN_AI_TOKEN_USAGE.record(
                    f64::from(resp.output_tokens),
                    &[
                        KeyValue::new("gen_ai.token.type", "output"),
                        op_kv,
                        provider_kv,
                        model_kv,
                    ],
                );
            }
            GenerateOutcome::Failure { .. } | GenerateOutcome::Transport(_) => {
                span.record("otel.status_code", "ERROR");
                span.record("error.type", error_type(&outcome));

                GEN_AI_ERROR_COUNT.add(
                    1,
                    &[
                        provider_kv,
                        model_kv,
                        KeyValue::new("error.type", error_type(&outcome)),
                    ],
                );
            }
        }

        outcome
    }

    /// Tries one model up to `attempts_per_model` times. Returns the failure kind that
    /// ended the model's turn when no attempt succeeded. Never sleeps after the last
    /// attempt; the caller moves on to the next model immediately.
    pub async fn generate_with_retry(
        &self,
        credential: &Credential,
        req: &GenerateRequest,
    ) -> Result<GenerateResponse, FailureKind> {
        let max_attempts = self.retry.attempts_per_model.max(1);
        let mut last_kind = FailureKind::Transient;

        for attempt in 0..max_attempts {
            let final_attempt = attempt + 1 == max_attempts;

            if attempt > 0 {
                GEN_AI_RETRY_COUNT.add(
                    1,
                    &[
                        KeyValue::new("gen_ai.provider.name", self.backend.name().to_string()),
                        KeyValue::new("gen_ai.request.model", req.model.clone()),
                    ],
                );
            }

            match self.generate_once(credential, req).await {
                GenerateOutcome::Success(resp) => return Ok(resp),
                GenerateOutcome::Failure { code, message } => {
                    let kind = FailureKind::from_status(code);
                    last_kind = kind;

                    tracing::warn!(
                        attempt = attempt + 1,
                        max_attempts = max_attempts,
                        model = %req.model,
                        status = code,
                        failure = kind.as_str(),
                        error = %truncate(&message, 300),
                        "Generation attempt failed"
                    );

                    match kind {
                        FailureKind::Permanent => return Err(kind),
                        FailureKind::RateLimited if !final_attempt => {
                            tokio::time::sleep(self.retry.backoff_for(attempt)).await;
                        }
                        FailureKind::Transient if !final_attempt => {
                            tokio::time::sleep(self.retry.transient_pause).await;
                        }
                        _ => {}
                    }
                }
                GenerateOutcome::Transport(reason) => {
                    last_kind = FailureKind::Transient;

                    tracing::warn!(
                        attempt = attempt + 1,
                        max_attempts = max_attempts,
                        model = %req.model,
                        error = %reason,
                        "Generation attempt failed in transport"
                    );

                    if !final_attempt {
                        tokio::time::sleep(self.retry.transient_pause).await;
                    }
                }
            }
        }

        Err(last_kind)
    }

    /// Walks the fallback chain in order. `None` when every model is exhausted.
    pub async fn generate(
        &self,
        credential: &Credential,
        chain: &[String],
        req: &GenerateRequest,
    ) -> Option<GenerateResponse> {
        for (index, model) in chain.iter().enumerate() {
            if index > 0 {
                tracing::warn!(
                    previous_model = %chain[index - 1],
                    fallback_model = %model,
                    "Falling back to next model"
                );
                GEN_AI_FALLBACK_COUNT.add(1, &[]);
            }

            let model_req = GenerateRequest {
                model: model.clone(),
                ..req.clone()
            };

            match self
                .generate_with_retry(credential, &model_req)
                .await
            {
                Ok(resp) => return Some(resp),
                Err(kind) => {
                    tracing::info!(model = %model, failure = kind.as_str(), "Model abandoned");
                }
            }
        }

        None
    }
}

fn error_type(outcome: &GenerateOutcome) -> &'static str {
    match outcome {
        GenerateOutcome::Success(_) => "",
        GenerateOutcome::Failure { code, .. } => FailureKind::from_status(*code).as_str(),
        GenerateOutcome::Transport(reason) => {
            let msg = reason.to_lowercase();
            if msg.contains("timeout") || msg.contains("timed out") {
                "timeout"
            } else if msg.contains("malformed") || msg.contains("no candidates") {
                "invalid_response"
            } else {
                "network_error"
            }
        }
    }
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        s.char_indices()
            .take_while(|&(i, _)| i < max)
            .map(|(_, c)| c)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::testing::ScriptedBackend;

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            attempts_per_model: 2,
            backoff: vec![Duration::ZERO],
            transient_pause: Duration::ZERO,
        }
    }

    fn request() -> GenerateRequest {
        GenerateRequest {
            model: String::new(),
            prompt: "ROLE: test".to_string(),
            max_output_tokens: 100,
            mode: "FX".to_string(),
        }
    }

    fn chain(models: &[&str]) -> Vec<String> {
        models.iter().map(|m| m.to_string()).collect()
    }

    fn credential() -> Credential {
        Credential::parse(Some("key")).unwrap()
    }

    #[tokio::test]
    async fn test_rate_limited_model_falls_back() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.push_status("model-a", 429);
        backend.push_status("model-a", 429);
        backend.push_text("model-b", "from b");

        let client = LlmClient::new(backend.clone(), fast_policy());
        let resp = client
            .generate(&credential(), &chain(&["model-a", "model-b"]), &request())
            .await
            .unwrap();

        assert_eq!(resp.content, "from b");
        assert_eq!(backend.called_models(), vec!["model-a", "model-a", "model-b"]);
    }

    #[tokio::test]
    async fn test_retry_same_model_after_rate_limit() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.push_status("model-a", 503);
        backend.push_text("model-a", "second try");

        let client = LlmClient::new(backend.clone(), fast_policy());
        let resp = client
            .generate(&credential(), &chain(&["model-a", "model-b"]), &request())
            .await
            .unwrap();

        assert_eq!(resp.content, "second try");
        assert_eq!(backend.call_count(), 2);
    }

    #[tokio::test]
    async fn test_not_found_abandons_without_retry() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.push_status("model-a", 404);
        backend.push_text("model-b", "ok");

        let client = LlmClient::new(backend.clone(), fast_policy());
        client
            .generate(&credential(), &chain(&["model-a", "model-b"]), &request())
            .await
            .unwrap();

        assert_eq!(backend.called_models(), vec!["model-a", "model-b"]);
    }

    #[tokio::test]
    async fn test_transport_failure_consumes_attempt() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.push(
            "model-a",
            GenerateOutcome::Transport("operation timed out".to_string()),
        );
        backend.push_text("model-a", "recovered");

        let client = LlmClient::new(backend.clone(), fast_policy());
        let resp = client
            .generate(&credential(), &chain(&["model-a"]), &request())
            .await
            .unwrap();

        assert_eq!(resp.content, "recovered");
        assert_eq!(backend.call_count(), 2);
    }

    #[tokio::test]
    async fn test_exhausted_chain_returns_none() {
        let backend = Arc::new(ScriptedBackend::new());
        for model in ["model-a", "model-b"] {
            backend.push_status(model, 503);
            backend.push_status(model, 503);
        }

        let client = LlmClient::new(backend.clone(), fast_policy());
        let resp = client
            .generate(&credential(), &chain(&["model-a", "model-b"]), &request())
            .await;

        assert!(resp.is_none());
        assert_eq!(backend.call_count(), 4);
    }

    #[tokio::test]
    async fn test_retry_reports_last_failure_kind() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.push_status("model-a", 429);
        backend.push_status("model-a", 429);

        let client = LlmClient::new(backend, fast_policy());
        let req = GenerateRequest {
            model: "model-a".to_string(),
            ..request()
        };
        let err = client
            .generate_with_retry(&credential(), &req)
            .await
            .unwrap_err();

        assert_eq!(err, FailureKind::RateLimited);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_wait_between_models() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.push_status("model-a", 429);
        backend.push_status("model-a", 429);
        backend.push_text("model-b", "from b");

        let client = LlmClient::new(
            backend.clone(),
            RetryPolicy {
                attempts_per_model: 2,
                backoff: vec![Duration::from_secs(5), Duration::from_secs(10)],
                transient_pause: Duration::from_secs(1),
            },
        );

        let start = tokio::time::Instant::now();
        let resp = client
            .generate(&credential(), &chain(&["model-a", "model-b"]), &request())
            .await
            .unwrap();
        let elapsed = start.elapsed();

        assert_eq!(resp.content, "from b");
        assert_eq!(backend.call_count(), 3);
        // one backoff between the two model-a attempts, none before model-b
        assert!(elapsed >= Duration::from_secs(5), "elapsed {elapsed:?}");
        assert!(elapsed <= Duration::from_millis(6250), "elapsed {elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_transient_pause_after_last_attempt() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.push_status("model-a", 500);
        backend.push_status("model-a", 500);
        backend.push_text("model-b", "from b");

        let client = LlmClient::new(
            backend.clone(),
            RetryPolicy {
                attempts_per_model: 2,
                backoff: vec![Duration::from_secs(5)],
                transient_pause: Duration::from_secs(1),
            },
        );

        let start = tokio::time::Instant::now();
        client
            .generate(&credential(), &chain(&["model-a", "model-b"]), &request())
            .await
            .unwrap();

        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(1), "elapsed {elapsed:?}");
        assert!(elapsed < Duration::from_secs(2), "elapsed {elapsed:?}");
    }

    #[tokio::test]
    async fn test_empty_chain_returns_none() {
        let backend = Arc::new(ScriptedBackend::new());
        let client = LlmClient::new(backend.clone(), fast_policy());
        assert!(client.generate(&credential(), &[], &request()).await.is_none());
        assert_eq!(backend.call_count(), 0);
    }

    #[test]
    fn test_backoff_escalates_and_repeats_last() {
        let policy = RetryPolicy {
            attempts_per_model: 3,
            backoff: vec![Duration::from_secs(5), Duration::from_secs(10)],
            transient_pause: Duration::ZERO,
        };
        let first = policy.backoff_for(0);
        let second = policy.backoff_for(1);
        let third = policy.backoff_for(2);
        assert!(first >= Duration::from_secs(5) && first <= Duration::from_millis(6250));
        assert!(second >= Duration::from_secs(10) && second <= Duration::from_millis(12500));
        assert!(third >= Duration::from_secs(10) && third <= Duration::from_millis(12500));
    }

    #[test]
    fn test_backoff_empty_schedule_is_zero() {
        let policy = RetryPolicy {
            attempts_per_model: 1,
            backoff: vec![],
            transient_pause: Duration::ZERO,
        };
        assert_eq!(policy.backoff_for(0), Duration::ZERO);
    }

    #[test]
    fn test_error_type_categories() {
        let cases = vec![
            (
                GenerateOutcome::Failure {
                    code: 429,
                    message: String::new(),
                },
                "rate_limit",
            ),
            (
                GenerateOutcome::Failure {
                    code: 404,
                    message: String::new(),
                },
                "invalid_model",
            ),
            (
                GenerateOutcome::Failure {
                    code: 500,
                    message: String::new(),
                },
                "transient",
            ),
            (
                GenerateOutcome::Transport("operation timed out".to_string()),
                "timeout",
            ),
            (
                GenerateOutcome::Transport("malformed response: EOF".to_string()),
                "invalid_response",
            ),
            (
                GenerateOutcome::Transport("connection refused".to_string()),
                "network_error",
            ),
        ];

        for (outcome, expected) in cases {
            assert_eq!(error_type(&outcome), expected, "error_type({outcome:?})");
        }
    }

    #[test]
    fn test_truncate_short() {
        assert_eq!(truncate("hello", 10), "hello");
    }

    #[test]
    fn test_truncate_long() {
        assert_eq!(truncate("hello world", 5), "hello");
    }

    #[test]
    fn test_truncate_multibyte_safe() {
        let result = truncate("hé世界!", 3);
        assert!(result.len() <= 3);
        assert!(result.is_char_boundary(result.len()));
    }
}
