use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub environment: String,
    pub google_api_key: Option<String>,
    pub gemini_base_url: String,
    pub news_base_url: String,
    pub preferred_models: Vec<String>,
    pub context_budget: usize,
    pub max_output_tokens: u32,
    pub attempts_per_model: u32,
    pub retry_backoff: Vec<Duration>,
    pub transient_pause: Duration,
    pub http_timeout: Duration,
    pub report_cache_ttl: Duration,
    pub report_cache_capacity: usize,
    pub news_cache_ttl: Duration,
    pub news_max_items: usize,
    pub otel_service_name: String,
    pub otel_exporter_endpoint: String,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Self {
            port: env::var("APP_PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .expect("APP_PORT must be a number"),
            environment: env::var("APP_ENVIRONMENT")
                .unwrap_or_else(|_| "development".to_string()),
            google_api_key: env::var("GOOGLE_API_KEY")
                .ok()
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty()),
            gemini_base_url: env::var("GEMINI_BASE_URL")
                .unwrap_or_else(|_| "https://generativelanguage.googleapis.com/v1beta".to_string()),
            news_base_url: env::var("NEWS_BASE_URL")
                .unwrap_or_else(|_| "https://news.google.com".to_string()),
            preferred_models: parse_list(
                &env::var("PREFERRED_MODELS").unwrap_or_else(|_| {
                    "gemini-2.0-flash,gemini-1.5-flash,gemini-1.0-pro,gemini-pro".to_string()
                }),
            ),
            context_budget: env::var("CONTEXT_BUDGET_CHARS")
                .unwrap_or_else(|_| "2000".to_string())
                .parse()
                .expect("CONTEXT_BUDGET_CHARS must be a number"),
            max_output_tokens: env::var("MAX_OUTPUT_TOKENS")
                .unwrap_or_else(|_| "2500".to_string())
                .parse()
                .expect("MAX_OUTPUT_TOKENS must be a number"),
            attempts_per_model: env::var("ATTEMPTS_PER_MODEL")
                .unwrap_or_else(|_| "2".to_string())
                .parse()
                .expect("ATTEMPTS_PER_MODEL must be a number"),
            retry_backoff: parse_list(
                &env::var("RETRY_BACKOFF_SECS").unwrap_or_else(|_| "5,10".to_string()),
            )
            .iter()
            .map(|s| {
                Duration::from_secs(
                    s.parse()
                        .expect("RETRY_BACKOFF_SECS must be a comma-separated list of numbers"),
                )
            })
            .collect(),
            transient_pause: Duration::from_millis(
                env::var("TRANSIENT_PAUSE_MS")
                    .unwrap_or_else(|_| "1000".to_string())
                    .parse()
                    .expect("TRANSIENT_PAUSE_MS must be a number"),
            ),
            http_timeout: Duration::from_secs(
                env::var("HTTP_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "60".to_string())
                    .parse()
                    .expect("HTTP_TIMEOUT_SECS must be a number"),
            ),
            report_cache_ttl: Duration::from_secs(
                env::var("REPORT_CACHE_TTL_SECS")
                    .unwrap_or_else(|_| "3600".to_string())
                    .parse()
                    .expect("REPORT_CACHE_TTL_SECS must be a number"),
            ),
            report_cache_capacity: env::var("REPORT_CACHE_CAPACITY")
                .unwrap_or_else(|_| "256".to_string())
                .parse()
                .expect("REPORT_CACHE_CAPACITY must be a number"),
            news_cache_ttl: Duration::from_secs(
                env::var("NEWS_CACHE_TTL_SECS")
                    .unwrap_or_else(|_| "600".to_string())
                    .parse()
                    .expect("NEWS_CACHE_TTL_SECS must be a number"),
            ),
            news_max_items: env::var("NEWS_MAX_ITEMS")
                .unwrap_or_else(|_| "15".to_string())
                .parse()
                .expect("NEWS_MAX_ITEMS must be a number"),
            otel_service_name: env::var("OTEL_SERVICE_NAME")
                .unwrap_or_else(|_| "market-briefing".to_string()),
            otel_exporter_endpoint: env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
                .unwrap_or_else(|_| "http://localhost:4317".to_string()),
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_list_trims_and_skips_empty() {
        assert_eq!(
            parse_list(" gemini-2.0-flash, ,gemini-pro ,"),
            vec!["gemini-2.0-flash", "gemini-pro"]
        );
    }

    #[test]
    fn test_parse_list_empty() {
        assert!(parse_list("").is_empty());
    }
}
