use crate::news::ContextProvider;

use super::mode::ReportMode;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrieveResult {
    pub context: String,
    pub query: Option<String>,
}

/// Uses caller-supplied context verbatim; otherwise asks the provider with the given
/// query or the mode's default one.
#[tracing::instrument(
    name = "pipeline_stage retrieve",
    skip(provider, supplied_context),
    fields(
        pipeline.stage = "retrieve",
        context.supplied = supplied_context.is_some(),
        context.chars,
    )
)]
pub async fn retrieve(
    provider: &dyn ContextProvider,
    mode: ReportMode,
    supplied_context: Option<String>,
    query: Option<&str>,
) -> RetrieveResult {
    let result = match supplied_context {
        Some(context) => RetrieveResult {
            context,
            query: None,
        },
        None => {
            let query = query
                .map(str::trim)
                .filter(|q| !q.is_empty())
                .unwrap_or_else(|| mode.default_query());
            RetrieveResult {
                context: provider.context(query).await,
                query: Some(query.to_string()),
            }
        }
    };

    let span = tracing::Span::current();
    span.record("context.chars", result.context.chars().count());

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::news::StaticContext;

    struct EchoQuery;

    #[async_trait::async_trait]
    impl ContextProvider for EchoQuery {
        async fn context(&self, query: &str) -> String {
            format!("headlines for {query}")
        }
    }

    #[tokio::test]
    async fn test_supplied_context_wins() {
        let provider = StaticContext("from provider".to_string());
        let result = retrieve(
            &provider,
            ReportMode::Fx,
            Some("from caller".to_string()),
            Some("ignored"),
        )
        .await;
        assert_eq!(result.context, "from caller");
        assert_eq!(result.query, None);
    }

    #[tokio::test]
    async fn test_uses_mode_default_query() {
        let result = retrieve(&EchoQuery, ReportMode::Bitcoin, None, None).await;
        assert_eq!(result.context, "headlines for Bitcoin crypto");
        assert_eq!(result.query.as_deref(), Some("Bitcoin crypto"));
    }

    #[tokio::test]
    async fn test_blank_query_falls_back_to_default() {
        let result = retrieve(&EchoQuery, ReportMode::Geopolitical, None, Some("  ")).await;
        assert_eq!(result.query.as_deref(), Some("Geopolitics War Oil Gold Economy"));
    }

    #[tokio::test]
    async fn test_custom_query() {
        let result = retrieve(&EchoQuery, ReportMode::Global, None, Some("ECB rate decision")).await;
        assert_eq!(result.context, "headlines for ECB rate decision");
    }
}
