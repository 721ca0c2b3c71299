pub mod google;

pub use google::GoogleNewsProvider;

/// Supplies the free-text context bundle for a briefing. Never fails: problems are
/// reported inside the returned text so the briefing can still be attempted.
#[async_trait::async_trait]
pub trait ContextProvider: Send + Sync {
    async fn context(&self, query: &str) -> String;
}

/// Serves a fixed text for every query.
pub struct StaticContext(pub String);

#[async_trait::async_trait]
impl ContextProvider for StaticContext {
    async fn context(&self, _query: &str) -> String {
        self.0.clone()
    }
}
