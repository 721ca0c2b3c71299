pub mod config;
pub mod error;
pub mod llm;
pub mod news;
pub mod pipeline;
pub mod routes;
pub mod telemetry;

use std::sync::Arc;

pub use config::Config;

use news::ContextProvider;
use pipeline::ReportGenerator;

#[derive(Clone)]
pub struct AppState {
    pub generator: Arc<ReportGenerator>,
    pub news: Arc<dyn ContextProvider>,
    /// Used when a request carries no `x-goog-api-key` header.
    pub default_api_key: Option<String>,
}
