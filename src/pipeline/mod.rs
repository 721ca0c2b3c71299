pub mod cache;
pub mod format;
pub mod mode;
pub mod orchestrator;
pub mod prompt;
pub mod retrieve;

pub use mode::ReportMode;
pub use orchestrator::{GeneratorSettings, ReportGenerator};
