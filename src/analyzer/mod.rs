// Analyzer module: reply validation, fallback results and stage sequencing.

pub mod fallback;
pub mod orchestrator;
pub mod validator;

pub use fallback::fallback_result;
pub use orchestrator::{AnalysisOrchestrator, RequestCounter};
pub use validator::{ResponseValidator, strip_code_fence};
