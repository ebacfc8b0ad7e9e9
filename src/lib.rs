pub mod ai;
pub mod analyzer;
pub mod config;
pub mod model;
pub mod ocr;
pub mod parser;
pub mod preprocess;
pub mod prompt;
pub mod utils;

pub use analyzer::AnalysisOrchestrator;
pub use model::{AnalysisRequest, AnalysisResult};
