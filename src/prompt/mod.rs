pub mod builder;

pub use builder::{MIN_CONFIDENCE_PCT, MIN_RISK_REWARD, PromptBuilder, SYSTEM_PROMPT};
