// AI module: the reasoning-service seam and its OpenAI-compatible client.

pub mod client;
pub mod traits;

pub use client::OpenAiClient;
pub use traits::{AiReply, ReasoningService};
