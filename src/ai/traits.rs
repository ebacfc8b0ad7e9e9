use crate::model::{AiServiceError, Usage};

/// Raw reply from the reasoning service, before validation.
#[derive(Debug, Clone, PartialEq)]
pub struct AiReply {
    pub content: String,
    pub usage: Option<Usage>,
}

#[async_trait::async_trait]
pub trait ReasoningService: Send + Sync {
    /// One round trip. No retries.
    async fn analyze(&self, document: &str) -> Result<AiReply, AiServiceError>;
}
