use crate::ai::traits::{AiReply, ReasoningService};
use crate::config::AiConfig;
use crate::model::{AiServiceError, Usage};
use crate::prompt::SYSTEM_PROMPT;
use crate::utils::truncate_chars;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// OpenAI-compatible chat-completions client.
pub struct OpenAiClient {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
    temperature: f64,
    max_tokens: u32,
    timeout_secs: u64,
}

impl OpenAiClient {
    pub fn new(config: &AiConfig) -> Result<Self, AiServiceError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AiServiceError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            timeout_secs: config.timeout_secs,
        })
    }

    async fn exchange(&self, api_key: &str, document: &str) -> Result<AiReply, AiServiceError> {
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: document,
                },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            response_format: ResponseFormat { kind: "json_object" },
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_else(|_| "unknown".into());
            let message = truncate_chars(body.trim(), 300);
            warn!("❌ Reasoning service responded [{}]: {}", status, message);
            return Err(match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AiServiceError::Auth {
                    status: status.as_u16(),
                    message,
                },
                _ => AiServiceError::Status {
                    status: status.as_u16(),
                    message,
                },
            });
        }

        let envelope: ChatResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                self.classify(e)
            } else {
                AiServiceError::MalformedResponse(e.to_string())
            }
        })?;

        let content = envelope
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| AiServiceError::MalformedResponse("response has no choices".into()))?
            .message
            .content
            .unwrap_or_default();
        if content.trim().is_empty() {
            return Err(AiServiceError::EmptyReply);
        }

        Ok(AiReply {
            content,
            usage: envelope.usage,
        })
    }

    fn classify(&self, e: reqwest::Error) -> AiServiceError {
        if e.is_timeout() {
            AiServiceError::Timeout {
                secs: self.timeout_secs,
            }
        } else {
            AiServiceError::Transport(e.to_string())
        }
    }
}

#[async_trait::async_trait]
impl ReasoningService for OpenAiClient {
    async fn analyze(&self, document: &str) -> Result<AiReply, AiServiceError> {
        let api_key = self.api_key.as_deref().ok_or(AiServiceError::MissingApiKey)?;
        debug!(model = %self.model, "📤 Sending instruction document ({} chars)", document.len());

        let limit = Duration::from_secs(self.timeout_secs);
        let reply = match timeout(limit, self.exchange(api_key, document)).await {
            Ok(result) => result?,
            Err(_) => {
                warn!("⏳ Reasoning service timed out after {}s", self.timeout_secs);
                return Err(AiServiceError::Timeout {
                    secs: self.timeout_secs,
                });
            }
        };

        info!(
            "✅ Reasoning service replied ({} chars, {} tokens)",
            reply.content.len(),
            reply.usage.as_ref().and_then(|u| u.total_tokens).unwrap_or(0)
        );
        Ok(reply)
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f64,
    max_tokens: u32,
    response_format: ResponseFormat,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ReplyMessage,
}

#[derive(Deserialize)]
struct ReplyMessage {
    content: Option<String>,
}
