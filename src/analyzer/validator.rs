use crate::ai::AiReply;
use crate::model::{AnalysisResult, DISCLAIMER, ValidationError};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

/// Top-level fields every reply must carry.
pub const REQUIRED_FIELDS: [&str; 2] = ["decision", "vision_summary"];

/// Fields owned by the pipeline; anything the service sends under these
/// names is dropped.
const RESERVED_FIELDS: [&str; 4] = ["disclaimer", "usage", "error", "metadata"];

static CODE_FENCE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^\s*```[A-Za-z0-9_-]*[ \t]*\r?\n?(.*?)\s*```\s*$").unwrap()
});

/// Removes a surrounding markdown code fence, with or without a language tag.
pub fn strip_code_fence(reply: &str) -> &str {
    match CODE_FENCE_RE.captures(reply).and_then(|caps| caps.get(1)) {
        Some(inner) => inner.as_str().trim(),
        None => reply.trim(),
    }
}

pub struct ResponseValidator;

impl ResponseValidator {
    pub fn validate(reply: &AiReply) -> Result<AnalysisResult, ValidationError> {
        let body = strip_code_fence(&reply.content);
        let value: Value =
            serde_json::from_str(body).map_err(|e| ValidationError::InvalidJson(e.to_string()))?;
        let Value::Object(mut object) = value else {
            return Err(ValidationError::NotAnObject);
        };

        for field in REQUIRED_FIELDS {
            if object.get(field).is_none_or(Value::is_null) {
                return Err(ValidationError::MissingField(field));
            }
        }
        for field in RESERVED_FIELDS {
            object.remove(field);
        }

        let mut result: AnalysisResult = serde_json::from_value(Value::Object(object))
            .map_err(|e| ValidationError::Schema(e.to_string()))?;
        result.disclaimer = DISCLAIMER.to_string();
        result.usage = reply.usage.clone();
        Ok(result)
    }
}
