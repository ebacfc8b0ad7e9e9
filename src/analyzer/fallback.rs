use crate::model::{
    Action, AnalysisResult, DISCLAIMER, Decision, ErrorInfo, PipelineError, ReplyValue, RequestId,
    RiskAssessment, VisionSummary,
};
use chrono::Utc;
use serde_json::Map;

const UNAVAILABLE: &str = "unavailable";

fn unavailable() -> Option<ReplyValue> {
    Some(ReplyValue::from(UNAVAILABLE))
}

/// Conservative HOLD result returned when invocation or validation fails.
pub fn fallback_result(request_id: &RequestId, error: &PipelineError) -> AnalysisResult {
    let message = error.to_string();

    AnalysisResult {
        vision_summary: VisionSummary {
            trend: unavailable(),
            support: unavailable(),
            resistance: unavailable(),
            rsi: unavailable(),
            macd: unavailable(),
            extra: Map::new(),
        },
        decision: Decision {
            action: Action::Hold,
            entry: Some(ReplyValue::null()),
            stop_loss: Some(ReplyValue::null()),
            take_profit_1: Some(ReplyValue::null()),
            take_profit_2: Some(ReplyValue::null()),
            probability: Some(ReplyValue::from(0.0)),
            risk_reward: Some(ReplyValue::from("N/A")),
            reason: Some(ReplyValue::from(format!(
                "Automated analysis failed ({}). Holding until a valid analysis is available. {}",
                message, DISCLAIMER
            ))),
            invalidation_condition: Some(ReplyValue::from("N/A")),
            extra: Map::new(),
        },
        risk_assessment: Some(RiskAssessment {
            level: Some(ReplyValue::from("high")),
            recommended_position: Some(ReplyValue::from("none")),
            timeframe_suitability: unavailable(),
            extra: Map::new(),
        }),
        disclaimer: DISCLAIMER.to_string(),
        usage: None,
        error: Some(ErrorInfo {
            kind: error.kind().to_string(),
            message,
            request_id: request_id.clone(),
            timestamp: Utc::now(),
        }),
        metadata: None,
        extra: Map::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AiServiceError, ValidationError};

    #[test]
    fn timeout_becomes_high_risk_hold() {
        let id = RequestId::new("req-000042");
        let error = PipelineError::from(AiServiceError::Timeout { secs: 45 });
        let result = fallback_result(&id, &error);

        assert_eq!(result.decision.action, Action::Hold);
        assert_eq!(result.decision.probability_pct(), Some(0.0));
        assert_eq!(result.decision.entry_price(), None);
        assert!(result.decision.reason.as_ref().unwrap().to_text().contains("timed out"));

        let risk = result.risk_assessment.as_ref().unwrap();
        assert_eq!(risk.level, Some(ReplyValue::from("high")));
        assert_eq!(risk.recommended_position, Some(ReplyValue::from("none")));

        let info = result.error.as_ref().unwrap();
        assert_eq!(info.kind, "ai_timeout");
        assert!(info.message.contains("timed out"));
        assert_eq!(info.request_id, id);
        assert!(result.is_fallback());
    }

    #[test]
    fn serializes_with_error_block() {
        let error = PipelineError::from(ValidationError::MissingField("decision"));
        let result = fallback_result(&RequestId::new("req-000001"), &error);
        let json = serde_json::to_value(&result).unwrap();

        assert_eq!(json["decision"]["action"], "HOLD");
        assert_eq!(json["decision"]["probability"], 0.0);
        assert!(json["decision"]["entry"].is_null());
        assert_eq!(json["risk_assessment"]["level"], "high");
        assert_eq!(json["error"]["kind"], "validation");
        assert_eq!(json["error"]["request_id"], "req-000001");
        assert!(json["error"]["message"].as_str().unwrap().contains("decision"));
        assert_eq!(json["disclaimer"], DISCLAIMER);
        assert!(json.get("usage").is_none());
    }
}
