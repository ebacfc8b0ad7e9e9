mod common;

use chart_sniper::AnalysisOrchestrator;
use chart_sniper::config::{AppConfig, LimitsConfig};
use chart_sniper::model::{
    Action, AnalysisRequest, DISCLAIMER, ReplyValue, RequestId, Stage, Symbol, Timeframe, TradeType,
};
use common::{CHART_TEXT, StubEngine, StubReasoning, VALID_REPLY, chart_png};
use futures::future::join_all;
use std::collections::HashSet;
use std::sync::Arc;

fn request(image: Vec<u8>) -> AnalysisRequest {
    AnalysisRequest::new(
        image,
        Symbol::Eurusd,
        Timeframe::H4,
        TradeType::Swing,
        "  NFP on Friday  ",
        &LimitsConfig::default(),
    )
    .unwrap()
}

fn orchestrator(engine: Arc<StubEngine>, reasoning: Arc<StubReasoning>) -> AnalysisOrchestrator {
    AnalysisOrchestrator::new(&AppConfig::default(), engine, reasoning)
}

#[tokio::test]
async fn test_successful_analysis() {
    let engine = Arc::new(StubEngine::with_text(CHART_TEXT));
    let reasoning = Arc::new(StubReasoning::replying(&format!("```json\n{}\n```", VALID_REPLY)));
    let pipeline = orchestrator(engine.clone(), reasoning.clone());

    let result = pipeline.analyze(request(chart_png())).await;

    assert_eq!(result.decision.action, Action::Buy);
    assert_eq!(result.decision.probability_pct(), Some(72.0));
    assert_eq!(result.decision.stop_loss_price(), Some(1.0795));
    assert_eq!(result.disclaimer, DISCLAIMER);
    assert_eq!(result.usage.as_ref().unwrap().total_tokens, Some(1500));
    assert!(!result.is_fallback());

    let metadata = result.metadata.as_ref().unwrap();
    assert_eq!(metadata.request_id.as_str(), "req-000001");
    assert_eq!(metadata.final_stage, Stage::Done);
    assert!(metadata.ocr_has_data);

    // The parsed chart data reaches the instruction document
    let documents = reasoning.documents();
    assert_eq!(documents.len(), 1);
    assert!(documents[0].contains("1.0795, 1.084, 1.085, 1.092"));
    assert!(documents[0].contains("RSI = 62.3"));
    assert!(documents[0].contains("EMA = 1.084"));
    assert!(documents[0].contains("- Trader notes: NFP on Friday"));

    assert_eq!(engine.counters.opened(), 1);
    assert_eq!(engine.counters.terminated(), 1);
}

#[tokio::test]
async fn test_timeout_returns_hold_fallback() {
    let engine = Arc::new(StubEngine::with_text(CHART_TEXT));
    let pipeline = orchestrator(engine, Arc::new(StubReasoning::timing_out()));

    let result = pipeline.analyze(request(chart_png())).await;

    assert_eq!(result.decision.action, Action::Hold);
    assert_eq!(result.decision.probability_pct(), Some(0.0));
    let risk = result.risk_assessment.as_ref().unwrap();
    assert_eq!(risk.level, Some(ReplyValue::from("high")));
    assert_eq!(risk.recommended_position, Some(ReplyValue::from("none")));

    let error = result.error.as_ref().unwrap();
    assert!(error.message.contains("timed out"));
    assert_eq!(error.kind, "ai_timeout");
    assert_eq!(error.request_id.as_str(), "req-000001");

    let metadata = result.metadata.as_ref().unwrap();
    assert_eq!(metadata.final_stage, Stage::Fallback);
    assert_eq!(metadata.request_id, error.request_id);
}

#[tokio::test]
async fn test_invalid_reply_returns_validation_fallback() {
    let engine = Arc::new(StubEngine::with_text(CHART_TEXT));
    let reasoning = Arc::new(StubReasoning::replying(r#"{ "vision_summary": { "trend": "up" } }"#));
    let pipeline = orchestrator(engine, reasoning);

    let result = pipeline.analyze(request(chart_png())).await;

    assert_eq!(result.decision.action, Action::Hold);
    let error = result.error.as_ref().unwrap();
    assert_eq!(error.kind, "validation");
    assert!(error.message.contains("decision"));
    assert_eq!(result.metadata.as_ref().unwrap().final_stage, Stage::Fallback);

    let result = orchestrator(
        Arc::new(StubEngine::with_text(CHART_TEXT)),
        Arc::new(StubReasoning::replying("Sorry, I cannot analyze this chart.")),
    )
    .analyze(request(chart_png()))
    .await;
    assert!(result.is_fallback());
    assert_eq!(result.decision.action, Action::Hold);
}

#[tokio::test]
async fn test_corrupt_image_still_reaches_reasoning_service() {
    let engine = Arc::new(StubEngine::with_text(CHART_TEXT));
    let reasoning = Arc::new(StubReasoning::replying(VALID_REPLY));
    let pipeline = orchestrator(engine.clone(), reasoning.clone());

    let result = pipeline.analyze(request(b"definitely not a png".to_vec())).await;

    assert_eq!(result.decision.action, Action::Buy);
    assert_eq!(result.metadata.as_ref().unwrap().final_stage, Stage::Done);
    assert_eq!(reasoning.documents().len(), 1);
    assert_eq!(engine.counters.terminated(), 1);
}

#[tokio::test]
async fn test_unavailable_ocr_engine_degrades_to_parameters_only() {
    let engine = Arc::new(StubEngine::unavailable());
    let reasoning = Arc::new(StubReasoning::replying(VALID_REPLY));
    let pipeline = orchestrator(engine.clone(), reasoning.clone());

    let result = pipeline.analyze(request(chart_png())).await;

    assert!(!result.is_fallback());
    assert!(!result.metadata.as_ref().unwrap().ocr_has_data);
    assert!(reasoning.documents()[0].contains("No data extracted from the chart image"));
    assert_eq!(engine.counters.opened(), 0);
    assert_eq!(engine.counters.terminated(), 0);
}

#[tokio::test]
async fn test_caller_supplied_request_id() {
    let pipeline = orchestrator(
        Arc::new(StubEngine::with_text(CHART_TEXT)),
        Arc::new(StubReasoning::timing_out()),
    );

    let result = pipeline
        .analyze_with_id(RequestId::new("upload-7f3a"), request(chart_png()))
        .await;

    assert_eq!(result.error.as_ref().unwrap().request_id.as_str(), "upload-7f3a");
    assert_eq!(result.metadata.as_ref().unwrap().request_id.as_str(), "upload-7f3a");
}

#[tokio::test]
async fn test_concurrent_requests_get_unique_ids_and_own_sessions() {
    let engine = Arc::new(StubEngine::with_text(CHART_TEXT));
    let reasoning = Arc::new(StubReasoning::replying(VALID_REPLY));
    let pipeline = orchestrator(engine.clone(), reasoning.clone());

    let runs = (0..12).map(|_| pipeline.analyze(request(chart_png())));
    let results = join_all(runs).await;

    let ids: HashSet<String> = results
        .iter()
        .map(|r| r.metadata.as_ref().unwrap().request_id.as_str().to_string())
        .collect();
    assert_eq!(ids.len(), 12);
    assert!(ids.contains("req-000001"));
    assert!(ids.contains("req-000012"));

    assert_eq!(engine.counters.opened(), 12);
    assert_eq!(engine.counters.terminated(), 12);
    assert_eq!(reasoning.documents().len(), 12);
}

#[test]
fn test_request_boundary_checks() {
    let limits = LimitsConfig {
        max_image_bytes: 8,
        max_notes_chars: 500,
    };

    assert!(AnalysisRequest::new(Vec::new(), Symbol::Btcusd, Timeframe::D1, TradeType::Position, "", &limits).is_err());
    assert!(AnalysisRequest::new(vec![0; 9], Symbol::Btcusd, Timeframe::D1, TradeType::Position, "", &limits).is_err());

    let notes = "n".repeat(800);
    let request = AnalysisRequest::new(vec![1; 8], Symbol::Btcusd, Timeframe::D1, TradeType::Position, &notes, &limits).unwrap();
    assert_eq!(request.notes().chars().count(), 500);
}
