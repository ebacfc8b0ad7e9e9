use crate::ai::ReasoningService;
use crate::analyzer::fallback::fallback_result;
use crate::analyzer::validator::ResponseValidator;
use crate::config::AppConfig;
use crate::model::{AnalysisRequest, AnalysisResult, PipelineError, RequestId, RequestMetadata, Stage};
use crate::ocr::{OcrEngine, OcrExtractor};
use crate::parser::{ChartTextParser, Parser};
use crate::preprocess::ImagePreprocessor;
use crate::prompt::PromptBuilder;
use chrono::Utc;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{Instrument, debug, info, info_span, warn};

/// Hands out unique, increasing request ids (`req-000001`, `req-000002`, ...).
#[derive(Debug)]
pub struct RequestCounter {
    next: AtomicU64,
}

impl RequestCounter {
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    pub fn next_id(&self) -> RequestId {
        let seq = self.next.fetch_add(1, Ordering::Relaxed);
        RequestId::new(format!("req-{:06}", seq))
    }
}

impl Default for RequestCounter {
    fn default() -> Self {
        Self::new()
    }
}

/// Forward-only walk through the pipeline stages of one request.
struct StageTracker {
    current: Stage,
}

impl StageTracker {
    fn start() -> Self {
        debug!(stage = %Stage::Preprocessing, "Entering stage");
        Self {
            current: Stage::Preprocessing,
        }
    }

    fn advance(&mut self, next: Stage) {
        debug_assert!(!self.current.is_terminal(), "stage after {}", self.current);
        debug_assert!(next as u8 > self.current as u8, "{} -> {}", self.current, next);
        debug!(from = %self.current, stage = %next, "Entering stage");
        self.current = next;
    }
}

/// Runs one chart through preprocess, OCR, parse, prompt, invoke and validate.
/// Always produces a result; invocation and validation failures become the
/// fallback HOLD.
pub struct AnalysisOrchestrator {
    preprocessor: ImagePreprocessor,
    extractor: OcrExtractor,
    parser: ChartTextParser,
    reasoning: Arc<dyn ReasoningService>,
    counter: RequestCounter,
}

impl AnalysisOrchestrator {
    pub fn new(config: &AppConfig, engine: Arc<dyn OcrEngine>, reasoning: Arc<dyn ReasoningService>) -> Self {
        Self {
            preprocessor: ImagePreprocessor::new(config.preprocess.clone()).with_auto_rotate(config.ocr.rotate_auto),
            extractor: OcrExtractor::new(engine, config.ocr.clone()),
            parser: ChartTextParser::new(),
            reasoning,
            counter: RequestCounter::new(),
        }
    }

    /// Analyzes with an id from the internal counter.
    pub async fn analyze(&self, request: AnalysisRequest) -> AnalysisResult {
        let request_id = self.counter.next_id();
        self.analyze_with_id(request_id, request).await
    }

    /// Analyzes with an id chosen by the caller.
    pub async fn analyze_with_id(&self, request_id: RequestId, request: AnalysisRequest) -> AnalysisResult {
        let span = info_span!(
            "analysis",
            request_id = %request_id,
            symbol = %request.symbol(),
            timeframe = %request.timeframe()
        );

        async move {
            let started = Instant::now();
            info!("📈 Analyzing {} {} chart ({} bytes)", request.symbol(), request.timeframe(), request.image().len());

            let mut tracker = StageTracker::start();
            let mut ocr_has_data = false;
            let outcome = self.run(&request, &mut tracker, &mut ocr_has_data).await;

            let mut result = match outcome {
                Ok(result) => {
                    tracker.advance(Stage::Done);
                    result
                }
                Err(e) => {
                    warn!("⚠️ {} failed, returning HOLD fallback: {}", e.stage(), e);
                    tracker.advance(Stage::Fallback);
                    fallback_result(&request_id, &e)
                }
            };

            let processing_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
            info!(
                "✅ Finished in {} ms: {:?} ({}%)",
                processing_ms,
                result.decision.action,
                result.decision.probability_pct().unwrap_or(0.0)
            );
            result.metadata = Some(RequestMetadata {
                request_id,
                processing_ms,
                timestamp: Utc::now(),
                final_stage: tracker.current,
                ocr_has_data,
            });
            result
        }
        .instrument(span)
        .await
    }

    async fn run(
        &self,
        request: &AnalysisRequest,
        tracker: &mut StageTracker,
        ocr_has_data: &mut bool,
    ) -> Result<AnalysisResult, PipelineError> {
        let image = self.preprocessor.preprocess_blocking(request.image()).await;

        tracker.advance(Stage::Extracting);
        let extracted = self.extractor.extract(&image).await;

        tracker.advance(Stage::Parsing);
        let ocr = self.parser.parse(&extracted.raw_text);
        *ocr_has_data = ocr.has_data;
        if !ocr.has_data {
            info!("No chart data recognized, analysis will rely on parameters only");
        }

        tracker.advance(Stage::Prompting);
        let document = PromptBuilder::build(
            &ocr,
            request.symbol(),
            request.timeframe(),
            request.trade_type(),
            request.notes(),
        );

        tracker.advance(Stage::Invoking);
        let reply = self.reasoning.analyze(&document).await?;

        tracker.advance(Stage::Validating);
        Ok(ResponseValidator::validate(&reply)?)
    }
}
