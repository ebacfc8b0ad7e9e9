#![allow(dead_code)]

use async_trait::async_trait;
use chart_sniper::ai::{AiReply, ReasoningService};
use chart_sniper::config::Region;
use chart_sniper::model::{AiServiceError, OcrError, Usage};
use chart_sniper::ocr::{OcrEngine, OcrSession, Recognition, SessionParams};
use image::{ImageBuffer, ImageFormat, Luma};
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const CHART_TEXT: &str = "EURUSD H4  1.08500  1.09200  1.07950\nRSI(14): 62.3  MACD: -0.0004  EMA(50): 1.0840";

pub const VALID_REPLY: &str = r#"{
    "vision_summary": { "trend": "bullish", "support": "1.0795", "resistance": "1.0920", "rsi": "62.3 neutral", "macd": "flat" },
    "decision": { "action": "BUY", "entry": 1.085, "stop_loss": 1.0795, "take_profit_1": 1.092, "take_profit_2": 1.1, "probability": 72, "risk_reward": "1:1.6", "reason": "Bounce off support.", "invalidation_condition": "H4 close below 1.0795" },
    "risk_assessment": { "level": "medium", "recommended_position": "1%", "timeframe_suitability": "good" }
}"#;

/// Small grayscale PNG, enough for the preprocessor to decode.
pub fn chart_png() -> Vec<u8> {
    let img: ImageBuffer<Luma<u8>, Vec<u8>> =
        ImageBuffer::from_fn(64, 48, |x, y| Luma([if (x + y) % 8 < 4 { 40 } else { 210 }]));
    let mut bytes = Cursor::new(Vec::new());
    img.write_to(&mut bytes, ImageFormat::Png).unwrap();
    bytes.into_inner()
}

#[derive(Default)]
pub struct SessionCounters {
    pub opened: AtomicUsize,
    pub terminated: AtomicUsize,
}

impl SessionCounters {
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn terminated(&self) -> usize {
        self.terminated.load(Ordering::SeqCst)
    }
}

/// OCR engine returning fixed text, or failing to open when `text` is `None`.
pub struct StubEngine {
    text: Option<String>,
    pub counters: Arc<SessionCounters>,
}

impl StubEngine {
    pub fn with_text(text: &str) -> Self {
        Self {
            text: Some(text.to_string()),
            counters: Arc::default(),
        }
    }

    pub fn unavailable() -> Self {
        Self {
            text: None,
            counters: Arc::default(),
        }
    }
}

struct StubSession {
    text: String,
    configured: bool,
    counters: Arc<SessionCounters>,
}

#[async_trait]
impl OcrEngine for StubEngine {
    async fn open_session(&self) -> Result<Box<dyn OcrSession>, OcrError> {
        let text = self
            .text
            .clone()
            .ok_or_else(|| OcrError::EngineUnavailable("stub engine offline".into()))?;
        self.counters.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(StubSession {
            text,
            configured: false,
            counters: self.counters.clone(),
        }))
    }
}

#[async_trait]
impl OcrSession for StubSession {
    async fn configure(&mut self, _params: &SessionParams) -> Result<(), OcrError> {
        self.configured = true;
        Ok(())
    }

    async fn recognize(&mut self, _image: &[u8], _region: &Region, _rotate_auto: bool) -> Result<Recognition, OcrError> {
        if !self.configured {
            return Err(OcrError::NotConfigured);
        }
        tokio::task::yield_now().await;
        Ok(Recognition {
            text: self.text.clone(),
            confidence: Some(91.0),
        })
    }

    async fn terminate(&mut self) -> Result<(), OcrError> {
        self.counters.terminated.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub enum Behavior {
    Reply(String),
    TimeOut,
}

/// Reasoning service that records every document it receives.
pub struct StubReasoning {
    behavior: Behavior,
    documents: Mutex<Vec<String>>,
}

impl StubReasoning {
    pub fn replying(content: &str) -> Self {
        Self {
            behavior: Behavior::Reply(content.to_string()),
            documents: Mutex::new(Vec::new()),
        }
    }

    pub fn timing_out() -> Self {
        Self {
            behavior: Behavior::TimeOut,
            documents: Mutex::new(Vec::new()),
        }
    }

    pub fn documents(&self) -> Vec<String> {
        self.documents.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReasoningService for StubReasoning {
    async fn analyze(&self, document: &str) -> Result<AiReply, AiServiceError> {
        self.documents.lock().unwrap().push(document.to_string());
        match &self.behavior {
            Behavior::Reply(content) => Ok(AiReply {
                content: content.clone(),
                usage: Some(Usage::new(1200, 300)),
            }),
            Behavior::TimeOut => Err(AiServiceError::Timeout { secs: 45 }),
        }
    }
}
