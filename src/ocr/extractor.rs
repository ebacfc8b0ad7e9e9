use crate::config::OcrConfig;
use crate::model::{OcrError, OcrResult};
use crate::ocr::traits::{OcrEngine, OcrSession, Recognition, SessionParams};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Runs one OCR session per call and always releases it before returning.
pub struct OcrExtractor {
    engine: Arc<dyn OcrEngine>,
    config: OcrConfig,
}

impl OcrExtractor {
    pub fn new(engine: Arc<dyn OcrEngine>, config: OcrConfig) -> Self {
        Self { engine, config }
    }

    /// Never fails: any engine problem yields an empty result.
    pub async fn extract(&self, image: &[u8]) -> OcrResult {
        match self.recognize_scoped(image).await {
            Ok(recognition) => {
                info!(
                    "OCR recognized {} chars (confidence: {:?})",
                    recognition.text.len(),
                    recognition.confidence
                );
                OcrResult::unparsed(recognition.text)
            }
            Err(e) => {
                warn!("OCR extraction failed, continuing without text: {}", e);
                OcrResult::empty()
            }
        }
    }

    async fn recognize_scoped(&self, image: &[u8]) -> Result<Recognition, OcrError> {
        let mut session = self.engine.open_session().await?;
        debug!("OCR session opened");

        let limit = Duration::from_secs(self.config.timeout_secs);
        let run = timeout(limit, Self::run(session.as_mut(), image, &self.config));
        let outcome = match AssertUnwindSafe(run).catch_unwind().await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(OcrError::Timeout(self.config.timeout_secs)),
            Err(_) => Err(OcrError::Recognition("OCR session panicked".into())),
        };

        if let Err(e) = session.terminate().await {
            warn!("OCR session terminate failed: {}", e);
        } else {
            debug!("OCR session terminated");
        }
        outcome
    }

    async fn run(
        session: &mut dyn OcrSession,
        image: &[u8],
        config: &OcrConfig,
    ) -> Result<Recognition, OcrError> {
        session.configure(&SessionParams::from(config)).await?;
        session.recognize(image, &config.region, config.rotate_auto).await
    }
}
