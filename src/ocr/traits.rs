use crate::config::{OcrConfig, Region};
use crate::model::OcrError;

/// Engine settings applied to a freshly opened session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionParams {
    pub char_whitelist: String,
    pub page_seg_mode: u8,
    pub preserve_interword_spaces: bool,
}

impl From<&OcrConfig> for SessionParams {
    fn from(config: &OcrConfig) -> Self {
        Self {
            char_whitelist: config.char_whitelist.clone(),
            page_seg_mode: config.page_seg_mode,
            preserve_interword_spaces: config.preserve_interword_spaces,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Recognition {
    pub text: String,
    /// Engine-reported confidence, when the engine provides one.
    pub confidence: Option<f32>,
}

#[async_trait::async_trait]
pub trait OcrEngine: Send + Sync {
    /// Acquires a new session. Every session returned here must later be
    /// terminated by the caller.
    async fn open_session(&self) -> Result<Box<dyn OcrSession>, OcrError>;
}

#[async_trait::async_trait]
pub trait OcrSession: Send {
    async fn configure(&mut self, params: &SessionParams) -> Result<(), OcrError>;

    async fn recognize(
        &mut self,
        image: &[u8],
        region: &Region,
        rotate_auto: bool,
    ) -> Result<Recognition, OcrError>;

    /// Releases the session. Must be safe to call after any failure.
    async fn terminate(&mut self) -> Result<(), OcrError>;
}
