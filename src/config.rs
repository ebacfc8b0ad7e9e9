use crate::model::{ConfigError, Symbol, Timeframe, TradeType};
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;

/// Characters the OCR engine may emit: digits, currency symbols,
/// punctuation and Latin letters.
pub const DEFAULT_CHAR_WHITELIST: &str =
    "0123456789$€£¥.,:%+-()/ ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o".to_string(),
            temperature: 0.1,
            max_tokens: 2000,
            timeout_secs: 45,
        }
    }
}

/// Top-left anchored recognition rectangle, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Region {
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
}

impl Default for Region {
    fn default() -> Self {
        Self {
            left: 0,
            top: 0,
            width: 1000,
            height: 1000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    pub tesseract_path: String,
    pub language: String,
    pub char_whitelist: String,
    pub page_seg_mode: u8,
    pub preserve_interword_spaces: bool,
    pub region: Region,
    pub rotate_auto: bool,
    pub timeout_secs: u64,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            tesseract_path: "tesseract".to_string(),
            language: "eng".to_string(),
            char_whitelist: DEFAULT_CHAR_WHITELIST.to_string(),
            // 6 = assume a single uniform block of text
            page_seg_mode: 6,
            preserve_interword_spaces: true,
            region: Region::default(),
            rotate_auto: true,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    pub max_dimension: u32,
    pub median_radius: u32,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            max_dimension: 2000,
            median_radius: 1,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub max_image_bytes: usize,
    pub max_notes_chars: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_image_bytes: 10 * 1024 * 1024,
            max_notes_chars: 500,
        }
    }
}

/// One chart to analyze when running from the command line.
#[derive(Debug, Clone, Deserialize)]
pub struct ChartJob {
    pub image_path: PathBuf,
    pub symbol: Symbol,
    pub timeframe: Timeframe,
    pub trade_type: TradeType,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub ai: AiConfig,
    pub ocr: OcrConfig,
    pub preprocess: PreprocessConfig,
    pub limits: LimitsConfig,
    pub charts: Vec<ChartJob>,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.preprocess.max_dimension == 0 {
            return Err(ConfigError::Invalid("preprocess.max_dimension must be > 0".into()));
        }
        if self.ocr.region.width == 0 || self.ocr.region.height == 0 {
            return Err(ConfigError::Invalid("ocr.region must have a non-zero size".into()));
        }
        if self.ai.timeout_secs == 0 {
            return Err(ConfigError::Invalid("ai.timeout_secs must be > 0".into()));
        }
        if !(0.0..=2.0).contains(&self.ai.temperature) {
            return Err(ConfigError::Invalid("ai.temperature must be within 0..=2".into()));
        }
        Ok(())
    }
}

pub fn load_config(path: &str) -> Result<AppConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parses and validates a JSON config. A missing `ai.api_key` is taken from
/// `OPENAI_API_KEY`.
pub fn parse_config(content: &str) -> Result<AppConfig, ConfigError> {
    let mut config: AppConfig = serde_json::from_str(content)?;
    if config.ai.api_key.as_deref().is_none_or(str::is_empty) {
        config.ai.api_key = std::env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty());
    }
    config.validate()?;
    Ok(config)
}
