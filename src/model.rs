// Core structs: AnalysisRequest, OcrResult, AnalysisResult and the pipeline errors
use crate::config::LimitsConfig;
use crate::utils::truncate_chars;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Fixed disclaimer attached to every analysis, normal or fallback.
pub const DISCLAIMER: &str = "This analysis is generated automatically for informational purposes only \
and is not financial advice. Trading involves substantial risk of loss. \
Always do your own research and never risk more than you can afford to lose.";

/// Maximum number of price levels kept after extraction.
pub const MAX_PRICE_LEVELS: usize = 15;

/// Raw OCR text is capped at this many characters once parsed.
pub const RAW_TEXT_LIMIT: usize = 1500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE", try_from = "String")]
pub enum Symbol {
    Eurusd,
    Gbpusd,
    Usdjpy,
    Audusd,
    Usdcad,
    Usdchf,
    Nzdusd,
    Xauusd,
    Btcusd,
    Ethusd,
}

impl Symbol {
    pub const ALL: [Symbol; 10] = [
        Symbol::Eurusd,
        Symbol::Gbpusd,
        Symbol::Usdjpy,
        Symbol::Audusd,
        Symbol::Usdcad,
        Symbol::Usdchf,
        Symbol::Nzdusd,
        Symbol::Xauusd,
        Symbol::Btcusd,
        Symbol::Ethusd,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Symbol::Eurusd => "EURUSD",
            Symbol::Gbpusd => "GBPUSD",
            Symbol::Usdjpy => "USDJPY",
            Symbol::Audusd => "AUDUSD",
            Symbol::Usdcad => "USDCAD",
            Symbol::Usdchf => "USDCHF",
            Symbol::Nzdusd => "NZDUSD",
            Symbol::Xauusd => "XAUUSD",
            Symbol::Btcusd => "BTCUSD",
            Symbol::Ethusd => "ETHUSD",
        }
    }
}

impl FromStr for Symbol {
    type Err = RequestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().replace('/', "");
        Symbol::ALL
            .into_iter()
            .find(|symbol| symbol.as_str().eq_ignore_ascii_case(&wanted))
            .ok_or_else(|| RequestError::UnsupportedSymbol(s.to_string()))
    }
}

impl TryFrom<String> for Symbol {
    type Error = RequestError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub enum Timeframe {
    M1,
    M5,
    M15,
    M30,
    H1,
    H4,
    D1,
    W1,
}

impl Timeframe {
    pub const ALL: [Timeframe; 8] = [
        Timeframe::M1,
        Timeframe::M5,
        Timeframe::M15,
        Timeframe::M30,
        Timeframe::H1,
        Timeframe::H4,
        Timeframe::D1,
        Timeframe::W1,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::M1 => "M1",
            Timeframe::M5 => "M5",
            Timeframe::M15 => "M15",
            Timeframe::M30 => "M30",
            Timeframe::H1 => "H1",
            Timeframe::H4 => "H4",
            Timeframe::D1 => "D1",
            Timeframe::W1 => "W1",
        }
    }
}

impl FromStr for Timeframe {
    type Err = RequestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Timeframe::ALL
            .into_iter()
            .find(|tf| tf.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| RequestError::UnsupportedTimeframe(s.to_string()))
    }
}

impl TryFrom<String> for Timeframe {
    type Error = RequestError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum TradeType {
    Scalping,
    Intraday,
    Swing,
    Position,
}

impl TradeType {
    pub const ALL: [TradeType; 4] = [
        TradeType::Scalping,
        TradeType::Intraday,
        TradeType::Swing,
        TradeType::Position,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TradeType::Scalping => "scalping",
            TradeType::Intraday => "intraday",
            TradeType::Swing => "swing",
            TradeType::Position => "position",
        }
    }
}

impl FromStr for TradeType {
    type Err = RequestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TradeType::ALL
            .into_iter()
            .find(|tt| tt.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| RequestError::UnsupportedTradeType(s.to_string()))
    }
}

impl TryFrom<String> for TradeType {
    type Error = RequestError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for TradeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated chart analysis request. Immutable once built.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    image: Vec<u8>,
    symbol: Symbol,
    timeframe: Timeframe,
    trade_type: TradeType,
    notes: String,
}

impl AnalysisRequest {
    /// Applies the inbound checks: non-empty image within the size limit,
    /// notes truncated to the configured number of characters.
    pub fn new(
        image: Vec<u8>,
        symbol: Symbol,
        timeframe: Timeframe,
        trade_type: TradeType,
        notes: &str,
        limits: &LimitsConfig,
    ) -> Result<Self, RequestError> {
        if image.is_empty() {
            return Err(RequestError::EmptyImage);
        }
        if image.len() > limits.max_image_bytes {
            return Err(RequestError::ImageTooLarge {
                size: image.len(),
                max: limits.max_image_bytes,
            });
        }

        Ok(Self {
            image,
            symbol,
            timeframe,
            trade_type,
            notes: truncate_chars(notes.trim(), limits.max_notes_chars),
        })
    }

    pub fn image(&self) -> &[u8] {
        &self.image
    }

    pub fn symbol(&self) -> Symbol {
        self.symbol
    }

    pub fn timeframe(&self) -> Timeframe {
        self.timeframe
    }

    pub fn trade_type(&self) -> TradeType {
        self.trade_type
    }

    pub fn notes(&self) -> &str {
        &self.notes
    }
}

/// Identifier attached to one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(String);

impl RequestId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Indicator {
    Rsi,
    Macd,
    Ma,
    Sma,
    Ema,
}

impl Indicator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Indicator::Rsi => "RSI",
            Indicator::Macd => "MACD",
            Indicator::Ma => "MA",
            Indicator::Sma => "SMA",
            Indicator::Ema => "EMA",
        }
    }

    /// Maps a moving-average tag as written on a chart.
    pub fn moving_average(tag: &str) -> Option<Self> {
        match tag.to_ascii_uppercase().as_str() {
            "MA" => Some(Indicator::Ma),
            "SMA" => Some(Indicator::Sma),
            "EMA" => Some(Indicator::Ema),
            _ => None,
        }
    }
}

impl fmt::Display for Indicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured data recovered from the chart text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OcrResult {
    pub raw_text: String,
    pub price_levels: Vec<f64>,
    pub indicators: BTreeMap<Indicator, f64>,
    pub has_data: bool,
}

impl OcrResult {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Text straight from the engine, before parsing. Not truncated yet.
    pub fn unparsed(raw_text: String) -> Self {
        Self {
            raw_text,
            ..Self::default()
        }
    }

    pub fn new(raw_text: &str, price_levels: Vec<f64>, indicators: BTreeMap<Indicator, f64>) -> Self {
        let has_data = !price_levels.is_empty() || !indicators.is_empty();
        Self {
            raw_text: truncate_chars(raw_text, RAW_TEXT_LIMIT),
            price_levels,
            indicators,
            has_data,
        }
    }
}

/// Pipeline stages, in execution order, plus the two terminal states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Preprocessing,
    Extracting,
    Parsing,
    Prompting,
    Invoking,
    Validating,
    Done,
    Fallback,
}

impl Stage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Done | Stage::Fallback)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Preprocessing => "preprocessing",
            Stage::Extracting => "extracting",
            Stage::Parsing => "parsing",
            Stage::Prompting => "prompting",
            Stage::Invoking => "invoking",
            Stage::Validating => "validating",
            Stage::Done => "done",
            Stage::Fallback => "fallback",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Action {
    #[serde(alias = "buy", alias = "Buy")]
    Buy,
    #[serde(alias = "sell", alias = "Sell")]
    Sell,
    #[serde(alias = "hold", alias = "Hold")]
    Hold,
}

/// A reply field kept exactly as the reasoning service sent it. Readers
/// interpret it leniently without changing what gets serialized back out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReplyValue(Value);

impl ReplyValue {
    pub fn null() -> Self {
        Self(Value::Null)
    }

    pub fn raw(&self) -> &Value {
        &self.0
    }

    /// Numbers as-is; numeric strings such as `"1.0850"`, `"72%"` or
    /// `"65,500"` parsed. Anything else is `None`.
    pub fn as_number(&self) -> Option<f64> {
        value_to_number(&self.0)
    }

    /// Strings as-is, scalars printed, arrays joined with `", "`.
    pub fn to_text(&self) -> String {
        value_to_text(&self.0)
    }
}

impl From<Value> for ReplyValue {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

impl From<&str> for ReplyValue {
    fn from(value: &str) -> Self {
        Self(Value::from(value))
    }
}

impl From<String> for ReplyValue {
    fn from(value: String) -> Self {
        Self(Value::from(value))
    }
}

impl From<f64> for ReplyValue {
    fn from(value: f64) -> Self {
        Self(Value::from(value))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VisionSummary {
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub trend: Option<ReplyValue>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub support: Option<ReplyValue>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub resistance: Option<ReplyValue>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub rsi: Option<ReplyValue>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub macd: Option<ReplyValue>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Only `action` is interpreted; every other field round-trips untouched,
/// including `null`s and keys this type does not name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub action: Action,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub entry: Option<ReplyValue>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub stop_loss: Option<ReplyValue>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub take_profit_1: Option<ReplyValue>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub take_profit_2: Option<ReplyValue>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub probability: Option<ReplyValue>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub risk_reward: Option<ReplyValue>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub reason: Option<ReplyValue>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub invalidation_condition: Option<ReplyValue>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Decision {
    pub fn entry_price(&self) -> Option<f64> {
        self.entry.as_ref().and_then(ReplyValue::as_number)
    }

    pub fn stop_loss_price(&self) -> Option<f64> {
        self.stop_loss.as_ref().and_then(ReplyValue::as_number)
    }

    /// Confidence in percent, when the reply gave a readable one.
    pub fn probability_pct(&self) -> Option<f64> {
        self.probability.as_ref().and_then(ReplyValue::as_number)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub level: Option<ReplyValue>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub recommended_position: Option<ReplyValue>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub timeframe_suitability: Option<ReplyValue>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Token accounting reported by the reasoning service, passed through as sent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_tokens: Option<u64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Usage {
    pub fn new(prompt_tokens: u64, completion_tokens: u64) -> Self {
        Self {
            prompt_tokens: Some(prompt_tokens),
            completion_tokens: Some(completion_tokens),
            total_tokens: Some(prompt_tokens + completion_tokens),
            extra: Map::new(),
        }
    }
}

/// Diagnostic block present only on fallback results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub kind: String,
    pub message: String,
    pub request_id: RequestId,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestMetadata {
    pub request_id: RequestId,
    pub processing_ms: u64,
    pub timestamp: DateTime<Utc>,
    pub final_stage: Stage,
    pub ocr_has_data: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub vision_summary: VisionSummary,
    pub decision: Decision,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_assessment: Option<RiskAssessment>,
    #[serde(default)]
    pub disclaimer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<RequestMetadata>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AnalysisResult {
    pub fn is_fallback(&self) -> bool {
        self.error.is_some()
    }
}

// A present key stays `Some`, even when its value is `null`.
fn present<'de, D>(deserializer: D) -> Result<Option<ReplyValue>, D::Error>
where
    D: Deserializer<'de>,
{
    ReplyValue::deserialize(deserializer).map(Some)
}

fn value_to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Array(items) => items
            .iter()
            .map(value_to_text)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(", "),
        Value::Object(_) => value.to_string(),
    }
}

fn value_to_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s
            .trim()
            .trim_end_matches('%')
            .replace(',', "")
            .trim()
            .parse::<f64>()
            .ok(),
        _ => None,
    }
}

#[derive(Debug, Error)]
pub enum RequestError {
    #[error("image is empty")]
    EmptyImage,
    #[error("image is {size} bytes, limit is {max}")]
    ImageTooLarge { size: usize, max: usize },
    #[error("unsupported symbol: {0}")]
    UnsupportedSymbol(String),
    #[error("unsupported timeframe: {0}")]
    UnsupportedTimeframe(String),
    #[error("unsupported trade type: {0}")]
    UnsupportedTradeType(String),
}

#[derive(Debug, Error)]
pub enum PreprocessError {
    #[error("image I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("preprocessing task failed: {0}")]
    Task(String),
}

#[derive(Debug, Error)]
pub enum OcrError {
    #[error("OCR engine unavailable: {0}")]
    EngineUnavailable(String),
    #[error("invalid OCR configuration: {0}")]
    InvalidConfig(String),
    #[error("OCR session used before configuration")]
    NotConfigured,
    #[error("OCR I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("OCR image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("recognition failed: {0}")]
    Recognition(String),
    #[error("recognition timed out after {0}s")]
    Timeout(u64),
}

#[derive(Debug, Error)]
pub enum AiServiceError {
    #[error("reasoning service API key is not configured")]
    MissingApiKey,
    #[error("reasoning service timed out after {secs}s")]
    Timeout { secs: u64 },
    #[error("reasoning service rejected credentials [{status}]: {message}")]
    Auth { status: u16, message: String },
    #[error("reasoning service responded [{status}]: {message}")]
    Status { status: u16, message: String },
    #[error("reasoning service transport error: {0}")]
    Transport(String),
    #[error("malformed reasoning service response: {0}")]
    MalformedResponse(String),
    #[error("reasoning service returned an empty reply")]
    EmptyReply,
}

impl AiServiceError {
    pub fn kind(&self) -> &'static str {
        match self {
            AiServiceError::MissingApiKey => "ai_config",
            AiServiceError::Timeout { .. } => "ai_timeout",
            AiServiceError::Auth { .. } => "ai_auth",
            AiServiceError::Status { .. } => "ai_status",
            AiServiceError::Transport(_) => "ai_transport",
            AiServiceError::MalformedResponse(_) | AiServiceError::EmptyReply => "ai_malformed",
        }
    }
}

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("reply is not valid JSON: {0}")]
    InvalidJson(String),
    #[error("reply is not a JSON object")]
    NotAnObject,
    #[error("reply is missing required field `{0}`")]
    MissingField(&'static str),
    #[error("reply does not match the expected schema: {0}")]
    Schema(String),
}

/// Failures that reach the orchestrator and force the fallback result.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Ai(#[from] AiServiceError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl PipelineError {
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::Ai(e) => e.kind(),
            PipelineError::Validation(_) => "validation",
        }
    }

    /// Stage the failure surfaced in.
    pub fn stage(&self) -> Stage {
        match self {
            PipelineError::Ai(_) => Stage::Invoking,
            PipelineError::Validation(_) => Stage::Validating,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid config value: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits() -> LimitsConfig {
        LimitsConfig {
            max_image_bytes: 16,
            max_notes_chars: 5,
        }
    }

    #[test]
    fn request_rejects_empty_and_oversized_images() {
        let empty = AnalysisRequest::new(vec![], Symbol::Eurusd, Timeframe::H1, TradeType::Swing, "", &limits());
        assert!(matches!(empty, Err(RequestError::EmptyImage)));

        let big = AnalysisRequest::new(vec![0; 17], Symbol::Eurusd, Timeframe::H1, TradeType::Swing, "", &limits());
        assert!(matches!(big, Err(RequestError::ImageTooLarge { size: 17, max: 16 })));
    }

    #[test]
    fn request_truncates_notes_on_char_boundaries() {
        let req = AnalysisRequest::new(vec![1], Symbol::Xauusd, Timeframe::D1, TradeType::Intraday, "ééééééé", &limits())
            .unwrap();
        assert_eq!(req.notes(), "ééééé");
    }

    #[test]
    fn enums_parse_case_insensitively() {
        assert_eq!("eur/usd".parse::<Symbol>().unwrap(), Symbol::Eurusd);
        assert_eq!("h4".parse::<Timeframe>().unwrap(), Timeframe::H4);
        assert_eq!("Swing".parse::<TradeType>().unwrap(), TradeType::Swing);
        assert!(matches!("DOGEUSD".parse::<Symbol>(), Err(RequestError::UnsupportedSymbol(_))));
    }

    #[test]
    fn ocr_result_tracks_has_data() {
        let empty = OcrResult::new("text", vec![], BTreeMap::new());
        assert!(!empty.has_data);

        let mut indicators = BTreeMap::new();
        indicators.insert(Indicator::Rsi, 55.0);
        let with_indicator = OcrResult::new("text", vec![], indicators);
        assert!(with_indicator.has_data);
    }

    #[test]
    fn decision_reads_loose_values_without_rewriting_them() {
        let sent = serde_json::json!({
            "action": "buy",
            "entry": "1.0850",
            "stop_loss": 1.08,
            "take_profit_1": "1.0950-1.0960",
            "probability": "72%",
            "risk_reward": 2.0,
            "reason": null,
            "confidence_basis": "3 touches"
        });
        let decision: Decision = serde_json::from_value(sent.clone()).unwrap();

        assert_eq!(decision.action, Action::Buy);
        assert_eq!(decision.entry_price(), Some(1.085));
        assert_eq!(decision.stop_loss_price(), Some(1.08));
        assert_eq!(decision.probability_pct(), Some(72.0));
        assert_eq!(decision.take_profit_1.as_ref().unwrap().as_number(), None);
        assert_eq!(decision.take_profit_1.as_ref().unwrap().to_text(), "1.0950-1.0960");
        assert_eq!(decision.reason, Some(ReplyValue::null()));
        assert_eq!(decision.take_profit_2, None);

        let mut expected = sent;
        expected["action"] = serde_json::json!("BUY");
        assert_eq!(serde_json::to_value(&decision).unwrap(), expected);
    }

    #[test]
    fn usage_keeps_provider_specific_fields() {
        let sent = serde_json::json!({
            "prompt_tokens": 812,
            "completion_tokens": 240,
            "total_tokens": 1052,
            "prompt_tokens_details": { "cached_tokens": 0 }
        });
        let usage: Usage = serde_json::from_value(sent.clone()).unwrap();

        assert_eq!(usage.total_tokens, Some(1052));
        assert_eq!(serde_json::to_value(&usage).unwrap(), sent);
        assert_eq!(Usage::new(10, 5).total_tokens, Some(15));
    }
}
