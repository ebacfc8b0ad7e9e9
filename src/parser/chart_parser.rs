// Chart-specific OCR text parsing
use crate::model::{Indicator, OcrResult};
use crate::parser::price_rules::{PriceRule, extract_prices, normalize_number};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use tracing::debug;

pub trait Parser {
    fn parse(&self, raw_text: &str) -> OcrResult;
}

// --- Compiled regexes ---

static RSI_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:RSI|Relative\s+Strength\s+Index)\s*(?:\(\s*\d+\s*\))?\s*[:=]?\s*(-?\d+(?:[.,]\d+)?)").unwrap()
});

static MACD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bMACD\s*(?:\(\s*\d+\s*(?:,\s*\d+\s*)*\))?\s*[:=]?\s*([-+]?\d+(?:\.\d+)?)").unwrap()
});

static MOVING_AVERAGE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(SMA|EMA|MA)\s*(?:\(\s*\d+\s*\)|\d+)?\s*[:=]\s*(\d{1,3}(?:,\d{3})+(?:\.\d+)?|\d+(?:[.,]\d+)?)").unwrap()
});

pub struct ChartTextParser {
    rules: Vec<PriceRule>,
}

impl ChartTextParser {
    pub fn new() -> Self {
        Self {
            rules: PriceRule::defaults(),
        }
    }

    pub fn with_rules(rules: Vec<PriceRule>) -> Self {
        Self { rules }
    }
}

impl Default for ChartTextParser {
    fn default() -> Self {
        Self::new()
    }
}

impl Parser for ChartTextParser {
    fn parse(&self, raw_text: &str) -> OcrResult {
        if raw_text.trim().is_empty() {
            return OcrResult::empty();
        }

        let price_levels = extract_prices(raw_text, &self.rules);
        let indicators = extract_indicators(raw_text);
        debug!(
            "Parsed {} price levels and {} indicators",
            price_levels.len(),
            indicators.len()
        );

        OcrResult::new(raw_text, price_levels, indicators)
    }
}

/// RSI: first value within [0, 100]. MACD: first parseable signed value.
/// MA/SMA/EMA: every occurrence, later ones overwrite earlier ones per tag.
pub fn extract_indicators(text: &str) -> BTreeMap<Indicator, f64> {
    let mut indicators = BTreeMap::new();

    let rsi = RSI_RE
        .captures_iter(text)
        .filter_map(|caps| parse_signed(&caps[1]))
        .find(|value| (0.0..=100.0).contains(value));
    match rsi {
        Some(value) => {
            indicators.insert(Indicator::Rsi, value);
        }
        None if RSI_RE.is_match(text) => debug!("RSI label found but no value within 0..=100"),
        None => {}
    }

    if let Some(value) = MACD_RE.captures_iter(text).find_map(|caps| parse_signed(&caps[1])) {
        indicators.insert(Indicator::Macd, value);
    }

    for caps in MOVING_AVERAGE_RE.captures_iter(text) {
        let (Some(tag), Some(value)) = (Indicator::moving_average(&caps[1]), normalize_number(&caps[2])) else {
            continue;
        };
        indicators.insert(tag, value);
    }

    indicators
}

fn parse_signed(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    let (negative, body) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    let value = body.replace(',', ".").parse::<f64>().ok()?;
    Some(if negative { -value } else { value })
}
