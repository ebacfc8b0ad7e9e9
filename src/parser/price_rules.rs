// Price-level extraction rules and the shared normalization stage
use crate::model::MAX_PRICE_LEVELS;
use crate::utils::round_to;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

// --- Compiled regexes ---

static PLAIN_DECIMAL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b\d{1,6}\.\d{2,5}\b").unwrap()
});

static GROUPED_DECIMAL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b\d{1,3}(?:[,.]\d{3})+[.,]\d{2,5}\b").unwrap()
});

static CURRENCY_DECIMAL_RE: Lazy<Regex> = Lazy::new(|| {
    // $, euro sign (U+20AC), pound (U+00A3), yen (U+00A5)
    Regex::new(r"[$\x{20AC}\x{00A3}\x{00A5}]\s?(?:\d{1,3}(?:[,.]\d{3})+|\d+)(?:[.,]\d{1,5})?").unwrap()
});

/// One independent way of spotting price candidates in OCR text.
#[derive(Debug, Clone)]
pub struct PriceRule {
    pub name: &'static str,
    pattern: Regex,
}

impl PriceRule {
    pub fn new(name: &'static str, pattern: Regex) -> Self {
        Self { name, pattern }
    }

    /// `1.08500`, `2345.67`
    pub fn plain_decimal() -> Self {
        Self::new("plain_decimal", PLAIN_DECIMAL_RE.clone())
    }

    /// `1,234.56`, `1.234,56`
    pub fn grouped_decimal() -> Self {
        Self::new("grouped_decimal", GROUPED_DECIMAL_RE.clone())
    }

    /// `$65,500.00`, `€ 1.0850`
    pub fn currency_decimal() -> Self {
        Self::new("currency_decimal", CURRENCY_DECIMAL_RE.clone())
    }

    pub fn defaults() -> Vec<Self> {
        vec![Self::plain_decimal(), Self::grouped_decimal(), Self::currency_decimal()]
    }

    pub fn candidates<'t>(&self, text: &'t str) -> impl Iterator<Item = &'t str> {
        self.pattern.find_iter(text).map(|m| m.as_str())
    }
}

/// Runs every rule, then normalizes, rounds, dedups, sorts ascending and caps
/// the combined candidates. Rounding can push a huge value past `f64::MAX`,
/// so the finite check comes after it.
pub fn extract_prices(text: &str, rules: &[PriceRule]) -> Vec<f64> {
    let mut prices: Vec<f64> = rules
        .iter()
        .flat_map(|rule| {
            rule.candidates(text).filter_map(move |candidate| match normalize_number(candidate).map(round_price) {
                Some(value) if value.is_finite() && value > 0.0 => Some(value),
                _ => {
                    debug!("Discarding {} candidate {:?}", rule.name, candidate);
                    None
                }
            })
        })
        .collect();

    prices.sort_by(|a, b| a.total_cmp(b));
    prices.dedup();
    prices.truncate(MAX_PRICE_LEVELS);
    prices
}

/// Forex quotes keep 5 places, mid-range instruments 4, large ones 2.
pub fn round_price(value: f64) -> f64 {
    if value < 10.0 {
        round_to(value, 5)
    } else if value < 1000.0 {
        round_to(value, 4)
    } else {
        round_to(value, 2)
    }
}

/// Strips currency symbols, whitespace and grouping separators and parses
/// what is left with `.` as the decimal separator.
///
/// When both `.` and `,` appear, the last one is the decimal separator. A
/// separator repeated more than once is grouping. A lone `,` followed by
/// exactly three digits is grouping; any other lone separator is decimal.
pub fn normalize_number(candidate: &str) -> Option<f64> {
    let digits: String = candidate
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == ',')
        .collect();
    if !digits.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }

    let last_dot = digits.rfind('.');
    let last_comma = digits.rfind(',');
    let decimal_at = match (last_dot, last_comma) {
        (Some(dot), Some(comma)) => Some(dot.max(comma)),
        (Some(dot), None) if digits.matches('.').count() == 1 => Some(dot),
        (None, Some(comma)) if digits.matches(',').count() == 1 && digits.len() - comma - 1 != 3 => Some(comma),
        _ => None,
    };

    let cleaned = match decimal_at {
        Some(at) => {
            let integer: String = digits[..at].chars().filter(char::is_ascii_digit).collect();
            let fraction = &digits[at + 1..];
            format!("{}.{}", if integer.is_empty() { "0" } else { integer.as_str() }, fraction)
        }
        None => digits.chars().filter(char::is_ascii_digit).collect(),
    };

    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}
