// Parser module: turns raw OCR text into price levels and indicator readings.

pub mod chart_parser;
pub mod price_rules;

pub use chart_parser::{ChartTextParser, Parser, extract_indicators};
pub use price_rules::{PriceRule, extract_prices, normalize_number, round_price};
