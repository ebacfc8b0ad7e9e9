// Instruction document for the reasoning service
use crate::model::{DISCLAIMER, OcrResult, Symbol, Timeframe, TradeType};

/// System role sent alongside every instruction document.
pub const SYSTEM_PROMPT: &str = "You are a professional trading analyst specialising in technical \
analysis of forex, commodity and crypto charts. You are disciplined and risk-averse: when the evidence \
is weak you recommend HOLD. You always answer with a single valid JSON object and nothing else.";

/// Below this confidence (percent) the decision must be HOLD.
pub const MIN_CONFIDENCE_PCT: u8 = 70;

/// Minimum reward per unit of risk for a BUY or SELL.
pub const MIN_RISK_REWARD: f64 = 1.5;

const OUTPUT_SCHEMA: &str = r#"{
  "vision_summary": {
    "trend": "bullish | bearish | sideways, with a one-sentence justification",
    "support": "key support levels",
    "resistance": "key resistance levels",
    "rsi": "RSI reading and interpretation, or \"not visible\"",
    "macd": "MACD reading and interpretation, or \"not visible\""
  },
  "decision": {
    "action": "BUY | SELL | HOLD",
    "entry": number or null,
    "stop_loss": number or null,
    "take_profit_1": number or null,
    "take_profit_2": number or null,
    "probability": number from 0 to 100,
    "risk_reward": "1:X",
    "reason": "concise reasoning ending with the disclaimer",
    "invalidation_condition": "what would prove this analysis wrong"
  },
  "risk_assessment": {
    "level": "low | medium | high",
    "recommended_position": "suggested position size, or \"none\"",
    "timeframe_suitability": "how well the setup fits the requested timeframe"
  }
}"#;

pub struct PromptBuilder;

impl PromptBuilder {
    /// Renders the user-role document. Same inputs always give the same text.
    pub fn build(
        ocr: &OcrResult,
        symbol: Symbol,
        timeframe: Timeframe,
        trade_type: TradeType,
        notes: &str,
    ) -> String {
        let sections = [
            "CHART ANALYSIS REQUEST".to_string(),
            Self::parameters_section(symbol, timeframe, trade_type, notes),
            Self::data_section(ocr),
            Self::requirements_section(timeframe, trade_type),
            Self::rules_section(),
            Self::output_section(),
        ];
        sections.join("\n\n")
    }

    fn parameters_section(symbol: Symbol, timeframe: Timeframe, trade_type: TradeType, notes: &str) -> String {
        let notes = if notes.trim().is_empty() { "none" } else { notes.trim() };
        format!(
            "Trading parameters:\n- Symbol: {}\n- Timeframe: {}\n- Trade type: {}\n- Trader notes: {}",
            symbol, timeframe, trade_type, notes
        )
    }

    fn data_section(ocr: &OcrResult) -> String {
        if !ocr.has_data {
            return "Data extracted from the chart (OCR):\n\
                No data extracted from the chart image. Base the analysis on the trading parameters only, \
                say in vision_summary that chart data was unavailable, and treat the data as insufficient."
                .to_string();
        }

        let prices = if ocr.price_levels.is_empty() {
            "none".to_string()
        } else {
            ocr.price_levels
                .iter()
                .map(|p| p.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        };
        let indicators = if ocr.indicators.is_empty() {
            "none".to_string()
        } else {
            ocr.indicators
                .iter()
                .map(|(name, value)| format!("{} = {}", name, value))
                .collect::<Vec<_>>()
                .join(", ")
        };

        format!(
            "Data extracted from the chart (OCR):\n- Price levels (ascending): {}\n- Indicators: {}",
            prices, indicators
        )
    }

    fn requirements_section(timeframe: Timeframe, trade_type: TradeType) -> String {
        format!(
            "Analysis requirements:\n\
            1. Identify the prevailing trend (bullish, bearish or sideways).\n\
            2. Identify key support and resistance levels, using the extracted price levels where available.\n\
            3. Interpret RSI and MACD if they are present.\n\
            4. Decide BUY, SELL or HOLD for a {} trade on the {} timeframe.",
            trade_type, timeframe
        )
    }

    fn rules_section() -> String {
        format!(
            "Decision rules:\n\
            - The action MUST be HOLD when your confidence is below {}% or the data is insufficient.\n\
            - Only recommend BUY or SELL when the risk/reward is at least 1:{}.\n\
            - For HOLD set entry, stop_loss, take_profit_1 and take_profit_2 to null.\n\
            - probability is your confidence from 0 to 100.",
            MIN_CONFIDENCE_PCT, MIN_RISK_REWARD
        )
    }

    fn output_section() -> String {
        format!(
            "Output format:\n\
            Respond with exactly one JSON object matching this schema. Do not add any text, markdown or \
            commentary before or after it.\n{}\n\n\
            End the \"reason\" field with this disclaimer: \"{}\"",
            OUTPUT_SCHEMA, DISCLAIMER
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Indicator;
    use std::collections::BTreeMap;

    fn sample_ocr() -> OcrResult {
        let mut indicators = BTreeMap::new();
        indicators.insert(Indicator::Ema, 1.205);
        indicators.insert(Indicator::Rsi, 72.5);
        OcrResult::new("raw", vec![1.205, 1234.56], indicators)
    }

    #[test]
    fn embeds_data_and_parameters() {
        let doc = PromptBuilder::build(&sample_ocr(), Symbol::Eurusd, Timeframe::H4, TradeType::Swing, "watch NFP");

        assert!(doc.contains("- Price levels (ascending): 1.205, 1234.56"));
        assert!(doc.contains("- Indicators: RSI = 72.5, EMA = 1.205"));
        assert!(doc.contains("- Symbol: EURUSD"));
        assert!(doc.contains("- Timeframe: H4"));
        assert!(doc.contains("- Trade type: swing"));
        assert!(doc.contains("- Trader notes: watch NFP"));
        assert!(!doc.contains("No data extracted"));
    }

    #[test]
    fn states_thresholds_schema_and_disclaimer() {
        let doc = PromptBuilder::build(&sample_ocr(), Symbol::Btcusd, Timeframe::D1, TradeType::Position, "");

        assert!(doc.contains("below 70%"));
        assert!(doc.contains("at least 1:1.5"));
        assert!(doc.contains("\"vision_summary\""));
        assert!(doc.contains("\"decision\""));
        assert!(doc.contains("\"risk_assessment\""));
        assert!(doc.contains(DISCLAIMER));
        assert!(doc.contains("- Trader notes: none"));
    }

    #[test]
    fn missing_data_is_called_out() {
        let doc = PromptBuilder::build(&OcrResult::empty(), Symbol::Xauusd, Timeframe::M15, TradeType::Scalping, "");
        assert!(doc.contains("No data extracted from the chart image"));
        assert!(!doc.contains("Price levels (ascending)"));
    }

    #[test]
    fn rendering_is_deterministic() {
        let a = PromptBuilder::build(&sample_ocr(), Symbol::Gbpusd, Timeframe::H1, TradeType::Intraday, "n");
        let b = PromptBuilder::build(&sample_ocr(), Symbol::Gbpusd, Timeframe::H1, TradeType::Intraday, "n");
        assert_eq!(a, b);
    }
}
