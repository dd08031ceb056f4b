// Signal generation: indicator values in, {action, confidence} out.
//
// The scoring rule sits behind `ScoringPolicy` so the risk gate and the trade
// lifecycle never depend on how confidence is produced.
pub mod scoring;

pub use scoring::{MajorityVoteScoring, Score, ScoringPolicy, Vote, VoteScoring};

use chrono::{DateTime, Utc};
use shared::models::{Candle, IndicatorSet, Interval, Signal};

use crate::indicators::IndicatorEngine;

pub struct SignalGenerator {
    indicators: IndicatorEngine,
    policy: Box<dyn ScoringPolicy>,
}

impl SignalGenerator {
    pub fn new(policy: Box<dyn ScoringPolicy>) -> Self {
        SignalGenerator { indicators: IndicatorEngine::new(), policy }
    }

    pub fn policy_name(&self) -> &str {
        self.policy.name()
    }

    pub fn indicator_engine(&self) -> &IndicatorEngine {
        &self.indicators
    }

    /// Scores the window ending at the last candle. `None` for an empty window.
    pub fn generate(&self, symbol: &str, interval: Interval, candles: &[Candle]) -> Option<Signal> {
        let last = candles.last()?;
        let indicators = self.indicators.compute(candles);
        Some(self.from_indicators(symbol, interval, last.close, indicators, last.timestamp))
    }

    pub fn from_indicators(
        &self,
        symbol: &str,
        interval: Interval,
        price: f64,
        indicators: IndicatorSet,
        timestamp: DateTime<Utc>,
    ) -> Signal {
        let score = self.policy.score(price, &indicators);
        tracing::debug!(
            symbol,
            %interval,
            policy = self.policy.name(),
            action = %score.action,
            confidence = score.confidence,
            rsi = indicators.rsi,
            macd = indicators.macd,
            percent_b = indicators.percent_b,
            ema = indicators.ema,
            "Signal scored"
        );
        Signal {
            symbol: symbol.to_string(),
            interval,
            action: score.action,
            confidence: score.confidence,
            price,
            indicators,
            timestamp,
        }
    }
}

impl Default for SignalGenerator {
    fn default() -> Self {
        Self::new(Box::new(VoteScoring))
    }
}
