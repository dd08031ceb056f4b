// Technical indicators module.
//
// Every calculator is a pure function of the closes it is given. The same
// `IndicatorEngine` serves the live cycle and the backtest replay, so the two
// can never drift apart.
pub mod bollinger;
pub mod ema;
pub mod macd;
pub mod rsi;
pub mod sma;

pub use bollinger::BollingerPercentB;
pub use ema::Ema;
pub use macd::Macd;
pub use rsi::Rsi;

use shared::models::{Candle, IndicatorSet};

// Common trait for all indicators
pub trait IndicatorCalculator: Send + Sync {
    fn name(&self) -> &str;
    /// Closes needed before the value stops being the neutral fallback.
    fn min_periods(&self) -> usize;
    /// Latest value over `closes` (ascending). Short windows yield the
    /// indicator's documented neutral value instead of an error.
    fn calculate(&self, closes: &[f64]) -> f64;
}

pub fn closes(candles: &[Candle]) -> Vec<f64> {
    candles.iter().map(|c| c.close).collect()
}

/// RSI(14), MACD(12, 26), %B(20, 2) and EMA(20) over one candle window.
pub struct IndicatorEngine {
    rsi: Rsi,
    macd: Macd,
    percent_b: BollingerPercentB,
    ema: Ema,
}

impl IndicatorEngine {
    pub fn new() -> Self {
        IndicatorEngine {
            rsi: Rsi::new(rsi::DEFAULT_PERIOD),
            macd: Macd::new(macd::FAST_PERIOD, macd::SLOW_PERIOD),
            percent_b: BollingerPercentB::new(bollinger::DEFAULT_PERIOD, bollinger::DEFAULT_WIDTH),
            ema: Ema::new(ema::DEFAULT_PERIOD),
        }
    }

    /// Longest lookback of the four indicators.
    pub fn warmup(&self) -> usize {
        self.calculators().iter().map(|c| c.min_periods()).max().unwrap_or(0)
    }

    pub fn compute(&self, candles: &[Candle]) -> IndicatorSet {
        self.compute_closes(&closes(candles))
    }

    pub fn compute_closes(&self, closes: &[f64]) -> IndicatorSet {
        for calculator in self.calculators() {
            if closes.len() < calculator.min_periods() {
                tracing::trace!(
                    indicator = calculator.name(),
                    available = closes.len(),
                    required = calculator.min_periods(),
                    "Insufficient data, using neutral value"
                );
            }
        }
        IndicatorSet {
            rsi: self.rsi.calculate(closes),
            macd: self.macd.calculate(closes),
            percent_b: self.percent_b.calculate(closes),
            ema: self.ema.calculate(closes),
        }
    }

    fn calculators(&self) -> [&dyn IndicatorCalculator; 4] {
        [&self.rsi, &self.macd, &self.percent_b, &self.ema]
    }
}

impl Default for IndicatorEngine {
    fn default() -> Self {
        Self::new()
    }
}
