// Moving Average Convergence Divergence (MACD line only)
use super::ema::ema_value;
use super::IndicatorCalculator;

pub const FAST_PERIOD: usize = 12;
pub const SLOW_PERIOD: usize = 26;

pub struct Macd {
    name: String,
    fast: usize,
    slow: usize,
}

impl Macd {
    pub fn new(fast: usize, slow: usize) -> Self {
        Self {
            name: format!("MACD({},{})", fast, slow),
            fast,
            slow,
        }
    }
}

impl IndicatorCalculator for Macd {
    fn name(&self) -> &str {
        &self.name
    }

    fn min_periods(&self) -> usize {
        self.fast.max(self.slow)
    }

    /// Fast EMA minus slow EMA; 0 until the slow EMA has enough data.
    fn calculate(&self, closes: &[f64]) -> f64 {
        match (ema_value(closes, self.fast), ema_value(closes, self.slow)) {
            (Some(fast), Some(slow)) => fast - slow,
            _ => 0.0,
        }
    }
}
