// Relative Strength Index (RSI) indicator implementation
use super::IndicatorCalculator;

pub const DEFAULT_PERIOD: usize = 14;
pub const NEUTRAL: f64 = 50.0;

pub struct Rsi {
    name: String,
    period: usize,
}

impl Rsi {
    pub fn new(period: usize) -> Self {
        Self {
            name: format!("RSI({})", period),
            period,
        }
    }
}

impl IndicatorCalculator for Rsi {
    fn name(&self) -> &str {
        &self.name
    }

    fn min_periods(&self) -> usize {
        self.period
    }

    /// Simple-average RSI over the trailing `period` price changes (or all
    /// available changes when only `period` closes exist).
    fn calculate(&self, closes: &[f64]) -> f64 {
        if self.period == 0 || closes.len() < self.period {
            return NEUTRAL;
        }

        let window = &closes[closes.len().saturating_sub(self.period + 1)..];
        let changes = (window.len() - 1) as f64;

        let mut gains = 0.0;
        let mut losses = 0.0;
        for pair in window.windows(2) {
            let change = pair[1] - pair[0];
            if change > 0.0 {
                gains += change;
            } else {
                losses -= change; // losses are positive values
            }
        }

        let avg_gain = gains / changes;
        let avg_loss = losses / changes;

        if avg_loss == 0.0 {
            return 100.0;
        }
        let rs = avg_gain / avg_loss;
        (100.0 - (100.0 / (1.0 + rs))).clamp(0.0, 100.0)
    }
}
