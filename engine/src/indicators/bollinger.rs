// Bollinger %B: where the latest close sits inside the band, on a 0..100 scale.
use super::sma::{sma_value, std_dev};
use super::IndicatorCalculator;

pub const DEFAULT_PERIOD: usize = 20;
pub const DEFAULT_WIDTH: f64 = 2.0;
pub const NEUTRAL: f64 = 50.0;

pub struct BollingerPercentB {
    name: String,
    period: usize,
    width: f64,
}

impl BollingerPercentB {
    pub fn new(period: usize, width: f64) -> Self {
        Self {
            name: format!("%B({},{})", period, width),
            period,
            width,
        }
    }
}

impl IndicatorCalculator for BollingerPercentB {
    fn name(&self) -> &str {
        &self.name
    }

    fn min_periods(&self) -> usize {
        self.period
    }

    /// Not clamped: a close outside the band reads below 0 or above 100.
    fn calculate(&self, closes: &[f64]) -> f64 {
        let Some(middle) = sma_value(closes, self.period) else {
            return NEUTRAL;
        };
        let Some(deviation) = std_dev(closes, self.period, middle) else {
            return NEUTRAL;
        };
        let upper = middle + self.width * deviation;
        let lower = middle - self.width * deviation;
        if upper == lower {
            return NEUTRAL;
        }
        let price = closes[closes.len() - 1];
        (price - lower) / (upper - lower) * 100.0
    }
}
