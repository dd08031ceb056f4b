// Exponential Moving Average (EMA) indicator implementation
use super::IndicatorCalculator;

pub const DEFAULT_PERIOD: usize = 20;

pub struct Ema {
    name: String,
    period: usize,
}

impl Ema {
    pub fn new(period: usize) -> Self {
        Self {
            name: format!("EMA({})", period),
            period,
        }
    }
}

/// EMA of `closes` after the last element, seeded with the simple average of
/// the first `period` closes. `None` when fewer than `period` closes exist.
pub fn ema_value(closes: &[f64], period: usize) -> Option<f64> {
    if period == 0 || closes.len() < period {
        return None;
    }
    let multiplier = 2.0 / (period as f64 + 1.0);
    let seed = closes[..period].iter().sum::<f64>() / period as f64;
    Some(
        closes[period..]
            .iter()
            .fold(seed, |previous, close| (close - previous) * multiplier + previous),
    )
}

impl IndicatorCalculator for Ema {
    fn name(&self) -> &str {
        &self.name
    }

    fn min_periods(&self) -> usize {
        self.period
    }

    fn calculate(&self, closes: &[f64]) -> f64 {
        ema_value(closes, self.period).unwrap_or(0.0)
    }
}
