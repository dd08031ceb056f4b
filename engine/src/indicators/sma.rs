// Simple moving average and population standard deviation over a trailing window.

/// Mean of the last `period` closes. `None` when fewer than `period` closes exist.
pub fn sma_value(closes: &[f64], period: usize) -> Option<f64> {
    if period == 0 || closes.len() < period {
        return None;
    }
    let window = &closes[closes.len() - period..];
    Some(window.iter().sum::<f64>() / period as f64)
}

/// Population standard deviation of the last `period` closes around `mean`.
pub fn std_dev(closes: &[f64], period: usize, mean: f64) -> Option<f64> {
    if period == 0 || closes.len() < period {
        return None;
    }
    let window = &closes[closes.len() - period..];
    let variance = window.iter().map(|c| (c - mean).powi(2)).sum::<f64>() / period as f64;
    Some(variance.sqrt())
}
