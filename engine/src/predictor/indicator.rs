use async_trait::async_trait;
use shared::models::{Interval, Signal};
use std::sync::Arc;

use super::Predictor;
use crate::data::MarketDataSource;
use crate::error::{EngineError, EngineResult};
use crate::signal::SignalGenerator;

/// Fetches the latest candles and scores them in-process.
pub struct IndicatorPredictor {
    market: Arc<dyn MarketDataSource>,
    generator: SignalGenerator,
    candle_limit: usize,
}

impl IndicatorPredictor {
    pub fn new(market: Arc<dyn MarketDataSource>, generator: SignalGenerator, candle_limit: usize) -> Self {
        IndicatorPredictor { market, generator, candle_limit }
    }
}

#[async_trait]
impl Predictor for IndicatorPredictor {
    fn name(&self) -> &str {
        "indicators"
    }

    async fn predict(&self, symbol: &str, interval: Interval) -> EngineResult<Signal> {
        let candles = self.market.fetch_candles(symbol, interval, self.candle_limit).await?;
        self.generator
            .generate(symbol, interval, &candles)
            .ok_or_else(|| EngineError::MarketDataError(format!("No candles returned for {} {}", symbol, interval)))
    }
}
