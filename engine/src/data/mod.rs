pub mod bybit;
pub mod csv_parser;
pub mod market_data;

use async_trait::async_trait;
use shared::models::{Candle, Interval};

use crate::error::EngineResult;

/// Where candles and last-trade prices come from.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// The most recent `limit` candles, oldest first.
    async fn fetch_candles(&self, symbol: &str, interval: Interval, limit: usize) -> EngineResult<Vec<Candle>>;

    async fn fetch_current_price(&self, symbol: &str) -> EngineResult<f64>;
}
