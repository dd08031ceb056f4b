// In-memory candle store, keyed by symbol and interval. Backs the CSV market
// source and the tests; wrapped in `Arc<RwLock<_>>` when shared.
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::models::{Candle, Interval};
use std::collections::HashMap;
use std::path::Path;
use tokio::sync::RwLock;

use super::csv_parser::CandleCsvParser;
use super::MarketDataSource;
use crate::config::TrackedPair;
use crate::error::{EngineError, EngineResult};

pub struct MarketDataStore {
    data: HashMap<String, HashMap<Interval, Vec<Candle>>>,
}

impl MarketDataStore {
    pub fn new() -> Self {
        MarketDataStore { data: HashMap::new() }
    }

    /// Loads `<dir>/<SYMBOL>_<interval>.csv` for every tracked pair.
    pub fn load_directory(dir: &Path, pairs: &[TrackedPair]) -> EngineResult<Self> {
        let mut store = Self::new();
        for pair in pairs {
            let path = dir.join(csv_file_name(&pair.symbol, pair.interval));
            let candles = CandleCsvParser::load_candles_from_csv(&path)?;
            tracing::info!(symbol = %pair.symbol, interval = %pair.interval, count = candles.len(), path = %path.display(), "Loaded market data");
            store.add_candles(&pair.symbol, pair.interval, candles);
        }
        Ok(store)
    }

    pub fn add_candles(&mut self, symbol: &str, interval: Interval, new_candles: Vec<Candle>) {
        let series = self.data.entry(symbol.to_string()).or_default().entry(interval).or_default();
        series.extend(new_candles);
        series.sort_by_key(|c| c.timestamp);
        series.dedup_by_key(|c| c.timestamp);
    }

    pub fn get_candles(
        &self,
        symbol: &str,
        interval: Interval,
        from_timestamp: Option<DateTime<Utc>>,
        to_timestamp: Option<DateTime<Utc>>,
    ) -> Option<Vec<Candle>> {
        self.series(symbol, interval).map(|candles| {
            candles
                .iter()
                .filter(|c| from_timestamp.map_or(true, |start| c.timestamp >= start))
                .filter(|c| to_timestamp.map_or(true, |end| c.timestamp <= end))
                .cloned()
                .collect()
        })
    }

    /// The most recent `limit` candles, oldest first.
    pub fn latest(&self, symbol: &str, interval: Interval, limit: usize) -> Option<Vec<Candle>> {
        self.series(symbol, interval).map(|candles| candles[candles.len().saturating_sub(limit)..].to_vec())
    }

    /// Close of the newest candle across every interval held for `symbol`.
    pub fn last_price(&self, symbol: &str) -> Option<f64> {
        self.data
            .get(symbol)?
            .values()
            .filter_map(|series| series.last())
            .max_by_key(|c| c.timestamp)
            .map(|c| c.close)
    }

    fn series(&self, symbol: &str, interval: Interval) -> Option<&Vec<Candle>> {
        self.data.get(symbol).and_then(|by_interval| by_interval.get(&interval))
    }
}

impl Default for MarketDataStore {
    fn default() -> Self {
        Self::new()
    }
}

pub fn csv_file_name(symbol: &str, interval: Interval) -> String {
    format!("{}_{}.csv", symbol.to_uppercase(), interval)
}

#[async_trait]
impl MarketDataSource for RwLock<MarketDataStore> {
    async fn fetch_candles(&self, symbol: &str, interval: Interval, limit: usize) -> EngineResult<Vec<Candle>> {
        self.read()
            .await
            .latest(symbol, interval, limit)
            .ok_or_else(|| EngineError::MarketDataError(format!("No candles stored for {} {}", symbol, interval)))
    }

    async fn fetch_current_price(&self, symbol: &str) -> EngineResult<f64> {
        self.read()
            .await
            .last_price(symbol)
            .ok_or_else(|| EngineError::MarketDataError(format!("No price stored for {}", symbol)))
    }
}
