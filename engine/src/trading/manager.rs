use chrono::Utc;
use serde_json::json;
use shared::models::{AccountId, LogLevel, Trade, TradeConfig};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use super::lifecycle::{evaluate_exit, ExitDecision, Transition};
use crate::activity::ActivityLog;
use crate::data::MarketDataSource;
use crate::error::{EngineError, EngineResult};
use crate::persistence::TradeRepository;

pub const DEFAULT_CLOSE_ATTEMPTS: u32 = 3;
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(200);

/// Prices observed during one tick. Every trade on a symbol is judged
/// against the same price; a symbol missing from the snapshot is fetched once.
#[derive(Debug, Clone, Default)]
pub struct PriceSnapshot {
    prices: HashMap<String, f64>,
}

impl PriceSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, symbol: &str, price: f64) {
        self.prices.entry(symbol.to_string()).or_insert(price);
    }

    pub fn get(&self, symbol: &str) -> Option<f64> {
        self.prices.get(symbol).copied()
    }

    pub async fn resolve(&mut self, symbol: &str, market: &dyn MarketDataSource, timeout: Duration) -> EngineResult<f64> {
        if let Some(price) = self.get(symbol) {
            return Ok(price);
        }
        let price = tokio::time::timeout(timeout, market.fetch_current_price(symbol))
            .await
            .map_err(|_| EngineError::Timeout(timeout, format!("current price of {}", symbol)))??;
        self.record(symbol, price);
        Ok(price)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MonitorReport {
    pub checked: usize,
    pub closed: Vec<(Uuid, ExitDecision)>,
    /// Trades left open because no price could be obtained this tick.
    pub price_unavailable: usize,
    /// Trades whose close could not be persisted after every retry.
    pub close_failed: usize,
}

pub struct TradeLifecycleManager {
    repository: Arc<dyn TradeRepository>,
    activity: Arc<dyn ActivityLog>,
    close_attempts: u32,
    retry_backoff: Duration,
}

impl TradeLifecycleManager {
    pub fn new(repository: Arc<dyn TradeRepository>, activity: Arc<dyn ActivityLog>) -> Self {
        TradeLifecycleManager { repository, activity, close_attempts: DEFAULT_CLOSE_ATTEMPTS, retry_backoff: DEFAULT_RETRY_BACKOFF }
    }

    pub fn with_retry(mut self, attempts: u32, backoff: Duration) -> Self {
        self.close_attempts = attempts.max(1);
        self.retry_backoff = backoff;
        self
    }

    pub fn evaluate(&self, trade: &Trade, current_price: f64, config: &TradeConfig) -> Option<ExitDecision> {
        evaluate_exit(trade, current_price, config)
    }

    /// Persists the close, retrying with linear backoff. Exhausted retries are
    /// escalated to an error entry in the activity log and returned.
    pub async fn close(&self, trade: &Trade, exit: &ExitDecision) -> EngineResult<Transition> {
        let exit_time = Utc::now();
        let mut attempt = 1;
        loop {
            match self.repository.close_trade(trade.id, exit, exit_time).await {
                Ok(transition) => {
                    if transition == Transition::Applied {
                        self.activity
                            .log(
                                trade.account_id,
                                LogLevel::Info,
                                &format!("Trade closed by {}", exit.reason),
                                json!({
                                    "tradeId": trade.id,
                                    "symbol": trade.symbol,
                                    "side": trade.side,
                                    "entryPrice": trade.entry_price,
                                    "exitPrice": exit.exit_price,
                                    "profit": exit.profit,
                                    "profitPercent": exit.profit_percent,
                                }),
                            )
                            .await;
                    } else {
                        tracing::debug!(trade_id = %trade.id, "Trade already terminal; close skipped");
                    }
                    return Ok(transition);
                }
                Err(e) if attempt < self.close_attempts => {
                    tracing::warn!(trade_id = %trade.id, attempt, error = %e, "Failed to persist trade close; retrying");
                    tokio::time::sleep(self.retry_backoff * attempt).await;
                    attempt += 1;
                }
                Err(e) => {
                    self.activity
                        .log(
                            trade.account_id,
                            LogLevel::Error,
                            "Failed to close trade",
                            json!({
                                "tradeId": trade.id,
                                "symbol": trade.symbol,
                                "reason": exit.reason,
                                "attempts": attempt,
                                "error": e.to_string(),
                            }),
                        )
                        .await;
                    return Err(e);
                }
            }
        }
    }

    pub async fn cancel(&self, trade: &Trade) -> EngineResult<Transition> {
        let transition = self.repository.cancel_trade(trade.id, Utc::now()).await?;
        if transition == Transition::Applied {
            self.activity
                .log(trade.account_id, LogLevel::Info, "Trade cancelled", json!({ "tradeId": trade.id, "symbol": trade.symbol }))
                .await;
        }
        Ok(transition)
    }

    /// One monitoring pass over an account's open trades.
    pub async fn monitor(
        &self,
        account_id: AccountId,
        config: &TradeConfig,
        prices: &mut PriceSnapshot,
        market: &dyn MarketDataSource,
        fetch_timeout: Duration,
    ) -> EngineResult<MonitorReport> {
        let open_trades = self.repository.get_open_trades(account_id).await?;
        let mut report = MonitorReport::default();

        for trade in &open_trades {
            report.checked += 1;
            let price = match prices.resolve(&trade.symbol, market, fetch_timeout).await {
                Ok(price) => price,
                Err(e) => {
                    tracing::warn!(account_id, trade_id = %trade.id, symbol = %trade.symbol, error = %e, "No price for open trade; checking next tick");
                    report.price_unavailable += 1;
                    continue;
                }
            };
            let Some(exit) = self.evaluate(trade, price, config) else {
                continue;
            };
            match self.close(trade, &exit).await {
                Ok(Transition::Applied) => report.closed.push((trade.id, exit)),
                Ok(Transition::AlreadyTerminal) => {}
                Err(_) => report.close_failed += 1,
            }
        }

        tracing::debug!(
            account_id,
            checked = report.checked,
            closed = report.closed.len(),
            price_unavailable = report.price_unavailable,
            close_failed = report.close_failed,
            "Monitoring pass finished"
        );
        Ok(report)
    }
}
