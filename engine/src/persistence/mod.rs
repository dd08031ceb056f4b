// Storage seam for trades, analyses, backtest runs and bot logs. Storage
// failures surface as `EngineError::PersistenceError`.
pub mod memory;

pub use memory::InMemoryRepository;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::models::{AccountId, BacktestRun, MarketAnalysis, SimulatedTrade, Trade, TradeStatistics};
use uuid::Uuid;

use crate::error::EngineResult;
use crate::trading::{ExitDecision, Transition};

#[async_trait]
pub trait TradeRepository: Send + Sync {
    async fn create_trade(&self, trade: &Trade) -> EngineResult<()>;

    /// Applies `open -> closed` atomically. Closing a terminal trade is a
    /// no-op reported as `Transition::AlreadyTerminal`.
    async fn close_trade(&self, trade_id: Uuid, exit: &ExitDecision, exit_time: DateTime<Utc>) -> EngineResult<Transition>;

    async fn cancel_trade(&self, trade_id: Uuid, at: DateTime<Utc>) -> EngineResult<Transition>;

    async fn get_trade(&self, trade_id: Uuid) -> EngineResult<Option<Trade>>;

    async fn get_open_trades(&self, account_id: AccountId) -> EngineResult<Vec<Trade>>;

    /// Trades of any status created at or after `day_start`.
    async fn get_today_trade_count(&self, account_id: AccountId, day_start: DateTime<Utc>) -> EngineResult<usize>;

    /// Newest first.
    async fn get_trades(&self, account_id: AccountId, limit: usize) -> EngineResult<Vec<Trade>>;

    async fn get_trade_statistics(&self, account_id: AccountId) -> EngineResult<TradeStatistics>;

    async fn save_market_analysis(&self, analysis: &MarketAnalysis) -> EngineResult<()>;

    async fn save_backtest_run(&self, run: &BacktestRun) -> EngineResult<()>;

    async fn save_simulated_trade(&self, trade: &SimulatedTrade) -> EngineResult<()>;
}
