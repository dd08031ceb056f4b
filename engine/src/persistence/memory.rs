use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use shared::models::{
    AccountId, BacktestRun, BotLog, LogLevel, MarketAnalysis, SimulatedTrade, Trade, TradeStatistics,
};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::TradeRepository;
use crate::activity::ActivityLog;
use crate::error::{EngineError, EngineResult};
use crate::trading::{apply_cancel, apply_close, ExitDecision, Transition};

#[derive(Default)]
struct Tables {
    trades: Vec<Trade>,
    analyses: Vec<MarketAnalysis>,
    runs: Vec<BacktestRun>,
    simulated: Vec<SimulatedTrade>,
    logs: Vec<BotLog>,
}

/// Process-local repository. Every write happens under one lock, so a state
/// transition and its exit fields are never observed half-applied.
#[derive(Default)]
pub struct InMemoryRepository {
    tables: RwLock<Tables>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn market_analyses(&self, account_id: AccountId) -> Vec<MarketAnalysis> {
        self.tables.read().await.analyses.iter().filter(|a| a.account_id == account_id).cloned().collect()
    }

    pub async fn backtest_runs(&self) -> Vec<BacktestRun> {
        self.tables.read().await.runs.clone()
    }

    pub async fn simulated_trades(&self, run_id: Uuid) -> Vec<SimulatedTrade> {
        self.tables.read().await.simulated.iter().filter(|t| t.backtest_run_id == run_id).cloned().collect()
    }

    pub async fn bot_logs(&self, account_id: AccountId) -> Vec<BotLog> {
        self.tables.read().await.logs.iter().filter(|l| l.account_id == account_id).cloned().collect()
    }

    fn not_found(trade_id: Uuid) -> EngineError {
        EngineError::PersistenceError(format!("Trade {} not found", trade_id))
    }
}

#[async_trait]
impl TradeRepository for InMemoryRepository {
    async fn create_trade(&self, trade: &Trade) -> EngineResult<()> {
        let mut tables = self.tables.write().await;
        if tables.trades.iter().any(|t| t.id == trade.id) {
            return Err(EngineError::PersistenceError(format!("Trade {} already exists", trade.id)));
        }
        tables.trades.push(trade.clone());
        Ok(())
    }

    async fn close_trade(&self, trade_id: Uuid, exit: &ExitDecision, exit_time: DateTime<Utc>) -> EngineResult<Transition> {
        let mut tables = self.tables.write().await;
        let trade = tables.trades.iter_mut().find(|t| t.id == trade_id).ok_or_else(|| Self::not_found(trade_id))?;
        Ok(apply_close(trade, exit, exit_time))
    }

    async fn cancel_trade(&self, trade_id: Uuid, at: DateTime<Utc>) -> EngineResult<Transition> {
        let mut tables = self.tables.write().await;
        let trade = tables.trades.iter_mut().find(|t| t.id == trade_id).ok_or_else(|| Self::not_found(trade_id))?;
        Ok(apply_cancel(trade, at))
    }

    async fn get_trade(&self, trade_id: Uuid) -> EngineResult<Option<Trade>> {
        Ok(self.tables.read().await.trades.iter().find(|t| t.id == trade_id).cloned())
    }

    async fn get_open_trades(&self, account_id: AccountId) -> EngineResult<Vec<Trade>> {
        let tables = self.tables.read().await;
        Ok(tables.trades.iter().filter(|t| t.account_id == account_id && t.is_open()).cloned().collect())
    }

    async fn get_today_trade_count(&self, account_id: AccountId, day_start: DateTime<Utc>) -> EngineResult<usize> {
        let tables = self.tables.read().await;
        Ok(tables.trades.iter().filter(|t| t.account_id == account_id && t.entry_time >= day_start).count())
    }

    async fn get_trades(&self, account_id: AccountId, limit: usize) -> EngineResult<Vec<Trade>> {
        let tables = self.tables.read().await;
        let mut trades: Vec<Trade> = tables.trades.iter().filter(|t| t.account_id == account_id).cloned().collect();
        trades.sort_by(|a, b| b.entry_time.cmp(&a.entry_time));
        trades.truncate(limit);
        Ok(trades)
    }

    async fn get_trade_statistics(&self, account_id: AccountId) -> EngineResult<TradeStatistics> {
        let tables = self.tables.read().await;
        Ok(TradeStatistics::from_trades(tables.trades.iter().filter(|t| t.account_id == account_id)))
    }

    async fn save_market_analysis(&self, analysis: &MarketAnalysis) -> EngineResult<()> {
        self.tables.write().await.analyses.push(analysis.clone());
        Ok(())
    }

    async fn save_backtest_run(&self, run: &BacktestRun) -> EngineResult<()> {
        self.tables.write().await.runs.push(run.clone());
        Ok(())
    }

    async fn save_simulated_trade(&self, trade: &SimulatedTrade) -> EngineResult<()> {
        self.tables.write().await.simulated.push(trade.clone());
        Ok(())
    }
}

#[async_trait]
impl ActivityLog for InMemoryRepository {
    async fn log(&self, account_id: AccountId, level: LogLevel, message: &str, metadata: Value) {
        self.tables.write().await.logs.push(BotLog {
            account_id,
            level,
            message: message.to_string(),
            metadata,
            created_at: Utc::now(),
        });
    }
}
