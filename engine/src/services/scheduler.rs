use chrono::Utc;
use serde_json::json;
use shared::models::{AccountId, LogLevel, MarketAnalysis, SignalAction, TradeConfig};
use shared::utils::local_day_start;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use uuid::Uuid;

use crate::activity::ActivityLog;
use crate::config::TrackedPair;
use crate::data::MarketDataSource;
use crate::error::{EngineError, EngineResult};
use crate::persistence::TradeRepository;
use crate::predictor::Predictor;
use crate::risk::{AccountState, GateOutcome, RejectReason, RiskGate};
use crate::trading::{MonitorReport, PriceSnapshot, TradeLifecycleManager};

/// One trading account. Ticks for the same account are serialised by
/// `tick_guard`; config changes wait for a running tick to finish.
pub struct Account {
    pub id: AccountId,
    config: RwLock<TradeConfig>,
    balance: Option<f64>,
    tick_guard: Mutex<()>,
}

impl Account {
    pub fn new(id: AccountId, config: TradeConfig, balance: Option<f64>) -> Self {
        Account { id, config: RwLock::new(config), balance, tick_guard: Mutex::new(()) }
    }

    pub async fn config(&self) -> TradeConfig {
        self.config.read().await.clone()
    }

    pub async fn update_config(&self, config: TradeConfig) -> EngineResult<()> {
        config.validate().map_err(|msg| EngineError::ConfigError(format!("account {}: {}", self.id, msg)))?;
        let _guard = self.tick_guard.lock().await;
        *self.config.write().await = config;
        tracing::info!(account_id = self.id, "Trade config updated");
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PairOutcome {
    Opened(Uuid),
    Rejected(RejectReason),
    Hold,
    /// No usable prediction this tick.
    Unavailable,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    pub pairs: Vec<(TrackedPair, PairOutcome)>,
    pub monitor: MonitorReport,
}

impl TickReport {
    pub fn opened(&self) -> Vec<Uuid> {
        self.pairs
            .iter()
            .filter_map(|(_, outcome)| match outcome {
                PairOutcome::Opened(id) => Some(*id),
                _ => None,
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// A previous tick for the account was still running.
    Skipped,
    Inactive,
    Completed(TickReport),
}

pub struct CycleScheduler {
    pairs: Vec<TrackedPair>,
    predictor: Arc<dyn Predictor>,
    market: Arc<dyn MarketDataSource>,
    repository: Arc<dyn TradeRepository>,
    activity: Arc<dyn ActivityLog>,
    gate: RiskGate,
    lifecycle: TradeLifecycleManager,
    fetch_timeout: Duration,
}

impl CycleScheduler {
    pub fn new(
        pairs: Vec<TrackedPair>,
        predictor: Arc<dyn Predictor>,
        market: Arc<dyn MarketDataSource>,
        repository: Arc<dyn TradeRepository>,
        activity: Arc<dyn ActivityLog>,
        gate: RiskGate,
        fetch_timeout: Duration,
    ) -> Self {
        let lifecycle = TradeLifecycleManager::new(repository.clone(), activity.clone());
        CycleScheduler { pairs, predictor, market, repository, activity, gate, lifecycle, fetch_timeout }
    }

    pub fn with_lifecycle(mut self, lifecycle: TradeLifecycleManager) -> Self {
        self.lifecycle = lifecycle;
        self
    }

    /// Analyse every tracked pair, gate and open, then run one monitoring
    /// pass against the prices seen in this tick.
    pub async fn run_tick(&self, account: &Account) -> EngineResult<TickOutcome> {
        let Ok(_guard) = account.tick_guard.try_lock() else {
            tracing::warn!(account_id = account.id, "Previous tick still running; skipping");
            self.activity.log(account.id, LogLevel::Warning, "Tick skipped: previous tick still running", json!({})).await;
            return Ok(TickOutcome::Skipped);
        };

        let config = account.config().await;
        if !config.is_active {
            tracing::debug!(account_id = account.id, "Account inactive; tick is a no-op");
            return Ok(TickOutcome::Inactive);
        }

        let day_start = local_day_start(Utc::now());
        let mut prices = PriceSnapshot::new();
        let mut report = TickReport::default();

        for pair in &self.pairs {
            let outcome = match self.evaluate_pair(account, &config, pair, day_start, &mut prices).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::warn!(account_id = account.id, symbol = %pair.symbol, interval = %pair.interval, error = %e, "Instrument skipped this tick");
                    PairOutcome::Unavailable
                }
            };
            report.pairs.push((pair.clone(), outcome));
        }

        report.monitor = self
            .lifecycle
            .monitor(account.id, &config, &mut prices, self.market.as_ref(), self.fetch_timeout)
            .await?;

        tracing::info!(
            account_id = account.id,
            pairs = report.pairs.len(),
            opened = report.opened().len(),
            closed = report.monitor.closed.len(),
            "Tick completed"
        );
        Ok(TickOutcome::Completed(report))
    }

    async fn evaluate_pair(
        &self,
        account: &Account,
        config: &TradeConfig,
        pair: &TrackedPair,
        day_start: chrono::DateTime<Utc>,
        prices: &mut PriceSnapshot,
    ) -> EngineResult<PairOutcome> {
        let prediction = tokio::time::timeout(self.fetch_timeout, self.predictor.predict(&pair.symbol, pair.interval)).await;
        let signal = match prediction {
            Ok(Ok(signal)) => signal,
            Ok(Err(e)) => {
                self.log_unavailable(account.id, pair, &e).await;
                return Ok(PairOutcome::Unavailable);
            }
            Err(_) => {
                let e = EngineError::Timeout(self.fetch_timeout, format!("prediction for {} {}", pair.symbol, pair.interval));
                self.log_unavailable(account.id, pair, &e).await;
                return Ok(PairOutcome::Unavailable);
            }
        };
        prices.record(&signal.symbol, signal.price);

        let open_trades = self.repository.get_open_trades(account.id).await?;
        let in_trade = open_trades.iter().any(|t| t.symbol == pair.symbol && t.interval == pair.interval);
        let analysis = MarketAnalysis {
            account_id: account.id,
            symbol: signal.symbol.clone(),
            interval: signal.interval,
            current_price: signal.price,
            prediction: signal.action,
            confidence: signal.confidence,
            indicators: signal.indicators,
            in_trade,
            analyzed_at: Utc::now(),
        };
        if let Err(e) = self.repository.save_market_analysis(&analysis).await {
            tracing::warn!(account_id = account.id, symbol = %pair.symbol, error = %e, "Failed to save market analysis");
        }

        if signal.action == SignalAction::Hold {
            return Ok(PairOutcome::Hold);
        }

        let today_trade_count = self.repository.get_today_trade_count(account.id, day_start).await?;
        let state = AccountState { account_id: account.id, today_trade_count, open_trades: &open_trades, balance: account.balance };
        match self.gate.try_open(&signal, config, &state, Utc::now()) {
            GateOutcome::Opened(trade) => {
                self.repository.create_trade(&trade).await?;
                tracing::info!(
                    account_id = account.id,
                    trade_id = %trade.id,
                    symbol = %trade.symbol,
                    interval = %trade.interval,
                    side = %trade.side,
                    entry_price = trade.entry_price,
                    quantity = trade.quantity,
                    confidence = trade.confidence,
                    "Trade opened"
                );
                self.activity
                    .log(
                        account.id,
                        LogLevel::Info,
                        &format!("Trade opened: {} {}", trade.side.to_string().to_uppercase(), trade.symbol),
                        json!({
                            "tradeId": trade.id,
                            "symbol": trade.symbol,
                            "interval": trade.interval,
                            "price": trade.entry_price,
                            "quantity": trade.quantity,
                            "confidence": trade.confidence,
                        }),
                    )
                    .await;
                Ok(PairOutcome::Opened(trade.id))
            }
            GateOutcome::Rejected(reason) => Ok(PairOutcome::Rejected(reason)),
        }
    }

    async fn log_unavailable(&self, account_id: AccountId, pair: &TrackedPair, error: &EngineError) {
        tracing::warn!(account_id, symbol = %pair.symbol, interval = %pair.interval, error = %error, "No usable prediction; instrument skipped");
        self.activity
            .log(
                account_id,
                LogLevel::Warning,
                &format!("Skipped {} {}: no usable prediction", pair.symbol, pair.interval),
                json!({ "symbol": pair.symbol, "interval": pair.interval, "error": error.to_string() }),
            )
            .await;
    }

    /// Runs ticks for `account` every `period` until shutdown is signalled.
    pub fn spawn(self: Arc<Self>, account: Arc<Account>, period: Duration, mut shutdown: broadcast::Receiver<()>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut timer = interval(period);
            timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
            tracing::info!(account_id = account.id, period_secs = period.as_secs(), "Account scheduler started");
            loop {
                tokio::select! {
                    _ = timer.tick() => {
                        if let Err(e) = self.run_tick(&account).await {
                            tracing::error!(account_id = account.id, error = %e, "Tick failed");
                            self.activity.log(account.id, LogLevel::Error, "Tick failed", json!({ "error": e.to_string() })).await;
                        }
                    }
                    _ = shutdown.recv() => {
                        tracing::info!(account_id = account.id, "Account scheduler shutting down");
                        break;
                    }
                }
            }
        })
    }
}

/// Owns one scheduler task per account and a shared shutdown signal.
pub struct SchedulerHandle {
    tasks: Vec<JoinHandle<()>>,
    shutdown_sender: broadcast::Sender<()>,
}

impl SchedulerHandle {
    pub fn start(scheduler: Arc<CycleScheduler>, accounts: Vec<Arc<Account>>, period: Duration) -> Self {
        let (shutdown_sender, _) = broadcast::channel(16);
        let tasks = accounts
            .into_iter()
            .map(|account| scheduler.clone().spawn(account, period, shutdown_sender.subscribe()))
            .collect();
        SchedulerHandle { tasks, shutdown_sender }
    }

    pub async fn shutdown(self) {
        let _ = self.shutdown_sender.send(());
        for handle in self.tasks {
            let _ = handle.await;
        }
    }
}
