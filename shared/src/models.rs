use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

pub type AccountId = u64;

/// One OHLCV bar. Series are ordered by `timestamp` ascending.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Interval {
    #[serde(rename = "5m")]
    Minute5,
    #[serde(rename = "15m")]
    Minute15,
    #[serde(rename = "30m")]
    Minute30,
    #[serde(rename = "1h")]
    Hour1,
    #[serde(rename = "4h")]
    Hour4,
    #[serde(rename = "1d")]
    Day1,
}

impl Interval {
    pub fn as_str(&self) -> &'static str {
        match self {
            Interval::Minute5 => "5m",
            Interval::Minute15 => "15m",
            Interval::Minute30 => "30m",
            Interval::Hour1 => "1h",
            Interval::Hour4 => "4h",
            Interval::Day1 => "1d",
        }
    }

    pub fn duration(&self) -> chrono::Duration {
        match self {
            Interval::Minute5 => chrono::Duration::minutes(5),
            Interval::Minute15 => chrono::Duration::minutes(15),
            Interval::Minute30 => chrono::Duration::minutes(30),
            Interval::Hour1 => chrono::Duration::hours(1),
            Interval::Hour4 => chrono::Duration::hours(4),
            Interval::Day1 => chrono::Duration::days(1),
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Interval {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "5m" | "5" => Ok(Interval::Minute5),
            "15m" | "15" => Ok(Interval::Minute15),
            "30m" | "30" => Ok(Interval::Minute30),
            "1h" | "60" => Ok(Interval::Hour1),
            "4h" | "240" => Ok(Interval::Hour4),
            "1d" | "d" => Ok(Interval::Day1),
            other => Err(format!("Unknown interval '{}'. Use 5m, 15m, 30m, 1h, 4h or 1d.", other)),
        }
    }
}

/// Indicator values computed from a candle window ending at one timestamp.
///
/// Deserialisation is lenient so predictions from an external model can carry
/// a partial set; missing values take the same neutral fallbacks the indicator
/// engine uses for short windows.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IndicatorSet {
    pub rsi: f64,
    pub macd: f64,
    #[serde(alias = "bollingerBands", alias = "percent_b")]
    pub percent_b: f64,
    pub ema: f64,
}

impl Default for IndicatorSet {
    fn default() -> Self {
        IndicatorSet { rsi: 50.0, macd: 0.0, percent_b: 50.0, ema: 0.0 }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SignalAction {
    Buy,
    Sell,
    Hold,
}

impl fmt::Display for SignalAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalAction::Buy => f.write_str("buy"),
            SignalAction::Sell => f.write_str("sell"),
            SignalAction::Hold => f.write_str("hold"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TradeSide {
    Buy,
    Sell,
}

impl TradeSide {
    /// +1 for long exposure, -1 for short exposure.
    pub fn direction(&self) -> f64 {
        match self {
            TradeSide::Buy => 1.0,
            TradeSide::Sell => -1.0,
        }
    }
}

impl TryFrom<SignalAction> for TradeSide {
    type Error = SignalAction;

    fn try_from(action: SignalAction) -> Result<Self, Self::Error> {
        match action {
            SignalAction::Buy => Ok(TradeSide::Buy),
            SignalAction::Sell => Ok(TradeSide::Sell),
            SignalAction::Hold => Err(action),
        }
    }
}

impl fmt::Display for TradeSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeSide::Buy => f.write_str("buy"),
            TradeSide::Sell => f.write_str("sell"),
        }
    }
}

/// A scored recommendation. Produced fresh on every evaluation and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Signal {
    pub symbol: String,
    pub interval: Interval,
    pub action: SignalAction,
    /// 0..=100
    pub confidence: f64,
    pub price: f64,
    pub indicators: IndicatorSet,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TradeStatus {
    Open,
    Closed,
    Cancelled,
}

impl TradeStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TradeStatus::Open)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum ExitReason {
    StopLoss,
    TakeProfit,
    OppositeSignal,
    EndOfData,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitReason::StopLoss => f.write_str("stop-loss"),
            ExitReason::TakeProfit => f.write_str("take-profit"),
            ExitReason::OppositeSignal => f.write_str("opposite-signal"),
            ExitReason::EndOfData => f.write_str("end-of-data"),
        }
    }
}

/// Per-account trading parameters, read at the start of every tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TradeConfig {
    /// Share of the account balance committed per trade, 1..=100.
    pub balance_per_trade_pct: f64,
    pub confidence_threshold: f64,
    pub max_daily_trades: u32,
    pub stop_loss_pct: f64,
    pub take_profit_pct: f64,
    pub risk_reward_ratio: f64,
    pub is_active: bool,
}

impl Default for TradeConfig {
    fn default() -> Self {
        TradeConfig {
            balance_per_trade_pct: 100.0,
            confidence_threshold: 80.0,
            max_daily_trades: 10,
            stop_loss_pct: 3.0,
            take_profit_pct: 5.0,
            risk_reward_ratio: 2.0,
            is_active: false,
        }
    }
}

impl TradeConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !(1.0..=100.0).contains(&self.balance_per_trade_pct) {
            return Err(format!("balance_per_trade_pct must be within 1..=100, got {}", self.balance_per_trade_pct));
        }
        if !(0.0..=100.0).contains(&self.confidence_threshold) {
            return Err(format!("confidence_threshold must be within 0..=100, got {}", self.confidence_threshold));
        }
        if self.max_daily_trades < 1 {
            return Err("max_daily_trades must be at least 1".to_string());
        }
        if !(self.stop_loss_pct > 0.0) {
            return Err(format!("stop_loss_pct must be positive, got {}", self.stop_loss_pct));
        }
        if !(self.take_profit_pct > 0.0) {
            return Err(format!("take_profit_pct must be positive, got {}", self.take_profit_pct));
        }
        Ok(())
    }
}

/// A simulated position tracked for one account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trade {
    pub id: Uuid,
    pub account_id: AccountId,
    pub symbol: String,
    pub interval: Interval,
    pub side: TradeSide,
    pub entry_price: f64,
    pub exit_price: Option<f64>,
    pub quantity: f64,
    pub confidence: f64,
    pub status: TradeStatus,
    pub profit: Option<f64>,
    pub profit_percent: Option<f64>,
    pub entry_time: DateTime<Utc>,
    pub exit_time: Option<DateTime<Utc>>,
    pub close_reason: Option<ExitReason>,
}

impl Trade {
    pub fn is_open(&self) -> bool {
        self.status == TradeStatus::Open
    }

    pub fn position_value(&self) -> f64 {
        self.entry_price * self.quantity
    }
}

/// A trade produced by a backtest replay, scoped to its run instead of an account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulatedTrade {
    pub id: Uuid,
    pub backtest_run_id: Uuid,
    pub symbol: String,
    pub interval: Interval,
    pub side: TradeSide,
    pub entry_price: f64,
    pub exit_price: Option<f64>,
    pub quantity: f64,
    pub confidence: f64,
    pub status: TradeStatus,
    pub profit: Option<f64>,
    pub profit_percent: Option<f64>,
    pub entry_time: DateTime<Utc>,
    pub exit_time: Option<DateTime<Utc>>,
    pub close_reason: Option<ExitReason>,
}

/// Aggregate statistics of one backtest replay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BacktestRun {
    pub id: Uuid,
    pub symbol: String,
    pub interval: Interval,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub confidence_threshold: f64,
    pub total_trades: usize,
    pub win_trades: usize,
    pub loss_trades: usize,
    pub win_rate: f64,
    pub total_profit: f64,
    /// Return on the initial balance, in percent.
    pub total_profit_percent: f64,
    /// Largest peak-to-trough equity decline, in percent.
    pub max_drawdown: f64,
    pub sharpe_ratio: f64,
    /// `f64::INFINITY` when there are wins and no losses.
    pub profit_factor: f64,
    pub initial_balance: f64,
    pub final_balance: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
}

/// Snapshot of one instrument's analysis during a tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketAnalysis {
    pub account_id: AccountId,
    pub symbol: String,
    pub interval: Interval,
    pub current_price: f64,
    pub prediction: SignalAction,
    pub confidence: f64,
    pub indicators: IndicatorSet,
    pub in_trade: bool,
    pub analyzed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BotLog {
    pub account_id: AccountId,
    pub level: LogLevel,
    pub message: String,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeStatistics {
    /// Closed trades only.
    pub total_trades: usize,
    pub win_trades: usize,
    pub loss_trades: usize,
    pub win_rate: f64,
    pub total_profit: f64,
    pub open_trades: usize,
}

impl TradeStatistics {
    pub fn from_trades<'a>(trades: impl IntoIterator<Item = &'a Trade>) -> Self {
        let mut stats = TradeStatistics::default();
        for trade in trades {
            match trade.status {
                TradeStatus::Open => stats.open_trades += 1,
                TradeStatus::Cancelled => {}
                TradeStatus::Closed => {
                    let profit = trade.profit.unwrap_or(0.0);
                    stats.total_trades += 1;
                    stats.total_profit += profit;
                    if profit > 0.0 {
                        stats.win_trades += 1;
                    } else if profit < 0.0 {
                        stats.loss_trades += 1;
                    }
                }
            }
        }
        if stats.total_trades > 0 {
            stats.win_rate = stats.win_trades as f64 * 100.0 / stats.total_trades as f64;
        }
        stats
    }
}
