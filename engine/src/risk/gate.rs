use chrono::{DateTime, Utc};
use shared::models::{AccountId, Signal, Trade, TradeConfig, TradeSide, TradeStatus};
use std::fmt;
use uuid::Uuid;

use super::sizing::{FixedQuantity, SizingPolicy};

/// What the gate needs to know about an account at decision time.
#[derive(Debug, Clone, Copy)]
pub struct AccountState<'a> {
    pub account_id: AccountId,
    /// Trades created since local midnight.
    pub today_trade_count: usize,
    pub open_trades: &'a [Trade],
    pub balance: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    NotActionable,
    ConfidenceTooLow,
    DailyLimitReached,
    PositionAlreadyOpen,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::NotActionable => f.write_str("no actionable signal"),
            RejectReason::ConfidenceTooLow => f.write_str("confidence too low"),
            RejectReason::DailyLimitReached => f.write_str("daily limit reached"),
            RejectReason::PositionAlreadyOpen => f.write_str("position already open"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum GateOutcome {
    Opened(Trade),
    Rejected(RejectReason),
}

impl GateOutcome {
    pub fn opened(&self) -> bool {
        matches!(self, GateOutcome::Opened(_))
    }

    pub fn reason(&self) -> String {
        match self {
            GateOutcome::Opened(_) => "opened".to_string(),
            GateOutcome::Rejected(reason) => reason.to_string(),
        }
    }

    pub fn into_trade(self) -> Option<Trade> {
        match self {
            GateOutcome::Opened(trade) => Some(trade),
            GateOutcome::Rejected(_) => None,
        }
    }
}

pub struct RiskGate {
    sizing: Box<dyn SizingPolicy>,
}

impl RiskGate {
    pub fn new(sizing: Box<dyn SizingPolicy>) -> Self {
        RiskGate { sizing }
    }

    pub fn sizing_name(&self) -> &str {
        self.sizing.name()
    }

    /// Checks, in order: actionable side, confidence, daily cap, one open
    /// position per (symbol, interval). The first failure short-circuits.
    /// On success the returned trade is open, sized, and stamped `opened_at`.
    pub fn try_open(
        &self,
        signal: &Signal,
        config: &TradeConfig,
        account: &AccountState<'_>,
        opened_at: DateTime<Utc>,
    ) -> GateOutcome {
        let Ok(side) = TradeSide::try_from(signal.action) else {
            return self.reject(signal, account, RejectReason::NotActionable);
        };
        if signal.confidence < config.confidence_threshold {
            return self.reject(signal, account, RejectReason::ConfidenceTooLow);
        }
        if account.today_trade_count >= config.max_daily_trades as usize {
            return self.reject(signal, account, RejectReason::DailyLimitReached);
        }
        let already_open = account
            .open_trades
            .iter()
            .any(|t| t.is_open() && t.symbol == signal.symbol && t.interval == signal.interval);
        if already_open {
            return self.reject(signal, account, RejectReason::PositionAlreadyOpen);
        }

        let quantity = self.sizing.quantity(signal.price, config, account.balance);
        GateOutcome::Opened(Trade {
            id: Uuid::new_v4(),
            account_id: account.account_id,
            symbol: signal.symbol.clone(),
            interval: signal.interval,
            side,
            entry_price: signal.price,
            exit_price: None,
            quantity,
            confidence: signal.confidence,
            status: TradeStatus::Open,
            profit: None,
            profit_percent: None,
            entry_time: opened_at,
            exit_time: None,
            close_reason: None,
        })
    }

    fn reject(&self, signal: &Signal, account: &AccountState<'_>, reason: RejectReason) -> GateOutcome {
        tracing::debug!(
            account_id = account.account_id,
            symbol = %signal.symbol,
            interval = %signal.interval,
            action = %signal.action,
            confidence = signal.confidence,
            %reason,
            "Signal rejected by risk gate"
        );
        GateOutcome::Rejected(reason)
    }
}

impl Default for RiskGate {
    fn default() -> Self {
        Self::new(Box::new(FixedQuantity::default()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::risk::sizing::BalancePercent;
    use shared::models::{IndicatorSet, Interval, SignalAction};

    fn signal(symbol: &str, action: SignalAction, confidence: f64) -> Signal {
        Signal {
            symbol: symbol.to_string(),
            interval: Interval::Hour1,
            action,
            confidence,
            price: 2_000.0,
            indicators: IndicatorSet::default(),
            timestamp: Utc::now(),
        }
    }

    fn state(open_trades: &[Trade], today_trade_count: usize) -> AccountState<'_> {
        AccountState { account_id: 1, today_trade_count, open_trades, balance: None }
    }

    fn active_config() -> TradeConfig {
        TradeConfig { is_active: true, ..TradeConfig::default() }
    }

    #[test]
    fn rejects_low_confidence() {
        let config = TradeConfig { confidence_threshold: 80.0, ..active_config() };
        let outcome = RiskGate::default().try_open(&signal("ETHUSDT", SignalAction::Buy, 75.0), &config, &state(&[], 0), Utc::now());
        assert!(!outcome.opened());
        assert_eq!(outcome.reason(), "confidence too low");
    }

    #[test]
    fn confidence_equal_to_threshold_passes() {
        let config = TradeConfig { confidence_threshold: 75.0, ..active_config() };
        let outcome = RiskGate::default().try_open(&signal("ETHUSDT", SignalAction::Sell, 75.0), &config, &state(&[], 0), Utc::now());
        assert!(outcome.opened());
    }

    #[test]
    fn opens_trade_from_signal() {
        let now = Utc::now();
        let outcome = RiskGate::default().try_open(&signal("ETHUSDT", SignalAction::Sell, 100.0), &active_config(), &state(&[], 0), now);
        let trade = outcome.into_trade().unwrap();
        assert_eq!(trade.side, TradeSide::Sell);
        assert_eq!(trade.status, TradeStatus::Open);
        assert_eq!(trade.entry_price, 2_000.0);
        assert_eq!(trade.quantity, 0.01);
        assert_eq!(trade.confidence, 100.0);
        assert_eq!(trade.entry_time, now);
        assert!(trade.exit_price.is_none() && trade.profit.is_none());
    }

    #[test]
    fn rejects_second_position_on_same_instrument() {
        let gate = RiskGate::default();
        let config = active_config();
        let first = gate
            .try_open(&signal("ETHUSDT", SignalAction::Buy, 100.0), &config, &state(&[], 0), Utc::now())
            .into_trade()
            .unwrap();
        let open = vec![first];
        let second = gate.try_open(&signal("ETHUSDT", SignalAction::Buy, 100.0), &config, &state(&open, 1), Utc::now());
        assert!(!second.opened());
        assert_eq!(second.reason(), "position already open");

        // A different instrument is unaffected.
        let other = gate.try_open(&signal("SOLUSDT", SignalAction::Buy, 100.0), &config, &state(&open, 1), Utc::now());
        assert!(other.opened());
    }

    #[test]
    fn same_symbol_other_interval_is_a_different_instrument() {
        let gate = RiskGate::default();
        let config = active_config();
        let first = gate
            .try_open(&signal("ETHUSDT", SignalAction::Buy, 100.0), &config, &state(&[], 0), Utc::now())
            .into_trade()
            .unwrap();
        let open = vec![first];
        let mut other = signal("ETHUSDT", SignalAction::Buy, 100.0);
        other.interval = Interval::Minute15;
        assert!(gate.try_open(&other, &config, &state(&open, 1), Utc::now()).opened());
    }

    #[test]
    fn closed_trades_do_not_block() {
        let gate = RiskGate::default();
        let config = active_config();
        let mut first = gate
            .try_open(&signal("ETHUSDT", SignalAction::Buy, 100.0), &config, &state(&[], 0), Utc::now())
            .into_trade()
            .unwrap();
        first.status = TradeStatus::Closed;
        let history = vec![first];
        assert!(gate.try_open(&signal("ETHUSDT", SignalAction::Buy, 100.0), &config, &state(&history, 1), Utc::now()).opened());
    }

    #[test]
    fn daily_cap_rejects_regardless_of_confidence() {
        let config = TradeConfig { max_daily_trades: 2, ..active_config() };
        let outcome = RiskGate::default().try_open(&signal("BTCUSDT", SignalAction::Buy, 100.0), &config, &state(&[], 2), Utc::now());
        assert!(!outcome.opened());
        assert_eq!(outcome.reason(), "daily limit reached");
    }

    #[test]
    fn confidence_is_checked_before_daily_cap() {
        let config = TradeConfig { max_daily_trades: 1, ..active_config() };
        let outcome = RiskGate::default().try_open(&signal("BTCUSDT", SignalAction::Buy, 25.0), &config, &state(&[], 5), Utc::now());
        assert_eq!(outcome, GateOutcome::Rejected(RejectReason::ConfidenceTooLow));
    }

    #[test]
    fn hold_is_never_opened() {
        let config = TradeConfig { confidence_threshold: 0.0, ..active_config() };
        let outcome = RiskGate::default().try_open(&signal("ETHUSDT", SignalAction::Hold, 100.0), &config, &state(&[], 0), Utc::now());
        assert_eq!(outcome, GateOutcome::Rejected(RejectReason::NotActionable));
    }

    #[test]
    fn sizing_policy_is_applied() {
        let gate = RiskGate::new(Box::new(BalancePercent::default()));
        let config = TradeConfig { balance_per_trade_pct: 50.0, ..active_config() };
        let account = AccountState { account_id: 1, today_trade_count: 0, open_trades: &[], balance: Some(8_000.0) };
        let trade = gate
            .try_open(&signal("ETHUSDT", SignalAction::Buy, 100.0), &config, &account, Utc::now())
            .into_trade()
            .unwrap();
        assert_eq!(trade.quantity, 2.0);
    }
}
