use chrono::{DateTime, Utc};
use shared::models::{ExitReason, Trade, TradeConfig, TradeSide, TradeStatus};
use shared::utils::percent_change;

/// Realised outcome of closing a trade at `exit_price`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExitDecision {
    pub reason: ExitReason,
    pub exit_price: f64,
    pub profit: f64,
    pub profit_percent: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Applied,
    /// The trade was already closed or cancelled; nothing changed.
    AlreadyTerminal,
}

/// Price move in the trade's favour, in percent. Positive is good for both sides.
pub fn effective_change_pct(side: TradeSide, entry_price: f64, current_price: f64) -> f64 {
    percent_change(entry_price, current_price) * side.direction()
}

/// Exit fields for closing `trade` at `exit_price`, whatever the trigger.
pub fn exit_at(trade: &Trade, exit_price: f64, reason: ExitReason) -> ExitDecision {
    ExitDecision {
        reason,
        exit_price,
        profit: (exit_price - trade.entry_price) * trade.quantity * trade.side.direction(),
        profit_percent: effective_change_pct(trade.side, trade.entry_price, exit_price),
    }
}

/// Stop-loss / take-profit check. `None` keeps the trade open.
pub fn evaluate_exit(trade: &Trade, current_price: f64, config: &TradeConfig) -> Option<ExitDecision> {
    if !trade.is_open() {
        return None;
    }
    let change = effective_change_pct(trade.side, trade.entry_price, current_price);
    if change <= -config.stop_loss_pct {
        Some(exit_at(trade, current_price, ExitReason::StopLoss))
    } else if change >= config.take_profit_pct {
        Some(exit_at(trade, current_price, ExitReason::TakeProfit))
    } else {
        None
    }
}

/// `open -> closed`. Status and every exit field change together; a terminal
/// trade is left untouched.
pub fn apply_close(trade: &mut Trade, exit: &ExitDecision, exit_time: DateTime<Utc>) -> Transition {
    if trade.status.is_terminal() {
        return Transition::AlreadyTerminal;
    }
    *trade = Trade {
        status: TradeStatus::Closed,
        exit_price: Some(exit.exit_price),
        profit: Some(exit.profit),
        profit_percent: Some(exit.profit_percent),
        exit_time: Some(exit_time),
        close_reason: Some(exit.reason),
        ..trade.clone()
    };
    Transition::Applied
}

/// `open -> cancelled`, no exit fields.
pub fn apply_cancel(trade: &mut Trade, at: DateTime<Utc>) -> Transition {
    if trade.status.is_terminal() {
        return Transition::AlreadyTerminal;
    }
    trade.status = TradeStatus::Cancelled;
    trade.exit_time = Some(at);
    Transition::Applied
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use shared::models::Interval;
    use uuid::Uuid;

    pub(crate) fn open_trade(side: TradeSide, entry_price: f64, quantity: f64) -> Trade {
        Trade {
            id: Uuid::new_v4(),
            account_id: 1,
            symbol: "ETHUSDT".to_string(),
            interval: Interval::Hour1,
            side,
            entry_price,
            exit_price: None,
            quantity,
            confidence: 100.0,
            status: TradeStatus::Open,
            profit: None,
            profit_percent: None,
            entry_time: Utc::now(),
            exit_time: None,
            close_reason: None,
        }
    }

    fn config(stop_loss_pct: f64, take_profit_pct: f64) -> TradeConfig {
        TradeConfig { stop_loss_pct, take_profit_pct, ..TradeConfig::default() }
    }

    #[test]
    fn buy_hits_stop_loss() {
        let trade = open_trade(TradeSide::Buy, 100.0, 2.0);
        let exit = evaluate_exit(&trade, 97.0, &config(3.0, 5.0)).unwrap();
        assert_eq!(exit.reason, ExitReason::StopLoss);
        assert_eq!(exit.profit_percent, -3.0);
        assert_eq!(exit.profit, -6.0);
        // -3% of the 200.0 position value
        assert_eq!(exit.profit / trade.position_value() * 100.0, -3.0);
    }

    #[test]
    fn sell_hits_take_profit_on_falling_price() {
        let trade = open_trade(TradeSide::Sell, 100.0, 1.0);
        let exit = evaluate_exit(&trade, 95.0, &config(3.0, 5.0)).unwrap();
        assert_eq!(exit.reason, ExitReason::TakeProfit);
        assert_eq!(exit.profit_percent, 5.0);
        assert_eq!(exit.profit, 5.0);
    }

    #[test]
    fn sell_hits_stop_loss_on_rising_price() {
        let trade = open_trade(TradeSide::Sell, 100.0, 1.0);
        let exit = evaluate_exit(&trade, 103.0, &config(3.0, 5.0)).unwrap();
        assert_eq!(exit.reason, ExitReason::StopLoss);
        assert_eq!(exit.profit, -3.0);
    }

    #[test]
    fn inside_the_band_stays_open() {
        let trade = open_trade(TradeSide::Buy, 100.0, 1.0);
        assert!(evaluate_exit(&trade, 97.5, &config(3.0, 5.0)).is_none());
        assert!(evaluate_exit(&trade, 104.9, &config(3.0, 5.0)).is_none());
    }

    #[test]
    fn close_sets_every_exit_field() {
        let mut trade = open_trade(TradeSide::Buy, 100.0, 1.0);
        let exit = exit_at(&trade, 106.0, ExitReason::TakeProfit);
        let at = Utc::now();
        assert_eq!(apply_close(&mut trade, &exit, at), Transition::Applied);
        assert_eq!(trade.status, TradeStatus::Closed);
        assert_eq!(trade.exit_price, Some(106.0));
        assert_eq!(trade.profit, Some(6.0));
        assert_eq!(trade.profit_percent, Some(6.0));
        assert_eq!(trade.exit_time, Some(at));
        assert_eq!(trade.close_reason, Some(ExitReason::TakeProfit));
    }

    #[test]
    fn closing_twice_is_a_no_op() {
        let mut trade = open_trade(TradeSide::Buy, 100.0, 1.0);
        let first = exit_at(&trade, 97.0, ExitReason::StopLoss);
        apply_close(&mut trade, &first, Utc::now());
        let snapshot = trade.clone();

        let second = exit_at(&trade, 150.0, ExitReason::TakeProfit);
        assert_eq!(apply_close(&mut trade, &second, Utc::now()), Transition::AlreadyTerminal);
        assert_eq!(trade, snapshot);
        assert!(evaluate_exit(&trade, 10.0, &config(3.0, 5.0)).is_none());
    }

    #[test]
    fn cancelled_is_terminal() {
        let mut trade = open_trade(TradeSide::Buy, 100.0, 1.0);
        assert_eq!(apply_cancel(&mut trade, Utc::now()), Transition::Applied);
        assert_eq!(trade.status, TradeStatus::Cancelled);
        assert!(trade.exit_price.is_none());
        let exit = exit_at(&trade, 97.0, ExitReason::StopLoss);
        assert_eq!(apply_close(&mut trade, &exit, Utc::now()), Transition::AlreadyTerminal);
        assert_eq!(apply_cancel(&mut trade, Utc::now()), Transition::AlreadyTerminal);
    }
}
