use shared::models::{
    BacktestRun, Candle, ExitReason, Interval, SignalAction, SimulatedTrade, Trade, TradeConfig, TradeSide,
};
use shared::utils::local_day_start;
use uuid::Uuid;

use super::metrics::TradeMetrics;
use crate::config::BacktestSettings;
use crate::error::{EngineError, EngineResult};
use crate::persistence::TradeRepository;
use crate::risk::{AccountState, GateOutcome, RiskGate};
use crate::signal::SignalGenerator;
use crate::trading::{apply_close, evaluate_exit, exit_at};

/// Account id carried by trades while they live inside a replay.
const REPLAY_ACCOUNT: u64 = 0;

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestReport {
    pub run: BacktestRun,
    pub trades: Vec<SimulatedTrade>,
}

/// Replays a candle window through the live signal, gate and exit rules.
/// At step `i` only `candles[..=i]` is visible; exits are checked against
/// each new candle's close before a new signal is considered.
pub struct BacktestRunner {
    generator: SignalGenerator,
    gate: RiskGate,
    settings: BacktestSettings,
}

impl BacktestRunner {
    pub fn new(generator: SignalGenerator, gate: RiskGate, settings: BacktestSettings) -> Self {
        BacktestRunner { generator, gate, settings }
    }

    pub fn simulate(&self, symbol: &str, interval: Interval, candles: &[Candle], config: &TradeConfig) -> EngineResult<BacktestReport> {
        let (Some(first), Some(last)) = (candles.first(), candles.last()) else {
            return Err(EngineError::MarketDataError(format!("No candles to replay for {} {}", symbol, interval)));
        };
        let run_id = Uuid::new_v4();
        let mut balance = self.settings.initial_balance;
        let mut open: Option<Trade> = None;
        let mut finished: Vec<Trade> = Vec::new();

        for i in self.settings.warmup.min(candles.len())..candles.len() {
            let candle = &candles[i];

            if let Some(trade) = open.as_mut() {
                if let Some(exit) = evaluate_exit(trade, candle.close, config) {
                    apply_close(trade, &exit, candle.timestamp);
                    balance += exit.profit;
                    finished.extend(open.take());
                }
            }

            let Some(signal) = self.generator.generate(symbol, interval, &candles[..=i]) else {
                continue;
            };

            if let Some(trade) = open.as_mut() {
                if self.settings.close_on_opposite_signal && is_opposite(trade.side, signal.action) {
                    let exit = exit_at(trade, candle.close, ExitReason::OppositeSignal);
                    apply_close(trade, &exit, candle.timestamp);
                    balance += exit.profit;
                    finished.extend(open.take());
                    continue;
                }
            }

            let today = local_day_start(candle.timestamp);
            let today_trade_count = finished
                .iter()
                .chain(open.iter())
                .filter(|t| local_day_start(t.entry_time) == today)
                .count();
            let open_trades: Vec<Trade> = open.iter().cloned().collect();
            let state = AccountState { account_id: REPLAY_ACCOUNT, today_trade_count, open_trades: &open_trades, balance: Some(balance) };
            if let GateOutcome::Opened(trade) = self.gate.try_open(&signal, config, &state, candle.timestamp) {
                open = Some(trade);
            }
        }

        if let Some(mut trade) = open.take() {
            if self.settings.close_at_end {
                let exit = exit_at(&trade, last.close, ExitReason::EndOfData);
                apply_close(&mut trade, &exit, last.timestamp);
            }
            finished.push(trade);
        }

        let trades: Vec<SimulatedTrade> = finished.into_iter().map(|t| into_simulated(t, run_id)).collect();
        let metrics = TradeMetrics::compute(&trades, self.settings.initial_balance);
        let run = BacktestRun {
            id: run_id,
            symbol: symbol.to_string(),
            interval,
            start_time: first.timestamp,
            end_time: last.timestamp,
            confidence_threshold: config.confidence_threshold,
            total_trades: metrics.total_trades,
            win_trades: metrics.win_trades,
            loss_trades: metrics.loss_trades,
            win_rate: metrics.win_rate,
            total_profit: metrics.total_profit,
            total_profit_percent: metrics.total_profit_percent,
            max_drawdown: metrics.max_drawdown,
            sharpe_ratio: metrics.sharpe_ratio,
            profit_factor: metrics.profit_factor,
            initial_balance: self.settings.initial_balance,
            final_balance: metrics.final_balance,
            avg_win: metrics.avg_win,
            avg_loss: metrics.avg_loss,
        };

        tracing::info!(
            run_id = %run.id,
            symbol,
            %interval,
            candles = candles.len(),
            total_trades = run.total_trades,
            win_rate = run.win_rate,
            total_profit = run.total_profit,
            max_drawdown = run.max_drawdown,
            "Backtest finished"
        );
        Ok(BacktestReport { run, trades })
    }

    /// Simulates and hands the run and its trades to the repository.
    pub async fn run_and_save(
        &self,
        symbol: &str,
        interval: Interval,
        candles: &[Candle],
        config: &TradeConfig,
        repository: &dyn TradeRepository,
    ) -> EngineResult<BacktestReport> {
        let report = self.simulate(symbol, interval, candles, config)?;
        repository.save_backtest_run(&report.run).await?;
        for trade in &report.trades {
            repository.save_simulated_trade(trade).await?;
        }
        Ok(report)
    }

    pub fn settings(&self) -> &BacktestSettings {
        &self.settings
    }
}

fn is_opposite(side: TradeSide, action: SignalAction) -> bool {
    matches!((side, action), (TradeSide::Buy, SignalAction::Sell) | (TradeSide::Sell, SignalAction::Buy))
}

fn into_simulated(trade: Trade, backtest_run_id: Uuid) -> SimulatedTrade {
    SimulatedTrade {
        id: trade.id,
        backtest_run_id,
        symbol: trade.symbol,
        interval: trade.interval,
        side: trade.side,
        entry_price: trade.entry_price,
        exit_price: trade.exit_price,
        quantity: trade.quantity,
        confidence: trade.confidence,
        status: trade.status,
        profit: trade.profit,
        profit_percent: trade.profit_percent,
        entry_time: trade.entry_time,
        exit_time: trade.exit_time,
        close_reason: trade.close_reason,
    }
}

/// Trailing `limit` candles, or all of them.
pub fn trailing_window(candles: &[Candle], limit: Option<usize>) -> &[Candle] {
    match limit {
        Some(limit) => &candles[candles.len().saturating_sub(limit)..],
        None => candles,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::test_support::candles_from_closes;
    use crate::persistence::InMemoryRepository;
    use crate::risk::sizing::FixedQuantity;
    use crate::signal::{Score, ScoringPolicy};
    use shared::models::{IndicatorSet, TradeStatus};

    /// Buys at or above 100, sells below, always at full confidence.
    struct PriceLevel;

    impl ScoringPolicy for PriceLevel {
        fn name(&self) -> &str {
            "price_level"
        }

        fn score(&self, price: f64, _indicators: &IndicatorSet) -> Score {
            let action = if price >= 100.0 { SignalAction::Buy } else { SignalAction::Sell };
            Score { action, confidence: 100.0 }
        }
    }

    fn runner(settings: BacktestSettings) -> BacktestRunner {
        BacktestRunner::new(SignalGenerator::new(Box::new(PriceLevel)), RiskGate::new(Box::new(FixedQuantity(1.0))), settings)
    }

    fn settings(warmup: usize) -> BacktestSettings {
        BacktestSettings { warmup, ..BacktestSettings::default() }
    }

    #[test]
    fn take_profit_then_end_of_data() {
        let candles = candles_from_closes(&[100.0, 100.0, 100.0, 103.0, 106.0, 106.0]);
        let report = runner(settings(2)).simulate("SOLUSDT", Interval::Hour1, &candles, &TradeConfig::default()).unwrap();

        assert_eq!(report.trades.len(), 2);
        let first = &report.trades[0];
        assert_eq!(first.entry_price, 100.0);
        assert_eq!(first.entry_time, candles[2].timestamp);
        assert_eq!(first.close_reason, Some(ExitReason::TakeProfit));
        assert_eq!(first.exit_price, Some(106.0));
        assert_eq!(first.profit, Some(6.0));
        // Re-entered on the candle that closed the first trade.
        let second = &report.trades[1];
        assert_eq!(second.entry_time, candles[4].timestamp);
        assert_eq!(second.close_reason, Some(ExitReason::EndOfData));
        assert!(report.trades.iter().all(|t| t.backtest_run_id == report.run.id));

        let run = &report.run;
        assert_eq!(run.total_trades, 2);
        assert_eq!(run.win_trades, 1);
        assert_eq!(run.loss_trades, 0);
        assert_eq!(run.win_rate, 50.0);
        assert_eq!(run.profit_factor, f64::INFINITY);
        assert_eq!(run.final_balance, 10_006.0);
        assert_eq!(run.total_profit_percent, 0.06);
        assert_eq!(run.sharpe_ratio, 1.0);
        assert_eq!(run.max_drawdown, 0.0);
        assert_eq!(run.start_time, candles[0].timestamp);
        assert_eq!(run.end_time, candles[5].timestamp);
    }

    #[test]
    fn stop_loss_is_a_losing_trade() {
        let candles = candles_from_closes(&[100.0, 100.0, 100.0, 96.0]);
        let config = TradeConfig { stop_loss_pct: 3.0, ..TradeConfig::default() };
        let report = runner(settings(2)).simulate("SOLUSDT", Interval::Hour1, &candles, &config).unwrap();
        let first = &report.trades[0];
        assert_eq!(first.close_reason, Some(ExitReason::StopLoss));
        assert_eq!(first.profit, Some(-4.0));
        assert_eq!(report.run.loss_trades, 1);
        assert_eq!(report.run.profit_factor, 0.0);
        assert_eq!(report.run.avg_loss, -4.0);
        assert!(report.run.max_drawdown > 0.0);
    }

    #[test]
    fn opposite_signal_closes_when_enabled() {
        let candles = candles_from_closes(&[100.0, 100.0, 101.0, 99.5]);
        let settings = BacktestSettings { close_on_opposite_signal: true, ..settings(2) };
        let report = runner(settings).simulate("SOLUSDT", Interval::Hour1, &candles, &TradeConfig::default()).unwrap();
        assert_eq!(report.trades.len(), 1);
        assert_eq!(report.trades[0].close_reason, Some(ExitReason::OppositeSignal));
        assert_eq!(report.trades[0].exit_price, Some(99.5));

        // Without the option the buy rides on and is closed at the end.
        let report = runner(settings_with_end(2, true)).simulate("SOLUSDT", Interval::Hour1, &candles, &TradeConfig::default()).unwrap();
        assert_eq!(report.trades.len(), 1);
        assert_eq!(report.trades[0].close_reason, Some(ExitReason::EndOfData));
    }

    fn settings_with_end(warmup: usize, close_at_end: bool) -> BacktestSettings {
        BacktestSettings { close_at_end, ..settings(warmup) }
    }

    #[test]
    fn open_trade_survives_when_end_close_disabled() {
        let candles = candles_from_closes(&[100.0, 100.0, 100.0, 101.0]);
        let report = runner(settings_with_end(2, false)).simulate("SOLUSDT", Interval::Hour1, &candles, &TradeConfig::default()).unwrap();
        assert_eq!(report.trades.len(), 1);
        assert_eq!(report.trades[0].status, TradeStatus::Open);
        assert_eq!(report.run.total_trades, 0);
        assert_eq!(report.run.final_balance, 10_000.0);
    }

    #[test]
    fn threshold_filters_signals() {
        let candles = candles_from_closes(&[100.0; 10]);
        let config = TradeConfig { confidence_threshold: 100.0, ..TradeConfig::default() };
        let report = runner(settings(2)).simulate("SOLUSDT", Interval::Hour1, &candles, &config).unwrap();
        assert_eq!(report.trades.len(), 1);

        let strict = BacktestRunner::new(SignalGenerator::default(), RiskGate::default(), settings(2));
        // Flat prices: only the EMA vote is cast, 25 points.
        let config = TradeConfig { confidence_threshold: 80.0, ..TradeConfig::default() };
        let report = strict.simulate("SOLUSDT", Interval::Hour1, &candles, &config).unwrap();
        assert!(report.trades.is_empty());
        assert_eq!(report.run.total_trades, 0);
        assert_eq!(report.run.win_rate, 0.0);
        assert_eq!(report.run.sharpe_ratio, 0.0);
    }

    #[test]
    fn daily_cap_applies_to_replay() {
        // Every candle is 6% above the last, so each trade takes profit and
        // would re-open immediately without the cap.
        let closes: Vec<f64> = (0..12).map(|i| 100.0 * 1.06_f64.powi(i)).collect();
        let config = TradeConfig { max_daily_trades: 3, ..TradeConfig::default() };
        let report = runner(settings(0)).simulate("SOLUSDT", Interval::Hour1, &candles_from_closes(&closes), &config).unwrap();

        assert!(report.trades.len() < 11);
        for trade in &report.trades {
            let day = local_day_start(trade.entry_time);
            let same_day = report.trades.iter().filter(|t| local_day_start(t.entry_time) == day).count();
            assert!(same_day <= 3);
        }
    }

    #[test]
    fn short_window_produces_empty_run() {
        let candles = candles_from_closes(&[100.0, 101.0]);
        let report = runner(settings(26)).simulate("SOLUSDT", Interval::Hour1, &candles, &TradeConfig::default()).unwrap();
        assert!(report.trades.is_empty());
        assert!(runner(settings(26)).simulate("SOLUSDT", Interval::Hour1, &[], &TradeConfig::default()).is_err());
    }

    #[test]
    fn no_look_ahead() {
        let closes: Vec<f64> = (0..80).map(|i| 100.0 + 8.0 * ((i as f64) / 5.0).sin()).collect();
        let candles = candles_from_closes(&closes);
        let runner = BacktestRunner::new(SignalGenerator::default(), RiskGate::default(), settings(26));
        let config = TradeConfig { confidence_threshold: 50.0, ..TradeConfig::default() };

        let full = runner.simulate("SOLUSDT", Interval::Hour1, &candles, &config).unwrap();
        let prefix = runner.simulate("SOLUSDT", Interval::Hour1, &candles[..50], &config).unwrap();
        let cutoff = candles[49].timestamp;
        let entries = |report: &BacktestReport| {
            report
                .trades
                .iter()
                .filter(|t| t.entry_time <= cutoff)
                .map(|t| (t.entry_time, t.side, t.entry_price))
                .collect::<Vec<_>>()
        };
        assert_eq!(entries(&full), entries(&prefix));
    }

    #[tokio::test]
    async fn run_and_save_persists_everything() {
        let repo = InMemoryRepository::new();
        let candles = candles_from_closes(&[100.0, 100.0, 100.0, 103.0, 106.0, 106.0]);
        let report = runner(settings(2))
            .run_and_save("SOLUSDT", Interval::Hour1, &candles, &TradeConfig::default(), &repo)
            .await
            .unwrap();
        assert_eq!(repo.backtest_runs().await, vec![report.run.clone()]);
        assert_eq!(repo.simulated_trades(report.run.id).await.len(), 2);
    }

    #[test]
    fn trailing_window_selects_tail() {
        let candles = candles_from_closes(&[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(trailing_window(&candles, Some(2)).len(), 2);
        assert_eq!(trailing_window(&candles, Some(10)).len(), 4);
        assert_eq!(trailing_window(&candles, None).len(), 4);
    }
}
