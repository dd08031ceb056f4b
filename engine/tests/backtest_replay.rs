use chrono::{Duration, TimeZone, Utc};
use engine::config::EngineSettings;
use engine::persistence::InMemoryRepository;
use shared::models::{Candle, Interval, TradeConfig, TradeStatus};

/// A hundred hourly candles swinging around a slow uptrend.
fn replay_candles() -> Vec<Candle> {
    let start = Utc.with_ymd_and_hms(2024, 5, 6, 0, 0, 0).unwrap();
    (0..100)
        .map(|i| {
            let close = 150.0 + 12.0 * (i as f64 * 0.35).sin() + 0.2 * i as f64;
            Candle {
                timestamp: start + Duration::hours(i),
                open: close - 0.5,
                high: close + 1.0,
                low: close - 1.0,
                close,
                volume: 5_000.0 + i as f64,
            }
        })
        .collect()
}

#[tokio::test]
async fn replay_is_deterministic_and_consistent() {
    let settings = EngineSettings::default();
    let candles = replay_candles();
    let config = TradeConfig { confidence_threshold: 80.0, ..TradeConfig::default() };
    let repository = InMemoryRepository::new();

    let first = settings
        .backtest_runner()
        .run_and_save("SOLUSDT", Interval::Hour1, &candles, &config, &repository)
        .await
        .unwrap();
    let second = settings
        .backtest_runner()
        .run_and_save("SOLUSDT", Interval::Hour1, &candles, &config, &repository)
        .await
        .unwrap();

    assert_ne!(first.run.id, second.run.id);
    let same_totals = |a: &shared::models::BacktestRun, b: &shared::models::BacktestRun| {
        a.total_trades == b.total_trades
            && a.win_trades == b.win_trades
            && a.loss_trades == b.loss_trades
            && a.total_profit == b.total_profit
            && a.final_balance == b.final_balance
            && a.max_drawdown == b.max_drawdown
    };
    assert!(same_totals(&first.run, &second.run));
    assert_eq!(first.trades.len(), second.trades.len());

    let run = &first.run;
    assert!(first.trades.iter().all(|t| t.confidence >= 80.0));
    assert!(run.win_trades + run.loss_trades <= run.total_trades);
    assert!((run.final_balance - (run.initial_balance + run.total_profit)).abs() < 1e-6);
    assert_eq!(run.start_time, candles[0].timestamp);
    assert_eq!(run.end_time, candles[99].timestamp);

    // One position at a time: each entry follows the previous exit.
    for pair in first.trades.windows(2) {
        let exit = pair[0].exit_time.unwrap();
        assert!(pair[1].entry_time >= exit);
    }
    assert!(first.trades.iter().all(|t| t.status == TradeStatus::Closed));

    let runs = repository.backtest_runs().await;
    assert_eq!(runs.len(), 2);
    assert_eq!(repository.simulated_trades(first.run.id).await.len(), first.trades.len());
}

#[tokio::test]
async fn zero_threshold_takes_trades() {
    let settings = EngineSettings::default();
    let config = TradeConfig { confidence_threshold: 0.0, ..TradeConfig::default() };
    let repository = InMemoryRepository::new();
    let report = settings
        .backtest_runner()
        .run_and_save("SOLUSDT", Interval::Hour1, &replay_candles(), &config, &repository)
        .await
        .unwrap();
    assert!(report.run.total_trades > 0);
    assert!(report.trades.iter().all(|t| t.backtest_run_id == report.run.id));
}
