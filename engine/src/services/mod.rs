// Long-running and on-demand drivers: the per-account cycle scheduler and
// the backtest replay.
pub mod backtest;
pub mod metrics;
pub mod scheduler;

pub use backtest::{BacktestReport, BacktestRunner};
pub use scheduler::{Account, CycleScheduler, PairOutcome, SchedulerHandle, TickOutcome, TickReport};
