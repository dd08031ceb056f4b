pub mod lifecycle;
pub mod manager;

pub use lifecycle::{apply_cancel, apply_close, effective_change_pct, evaluate_exit, exit_at, ExitDecision, Transition};
pub use manager::{MonitorReport, PriceSnapshot, TradeLifecycleManager};
