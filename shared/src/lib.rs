// Data model shared by the live engine and the backtest runner.
pub mod models;
pub mod utils;
