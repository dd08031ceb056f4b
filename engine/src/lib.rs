// Engine library root: signal generation, risk gating, trade lifecycle,
// scheduling and backtest replay.

pub mod activity;
pub mod config;
pub mod data;
pub mod error;
pub mod indicators;
pub mod persistence;
pub mod predictor;
pub mod risk;
pub mod services;
pub mod signal;
pub mod trading;
