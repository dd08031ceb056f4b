pub mod components;
pub mod settings;

pub use settings::{
    AccountSettings, BacktestSettings, EngineSettings, MarketSettings, PredictorSettings, ScoringSettings,
    SizingSettings, TrackedPair,
};
