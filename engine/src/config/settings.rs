// Engine settings, loaded from a TOML file. Every field has a default so an
// empty file (or no file at all) yields a runnable configuration.
use serde::Deserialize;
use shared::models::{AccountId, Interval, TradeConfig};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{EngineError, EngineResult};

pub const DEFAULT_BYBIT_URL: &str = "https://api.bybit.com";

#[derive(Debug, Deserialize, Clone, PartialEq, Eq, Hash)]
pub struct TrackedPair {
    pub symbol: String,
    pub interval: Interval,
}

impl TrackedPair {
    pub fn new(symbol: impl Into<String>, interval: Interval) -> Self {
        TrackedPair { symbol: symbol.into(), interval }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PredictorSettings {
    /// In-process indicator scoring.
    Indicators,
    /// External model invoked as `<program> <args..> <symbol> <interval>`.
    Script {
        program: String,
        #[serde(default)]
        args: Vec<String>,
    },
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MarketSettings {
    Bybit {
        #[serde(default = "default_bybit_url")]
        base_url: String,
    },
    /// Directory of `<SYMBOL>_<interval>.csv` files.
    Csv { dir: PathBuf },
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SizingSettings {
    Fixed {
        #[serde(default = "default_fixed_quantity")]
        quantity: f64,
    },
    BalancePercent,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ScoringSettings {
    Votes,
    Majority,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct AccountSettings {
    pub id: AccountId,
    #[serde(default)]
    pub balance: Option<f64>,
    #[serde(default)]
    pub trade_config: TradeConfig,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct BacktestSettings {
    pub initial_balance: f64,
    /// Candles replayed before the first signal is evaluated.
    pub warmup: usize,
    pub close_on_opposite_signal: bool,
    pub close_at_end: bool,
}

impl Default for BacktestSettings {
    fn default() -> Self {
        BacktestSettings { initial_balance: 10_000.0, warmup: 26, close_on_opposite_signal: false, close_at_end: true }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EngineSettings {
    pub tick_interval_secs: u64,
    pub fetch_timeout_secs: u64,
    pub candle_limit: usize,
    pub pairs: Vec<TrackedPair>,
    pub predictor: PredictorSettings,
    pub market: MarketSettings,
    pub sizing: SizingSettings,
    pub scoring: ScoringSettings,
    pub accounts: Vec<AccountSettings>,
    pub backtest: BacktestSettings,
}

impl Default for EngineSettings {
    fn default() -> Self {
        EngineSettings {
            tick_interval_secs: 300,
            fetch_timeout_secs: 10,
            candle_limit: 100,
            pairs: vec![TrackedPair::new("ETHUSDT", Interval::Hour1), TrackedPair::new("SOLUSDT", Interval::Hour1)],
            predictor: PredictorSettings::Indicators,
            market: MarketSettings::Bybit { base_url: default_bybit_url() },
            sizing: SizingSettings::Fixed { quantity: default_fixed_quantity() },
            scoring: ScoringSettings::Votes,
            accounts: Vec::new(),
            backtest: BacktestSettings::default(),
        }
    }
}

impl EngineSettings {
    pub fn from_file(path: &Path) -> EngineResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        let settings = Self::from_toml_str(&raw)?;
        tracing::info!(path = %path.display(), accounts = settings.accounts.len(), pairs = settings.pairs.len(), "Loaded engine settings");
        Ok(settings)
    }

    pub fn from_toml_str(raw: &str) -> EngineResult<Self> {
        let settings: EngineSettings = toml::from_str(raw)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> EngineResult<()> {
        if self.tick_interval_secs == 0 {
            return Err(EngineError::ConfigError("tick_interval_secs must be positive".to_string()));
        }
        if self.fetch_timeout_secs == 0 {
            return Err(EngineError::ConfigError("fetch_timeout_secs must be positive".to_string()));
        }
        if self.candle_limit == 0 {
            return Err(EngineError::ConfigError("candle_limit must be positive".to_string()));
        }
        if let SizingSettings::Fixed { quantity } = self.sizing {
            if !(quantity > 0.0) {
                return Err(EngineError::ConfigError(format!("fixed sizing quantity must be positive, got {}", quantity)));
            }
        }
        for account in &self.accounts {
            account
                .trade_config
                .validate()
                .map_err(|msg| EngineError::ConfigError(format!("account {}: {}", account.id, msg)))?;
        }
        if !(self.backtest.initial_balance > 0.0) {
            return Err(EngineError::ConfigError("backtest.initial_balance must be positive".to_string()));
        }
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

fn default_bybit_url() -> String {
    DEFAULT_BYBIT_URL.to_string()
}

fn default_fixed_quantity() -> f64 {
    0.01
}
