// Turns settings into the trait objects the services run on.
use std::sync::Arc;
use tokio::sync::RwLock;

use super::settings::{EngineSettings, MarketSettings, PredictorSettings, ScoringSettings, SizingSettings};
use crate::data::bybit::BybitClient;
use crate::data::market_data::MarketDataStore;
use crate::data::MarketDataSource;
use crate::error::EngineResult;
use crate::predictor::{IndicatorPredictor, Predictor, ScriptPredictor};
use crate::risk::{BalancePercent, FixedQuantity, RiskGate, SizingPolicy};
use crate::services::BacktestRunner;
use crate::signal::{MajorityVoteScoring, ScoringPolicy, SignalGenerator, VoteScoring};

impl EngineSettings {
    pub fn scoring_policy(&self) -> Box<dyn ScoringPolicy> {
        match self.scoring {
            ScoringSettings::Votes => Box::new(VoteScoring),
            ScoringSettings::Majority => Box::new(MajorityVoteScoring),
        }
    }

    pub fn sizing_policy(&self) -> Box<dyn SizingPolicy> {
        match self.sizing {
            SizingSettings::Fixed { quantity } => Box::new(FixedQuantity(quantity)),
            SizingSettings::BalancePercent => Box::new(BalancePercent::default()),
        }
    }

    pub fn signal_generator(&self) -> SignalGenerator {
        SignalGenerator::new(self.scoring_policy())
    }

    pub fn risk_gate(&self) -> RiskGate {
        RiskGate::new(self.sizing_policy())
    }

    pub fn market_source(&self) -> EngineResult<Arc<dyn MarketDataSource>> {
        match &self.market {
            MarketSettings::Bybit { base_url } => Ok(Arc::new(BybitClient::new(base_url.clone(), self.fetch_timeout())?)),
            MarketSettings::Csv { dir } => {
                let store = MarketDataStore::load_directory(dir, &self.pairs)?;
                Ok(Arc::new(RwLock::new(store)))
            }
        }
    }

    pub fn predictor(&self, market: Arc<dyn MarketDataSource>) -> Arc<dyn Predictor> {
        match &self.predictor {
            PredictorSettings::Indicators => Arc::new(IndicatorPredictor::new(market, self.signal_generator(), self.candle_limit)),
            PredictorSettings::Script { program, args } => {
                Arc::new(ScriptPredictor::new(program.clone(), args.clone(), self.fetch_timeout()))
            }
        }
    }

    pub fn backtest_runner(&self) -> BacktestRunner {
        BacktestRunner::new(self.signal_generator(), self.risk_gate(), self.backtest.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policies_follow_settings() {
        let settings = EngineSettings::from_toml_str("scoring = \"majority\"\n[sizing]\nkind = \"balance_percent\"").unwrap();
        assert_eq!(settings.signal_generator().policy_name(), "majority");
        assert_eq!(settings.risk_gate().sizing_name(), "balance_percent");

        let defaults = EngineSettings::default();
        assert_eq!(defaults.signal_generator().policy_name(), "votes");
        assert_eq!(defaults.risk_gate().sizing_name(), "fixed");
    }

    #[test]
    fn predictor_follows_settings() {
        let settings = EngineSettings::from_toml_str("[predictor]\nkind = \"script\"\nprogram = \"python3\"").unwrap();
        let market: Arc<dyn MarketDataSource> = Arc::new(RwLock::new(MarketDataStore::new()));
        assert_eq!(settings.predictor(market.clone()).name(), "script");
        assert_eq!(EngineSettings::default().predictor(market).name(), "indicators");
    }

    #[test]
    fn csv_market_requires_files() {
        let dir = tempfile::tempdir().unwrap();
        let raw = format!("[market]\nkind = \"csv\"\ndir = {:?}", dir.path().display().to_string());
        let settings = EngineSettings::from_toml_str(&raw).unwrap();
        assert!(settings.market_source().is_err());
    }
}
