// Prediction sources. The scheduler only sees `Predictor`; whether the signal
// comes from in-process indicator scoring or an external model is config.
pub mod indicator;
pub mod script;

pub use indicator::IndicatorPredictor;
pub use script::ScriptPredictor;

use async_trait::async_trait;
use shared::models::{Interval, Signal};

use crate::error::EngineResult;

#[async_trait]
pub trait Predictor: Send + Sync {
    fn name(&self) -> &str;

    /// A fresh signal for the latest closed candle. Hold is a valid answer.
    async fn predict(&self, symbol: &str, interval: Interval) -> EngineResult<Signal>;
}
