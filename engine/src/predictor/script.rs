use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use shared::models::{IndicatorSet, Interval, Signal, SignalAction};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

use super::Predictor;
use crate::error::{EngineError, EngineResult};

/// Output contract of an external model: one JSON object on stdout.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScriptOutput {
    #[serde(alias = "action")]
    prediction: Option<SignalAction>,
    confidence: Option<f64>,
    #[serde(alias = "price")]
    current_price: Option<f64>,
    #[serde(default)]
    indicators: IndicatorSet,
    timestamp: Option<String>,
    error: Option<String>,
}

/// Runs `<program> <args..> <symbol> <interval>` and reads its verdict.
pub struct ScriptPredictor {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl ScriptPredictor {
    pub fn new(program: impl Into<String>, args: Vec<String>, timeout: Duration) -> Self {
        ScriptPredictor { program: program.into(), args, timeout }
    }
}

#[async_trait]
impl Predictor for ScriptPredictor {
    fn name(&self) -> &str {
        "script"
    }

    async fn predict(&self, symbol: &str, interval: Interval) -> EngineResult<Signal> {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .arg(symbol)
            .arg(interval.as_str())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, command.output())
            .await
            .map_err(|_| EngineError::Timeout(self.timeout, format!("prediction for {} {}", symbol, interval)))??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(EngineError::PredictionError(format!(
                "{} exited with {} for {} {}: {}",
                self.program,
                output.status,
                symbol,
                interval,
                stderr.trim()
            )));
        }
        parse_prediction(&String::from_utf8_lossy(&output.stdout), symbol, interval)
    }
}

pub fn parse_prediction(stdout: &str, symbol: &str, interval: Interval) -> EngineResult<Signal> {
    let output: ScriptOutput = serde_json::from_str(stdout.trim())
        .map_err(|e| EngineError::PredictionError(format!("Unreadable prediction for {} {}: {}", symbol, interval, e)))?;

    if let Some(error) = output.error {
        return Err(EngineError::PredictionError(format!("Model failed for {} {}: {}", symbol, interval, error)));
    }
    let missing = |field: &str| EngineError::PredictionError(format!("Prediction for {} {} lacks '{}'", symbol, interval, field));
    let action = output.prediction.ok_or_else(|| missing("prediction"))?;
    let confidence = output.confidence.ok_or_else(|| missing("confidence"))?;
    let price = output.current_price.ok_or_else(|| missing("currentPrice"))?;
    if !(0.0..=100.0).contains(&confidence) {
        return Err(EngineError::PredictionError(format!("Confidence {} for {} {} is outside 0..=100", confidence, symbol, interval)));
    }
    if !(price.is_finite() && price > 0.0) {
        return Err(EngineError::PredictionError(format!("Price {} for {} {} is not usable", price, symbol, interval)));
    }

    let timestamp = output
        .timestamp
        .as_deref()
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(Utc::now);

    Ok(Signal {
        symbol: symbol.to_string(),
        interval,
        action,
        confidence,
        price,
        indicators: output.indicators,
        timestamp,
    })
}
