use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("CSV parsing system error: {source}")]
    CsvSystemError {
        #[from]
        source: csv::Error,
    },

    #[error("I/O error: {source}")]
    IoError {
        #[from]
        source: std::io::Error,
    },

    #[error("CSV data format error: {0}")]
    CsvDataFormatError(String),

    #[error("Market data error: {0}")]
    MarketDataError(String),

    #[error("HTTP error: {source}")]
    HttpError {
        #[from]
        source: reqwest::Error,
    },

    #[error("JSON error: {source}")]
    JsonError {
        #[from]
        source: serde_json::Error,
    },

    #[error("TOML error: {source}")]
    TomlError {
        #[from]
        source: toml::de::Error,
    },

    #[error("Timed out after {0:?} waiting for {1}")]
    Timeout(std::time::Duration, String),

    #[error("Prediction error: {0}")]
    PredictionError(String),

    #[error("Persistence error: {0}")]
    PersistenceError(String),

    #[error(transparent)]
    AnyhowError(#[from] anyhow::Error),
}

impl EngineError {
    /// Failures that clear up on their own; the affected instrument is retried next tick.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            EngineError::HttpError { .. } | EngineError::Timeout(..) | EngineError::MarketDataError(_)
        )
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
