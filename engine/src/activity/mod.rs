// Account-scoped activity log. Entries go to tracing and, when a repository
// is wired in, to the persisted bot log.
use async_trait::async_trait;
use serde_json::Value;
use shared::models::{AccountId, LogLevel};
use std::sync::Arc;

/// Logging never fails the caller; sinks swallow their own errors.
#[async_trait]
pub trait ActivityLog: Send + Sync {
    async fn log(&self, account_id: AccountId, level: LogLevel, message: &str, metadata: Value);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TracingActivityLog;

#[async_trait]
impl ActivityLog for TracingActivityLog {
    async fn log(&self, account_id: AccountId, level: LogLevel, message: &str, metadata: Value) {
        match level {
            LogLevel::Info => tracing::info!(account_id, %metadata, "{}", message),
            LogLevel::Warning => tracing::warn!(account_id, %metadata, "{}", message),
            LogLevel::Error => tracing::error!(account_id, %metadata, "{}", message),
        }
    }
}

/// Fans every entry out to each sink in order.
#[derive(Clone, Default)]
pub struct CompositeActivityLog {
    sinks: Vec<Arc<dyn ActivityLog>>,
}

impl CompositeActivityLog {
    pub fn new(sinks: Vec<Arc<dyn ActivityLog>>) -> Self {
        CompositeActivityLog { sinks }
    }

    pub fn with(mut self, sink: Arc<dyn ActivityLog>) -> Self {
        self.sinks.push(sink);
        self
    }
}

#[async_trait]
impl ActivityLog for CompositeActivityLog {
    async fn log(&self, account_id: AccountId, level: LogLevel, message: &str, metadata: Value) {
        for sink in &self.sinks {
            sink.log(account_id, level, message, metadata.clone()).await;
        }
    }
}
