use std::collections::BTreeMap;
use std::str::FromStr;
use std::time::Instant;

use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

use crate::error::DenoiserError;

/// Logging configuration
#[derive(Debug, Clone, PartialEq)]
pub struct LogConfig {
    pub level: Level,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            level: Level::INFO,
            format: LogFormat::Compact,
        }
    }
}

impl FromStr for LogFormat {
    type Err = DenoiserError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "compact" => Ok(LogFormat::Compact),
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            _ => Err(DenoiserError::InvalidParameter(format!(
                "Unknown log format: {}. Use pretty, compact or json",
                s
            ))),
        }
    }
}

/// Install a tracing subscriber. `log` records from the library are forwarded to it.
pub fn init_logging(config: LogConfig) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.to_string().to_lowercase()));

    let fmt_layer = match config.format {
        LogFormat::Compact => fmt::layer().compact().with_span_events(FmtSpan::CLOSE).boxed(),
        LogFormat::Pretty => fmt::layer().pretty().with_span_events(FmtSpan::CLOSE).boxed(),
        LogFormat::Json => fmt::layer().json().with_span_events(FmtSpan::CLOSE).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()?;

    Ok(())
}

/// Plain env_logger output at `info` unless `RUST_LOG` says otherwise.
pub fn init_simple_logger() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .format_target(false)
        .try_init();
}

/// Operation logger for tracking a long running operation
pub struct OperationLogger {
    operation_id: String,
    start_time: Instant,
    metadata: BTreeMap<String, String>,
}

impl OperationLogger {
    pub fn new(operation_id: impl Into<String>) -> Self {
        let operation_id = operation_id.into();
        tracing::debug!(operation_id = %operation_id, "Operation started");

        OperationLogger {
            operation_id,
            start_time: Instant::now(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn add_metadata(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.metadata.insert(key.into(), value.into());
    }

    pub fn metadata(&self) -> &BTreeMap<String, String> {
        &self.metadata
    }

    pub fn log_progress(&self, message: impl AsRef<str>) {
        let elapsed = self.start_time.elapsed();
        tracing::debug!(
            operation_id = %self.operation_id,
            elapsed_ms = elapsed.as_millis() as u64,
            message = %message.as_ref(),
            "Operation progress"
        );
    }

    pub fn log_error(&self, error: &dyn std::error::Error) {
        let elapsed = self.start_time.elapsed();
        tracing::error!(
            operation_id = %self.operation_id,
            elapsed_ms = elapsed.as_millis() as u64,
            error = %error,
            "Operation failed"
        );
    }

    pub fn complete(self) {
        let elapsed = self.start_time.elapsed();
        tracing::info!(
            operation_id = %self.operation_id,
            elapsed_ms = elapsed.as_millis() as u64,
            metadata = ?self.metadata,
            "Operation completed"
        );
    }
}
