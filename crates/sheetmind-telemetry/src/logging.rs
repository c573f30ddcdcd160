//! Tracing subscriber setup.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::error::{TelemetryError, TelemetryResult};

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable, multi-line, for local development.
    Pretty,
    /// Single-line compact text.
    Compact,
    /// Structured JSON, one object per line, for production ingestion.
    Json,
}

/// Where log lines are written.
#[derive(Debug, Clone)]
pub enum LogTarget {
    /// Standard error (the default).
    Stderr,
    /// A rolling daily file under `directory`, named `prefix.<date>`.
    File {
        /// Directory the rolling file lives in.
        directory: String,
        /// File name prefix.
        prefix: String,
    },
}

/// Logging setup parameters.
#[derive(Debug, Clone)]
pub struct LogConfig {
    level: String,
    format: LogFormat,
    target: LogTarget,
    directives: Vec<String>,
}

impl LogConfig {
    /// Start from a base level (`"info"`, `"debug"`, `"astrid_engine=debug,warn"`, …).
    #[must_use]
    pub fn new(level: impl Into<String>) -> Self {
        Self {
            level: level.into(),
            format: LogFormat::Pretty,
            target: LogTarget::Stderr,
            directives: Vec::new(),
        }
    }

    /// Set the output format.
    #[must_use]
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Write to a rolling file instead of stderr.
    #[must_use]
    pub fn with_file_target(mut self, directory: impl Into<String>, prefix: impl Into<String>) -> Self {
        self.target = LogTarget::File { directory: directory.into(), prefix: prefix.into() };
        self
    }

    /// Add an extra per-module filter directive (e.g. `"sheetmind_llm=trace"`).
    #[must_use]
    pub fn with_directive(mut self, directive: impl Into<String>) -> Self {
        self.directives.push(directive.into());
        self
    }

    fn env_filter(&self) -> TelemetryResult<EnvFilter> {
        let mut spec = self.level.clone();
        for directive in &self.directives {
            spec.push(',');
            spec.push_str(directive);
        }
        EnvFilter::try_new(spec).map_err(|e| TelemetryError::ConfigError(e.to_string()))
    }
}

/// Initialise the global tracing subscriber from `config`.
///
/// # Errors
///
/// Returns [`TelemetryError::ConfigError`] if the level/directive spec
/// fails to parse, or [`TelemetryError::InitError`] if a subscriber is
/// already installed.
pub fn setup_logging(config: &LogConfig) -> TelemetryResult<()> {
    let filter = config.env_filter()?;

    let (non_blocking, guard) = match &config.target {
        LogTarget::Stderr => tracing_appender::non_blocking(std::io::stderr()),
        LogTarget::File { directory, prefix } => {
            let appender = tracing_appender::rolling::daily(directory, prefix);
            tracing_appender::non_blocking(appender)
        },
    };
    // Leak the guard: the subscriber must outlive this function, and
    // there is exactly one per process.
    std::mem::forget(guard);

    let fmt_layer: Box<dyn Layer<tracing_subscriber::Registry> + Send + Sync> = match config.format {
        LogFormat::Pretty => Box::new(tracing_subscriber::fmt::layer().pretty().with_writer(non_blocking)),
        LogFormat::Compact => Box::new(tracing_subscriber::fmt::layer().compact().with_writer(non_blocking)),
        LogFormat::Json => Box::new(tracing_subscriber::fmt::layer().json().with_writer(non_blocking)),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| TelemetryError::InitError(e.to_string()))
}

/// Initialise logging with sane defaults: `info` level, pretty format to
/// stderr, JSON when `json` is set (the production posture).
///
/// # Errors
///
/// See [`setup_logging`].
pub fn setup_default_logging(json: bool) -> TelemetryResult<()> {
    let format = if json { LogFormat::Json } else { LogFormat::Pretty };
    setup_logging(&LogConfig::new("info").with_format(format))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_filter_includes_extra_directives() {
        let config = LogConfig::new("info").with_directive("sheetmind_engine=debug");
        let filter = config.env_filter().unwrap();
        assert!(filter.to_string().contains("sheetmind_engine=debug"));
    }
}
