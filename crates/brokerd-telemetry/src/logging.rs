//! Logging setup.
//!
//! The gateway logs through `tracing`; this module configures the
//! global subscriber once at startup from [`LogConfig`] (spec §6's
//! "logging sinks" are an external collaborator — this crate only
//! builds the subscriber the deployment wires up).

use std::path::PathBuf;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

use crate::error::{TelemetryError, TelemetryResult};

/// Human-readable vs. machine-parseable log output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Multi-line, colourised output for a terminal.
    Pretty,
    /// Single-line, for a terminal or a log aggregator that still wants
    /// plain text.
    Compact,
    /// Newline-delimited JSON, for structured log aggregation.
    Json,
}

/// Where log output is written.
#[derive(Debug, Clone)]
pub enum LogTarget {
    /// The process's stdout.
    Stdout,
    /// A rolling log file under the given directory.
    RollingFile {
        /// Directory the rolling appender writes into.
        directory: PathBuf,
        /// File name prefix.
        prefix: String,
    },
}

/// Logging configuration, built from the gateway's environment-variable
/// configuration (spec §6).
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Base level filter (`"info"`, `"debug"`, ...).
    level: String,
    /// Output encoding.
    format: LogFormat,
    /// Additional per-target directives (e.g. `"brokerd_session=trace"`).
    directives: Vec<String>,
    /// Where to write.
    target: LogTarget,
}

impl LogConfig {
    /// Start from a base level filter, defaulting to pretty stdout output.
    #[must_use]
    pub fn new(level: impl Into<String>) -> Self {
        Self { level: level.into(), format: LogFormat::Pretty, directives: Vec::new(), target: LogTarget::Stdout }
    }

    /// Set the output format.
    #[must_use]
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Add a per-target directive.
    #[must_use]
    pub fn with_directive(mut self, directive: impl Into<String>) -> Self {
        self.directives.push(directive.into());
        self
    }

    /// Write to a rolling file instead of stdout.
    #[must_use]
    pub fn with_target(mut self, target: LogTarget) -> Self {
        self.target = target;
        self
    }

    fn env_filter(&self) -> TelemetryResult<EnvFilter> {
        let mut filter = EnvFilter::try_new(&self.level).map_err(|e| TelemetryError::InvalidDirective(e.to_string()))?;
        for directive in &self.directives {
            let parsed = directive.parse().map_err(|_| TelemetryError::InvalidDirective(directive.clone()))?;
            filter = filter.add_directive(parsed);
        }
        Ok(filter)
    }
}

/// Install the global `tracing` subscriber from `config`.
///
/// Must be called at most once per process; a second call returns
/// [`TelemetryError::AlreadyInitialised`].
///
/// # Errors
///
/// Returns [`TelemetryError::InvalidDirective`] if `config`'s level or
/// directives don't parse, or [`TelemetryError::AlreadyInitialised`] if
/// a global subscriber is already set.
pub fn setup_logging(config: &LogConfig) -> TelemetryResult<()> {
    let filter = config.env_filter()?;
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_span_events(FmtSpan::CLOSE);

    let result = match (&config.format, &config.target) {
        (LogFormat::Json, LogTarget::Stdout) => builder.json().try_init(),
        (LogFormat::Compact, LogTarget::Stdout) => builder.compact().try_init(),
        (LogFormat::Pretty, LogTarget::Stdout) => builder.pretty().try_init(),
        (format, LogTarget::RollingFile { directory, prefix }) => {
            let appender = tracing_appender::rolling::daily(directory, prefix);
            let builder = tracing_subscriber::fmt().with_env_filter(config.env_filter()?).with_writer(appender);
            match format {
                LogFormat::Json => builder.json().try_init(),
                LogFormat::Compact => builder.compact().try_init(),
                LogFormat::Pretty => builder.try_init(),
            }
        }
    };

    result.map_err(|_| TelemetryError::AlreadyInitialised)
}

/// Install a sensible default: `info` level, pretty stdout output.
///
/// # Errors
///
/// See [`setup_logging`].
pub fn setup_default_logging() -> TelemetryResult<()> {
    setup_logging(&LogConfig::new("info"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_level_is_rejected_before_touching_the_global_subscriber() {
        let config = LogConfig::new("not_a_real_level!!");
        assert!(matches!(config.env_filter(), Err(TelemetryError::InvalidDirective(_))));
    }

    #[test]
    fn builder_methods_compose() {
        let config = LogConfig::new("debug").with_format(LogFormat::Json).with_directive("brokerd_session=trace");
        assert!(config.env_filter().is_ok());
    }
}
