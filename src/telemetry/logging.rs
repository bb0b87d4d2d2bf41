//! Logging subscriber setup.

use crate::config::LoggingConfig;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Multi-line human output
    Pretty,
    /// Single-line output
    #[default]
    Compact,
    /// One JSON object per event
    Json,
}

impl FromStr for LogFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "compact" => Ok(LogFormat::Compact),
            "json" => Ok(LogFormat::Json),
            other => Err(Error::InvalidConfig {
                key: "logging.format".to_string(),
                message: format!("unknown log format '{}'", other),
            }),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogFormat::Pretty => write!(f, "pretty"),
            LogFormat::Compact => write!(f, "compact"),
            LogFormat::Json => write!(f, "json"),
        }
    }
}

/// Builder for the global tracing subscriber.
#[derive(Debug, Clone)]
pub struct LoggingBuilder {
    level: String,
    format: LogFormat,
    ansi: bool,
    with_target: bool,
    with_spans: bool,
}

impl LoggingBuilder {
    /// Create a builder logging warnings in compact format.
    pub fn new() -> Self {
        Self {
            level: "warn".to_string(),
            format: LogFormat::Compact,
            ansi: true,
            with_target: false,
            with_spans: false,
        }
    }

    /// Create a builder from the `[logging]` configuration section.
    pub fn from_config(config: &LoggingConfig) -> Result<Self> {
        Ok(Self {
            level: config.level.clone(),
            format: config.format.parse()?,
            with_target: config.with_target,
            ..Self::new()
        })
    }

    /// Set the level directive.
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    /// Raise the level according to a `-v` count. Zero keeps the current
    /// level.
    pub fn with_verbosity(self, verbosity: u8) -> Self {
        match verbosity {
            0 => self,
            1 => self.with_level("info"),
            2 => self.with_level("debug"),
            _ => self.with_level("trace"),
        }
    }

    /// Set the output format.
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Enable or disable ANSI colors.
    pub fn with_ansi(mut self, enabled: bool) -> Self {
        self.ansi = enabled;
        self
    }

    /// Log span open and close events.
    pub fn with_spans(mut self, enabled: bool) -> Self {
        self.with_spans = enabled;
        self
    }

    /// The level directive used when `RUST_LOG` is unset.
    pub fn level(&self) -> &str {
        &self.level
    }

    /// The output format.
    pub fn format(&self) -> LogFormat {
        self.format
    }

    fn build_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&self.level))
            .unwrap_or_else(|_| EnvFilter::new("warn"))
    }

    fn span_events(&self) -> FmtSpan {
        if self.with_spans {
            FmtSpan::NEW | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        }
    }

    /// Install the subscriber. Logs go to stderr so that command output on
    /// stdout stays machine readable.
    pub fn init(self) -> Result<()> {
        let filter = self.build_filter();
        let registry = tracing_subscriber::registry().with(filter);

        let result = match self.format {
            LogFormat::Pretty => registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .pretty()
                        .with_writer(std::io::stderr)
                        .with_ansi(self.ansi)
                        .with_target(self.with_target)
                        .with_span_events(self.span_events()),
                )
                .try_init(),
            LogFormat::Compact => registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .compact()
                        .with_writer(std::io::stderr)
                        .with_ansi(self.ansi)
                        .with_target(self.with_target)
                        .with_span_events(self.span_events()),
                )
                .try_init(),
            LogFormat::Json => registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(std::io::stderr)
                        .with_current_span(self.with_spans)
                        .with_span_list(self.with_spans)
                        .with_target(self.with_target),
                )
                .try_init(),
        };

        result.map_err(|e| Error::Config(e.to_string()))
    }
}

impl Default for LoggingBuilder {
    fn default() -> Self {
        Self::new()
    }
}
