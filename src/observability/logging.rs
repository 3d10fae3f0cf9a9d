//! Logging setup on top of `tracing-subscriber`.

use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::errors::{PlanStreamError, PlanStreamResult};

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// The minimum log level to capture
    pub level: LogLevel,
    /// The output format for log messages
    pub format: LogFormat,
    /// Whether to include timestamps in log output
    pub include_timestamps: bool,
    /// Whether to include the module target in log output
    pub include_target: bool,
    /// Whether to include file and line number in log output
    pub include_file_line: bool,
}

/// Log level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Trace-level logging (per-chunk detail)
    Trace,
    /// Debug-level logging
    Debug,
    /// Info-level logging
    Info,
    /// Warning-level logging
    Warn,
    /// Error-level logging
    Error,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

impl From<LogLevel> for tracing::level_filters::LevelFilter {
    fn from(level: LogLevel) -> Self {
        Self::from_level(level.into())
    }
}

impl std::str::FromStr for LogLevel {
    type Err = PlanStreamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            other => Err(PlanStreamError::Configuration {
                message: format!("Unknown log level '{other}'"),
            }),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable format with colors (for development)
    Pretty,
    /// JSON format (for structured logging in production)
    Json,
    /// Compact format
    Compact,
}

impl std::str::FromStr for LogFormat {
    type Err = PlanStreamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            "compact" => Ok(LogFormat::Compact),
            other => Err(PlanStreamError::Configuration {
                message: format!("Unknown log format '{other}'"),
            }),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Pretty,
            include_timestamps: true,
            include_target: true,
            include_file_line: false,
        }
    }
}

impl LoggingConfig {
    /// Creates a new logging configuration with default settings.
    ///
    /// # Examples
    ///
    /// ```
    /// use plan_stream::observability::{LoggingConfig, LogLevel, LogFormat};
    ///
    /// let config = LoggingConfig::new();
    /// assert_eq!(config.level, LogLevel::Info);
    /// assert_eq!(config.format, LogFormat::Pretty);
    /// ```
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads `PLAN_STREAM_LOG_LEVEL` and `PLAN_STREAM_LOG_FORMAT`, falling
    /// back to the defaults for unset variables.
    pub fn from_env() -> PlanStreamResult<Self> {
        let mut config = Self::default();

        if let Ok(level) = std::env::var("PLAN_STREAM_LOG_LEVEL") {
            config.level = level.parse()?;
        }

        if let Ok(format) = std::env::var("PLAN_STREAM_LOG_FORMAT") {
            config.format = format.parse()?;
        }

        Ok(config)
    }

    /// Sets the log level.
    #[must_use]
    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    /// Sets the log format.
    #[must_use]
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Sets whether to include timestamps.
    #[must_use]
    pub fn with_timestamps(mut self, include: bool) -> Self {
        self.include_timestamps = include;
        self
    }

    /// Sets whether to include the module target.
    #[must_use]
    pub fn with_target(mut self, include: bool) -> Self {
        self.include_target = include;
        self
    }

    /// Sets whether to include file and line number.
    #[must_use]
    pub fn with_file_line(mut self, include: bool) -> Self {
        self.include_file_line = include;
        self
    }

    /// Installs the global subscriber.
    ///
    /// `RUST_LOG` directives are honored on top of the configured level.
    ///
    /// ```no_run
    /// use plan_stream::observability::{LoggingConfig, LogLevel};
    ///
    /// # fn main() -> Result<(), plan_stream::PlanStreamError> {
    /// LoggingConfig::new()
    ///     .with_level(LogLevel::Debug)
    ///     .init()?;
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    ///
    /// Returns a configuration error if a global subscriber is already set.
    pub fn init(self) -> PlanStreamResult<()> {
        let filter = EnvFilter::from_default_env().add_directive(
            tracing::level_filters::LevelFilter::from(self.level).into(),
        );

        let registry = tracing_subscriber::registry().with(filter);

        let result = match (self.format, self.include_timestamps) {
            (LogFormat::Pretty, true) => registry
                .with(
                    fmt::layer()
                        .with_ansi(true)
                        .with_target(self.include_target)
                        .with_file(self.include_file_line)
                        .with_line_number(self.include_file_line),
                )
                .try_init(),
            (LogFormat::Pretty, false) => registry
                .with(
                    fmt::layer()
                        .with_ansi(true)
                        .without_time()
                        .with_target(self.include_target)
                        .with_file(self.include_file_line)
                        .with_line_number(self.include_file_line),
                )
                .try_init(),
            (LogFormat::Json, _) => registry
                .with(
                    fmt::layer()
                        .json()
                        .with_target(self.include_target)
                        .with_file(self.include_file_line)
                        .with_line_number(self.include_file_line),
                )
                .try_init(),
            (LogFormat::Compact, true) => registry
                .with(fmt::layer().compact().with_target(self.include_target))
                .try_init(),
            (LogFormat::Compact, false) => registry
                .with(
                    fmt::layer()
                        .compact()
                        .without_time()
                        .with_target(self.include_target),
                )
                .try_init(),
        };

        result.map_err(|e| PlanStreamError::Configuration {
            message: format!("Failed to install tracing subscriber: {e}"),
        })
    }
}
