use std::io::IsTerminal;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// The names of all workspace crates, used to raise their default filter level.
const CRATE_NAMES: &[&str] = &[
    "floodgate",
    "floodgate_common",
    "floodgate_config",
    "floodgate_log",
    "floodgate_metrics",
    "floodgate_server",
    "floodgate_statsd",
];

/// Controls the log format.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Auto detect the best format.
    ///
    /// This chooses [`LogFormat::Pretty`] for TTY, otherwise [`LogFormat::Simplified`].
    #[default]
    Auto,

    /// Pretty printing with colors.
    Pretty,

    /// Simplified plain text output.
    Simplified,

    /// Dump out JSON lines.
    Json,
}

/// The logging level parsed from configuration.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Log only error messages.
    Error,
    /// Log errors and warnings.
    Warn,
    /// Log informational messages and above. The default.
    Info,
    /// Log debug messages and above.
    Debug,
    /// Log everything.
    Trace,
}

impl LogLevel {
    fn as_tracing(self) -> Level {
        match self {
            Self::Error => Level::ERROR,
            Self::Warn => Level::WARN,
            Self::Info => Level::INFO,
            Self::Debug => Level::DEBUG,
            Self::Trace => Level::TRACE,
        }
    }
}

/// Controls the logging system.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct LogConfig {
    /// The log level for workspace crates.
    pub level: LogLevel,

    /// Controls the log output format.
    ///
    /// Defaults to [`LogFormat::Auto`], which detects the best format based on the TTY.
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Auto,
        }
    }
}

/// Initializes the logging system.
///
/// The `RUST_LOG` environment variable, when set, takes precedence over the
/// configured level. Repeated calls after the first are no-ops, which keeps the
/// function safe to use from tests.
pub fn init(config: &LogConfig) {
    let filter = match std::env::var(EnvFilter::DEFAULT_ENV) {
        Ok(directives) => {
            EnvFilter::from_str(&directives).unwrap_or_else(|_| default_filter(config.level))
        }
        Err(_) => default_filter(config.level),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    let format = match config.format {
        LogFormat::Auto if std::io::stderr().is_terminal() => LogFormat::Pretty,
        LogFormat::Auto => LogFormat::Simplified,
        other => other,
    };

    let result = match format {
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Simplified => builder.with_ansi(false).try_init(),
        LogFormat::Json => builder.json().flatten_event(true).try_init(),
        LogFormat::Auto => unreachable!(),
    };

    // An already installed subscriber (e.g. in tests) wins.
    result.ok();
}

/// Configures third-party crates at `INFO` and workspace crates at the given level.
fn default_filter(level: LogLevel) -> EnvFilter {
    let mut filter = EnvFilter::new("info");
    for name in CRATE_NAMES {
        filter = filter.add_directive(
            format!("{name}={}", level.as_tracing())
                .parse()
                .expect("static filter directive"),
        );
    }
    filter
}
