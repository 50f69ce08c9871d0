use std::fmt;
use std::fs;
use std::net::{SocketAddr, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::time::Duration;

use floodgate_log::LogConfig;
use floodgate_metrics::{DelayThreshold, IngestionWindow};
use serde::{Deserialize, Serialize};

/// Indicates config related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to open the file.
    #[error("could not open config file at {1:?}")]
    CouldNotOpenFile(#[source] std::io::Error, PathBuf),

    /// Failed to parse the file contents.
    #[error("could not parse yaml config file at {1:?}")]
    BadYaml(#[source] serde_yaml::Error, PathBuf),

    /// Failed to interpret a JSON value as configuration.
    #[error("could not interpret json as config")]
    BadJson(#[source] serde_json::Error),

    /// A config value is present but unusable.
    #[error("invalid config value for '{0}'")]
    InvalidValue(&'static str),
}

/// Controls the HTTP server.
#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
struct Http {
    /// The interface to bind to.
    host: String,
    /// The port to bind to.
    port: u16,
}

impl Default for Http {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_owned(),
            port: 19000,
        }
    }
}

/// Controls the ingestion pipeline.
#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
struct Ingestion {
    /// How far in the past a collection timestamp may lie, in milliseconds.
    before_current_collectiontime_ms: u64,
    /// How far in the future a collection timestamp may lie, in milliseconds.
    after_current_collectiontime_ms: u64,
    /// Grace period before a late metric is reported to the tracker, in milliseconds.
    tracker_delayed_metrics_millis: u64,
    /// The delay already absorbed by short-delay rollups, in milliseconds.
    short_delay_metrics_rollup_delay_millis: u64,
    /// The bounded wait for the persistence layer, in milliseconds.
    persist_timeout_ms: u64,
    /// The maximum accepted request body size, in bytes.
    max_payload_bytes: usize,
    /// The retention assigned to ingested metrics, in seconds.
    ttl_seconds: u64,
    /// When enabled, overrides every client-supplied TTL with `ttl_seconds`.
    force_ttls: bool,
    /// The assumed agent flush interval for rate derivation, in milliseconds.
    flush_interval_ms: u64,
}

impl Default for Ingestion {
    fn default() -> Self {
        Self {
            before_current_collectiontime_ms: 259_200_000, // 3 days
            after_current_collectiontime_ms: 600_000,      // 10 minutes
            tracker_delayed_metrics_millis: 300_000,
            short_delay_metrics_rollup_delay_millis: 300_000,
            persist_timeout_ms: 5_000,
            max_payload_bytes: 1_048_576,
            ttl_seconds: 432_000, // 5 days
            force_ttls: false,
            flush_interval_ms: 15_000,
        }
    }
}

/// Controls internal statsd reporting.
#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
struct Statsd {
    /// The statsd host to report to. Reporting is disabled when unset.
    host: Option<String>,
    /// The prefix prepended to all metric names.
    prefix: String,
}

impl Default for Statsd {
    fn default() -> Self {
        Self {
            host: None,
            prefix: "floodgate".to_owned(),
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct ConfigValues {
    http: Http,
    ingestion: Ingestion,
    logging: LogConfig,
    statsd: Statsd,
}

/// Config holds the process-wide configuration, read-only after process start.
pub struct Config {
    values: ConfigValues,
    path: PathBuf,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("path", &self.path)
            .field("values", &self.values)
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            values: ConfigValues::default(),
            path: PathBuf::new(),
        }
    }
}

impl Config {
    /// Loads the configuration from the given YAML file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .map_err(|error| ConfigError::CouldNotOpenFile(error, path.to_owned()))?;

        let values = serde_yaml::from_str(&contents)
            .map_err(|error| ConfigError::BadYaml(error, path.to_owned()))?;

        Ok(Self {
            values,
            path: path.to_owned(),
        })
    }

    /// Creates a config from a JSON value. Mainly used for tests.
    pub fn from_json_value(value: serde_json::Value) -> Result<Self, ConfigError> {
        Ok(Self {
            values: serde_json::from_value(value).map_err(ConfigError::BadJson)?,
            path: PathBuf::new(),
        })
    }

    /// The path the configuration was loaded from. Empty for defaults.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Dumps the effective configuration as YAML.
    pub fn to_yaml_string(&self) -> Result<String, ConfigError> {
        serde_yaml::to_string(&self.values)
            .map_err(|error| ConfigError::BadYaml(error, self.path.clone()))
    }

    /// The socket address the HTTP server binds to.
    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        (self.values.http.host.as_str(), self.values.http.port)
            .to_socket_addrs()
            .map_err(|_| ConfigError::InvalidValue("http.host"))?
            .next()
            .ok_or(ConfigError::InvalidValue("http.host"))
    }

    /// The tolerated collection timestamp window around ingestion time.
    pub fn ingestion_window(&self) -> IngestionWindow {
        IngestionWindow {
            past: Duration::from_millis(self.values.ingestion.before_current_collectiontime_ms),
            future: Duration::from_millis(self.values.ingestion.after_current_collectiontime_ms),
        }
    }

    /// The threshold after which a metric counts as delayed.
    pub fn delay_threshold(&self) -> DelayThreshold {
        DelayThreshold {
            tracker_delay: Duration::from_millis(self.values.ingestion.tracker_delayed_metrics_millis),
            short_rollup_delay: Duration::from_millis(
                self.values.ingestion.short_delay_metrics_rollup_delay_millis,
            ),
        }
    }

    /// The bounded wait applied to persistence submissions.
    pub fn persist_timeout(&self) -> Duration {
        Duration::from_millis(self.values.ingestion.persist_timeout_ms)
    }

    /// The maximum accepted request body size in bytes.
    pub fn max_payload_bytes(&self) -> usize {
        self.values.ingestion.max_payload_bytes
    }

    /// The retention assigned to ingested metrics, in seconds.
    pub fn ingestion_ttl_seconds(&self) -> u64 {
        self.values.ingestion.ttl_seconds
    }

    /// Whether client-supplied TTLs are overridden unconditionally.
    pub fn force_ttls(&self) -> bool {
        self.values.ingestion.force_ttls
    }

    /// The assumed agent flush interval in milliseconds.
    pub fn flush_interval_millis(&self) -> u64 {
        self.values.ingestion.flush_interval_ms
    }

    /// The logging configuration.
    pub fn logging(&self) -> &LogConfig {
        &self.values.logging
    }

    /// The statsd host to report internal metrics to, if any.
    pub fn statsd_host(&self) -> Option<&str> {
        self.values.statsd.host.as_deref()
    }

    /// The prefix for internal metric names.
    pub fn statsd_prefix(&self) -> &str {
        &self.values.statsd.prefix
    }
}
