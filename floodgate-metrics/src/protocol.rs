//! The canonical metric representation and the raw per-metric JSON batch format.

use std::fmt;

use floodgate_common::UnixTimestamp;
use serde::{Deserialize, Serialize};

use crate::validation::{DelayThreshold, IngestionWindow};

/// Type used for hashed set members.
pub type SetType = u32;

/// A numeric metric value resolved to its narrowest exact representation.
///
/// Wire payloads carry lazily typed numbers. A literal that parses as an integer
/// without loss stays integral; everything else becomes floating-point. Once
/// resolved, a value is never silently coerced to the other representation.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    /// An exact integer value.
    Int(i64),
    /// A finite floating-point value.
    Float(f64),
}

impl MetricValue {
    /// Resolves a JSON number to the narrowest exact representation.
    ///
    /// Fails for values that cannot be represented as a finite number, since the
    /// persistence codec cannot encode them.
    pub fn resolve(number: &serde_json::Number) -> Result<Self, ResolveNumberError> {
        if let Some(int) = number.as_i64() {
            return Ok(Self::Int(int));
        }

        match number.as_f64() {
            Some(float) if float.is_finite() => Ok(Self::Float(float)),
            _ => Err(ResolveNumberError(number.clone())),
        }
    }

    /// Returns the value widened to a float.
    pub fn to_f64(self) -> f64 {
        match self {
            Self::Int(int) => int as f64,
            Self::Float(float) => float,
        }
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(int) => int.fmt(f),
            Self::Float(float) => float.fmt(f),
        }
    }
}

/// An error resolving a lazily typed number into a [`MetricValue`].
#[derive(Debug, thiserror::Error)]
#[error("number '{0}' has no finite numeric representation")]
pub struct ResolveNumberError(serde_json::Number);

/// Hashes a set member into the numeric representation stored for sets.
///
/// Members are hashed into a 32-bit value and the original string is dropped.
pub fn hash_set_value(string: &str) -> SetType {
    use std::hash::Hasher as _;

    use hash32::{FnvHasher, Hasher as _};
    let mut hasher = FnvHasher::default();
    hasher.write(string.as_bytes());
    hasher.finish32()
}

/// Validates a metric name.
///
/// Metric names cannot be empty, must begin with a letter and can consist of ASCII
/// alphanumerics, underscores, dashes, slashes and periods.
pub fn is_valid_name(name: &str) -> bool {
    let mut iter = name.as_bytes().iter();
    if let Some(first_byte) = iter.next() {
        if first_byte.is_ascii_alphabetic() {
            return iter.all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'/' | b'-'));
        }
    }
    false
}

/// The canonical ingested datum.
///
/// Created by decoding and validation, mutated only by the TTL enforcer, and owned
/// by the request's processing context until handed to persistence.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Metric {
    /// The tenant this metric belongs to.
    pub tenant_id: String,
    /// The path-like metric name.
    pub name: String,
    /// The collection timestamp in epoch milliseconds.
    pub timestamp: UnixTimestamp,
    /// The resolved numeric value.
    pub value: MetricValue,
    /// The unit of measurement, if the client supplied one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    /// Retention in seconds. Overwritten by the TTL enforcer when TTLs are forced.
    pub ttl_seconds: u64,
}

/// A single entry of the raw per-metric JSON batch format.
///
/// All fields are optional at the decode stage: field presence and value shapes are
/// the validator's concern, not the decoder's.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMetric {
    /// The path-like metric name.
    #[serde(default)]
    pub metric_name: Option<String>,
    /// The metric value, still untyped.
    #[serde(default)]
    pub metric_value: Option<serde_json::Value>,
    /// The collection timestamp in epoch milliseconds.
    #[serde(default)]
    pub collection_time: Option<u64>,
    /// Client-requested retention in seconds.
    #[serde(default)]
    pub ttl_in_seconds: Option<u64>,
    /// The unit of measurement.
    #[serde(default)]
    pub unit: Option<String>,
}

impl RawMetric {
    /// The identifier used to report validation errors for this entry.
    fn identifier(&self) -> &str {
        self.metric_name.as_deref().unwrap_or("<unnamed>")
    }
}

/// An error decoding a wire payload.
///
/// Both variants surface the same client-visible error kind; they are separate so
/// that operators can tell syntactically broken senders from senders with a schema
/// mismatch.
#[derive(Debug, thiserror::Error)]
pub enum ParseMetricsError {
    /// The body is not syntactically valid JSON.
    #[error("invalid JSON data")]
    InvalidJson(#[source] serde_json::Error),

    /// The body parses as JSON but does not have the expected shape.
    #[error("invalid metrics payload")]
    InvalidShape(#[source] serde_json::Error),
}

impl ParseMetricsError {
    /// Renders the message passed back to the client as a debugging aid.
    pub fn detail(&self) -> String {
        match self {
            Self::InvalidJson(source) => format!("{self}: {source}"),
            Self::InvalidShape(source) => format!("{self}: {source}"),
        }
    }
}

/// Parses a raw JSON batch into its unvalidated entries.
///
/// This performs no temporal or business validation. The distinction between the
/// two error variants exists purely for logging.
pub fn parse_metrics(slice: &[u8]) -> Result<Vec<RawMetric>, ParseMetricsError> {
    let value: serde_json::Value =
        serde_json::from_slice(slice).map_err(ParseMetricsError::InvalidJson)?;

    serde_json::from_value(value).map_err(ParseMetricsError::InvalidShape)
}

/// A structured validation failure for a single metric.
///
/// The presence of validation errors does not imply the batch was rejected; valid
/// entries of the same batch still proceed to persistence.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidationError {
    /// The identifier of the offending metric.
    pub metric: String,
    /// A human readable description of the failure.
    pub message: String,
}

impl ValidationError {
    fn new(metric: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            metric: metric.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}': {}", self.metric, self.message)
    }
}

/// A metric observed after its rollup eligibility window.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DelayedMetric {
    /// The metric name or check identifier that arrived late.
    pub name: String,
    /// The observed delay in milliseconds.
    pub delay_millis: u64,
}

/// The result of validating a raw batch.
#[derive(Clone, Debug, Default)]
pub struct ValidatedBatch {
    /// Metrics that passed validation, in input order.
    pub metrics: Vec<Metric>,
    /// Validation failures, one per rejected metric.
    pub errors: Vec<ValidationError>,
    /// Valid metrics that arrived after their rollup eligibility window.
    pub delayed: Vec<DelayedMetric>,
}

/// Validates decoded raw metrics into canonical [`Metric`]s.
///
/// Invalid entries are filtered out and reported in the error list; the remainder
/// of the batch proceeds. Delayed classification is orthogonal to accept/reject and
/// never produces a validation error.
pub fn validate_metrics(
    raw_metrics: Vec<RawMetric>,
    tenant_id: Option<&str>,
    now: UnixTimestamp,
    window: &IngestionWindow,
    delay_threshold: &DelayThreshold,
    default_ttl_seconds: u64,
) -> ValidatedBatch {
    let mut batch = ValidatedBatch::default();

    for raw in raw_metrics {
        match validate_metric(&raw, tenant_id, now, window, default_ttl_seconds) {
            Ok(metric) => {
                if let Some(delay) = delay_threshold.delay_of(metric.timestamp, now) {
                    batch.delayed.push(DelayedMetric {
                        name: metric.name.clone(),
                        delay_millis: delay.as_millis() as u64,
                    });
                }
                batch.metrics.push(metric);
            }
            Err(error) => batch.errors.push(error),
        }
    }

    batch
}

fn validate_metric(
    raw: &RawMetric,
    tenant_id: Option<&str>,
    now: UnixTimestamp,
    window: &IngestionWindow,
    default_ttl_seconds: u64,
) -> Result<Metric, ValidationError> {
    let Some(tenant_id) = tenant_id.filter(|tenant| !tenant.is_empty()) else {
        return Err(ValidationError::new(
            raw.identifier(),
            "no tenant id provided",
        ));
    };

    let name = match raw.metric_name.as_deref() {
        Some(name) if is_valid_name(name) => name.to_owned(),
        Some(name) => {
            return Err(ValidationError::new(
                name,
                format!("invalid metric name '{name}'"),
            ));
        }
        None => {
            return Err(ValidationError::new(
                raw.identifier(),
                "missing metric name",
            ));
        }
    };

    let value = match &raw.metric_value {
        Some(serde_json::Value::Number(number)) => MetricValue::resolve(number)
            .map_err(|_| ValidationError::new(&name, "metric value is not a finite number"))?,
        Some(_) => {
            return Err(ValidationError::new(
                &name,
                "metric value is not a finite number",
            ));
        }
        None => return Err(ValidationError::new(&name, "missing metric value")),
    };

    let timestamp = match raw.collection_time {
        Some(millis) => UnixTimestamp::from_millis(millis),
        None => return Err(ValidationError::new(&name, "missing collection time")),
    };

    if let Err(skew) = window.check(timestamp, now) {
        return Err(ValidationError::new(&name, skew.message(timestamp)));
    }

    Ok(Metric {
        tenant_id: tenant_id.to_owned(),
        name,
        timestamp,
        value,
        unit: raw.unit.clone(),
        ttl_seconds: raw.ttl_in_seconds.unwrap_or(default_ttl_seconds),
    })
}
