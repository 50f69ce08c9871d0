//! Retention override for ingested metrics.

use floodgate_config::Config;
use floodgate_metrics::IngestedMetric;

/// Overrides per-metric retention when the force-TTL policy is active.
///
/// When forcing is enabled, every metric's TTL is overwritten with the
/// configured ingestion TTL, regardless of any client-supplied value. The pass
/// runs after validation and before submission; with forcing disabled it is a
/// no-op.
#[derive(Clone, Copy, Debug)]
pub struct TtlEnforcer {
    forced_ttl_seconds: Option<u64>,
}

impl TtlEnforcer {
    /// Creates an enforcer that forces the given TTL, or does nothing for `None`.
    pub fn new(forced_ttl_seconds: Option<u64>) -> Self {
        Self { forced_ttl_seconds }
    }

    /// Derives the enforcer from the process configuration.
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.force_ttls().then(|| config.ingestion_ttl_seconds()))
    }

    /// Applies the policy to all metrics in place.
    pub fn apply(&self, metrics: &mut [IngestedMetric]) {
        let Some(ttl_seconds) = self.forced_ttl_seconds else {
            return;
        };

        for metric in metrics {
            metric.set_ttl_seconds(ttl_seconds);
        }
    }
}
