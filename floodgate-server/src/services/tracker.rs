//! Process-wide registry of request activity and delayed metrics.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use axum::http::StatusCode;
use floodgate_metrics::DelayedMetric;
use floodgate_statsd::metric;
use parking_lot::RwLock;

use crate::statsd::{IngestCounters, IngestGauges};

/// Describes one inbound ingestion request for tracking.
#[derive(Clone, Copy, Debug)]
pub struct RequestDescriptor<'a> {
    /// The route that received the request.
    pub route: &'a str,
    /// The tenant the request belongs to, when known at receipt time.
    pub tenant_id: Option<&'a str>,
}

/// Process-wide tracker for request rates and delayed metrics.
///
/// One instance lives for the process lifetime, owned by the service state.
/// All methods are safe under unbounded concurrent calls: counters are atomic,
/// and delayed records are appended under a short write lock. Readers take a
/// snapshot and never hold writers up for long.
#[derive(Debug, Default)]
pub struct Tracker {
    requests_received: AtomicU64,
    responses_sent: AtomicU64,
    in_flight: AtomicI64,
    delayed: RwLock<BTreeMap<String, Vec<DelayedMetric>>>,
}

impl Tracker {
    /// Records that a request was received.
    pub fn track(&self, descriptor: &RequestDescriptor<'_>) {
        self.requests_received.fetch_add(1, Ordering::Relaxed);
        let in_flight = self.in_flight.fetch_add(1, Ordering::Relaxed) + 1;

        metric!(counter(IngestCounters::RequestsReceived) += 1, route = descriptor.route);
        metric!(gauge(IngestGauges::InFlightRequests) = in_flight.max(0) as u64);

        floodgate_log::debug!(
            route = descriptor.route,
            tenant_id = descriptor.tenant_id.unwrap_or("-"),
            "tracking request",
        );
    }

    /// Records that a response was sent for a previously tracked request.
    pub fn track_response(&self, route: &str, status: StatusCode) {
        self.responses_sent.fetch_add(1, Ordering::Relaxed);
        let in_flight = self.in_flight.fetch_sub(1, Ordering::Relaxed) - 1;

        metric!(
            counter(IngestCounters::ResponsesSent) += 1,
            route = route,
            status = status.as_str(),
        );
        metric!(gauge(IngestGauges::InFlightRequests) = in_flight.max(0) as u64);
    }

    /// Appends delayed-metric observations for a tenant.
    ///
    /// Records accumulate until the observability collaborator consumes them via
    /// [`take_delayed`](Self::take_delayed).
    pub fn track_delayed(&self, tenant_id: &str, records: Vec<DelayedMetric>) {
        if records.is_empty() {
            return;
        }

        floodgate_log::warn!(
            tenant_id,
            count = records.len(),
            "received metrics past their rollup window",
        );

        self.delayed
            .write()
            .entry(tenant_id.to_owned())
            .or_default()
            .extend(records);
    }

    /// Snapshots the accumulated delayed metrics per tenant.
    pub fn delayed_metrics(&self) -> BTreeMap<String, Vec<DelayedMetric>> {
        self.delayed.read().clone()
    }

    /// Drains the accumulated delayed metrics, handing them to the consumer.
    pub fn take_delayed(&self) -> BTreeMap<String, Vec<DelayedMetric>> {
        std::mem::take(&mut *self.delayed.write())
    }

    /// Total number of requests received since process start.
    pub fn requests_received(&self) -> u64 {
        self.requests_received.load(Ordering::Relaxed)
    }

    /// Total number of responses sent since process start.
    pub fn responses_sent(&self) -> u64 {
        self.responses_sent.load(Ordering::Relaxed)
    }

    /// The number of requests currently in flight.
    pub fn in_flight(&self) -> i64 {
        self.in_flight.load(Ordering::Relaxed)
    }
}
