use floodgate_statsd::{CounterMetric, GaugeMetric, TimerMetric};

/// Counter metrics emitted by the ingestion endpoints.
pub enum IngestCounters {
    /// Number of inbound ingestion requests.
    ///
    /// This metric is tagged with:
    /// - `route`: the ingestion route that received the request.
    RequestsReceived,
    /// Number of responses sent back to clients.
    ///
    /// This metric is tagged with:
    /// - `route`: the ingestion route that produced the response.
    /// - `status`: the HTTP status code of the response.
    ResponsesSent,
    /// Number of request bodies that could not be decoded.
    ///
    /// Spikes usually mean a misbehaving sender worth tracking down.
    DecodeFailed,
    /// Number of metrics dropped by validation.
    MetricsDropped,
}

impl CounterMetric for IngestCounters {
    fn name(&self) -> &'static str {
        match self {
            Self::RequestsReceived => "requests.received",
            Self::ResponsesSent => "requests.responded",
            Self::DecodeFailed => "decode.failed",
            Self::MetricsDropped => "metrics.dropped",
        }
    }
}

/// Timer metrics emitted by the ingestion endpoints.
pub enum IngestTimers {
    /// Time spent decoding and validating a request body.
    DecodeJson,
    /// Time spent waiting for the persistence layer, bounded by the configured
    /// timeout.
    Persist,
}

impl TimerMetric for IngestTimers {
    fn name(&self) -> &'static str {
        match self {
            Self::DecodeJson => "decode.json",
            Self::Persist => "persist.wait",
        }
    }
}

/// Gauge metrics emitted by the ingestion endpoints.
pub enum IngestGauges {
    /// The number of ingestion requests currently in flight.
    InFlightRequests,
}

impl GaugeMetric for IngestGauges {
    fn name(&self) -> &'static str {
        match self {
            Self::InFlightRequests => "requests.in_flight",
        }
    }
}
