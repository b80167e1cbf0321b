//! Prometheus metrics for provider traffic

use prometheus::{
    exponential_buckets, Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry,
    TextEncoder,
};
use std::time::Duration;

use crate::errors::WalletResult;

/// Request counters and latency histograms, registered on a private registry
#[derive(Clone)]
pub struct ProtocolMetrics {
    registry: Registry,
    requests: IntCounterVec,
    durations: HistogramVec,
    signature_failures: IntCounter,
}

impl ProtocolMetrics {
    pub fn new() -> WalletResult<Self> {
        let registry = Registry::new();

        let requests = IntCounterVec::new(
            Opts::new("groove_requests_total", "Provider requests by operation and result code"),
            &["request", "code"],
        )?;
        let durations = HistogramVec::new(
            HistogramOpts::new("groove_request_duration_seconds", "Provider request latency")
                .buckets(exponential_buckets(0.0005, 2.0, 14)?),
            &["request"],
        )?;
        let signature_failures = IntCounter::new(
            "groove_signature_failures_total",
            "Requests rejected for a missing or invalid signature",
        )?;

        registry.register(Box::new(requests.clone()))?;
        registry.register(Box::new(durations.clone()))?;
        registry.register(Box::new(signature_failures.clone()))?;

        Ok(Self {
            registry,
            requests,
            durations,
            signature_failures,
        })
    }

    pub fn record_request(&self, request: &str, code: u16, elapsed: Duration) {
        self.requests
            .with_label_values(&[request, &code.to_string()])
            .inc();
        self.durations
            .with_label_values(&[request])
            .observe(elapsed.as_secs_f64());
    }

    pub fn record_signature_failure(&self) {
        self.signature_failures.inc();
    }

    pub fn requests_total(&self, request: &str, code: u16) -> u64 {
        self.requests
            .with_label_values(&[request, &code.to_string()])
            .get()
    }

    pub fn signature_failures(&self) -> u64 {
        self.signature_failures.get()
    }

    /// Text exposition format
    pub fn render(&self) -> WalletResult<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|err| crate::errors::WalletError::Server(err.to_string()))
    }
}
