//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by outcome (filtered, proxied, failed)
//! - `gateway_request_duration_seconds` (histogram): time until the response head is ready;
//!   streamed proxy bodies are not included
//! - `gateway_connections_total` (counter): accepted connections

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use serde::{Deserialize, Serialize};

/// How a request was finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    /// Answered by a filter.
    Filtered,
    /// Forwarded upstream.
    Proxied,
    /// Ended in a local error response.
    Failed,
}

impl RequestOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestOutcome::Filtered => "filtered",
            RequestOutcome::Proxied => "proxied",
            RequestOutcome::Failed => "failed",
        }
    }
}

/// Gateway-wide counters, shared by every connection task.
#[derive(Debug, Default)]
pub struct GatewayMetrics {
    requests_total: AtomicU64,
    requests_filtered: AtomicU64,
    requests_proxied: AtomicU64,
    requests_failed: AtomicU64,
    connections_accepted: AtomicU64,
    total_time_micros: AtomicU64,
}

/// Point-in-time copy of [`GatewayMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub requests_total: u64,
    pub requests_filtered: u64,
    pub requests_proxied: u64,
    pub requests_failed: u64,
    pub connections_accepted: u64,
    pub total_time_micros: u64,
}

impl GatewayMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_connection(&self) {
        self.connections_accepted.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("gateway_connections_total").increment(1);
    }

    pub fn record_request(&self, outcome: RequestOutcome, started: Instant) {
        let elapsed = started.elapsed();
        self.requests_total.fetch_add(1, Ordering::Relaxed);
        let bucket = match outcome {
            RequestOutcome::Filtered => &self.requests_filtered,
            RequestOutcome::Proxied => &self.requests_proxied,
            RequestOutcome::Failed => &self.requests_failed,
        };
        bucket.fetch_add(1, Ordering::Relaxed);
        self.total_time_micros
            .fetch_add(u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX), Ordering::Relaxed);

        metrics::counter!("gateway_requests_total", "outcome" => outcome.as_str()).increment(1);
        metrics::histogram!("gateway_request_duration_seconds").record(elapsed.as_secs_f64());
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests_total: self.requests_total.load(Ordering::Relaxed),
            requests_filtered: self.requests_filtered.load(Ordering::Relaxed),
            requests_proxied: self.requests_proxied.load(Ordering::Relaxed),
            requests_failed: self.requests_failed.load(Ordering::Relaxed),
            connections_accepted: self.connections_accepted.load(Ordering::Relaxed),
            total_time_micros: self.total_time_micros.load(Ordering::Relaxed),
        }
    }
}

/// Install the Prometheus recorder and its scrape listener.
/// Must be called from within a tokio runtime.
pub fn install_prometheus(addr: SocketAddr) -> Result<(), metrics_exporter_prometheus::BuildError> {
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    metrics::describe_counter!("gateway_requests_total", "Requests handled, by outcome");
    metrics::describe_histogram!(
        "gateway_request_duration_seconds",
        metrics::Unit::Seconds,
        "Time from request head until the response head is ready"
    );
    metrics::describe_counter!("gateway_connections_total", "Client connections accepted");
    tracing::info!(address = %addr, "Prometheus exporter listening");
    Ok(())
}
