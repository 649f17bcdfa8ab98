//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured tracing events)
//!     → metrics.rs (atomic counters mirrored to the `metrics` facade)
//!
//! Consumers:
//!     → stdout (fmt subscriber)
//!     → /debug/metrics on the gateway itself
//!     → Prometheus scrape endpoint (optional)
//! ```
//!
//! # Design Decisions
//! - Structured fields (connection id, domain, path, status) on every event
//! - Metrics are cheap (atomic increments)
//! - The exporter is optional; the facade is a no-op without a recorder

pub mod logging;
pub mod metrics;

pub use logging::init_logging;
pub use metrics::{GatewayMetrics, MetricsSnapshot, RequestOutcome};
