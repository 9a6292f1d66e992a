//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Dispatch engine and HTTP adapter produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → stdout via tracing-subscriber
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Request ID flows through the HTTP layer's trace spans
//! - Metrics are cheap when no exporter is installed

pub mod logging;
pub mod metrics;
