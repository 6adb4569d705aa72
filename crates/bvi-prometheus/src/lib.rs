//! Prometheus metrics for the bvi scan scheduler.
//!
//! [`PrometheusMetrics`] is a [`bvi_core::Subscribe`] implementation: register it on the scheduler
//! builder and it turns scheduler events into metrics on its own [`Registry`].
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use bvi_core::{Event, EventKind, Subscribe};
//! use bvi_prometheus::PrometheusMetrics;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let metrics = Arc::new(PrometheusMetrics::new()?);
//! // Scheduler::builder(config).with_subscriber(metrics.clone())
//! metrics.on_event(&Event::new(EventKind::MessageSkipped));
//!
//! let families = metrics.gather();
//! assert!(families.iter().any(|f| f.name() == "bvi_messages_skipped_total"));
//! # Ok(())
//! # }
//! ```
//!
//! ## Metrics
//! - `bvi_jobs_started_total{task_type}` - Counter
//! - `bvi_jobs_completed_total{task_type, outcome}` - Counter
//! - `bvi_job_duration_seconds{task_type}` - Histogram
//! - `bvi_admission_rejected_total{reason}` - Counter
//! - `bvi_messages_skipped_total` - Counter
//! - `bvi_admission_capacity` - Gauge
//! - `bvi_admission_running` - Gauge
//!
//! ## HTTP Server
//! This crate does NOT provide HTTP server for `/metrics` endpoint.
//! Encode [`PrometheusMetrics::gather`] with a [`TextEncoder`] from your own handler.

mod backend;
pub use backend::PrometheusMetrics;

pub use prometheus::{Encoder, Registry, TextEncoder};
