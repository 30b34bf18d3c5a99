//! Observability: runtime telemetry and sink abstractions.
//!
//! Execution semantics must never depend on this module; sinks observe,
//! they do not steer.

pub(crate) mod metrics;
pub(crate) mod sink;

pub use metrics::OpsCounters;
pub use sink::{MetricsEvent, MetricsSink, metrics_report, metrics_reset_all, with_metrics_sink};

pub(crate) use sink::record;
