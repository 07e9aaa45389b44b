//! Top-level facade crate for metricweave.
//!
//! Re-exports the core data model and the declarative layer so users can
//! depend on a single crate.

pub mod core {
    pub use metricweave_core::*;
}

pub mod declarative {
    pub use metricweave_declarative::*;
}

pub use metricweave_core::{MetricIdentity, MetricKind, MetricRegistry, MetricsError, Tags};
pub use metricweave_declarative::{
    call_site, global, measured, FailureRule, GaugeMode, Instrumented, Interceptor, Measure,
    MetricsFacade, Operation,
};
