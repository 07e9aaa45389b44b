//! metricweave core: metric identities, instances, and the shared registry.
//!
//! This crate owns the data model the interception layer records into. It
//! carries no interception logic, so exporters and tests can depend on it
//! alone.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here. Every fallible
//! path surfaces as `MetricsError`/`Result`; recording must never take down
//! the caller.

#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::panic))]

pub mod clock;
pub mod error;
pub mod identity;
pub mod metric;
pub mod registry;
pub mod tags;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{ErrorClass, MetricsError, Result};
pub use identity::{MetricIdentity, MetricKind};
pub use metric::{Counter, Gauge, Meter, MetricHandle, MetricValue, Sampler, Timer};
pub use registry::{MetricRegistry, MetricSnapshot};
pub use tags::Tags;
