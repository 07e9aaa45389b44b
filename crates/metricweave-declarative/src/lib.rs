//! metricweave declarative layer: markers, naming and the interception engine.
//!
//! Application code declares what to measure per call-site with a
//! [`Measure`] marker and runs the operation through an [`Interceptor`]
//! (directly, through the [`Instrumented`] proxy, or via `measured!`). The
//! engine derives the metric identity, records into the shared registry and
//! returns the operation's own result unchanged.

#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::panic))]

pub mod config;
pub mod descriptor;
pub mod diag;
pub mod engine;
pub mod facade;
pub mod generators;
pub mod global;
pub mod marker;
pub mod naming;
pub mod operation;

pub use descriptor::InterceptionDescriptor;
pub use engine::{Interceptor, MeasurementContext};
pub use facade::{MetricsFacade, MetricsFacadeBuilder};
pub use generators::TagGenerators;
pub use marker::{Exit, FailureRule, GaugeMode, Measure, TagGenerator};
pub use metricweave_core::MetricsError;
pub use naming::{CallSite, DefaultNaming, NamingStrategy, TypeNameStyle};
pub use operation::{from_fn, AsyncOperation, FnOperation, Instrumented, Operation};
