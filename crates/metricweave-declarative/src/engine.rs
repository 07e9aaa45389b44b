//! Interception engine.
//!
//! An [`Interceptor`] stands in front of one call-site. Every invocation runs
//! inside a [`MeasurementContext`], a guard that records exactly once:
//! explicitly on return, or from `Drop` when the call unwinds or its future
//! is dropped. Whatever the operation returns is handed back untouched.
//!
//! ```
//! use std::sync::Arc;
//! use metricweave_core::MetricRegistry;
//! use metricweave_declarative::{call_site, FailureRule, Measure, MetricsFacade, MetricsError};
//!
//! #[derive(Debug)]
//! enum Error { Empty, Metrics(MetricsError) }
//! impl From<MetricsError> for Error {
//!     fn from(e: MetricsError) -> Self { Error::Metrics(e) }
//! }
//!
//! struct Stats;
//! let facade = MetricsFacade::new(Arc::new(MetricRegistry::new()));
//! let mean = facade.interceptor(
//!     call_site!(Stats, "mean"),
//!     Measure::timer().failing_on(FailureRule::of_type::<Error>()),
//! );
//!
//! let xs: Vec<f64> = vec![];
//! let r: Result<f64, Error> = mean.invoke(|| {
//!     if xs.is_empty() {
//!         return Err(Error::Empty);
//!     }
//!     Ok(xs.iter().sum::<f64>() / xs.len() as f64)
//! });
//! assert!(matches!(r, Err(Error::Empty)));
//! ```

use std::any::Any;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use metricweave_core::error::{MetricsError, Result};
use metricweave_core::Tags;

use crate::descriptor::InterceptionDescriptor;
use crate::diag::RecordingDiagnostics;
use crate::facade::MetricsFacade;
use crate::generators::generate;
use crate::marker::{Exit, Measure};
use crate::naming::CallSite;

/// Measurement bracket around one invocation.
///
/// Closed exactly once: by [`MeasurementContext::close`] on a normal return,
/// otherwise by `Drop` as an aborted exit.
pub struct MeasurementContext<'a> {
    interceptor: &'a Interceptor,
    descriptor: &'a InterceptionDescriptor,
    started: Option<Duration>,
    closed: bool,
}

impl<'a> MeasurementContext<'a> {
    fn open(interceptor: &'a Interceptor, descriptor: &'a InterceptionDescriptor) -> Self {
        let started = descriptor
            .is_timed()
            .then(|| interceptor.facade.clock().now());
        Self {
            interceptor,
            descriptor,
            started,
            closed: false,
        }
    }

    fn close(mut self, exit: Exit<'_>) {
        self.closed = true;
        self.finish(exit);
    }

    /// Record under the call-site identity, or under the identity extended
    /// with the tags generated from the exit value.
    fn finish(&self, exit: Exit<'_>) {
        let i = self.interceptor;
        let elapsed = self
            .started
            .map(|start| i.facade.clock().now().saturating_sub(start));

        let recorded = i.generated_tags(exit).and_then(|tags| {
            if tags.is_empty() {
                return self.descriptor.record(elapsed, exit);
            }
            self.descriptor
                .with_call_tags(&i.facade, &i.measure, &tags)?
                .record(elapsed, exit)
        });
        if let Err(e) = recorded {
            i.diag
                .recording_failed(&i.site, self.descriptor.identity(), &e);
        }
    }
}

impl Drop for MeasurementContext<'_> {
    fn drop(&mut self) {
        if !self.closed {
            self.closed = true;
            self.finish(Exit::Aborted);
        }
    }
}

fn exit_of<T: 'static, E: 'static>(result: &std::result::Result<T, E>) -> Exit<'_> {
    match result {
        Ok(v) => Exit::Success(v as &dyn Any),
        Err(e) => Exit::Error(e as &dyn Any),
    }
}

/// Interception front for one call-site.
pub struct Interceptor {
    facade: MetricsFacade,
    site: CallSite,
    measure: Measure,
    descriptor: OnceLock<Result<Arc<InterceptionDescriptor>>>,
    diag: RecordingDiagnostics,
    tag_conflict_logged: AtomicBool,
}

impl std::fmt::Debug for Interceptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interceptor")
            .field("site", &self.site)
            .field("measure", &self.measure)
            .field("resolved", &self.descriptor.get().is_some())
            .finish()
    }
}

impl Interceptor {
    pub fn new(facade: MetricsFacade, site: CallSite, measure: Measure) -> Self {
        let diag = RecordingDiagnostics::new(facade.warn_interval());
        Self {
            facade,
            site,
            measure,
            descriptor: OnceLock::new(),
            diag,
            tag_conflict_logged: AtomicBool::new(false),
        }
    }

    pub fn call_site(&self) -> &CallSite {
        &self.site
    }

    pub fn measure(&self) -> &Measure {
        &self.measure
    }

    /// Recording failures swallowed so far at this call-site.
    pub fn recording_failures(&self) -> u64 {
        self.diag.failures()
    }

    /// The call-site's descriptor, resolved on first use.
    ///
    /// Resolution runs once even under concurrent first calls. A failure is
    /// cached and logged once; every later call gets the same error.
    pub fn descriptor(&self) -> Result<&InterceptionDescriptor> {
        let resolved = self.descriptor.get_or_init(|| {
            match InterceptionDescriptor::resolve(&self.facade, &self.site, &self.measure) {
                Ok(d) => {
                    tracing::debug!(
                        type_name = self.site.type_name(),
                        operation = self.site.operation(),
                        metric = %d.identity(),
                        kind = %d.kind(),
                        "call-site resolved"
                    );
                    Ok(Arc::new(d))
                }
                Err(e) => {
                    tracing::error!(
                        type_name = self.site.type_name(),
                        operation = self.site.operation(),
                        error = %e,
                        "call-site resolution failed; calls will be rejected"
                    );
                    Err(e)
                }
            }
        });
        match resolved {
            Ok(d) => Ok(d.as_ref()),
            Err(e) => Err(e.clone()),
        }
    }

    fn open<'a>(&'a self, descriptor: &'a InterceptionDescriptor) -> MeasurementContext<'a> {
        MeasurementContext::open(self, descriptor)
    }

    /// Tags generated from the exit value: the marker's generator first, then
    /// the facade's. Aborted exits carry no value and get none.
    fn generated_tags(&self, exit: Exit<'_>) -> Result<Tags> {
        let generators = self.facade.generators();
        let (own, value, fallback) = match exit {
            Exit::Success(v) => (self.measure.success_tags(), v, generators.for_result(v)),
            Exit::Error(e) => (self.measure.error_tags(), e, generators.for_error()),
            Exit::Aborted => return Ok(Tags::empty()),
        };
        if let Some(g) = own {
            if let Some(tags) = generate(g, value)? {
                return Ok(tags);
            }
        }
        match fallback {
            Some(g) => Ok(generate(g, value)?.unwrap_or_default()),
            None => Ok(Tags::empty()),
        }
    }

    /// Run `op` measured. The outer error is a resolution failure, in which
    /// case `op` never ran; the inner result is `op`'s own.
    pub fn try_invoke<T, E, F>(&self, op: F) -> Result<std::result::Result<T, E>>
    where
        T: 'static,
        E: 'static,
        F: FnOnce() -> std::result::Result<T, E>,
    {
        let descriptor = self.descriptor()?;
        let ctx = self.open(descriptor);
        let result = op();
        ctx.close(exit_of(&result));
        Ok(result)
    }

    /// Run `op` measured, returning its result unchanged. A resolution
    /// failure is converted into the caller's error type.
    pub fn invoke<T, E, F>(&self, op: F) -> std::result::Result<T, E>
    where
        T: 'static,
        E: From<MetricsError> + 'static,
        F: FnOnce() -> std::result::Result<T, E>,
    {
        self.try_invoke(op)?
    }

    /// Run an operation that cannot fail. Only resolution can error.
    pub fn invoke_infallible<T, F>(&self, op: F) -> Result<T>
    where
        T: 'static,
        F: FnOnce() -> T,
    {
        let descriptor = self.descriptor()?;
        let ctx = self.open(descriptor);
        let value = op();
        ctx.close(Exit::Success(&value));
        Ok(value)
    }

    /// Run `op` measured under this call-site's identity extended with
    /// per-call `tags`.
    ///
    /// The tagged identity is looked up on every call. A kind conflict on it
    /// rejects the call like a conflict on the call-site itself. Any other
    /// lookup failure (a full registry) lets the call run unmeasured and
    /// goes to the diagnostic channel.
    pub fn invoke_tagged<T, E, F>(&self, tags: &Tags, op: F) -> std::result::Result<T, E>
    where
        T: 'static,
        E: From<MetricsError> + 'static,
        F: FnOnce() -> std::result::Result<T, E>,
    {
        let base = self.descriptor()?;
        let tagged = match base.with_call_tags(&self.facade, &self.measure, tags) {
            Ok(d) => d,
            Err(e) if e.is_kind_conflict() => {
                if !self.tag_conflict_logged.swap(true, Ordering::Relaxed) {
                    tracing::error!(
                        type_name = self.site.type_name(),
                        operation = self.site.operation(),
                        metric = %base.identity().with_tags(tags),
                        error = %e,
                        "per-call tags conflict with a registered metric; calls will be rejected"
                    );
                }
                return Err(e.into());
            }
            Err(e) => {
                self.diag
                    .recording_failed(&self.site, &base.identity().with_tags(tags), &e);
                return op();
            }
        };
        let ctx = self.open(&tagged);
        let result = op();
        ctx.close(exit_of(&result));
        result
    }

    /// Await `fut` measured. Dropping the returned future before it
    /// completes records a cancelled (aborted) exit.
    pub async fn invoke_async<T, E, Fut>(&self, fut: Fut) -> std::result::Result<T, E>
    where
        T: 'static,
        E: From<MetricsError> + 'static,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        let descriptor = self.descriptor()?;
        let ctx = self.open(descriptor);
        let result = fut.await;
        ctx.close(exit_of(&result));
        result
    }
}
