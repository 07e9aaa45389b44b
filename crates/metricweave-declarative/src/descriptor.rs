//! Per call-site interception descriptors.
//!
//! A descriptor is resolved once, on the first invocation of its call-site,
//! and caches everything the hot path needs: the identity, the metric handle
//! and the failure counter. Recording through a descriptor never touches the
//! registry map.

use std::sync::Arc;
use std::time::Duration;

use metricweave_core::error::{MetricsError, Result};
use metricweave_core::{Counter, Gauge, MetricHandle, MetricIdentity, MetricKind, Sampler, Tags};

use crate::facade::MetricsFacade;
use crate::marker::{Exit, FailureRule, GaugeMode, Measure};
use crate::naming::CallSite;

pub struct InterceptionDescriptor {
    identity: MetricIdentity,
    handle: MetricHandle,
    failure_rule: Option<FailureRule>,
    failures: Option<Arc<Counter>>,
    push_sampler: Option<Sampler>,
}

impl std::fmt::Debug for InterceptionDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterceptionDescriptor")
            .field("identity", &self.identity)
            .field("kind", &self.kind())
            .field("failure_rule", &self.failure_rule)
            .finish()
    }
}

impl InterceptionDescriptor {
    /// Resolve the descriptor for `site` as declared by `measure`.
    ///
    /// Registers the metric (and the failure counter, when a failure rule is
    /// declared). Pull gauges hand their sampler to the registry here.
    pub fn resolve(facade: &MetricsFacade, site: &CallSite, measure: &Measure) -> Result<Self> {
        let identity = facade
            .naming()
            .resolve(site, measure.name(), measure.marker_tags());
        Self::for_identity(facade, identity, measure)
    }

    /// Same call-site, recorded under its identity extended with `tags`.
    pub fn with_call_tags(&self, facade: &MetricsFacade, measure: &Measure, tags: &Tags) -> Result<Self> {
        Self::for_identity(facade, self.identity.with_tags(tags), measure)
    }

    /// Kinds of both the metric and its failure counter are checked before
    /// either is registered, so a conflict leaves the registry untouched. A
    /// full registry can still fail between the two registrations.
    fn for_identity(facade: &MetricsFacade, identity: MetricIdentity, measure: &Measure) -> Result<Self> {
        let registry = facade.registry();
        let failures_id = measure.failure_rule().map(|_| identity.failures());
        if let Some(id) = &failures_id {
            registry.ensure_kind(id, MetricKind::Counter)?;
        }
        let handle = registry.get_or_create(&identity, measure.kind())?;

        let failures = match &failures_id {
            Some(id) => Some(registry.counter(id)?),
            None => None,
        };

        let mut push_sampler = None;
        if let MetricHandle::Gauge(gauge) = &handle {
            let sampler = measure.sampler().cloned().ok_or_else(|| {
                MetricsError::InvalidConfig(format!("gauge {identity} declared without a sampler"))
            })?;
            match measure.declared_gauge_mode().unwrap_or(facade.gauge_mode()) {
                GaugeMode::Pull => gauge.set_sampler(sampler),
                GaugeMode::Push => push_sampler = Some(sampler),
            }
        }

        Ok(Self {
            identity,
            handle,
            failure_rule: measure.failure_rule().cloned(),
            failures,
            push_sampler,
        })
    }

    pub fn identity(&self) -> &MetricIdentity {
        &self.identity
    }

    pub fn kind(&self) -> MetricKind {
        self.handle.kind()
    }

    pub fn handle(&self) -> &MetricHandle {
        &self.handle
    }

    /// Whether a measurement needs a start timestamp.
    pub fn is_timed(&self) -> bool {
        self.kind() == MetricKind::Timer
    }

    /// Record one completed invocation. `elapsed` is present for timers.
    pub fn record(&self, elapsed: Option<Duration>, exit: Exit<'_>) -> Result<()> {
        if let (Some(rule), Some(failures)) = (&self.failure_rule, &self.failures) {
            if rule.matches(exit) {
                failures.inc();
            }
        }

        match &self.handle {
            MetricHandle::Timer(t) => t.record(elapsed.unwrap_or_default()),
            MetricHandle::Counter(c) => c.inc(),
            MetricHandle::Meter(m) => m.mark(),
            MetricHandle::Gauge(g) => {
                if let Some(sampler) = &self.push_sampler {
                    g.set(Gauge::poll(sampler)?);
                }
            }
        }
        Ok(())
    }
}
