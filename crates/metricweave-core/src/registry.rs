//! Process-wide metric registry.
//!
//! Identity → handle map backed by `DashMap`. The map is written only when an
//! identity is seen for the first time; afterwards callers keep the returned
//! handle and record straight into the metric's atomics.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;

use crate::clock::{Clock, SystemClock};
use crate::error::{MetricsError, Result};
use crate::identity::{MetricIdentity, MetricKind};
use crate::metric::{Counter, Gauge, Meter, MetricHandle, MetricValue, Sampler, Timer};

/// One row of a registry snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricSnapshot {
    pub identity: MetricIdentity,
    pub kind: MetricKind,
    pub value: MetricValue,
}

pub struct MetricRegistry {
    metrics: DashMap<MetricIdentity, MetricHandle>,
    registered: AtomicUsize,
    max_metrics: Option<usize>,
    clock: Arc<dyn Clock>,
}

impl Default for MetricRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MetricRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricRegistry")
            .field("len", &self.len())
            .field("max_metrics", &self.max_metrics)
            .finish()
    }
}

impl MetricRegistry {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock::new()))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            metrics: DashMap::new(),
            registered: AtomicUsize::new(0),
            max_metrics: None,
            clock,
        }
    }

    /// Refuse registrations beyond `limit` distinct identities.
    pub fn with_max_metrics(mut self, limit: usize) -> Self {
        self.max_metrics = Some(limit);
        self
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Return the handle registered under `identity`, creating it if absent.
    ///
    /// Concurrent first lookups of the same identity create exactly one
    /// instance: creation happens under the shard's write lock.
    pub fn get_or_create(&self, identity: &MetricIdentity, kind: MetricKind) -> Result<MetricHandle> {
        if let Some(existing) = self.metrics.get(identity) {
            return check_kind(identity, existing.value(), kind);
        }

        match self.metrics.entry(identity.clone()) {
            Entry::Occupied(e) => check_kind(identity, e.get(), kind),
            Entry::Vacant(v) => {
                self.reserve_slot()?;
                let handle = MetricHandle::create(kind, self.clock.now());
                v.insert(handle.clone());
                tracing::debug!(metric = %identity, kind = %kind, "metric registered");
                Ok(handle)
            }
        }
    }

    /// Fail with `KindConflict` if `identity` is registered as another kind.
    /// Registers nothing.
    pub fn ensure_kind(&self, identity: &MetricIdentity, kind: MetricKind) -> Result<()> {
        match self.metrics.get(identity) {
            Some(existing) => check_kind(identity, existing.value(), kind).map(|_| ()),
            None => Ok(()),
        }
    }

    pub fn get(&self, identity: &MetricIdentity) -> Option<MetricHandle> {
        self.metrics.get(identity).map(|r| r.value().clone())
    }

    pub fn counter(&self, identity: &MetricIdentity) -> Result<Arc<Counter>> {
        let h = self.get_or_create(identity, MetricKind::Counter)?;
        h.as_counter().cloned().ok_or_else(|| wrong_kind(identity, &h, MetricKind::Counter))
    }

    pub fn timer(&self, identity: &MetricIdentity) -> Result<Arc<Timer>> {
        let h = self.get_or_create(identity, MetricKind::Timer)?;
        h.as_timer().cloned().ok_or_else(|| wrong_kind(identity, &h, MetricKind::Timer))
    }

    pub fn meter(&self, identity: &MetricIdentity) -> Result<Arc<Meter>> {
        let h = self.get_or_create(identity, MetricKind::Meter)?;
        h.as_meter().cloned().ok_or_else(|| wrong_kind(identity, &h, MetricKind::Meter))
    }

    pub fn gauge(&self, identity: &MetricIdentity) -> Result<Arc<Gauge>> {
        let h = self.get_or_create(identity, MetricKind::Gauge)?;
        h.as_gauge().cloned().ok_or_else(|| wrong_kind(identity, &h, MetricKind::Gauge))
    }

    /// Register a pull gauge: `sampler` is polled every time the gauge is read.
    pub fn register_gauge(&self, identity: &MetricIdentity, sampler: Sampler) -> Result<Arc<Gauge>> {
        let gauge = self.gauge(identity)?;
        gauge.set_sampler(sampler);
        Ok(gauge)
    }

    /// Read-only view for exporters, ordered by identity.
    ///
    /// The map is only held while cloning handles; values (including gauge
    /// samplers) are read afterwards.
    pub fn snapshot(&self) -> Vec<MetricSnapshot> {
        let mut handles: Vec<(MetricIdentity, MetricHandle)> = self
            .metrics
            .iter()
            .map(|r| (r.key().clone(), r.value().clone()))
            .collect();
        handles.sort_by(|a, b| a.0.cmp(&b.0));

        let now = self.clock.now();
        handles
            .into_iter()
            .map(|(identity, handle)| {
                let value = handle.value(now).unwrap_or_else(|e| {
                    tracing::warn!(metric = %identity, error = %e, "gauge sampling failed; reporting last value");
                    let last = handle.as_gauge().map(|g| g.last()).unwrap_or(0.0);
                    MetricValue::Gauge { value: last }
                });
                MetricSnapshot {
                    kind: handle.kind(),
                    identity,
                    value,
                }
            })
            .collect()
    }

    /// Zero every metric. Registrations (and gauge samplers) are kept.
    pub fn reset(&self) {
        let now = self.clock.now();
        for r in self.metrics.iter() {
            r.value().reset(now);
        }
        tracing::info!(metrics = self.len(), "registry reset");
    }

    pub fn len(&self) -> usize {
        self.registered.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn reserve_slot(&self) -> Result<()> {
        let Some(limit) = self.max_metrics else {
            self.registered.fetch_add(1, Ordering::Relaxed);
            return Ok(());
        };
        self.registered
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| (n < limit).then_some(n + 1))
            .map(|_| ())
            .map_err(|_| MetricsError::CapacityExceeded { limit })
    }
}

fn check_kind(identity: &MetricIdentity, existing: &MetricHandle, requested: MetricKind) -> Result<MetricHandle> {
    if existing.kind() == requested {
        Ok(existing.clone())
    } else {
        Err(wrong_kind(identity, existing, requested))
    }
}

fn wrong_kind(identity: &MetricIdentity, existing: &MetricHandle, requested: MetricKind) -> MetricsError {
    MetricsError::KindConflict {
        identity: identity.clone(),
        existing: existing.kind(),
        requested,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::tags::Tags;
    use std::time::Duration;

    #[test]
    fn same_identity_same_kind_returns_same_instance() {
        let reg = MetricRegistry::new();
        let id = MetricIdentity::named("hits");
        let a = reg.counter(&id).unwrap();
        let b = reg.counter(&id).unwrap();
        a.inc();
        assert_eq!(b.get(), 1);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn kind_conflict_leaves_original_intact() {
        let reg = MetricRegistry::new();
        let id = MetricIdentity::named("X");
        reg.counter(&id).unwrap().add(7);

        let err = reg.get_or_create(&id, MetricKind::Timer).unwrap_err();
        assert_eq!(
            err,
            MetricsError::KindConflict {
                identity: id.clone(),
                existing: MetricKind::Counter,
                requested: MetricKind::Timer,
            }
        );
        assert_eq!(reg.counter(&id).unwrap().get(), 7);
        assert_eq!(reg.get(&id).map(|h| h.kind()), Some(MetricKind::Counter));
    }

    #[test]
    fn ensure_kind_checks_without_registering() {
        let reg = MetricRegistry::new();
        let id = MetricIdentity::named("probe");
        assert!(reg.ensure_kind(&id, MetricKind::Counter).is_ok());
        assert!(reg.is_empty());

        reg.timer(&id).unwrap();
        assert!(reg.ensure_kind(&id, MetricKind::Timer).is_ok());
        assert!(reg.ensure_kind(&id, MetricKind::Counter).unwrap_err().is_kind_conflict());
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn identities_rendering_alike_stay_distinct() {
        let reg = MetricRegistry::new();
        let a = MetricIdentity::new("a.b", "c", Tags::empty());
        let b = MetricIdentity::new("a", "b.c", Tags::empty());
        assert_eq!(a.name(), b.name());

        reg.counter(&a).unwrap().inc();
        reg.timer(&b).unwrap();
        assert_eq!(reg.len(), 2);
        assert_eq!(reg.counter(&a).unwrap().get(), 1);
    }

    #[test]
    fn capacity_limit_is_explicit() {
        let reg = MetricRegistry::new().with_max_metrics(1);
        reg.counter(&MetricIdentity::named("a")).unwrap();
        let err = reg.counter(&MetricIdentity::named("b")).unwrap_err();
        assert_eq!(err, MetricsError::CapacityExceeded { limit: 1 });
        // existing identities are still served
        assert!(reg.counter(&MetricIdentity::named("a")).is_ok());
    }

    #[test]
    fn snapshot_is_ordered_and_samples_gauges() {
        let reg = MetricRegistry::new();
        reg.counter(&MetricIdentity::named("b")).unwrap().inc();
        reg.register_gauge(&MetricIdentity::named("a"), Arc::new(|| 2.5)).unwrap();

        let snap = reg.snapshot();
        let names: Vec<String> = snap.iter().map(|s| s.identity.name()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(snap[0].value, MetricValue::Gauge { value: 2.5 });
        assert_eq!(snap[1].value, MetricValue::Counter { count: 1 });
    }

    #[test]
    fn reset_zeroes_but_keeps_registrations() {
        let clock = Arc::new(ManualClock::new());
        let reg = MetricRegistry::with_clock(clock.clone());
        let id = MetricIdentity::new("ns", "t", Tags::empty());
        reg.timer(&id).unwrap().record(Duration::from_millis(1));
        clock.advance(Duration::from_secs(1));
        reg.reset();
        assert_eq!(reg.timer(&id).unwrap().count(), 0);
        assert_eq!(reg.len(), 1);
    }
}
