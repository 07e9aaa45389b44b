//! Metric instances.
//!
//! Every recording operation is a handful of relaxed atomic updates on the
//! instance itself; nothing here touches the registry map. Timer buckets are
//! fixed in microseconds to avoid floating point math on the hot path.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use serde::Serialize;

use crate::error::{MetricsError, Result};
use crate::identity::MetricKind;

/// Monotonic count.
#[derive(Debug, Default)]
pub struct Counter {
    value: AtomicU64,
}

impl Counter {
    pub fn inc(&self) {
        self.add(1);
    }

    pub fn add(&self, v: u64) {
        self.value.fetch_add(v, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }

    fn reset(&self) {
        self.value.store(0, Ordering::Relaxed);
    }
}

// 100us, 500us, 1ms, 5ms, 10ms, 50ms, 100ms, 500ms, 1s
pub const BUCKETS_MICROS: [u64; 9] = [
    100, 500, 1_000, 5_000, 10_000, 50_000, 100_000, 500_000, 1_000_000,
];

/// Duration distribution: count, sum, max and cumulative buckets.
#[derive(Debug, Default)]
pub struct Timer {
    count: AtomicU64,
    sum_micros: AtomicU64,
    max_micros: AtomicU64,
    buckets: [AtomicU64; 9],
}

impl Timer {
    pub fn record(&self, duration: Duration) {
        let micros = duration.as_micros() as u64;

        self.count.fetch_add(1, Ordering::Relaxed);
        self.sum_micros.fetch_add(micros, Ordering::Relaxed);
        self.max_micros.fetch_max(micros, Ordering::Relaxed);

        // Cumulative: every bucket at or above the value.
        for (i, &b) in BUCKETS_MICROS.iter().enumerate() {
            if micros <= b {
                self.buckets[i].fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> TimerSnapshot {
        let mut buckets = [0u64; 9];
        for (slot, b) in buckets.iter_mut().zip(self.buckets.iter()) {
            *slot = b.load(Ordering::Relaxed);
        }
        TimerSnapshot {
            count: self.count.load(Ordering::Relaxed),
            sum_micros: self.sum_micros.load(Ordering::Relaxed),
            max_micros: self.max_micros.load(Ordering::Relaxed),
            buckets,
        }
    }

    fn reset(&self) {
        self.count.store(0, Ordering::Relaxed);
        self.sum_micros.store(0, Ordering::Relaxed);
        self.max_micros.store(0, Ordering::Relaxed);
        for b in &self.buckets {
            b.store(0, Ordering::Relaxed);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimerSnapshot {
    pub count: u64,
    pub sum_micros: u64,
    pub max_micros: u64,
    /// Cumulative counts, aligned with `BUCKETS_MICROS`.
    pub buckets: [u64; 9],
}

impl TimerSnapshot {
    pub fn mean(&self) -> Duration {
        if self.count == 0 {
            return Duration::ZERO;
        }
        Duration::from_micros(self.sum_micros / self.count)
    }
}

/// Event rate since creation (or the last reset).
#[derive(Debug)]
pub struct Meter {
    count: AtomicU64,
    started_micros: AtomicU64,
}

impl Meter {
    pub fn new(now: Duration) -> Self {
        Self {
            count: AtomicU64::new(0),
            started_micros: AtomicU64::new(now.as_micros() as u64),
        }
    }

    pub fn mark(&self) {
        self.mark_n(1);
    }

    pub fn mark_n(&self, n: u64) {
        self.count.fetch_add(n, Ordering::Relaxed);
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self, now: Duration) -> MeterSnapshot {
        let count = self.count.load(Ordering::Relaxed);
        let started = self.started_micros.load(Ordering::Relaxed);
        let elapsed = (now.as_micros() as u64).saturating_sub(started);
        let mean_rate = if elapsed == 0 {
            0.0
        } else {
            count as f64 * 1_000_000.0 / elapsed as f64
        };
        MeterSnapshot { count, mean_rate }
    }

    fn reset(&self, now: Duration) {
        self.count.store(0, Ordering::Relaxed);
        self.started_micros
            .store(now.as_micros() as u64, Ordering::Relaxed);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MeterSnapshot {
    pub count: u64,
    /// Events per second.
    pub mean_rate: f64,
}

/// Value-producing callback sampled by gauges.
pub type Sampler = Arc<dyn Fn() -> f64 + Send + Sync>;

/// Instantaneous value.
///
/// A gauge either holds the last value pushed to it, or owns a sampler that
/// is polled when read. Sampled values are also stored, so a panicking
/// sampler degrades to the last good reading.
#[derive(Default)]
pub struct Gauge {
    bits: AtomicU64,
    sampler: RwLock<Option<Sampler>>,
}

impl std::fmt::Debug for Gauge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gauge")
            .field("last", &self.last())
            .field("sampled", &self.has_sampler())
            .finish()
    }
}

impl Gauge {
    pub fn set(&self, v: f64) {
        self.bits.store(v.to_bits(), Ordering::Relaxed);
    }

    /// Last stored value, without sampling.
    pub fn last(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Relaxed))
    }

    /// Install (or replace) the sampler polled on read.
    pub fn set_sampler(&self, sampler: Sampler) {
        if let Ok(mut slot) = self.sampler.write() {
            *slot = Some(sampler);
        }
    }

    pub fn has_sampler(&self) -> bool {
        self.sampler.read().map(|s| s.is_some()).unwrap_or(false)
    }

    /// Poll the sampler if one is installed, otherwise return the last value.
    pub fn sample(&self) -> Result<f64> {
        let sampler = match self.sampler.read() {
            Ok(slot) => slot.clone(),
            Err(_) => return Err(MetricsError::RecordingFailure("gauge sampler lock poisoned".into())),
        };
        let Some(sampler) = sampler else {
            return Ok(self.last());
        };
        Self::poll(&sampler).map(|v| {
            self.set(v);
            v
        })
    }

    /// Run an arbitrary sampler, converting a panic into a recording failure.
    pub fn poll(sampler: &Sampler) -> Result<f64> {
        catch_unwind(AssertUnwindSafe(|| sampler()))
            .map_err(|_| MetricsError::RecordingFailure("gauge sampler panicked".into()))
    }

    fn reset(&self) {
        self.set(0.0);
    }
}

/// Shared reference to one live metric in the registry.
#[derive(Debug, Clone)]
pub enum MetricHandle {
    Counter(Arc<Counter>),
    Timer(Arc<Timer>),
    Meter(Arc<Meter>),
    Gauge(Arc<Gauge>),
}

impl MetricHandle {
    pub(crate) fn create(kind: MetricKind, now: Duration) -> Self {
        match kind {
            MetricKind::Counter => MetricHandle::Counter(Arc::new(Counter::default())),
            MetricKind::Timer => MetricHandle::Timer(Arc::new(Timer::default())),
            MetricKind::Meter => MetricHandle::Meter(Arc::new(Meter::new(now))),
            MetricKind::Gauge => MetricHandle::Gauge(Arc::new(Gauge::default())),
        }
    }

    pub fn kind(&self) -> MetricKind {
        match self {
            MetricHandle::Counter(_) => MetricKind::Counter,
            MetricHandle::Timer(_) => MetricKind::Timer,
            MetricHandle::Meter(_) => MetricKind::Meter,
            MetricHandle::Gauge(_) => MetricKind::Gauge,
        }
    }

    pub fn as_counter(&self) -> Option<&Arc<Counter>> {
        match self {
            MetricHandle::Counter(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_timer(&self) -> Option<&Arc<Timer>> {
        match self {
            MetricHandle::Timer(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_meter(&self) -> Option<&Arc<Meter>> {
        match self {
            MetricHandle::Meter(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_gauge(&self) -> Option<&Arc<Gauge>> {
        match self {
            MetricHandle::Gauge(g) => Some(g),
            _ => None,
        }
    }

    /// Read the current value. Gauges with a sampler are polled.
    pub fn value(&self, now: Duration) -> Result<MetricValue> {
        Ok(match self {
            MetricHandle::Counter(c) => MetricValue::Counter { count: c.get() },
            MetricHandle::Timer(t) => MetricValue::Timer(t.snapshot()),
            MetricHandle::Meter(m) => MetricValue::Meter(m.snapshot(now)),
            MetricHandle::Gauge(g) => MetricValue::Gauge { value: g.sample()? },
        })
    }

    pub(crate) fn reset(&self, now: Duration) {
        match self {
            MetricHandle::Counter(c) => c.reset(),
            MetricHandle::Timer(t) => t.reset(),
            MetricHandle::Meter(m) => m.reset(now),
            MetricHandle::Gauge(g) => g.reset(),
        }
    }
}

/// Point-in-time value of one metric.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum MetricValue {
    Counter { count: u64 },
    Timer(TimerSnapshot),
    Meter(MeterSnapshot),
    Gauge { value: f64 },
}
