//! Diagnostic channel for recording-path failures.
//!
//! Recording failures never reach the caller. They are counted, and reported
//! as warnings through a token bucket so a call-site failing on every call
//! under load logs once per interval instead of once per call.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use metricweave_core::{MetricIdentity, MetricsError};

use crate::naming::CallSite;

pub struct RecordingDiagnostics {
    failures: AtomicU64,
    limiter: Mutex<TokenBucket>,
}

impl RecordingDiagnostics {
    pub fn new(interval: Duration) -> Self {
        Self {
            failures: AtomicU64::new(0),
            limiter: Mutex::new(TokenBucket::new(interval)),
        }
    }

    /// Total recording failures seen, logged or not.
    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    pub fn recording_failed(&self, site: &CallSite, identity: &MetricIdentity, err: &MetricsError) {
        self.failures.fetch_add(1, Ordering::Relaxed);

        // Poisoned mutex means a logic bug; stay quiet rather than panic.
        let Ok(mut bucket) = self.limiter.lock() else {
            return;
        };
        if let Some(suppressed) = bucket.take(Instant::now()) {
            tracing::warn!(
                type_name = site.type_name(),
                operation = site.operation(),
                metric = %identity,
                error = %err,
                suppressed,
                "metric recording failed; call outcome unaffected"
            );
        }
    }
}

/// Single-token bucket refilled once per interval; counts what it refuses.
#[derive(Debug)]
struct TokenBucket {
    interval: Duration,
    tokens: u32,
    suppressed: u64,
    last: Instant,
}

impl TokenBucket {
    fn new(interval: Duration) -> Self {
        Self {
            interval,
            tokens: 1,
            suppressed: 0,
            last: Instant::now(),
        }
    }

    /// `Some(suppressed_since_last)` when a token was available.
    fn take(&mut self, now: Instant) -> Option<u64> {
        self.refill(now);

        if self.tokens == 0 {
            self.suppressed += 1;
            return None;
        }
        self.tokens -= 1;
        Some(std::mem::take(&mut self.suppressed))
    }

    fn refill(&mut self, now: Instant) {
        if now.saturating_duration_since(self.last) >= self.interval {
            self.tokens = 1;
            self.last = now;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_allows_one_per_interval() {
        let mut b = TokenBucket::new(Duration::from_secs(3600));
        let t0 = b.last;
        assert_eq!(b.take(t0), Some(0));
        assert_eq!(b.take(t0 + Duration::from_secs(1)), None);
        assert_eq!(b.take(t0 + Duration::from_secs(2)), None);
        assert_eq!(b.take(t0 + Duration::from_secs(3601)), Some(2));
    }

    #[test]
    fn every_failure_is_counted() {
        let d = RecordingDiagnostics::new(Duration::from_secs(3600));
        let site = CallSite::new("T", "op");
        let id = MetricIdentity::named("x");
        let err = MetricsError::RecordingFailure("nope".into());
        for _ in 0..5 {
            d.recording_failed(&site, &id, &err);
        }
        assert_eq!(d.failures(), 5);
    }
}
