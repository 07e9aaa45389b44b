//! A call-site that cannot resolve logs once, however often it is called.
//!
//! Kept in its own test binary: the capturing subscriber is scoped to one
//! thread and nothing else should emit into it.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::io;
use std::sync::{Arc, Mutex};

use metricweave_core::{MetricIdentity, MetricRegistry, Tags};
use metricweave_declarative::{call_site, Measure, MetricsError, MetricsFacade};

#[derive(Clone, Default)]
struct Captured(Arc<Mutex<Vec<u8>>>);

impl io::Write for Captured {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Captured {
    fn lines_containing(&self, needle: &str) -> usize {
        let bytes = self.0.lock().unwrap();
        String::from_utf8_lossy(&bytes)
            .lines()
            .filter(|l| l.contains(needle))
            .count()
    }
}

struct Ledger;

#[test]
fn conflicts_are_logged_once_per_call_site() {
    let captured = Captured::default();
    let writer = captured.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::TRACE)
        .finish();

    tracing::subscriber::with_default(subscriber, || {
        let facade = MetricsFacade::new(Arc::new(MetricRegistry::new()));
        facade
            .registry()
            .counter(&MetricIdentity::named("posted"))
            .unwrap();

        let post = facade.interceptor(call_site!(Ledger, "post"), Measure::timer().named("posted"));
        for _ in 0..5 {
            let r: Result<(), MetricsError> = post.invoke(|| Ok(()));
            assert!(r.unwrap_err().is_kind_conflict());
        }

        let acme = Tags::of(&[("customer", "acme")]);
        facade
            .registry()
            .timer(&MetricIdentity::named("charged").with_tags(&acme))
            .unwrap();
        let charge = facade.interceptor(call_site!(Ledger, "charge"), Measure::counter().named("charged"));
        for _ in 0..5 {
            let r: Result<(), MetricsError> = charge.invoke_tagged(&acme, || Ok(()));
            assert!(r.unwrap_err().is_kind_conflict());
        }
    });

    assert_eq!(captured.lines_containing("call-site resolution failed"), 1);
    assert_eq!(captured.lines_containing("per-call tags conflict"), 1);
}
