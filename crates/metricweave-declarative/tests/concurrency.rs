//! One call-site hammered from many threads.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::sync::{Arc, Barrier};

use metricweave_core::MetricRegistry;
use metricweave_declarative::{call_site, FailureRule, Measure, MetricsError, MetricsFacade};

const THREADS: usize = 8;
const CALLS: usize = 500;

struct Worker;

#[test]
fn no_lost_updates_across_threads() {
    let facade = MetricsFacade::new(Arc::new(MetricRegistry::new()));
    let site = facade.interceptor(
        call_site!(Worker, "step"),
        Measure::timer().failing_on(FailureRule::of_type::<MetricsError>()),
    );
    let barrier = Barrier::new(THREADS);

    std::thread::scope(|s| {
        for t in 0..THREADS {
            let site = &site;
            let barrier = &barrier;
            s.spawn(move || {
                // All threads race the first resolution.
                barrier.wait();
                for n in 0..CALLS {
                    let r: Result<usize, MetricsError> = site.invoke(|| {
                        if n % 10 == 0 {
                            Err(MetricsError::RecordingFailure(format!("thread {t}")))
                        } else {
                            Ok(n)
                        }
                    });
                    assert_eq!(r.is_ok(), n % 10 != 0);
                }
            });
        }
    });

    let id = site.descriptor().unwrap().identity().clone();
    let reg = facade.registry();
    assert_eq!(reg.timer(&id).unwrap().count(), (THREADS * CALLS) as u64);
    assert_eq!(reg.counter(&id.failures()).unwrap().get(), (THREADS * CALLS / 10) as u64);
    // the timer plus its failure counter, nothing duplicated
    assert_eq!(reg.len(), 2);
}

#[test]
fn separate_interceptors_for_one_identity_share_the_metric() {
    let facade = MetricsFacade::new(Arc::new(MetricRegistry::new()));
    let barrier = Barrier::new(THREADS);

    std::thread::scope(|s| {
        for _ in 0..THREADS {
            let facade = facade.clone();
            let barrier = &barrier;
            s.spawn(move || {
                let site = facade.interceptor(call_site!(Worker, "shared"), Measure::counter());
                barrier.wait();
                for _ in 0..CALLS {
                    site.invoke_infallible(|| ()).unwrap();
                }
            });
        }
    });

    let snap = facade.registry().snapshot();
    assert_eq!(snap.len(), 1);
    assert_eq!(
        snap[0].value,
        metricweave_core::MetricValue::Counter {
            count: (THREADS * CALLS) as u64
        }
    );
}
