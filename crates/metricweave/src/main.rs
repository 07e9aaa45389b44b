//! metricweave demo
//!
//! Wires a facade at the composition root, runs an instrumented operation a
//! few times (one call fails) and prints the registry snapshot as JSON.
//!
//! Config comes from the `METRICWEAVE_CONFIG` environment variable (YAML),
//! defaults otherwise. Log level via `RUST_LOG`.

use tracing_subscriber::{fmt, EnvFilter};

use metricweave::declarative::{config, from_fn, Operation};
use metricweave::{call_site, global, FailureRule, Instrumented, Measure, MetricsError, MetricsFacade};

enum TotalError {
    Overflow,
    Metrics(MetricsError),
}

impl From<MetricsError> for TotalError {
    fn from(e: MetricsError) -> Self {
        TotalError::Metrics(e)
    }
}

struct Checkout;

fn compute_total(items: &[u64]) -> Result<u64, TotalError> {
    items
        .iter()
        .try_fold(0u64, |acc, &x| acc.checked_add(x))
        .ok_or(TotalError::Overflow)
}

fn main() {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let cfg = match std::env::var("METRICWEAVE_CONFIG") {
        Ok(yaml) => config::load_from_str(&yaml).expect("config load failed"),
        Err(_) => config::MetricsConfig::default(),
    };
    let facade = MetricsFacade::from_config(&cfg).expect("invalid config");
    global::install(facade.clone());

    let total = Instrumented::new(
        from_fn(|items: Vec<u64>| compute_total(&items)),
        &facade,
        call_site!(Checkout, "compute_total"),
        Measure::timer().failing_on(FailureRule::when(|e: &TotalError| matches!(e, TotalError::Overflow))),
    );

    let baskets = [vec![1, 2, 3], vec![], vec![u64::MAX, 1], vec![10, 20], vec![7]];
    for basket in baskets {
        let items = basket.len();
        match total.call(basket) {
            Ok(sum) => tracing::info!(items, sum, "basket totalled"),
            Err(TotalError::Overflow) => tracing::warn!(items, "basket total overflowed"),
            Err(TotalError::Metrics(e)) => tracing::error!(error = %e, "metrics misconfigured"),
        }
    }

    let snapshot = facade.registry().snapshot();
    let json = serde_json::to_string_pretty(&snapshot).expect("snapshot serializes");
    println!("{json}");
}
