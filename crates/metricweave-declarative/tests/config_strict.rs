#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use metricweave_core::{ErrorClass, MetricsError};
use metricweave_declarative::config::{self, GaugeMode, TypeNameStyle};

#[test]
fn deny_unknown_fields() {
    let bad = r#"
version: 1
prefx: "shop" # typo should fail
"#;

    let err = config::load_from_str(bad).expect_err("must fail");
    assert_eq!(err.class().as_str(), ErrorClass::Configuration.as_str());
}

#[test]
fn ok_minimal_config() {
    let cfg = config::load_from_str("version: 1\n").expect("must parse");
    assert_eq!(cfg.version, 1);
    assert_eq!(cfg.prefix, None);
    assert_eq!(cfg.type_names, TypeNameStyle::Qualified);
    assert_eq!(cfg.gauge_mode, GaugeMode::Pull);
    assert_eq!(cfg.warn_interval_ms, 10_000);
}

#[test]
fn full_config() {
    let cfg = config::load_from_str(
        r#"
version: 1
prefix: "shop"
tags:
  env: "prod"
  region: "eu-west-1"
type_names: simple
gauge_mode: push
max_metrics: 5000
warn_interval_ms: 500
"#,
    )
    .expect("must parse");
    assert_eq!(cfg.prefix.as_deref(), Some("shop"));
    assert_eq!(cfg.tags.len(), 2);
    assert_eq!(cfg.gauge_mode, GaugeMode::Push);
    assert_eq!(cfg.max_metrics, Some(5000));
}

#[test]
fn unsupported_version() {
    let err = config::load_from_str("version: 2\n").unwrap_err();
    assert_eq!(err, MetricsError::UnsupportedVersion);
}

#[test]
fn out_of_range_values_are_rejected() {
    for bad in [
        "version: 1\nwarn_interval_ms: 5\n",
        "version: 1\nmax_metrics: 0\n",
        "version: 1\nprefix: \"has space\"\n",
    ] {
        let err = config::load_from_str(bad).unwrap_err();
        assert!(matches!(err, MetricsError::InvalidConfig(_)), "{bad}: {err}");
    }
}
