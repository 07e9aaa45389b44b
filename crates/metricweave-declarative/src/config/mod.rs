//! Facade config (strict parsing).
//!
//! Input is a YAML string; reading it from wherever it lives is the
//! caller's business.

pub mod schema;

use metricweave_core::error::{MetricsError, Result};

pub use schema::{GaugeMode, MetricsConfig, TypeNameStyle};

pub fn load_from_str(s: &str) -> Result<MetricsConfig> {
    let cfg: MetricsConfig = serde_yaml::from_str(s)
        .map_err(|e| MetricsError::InvalidConfig(format!("invalid yaml: {e}")))?;
    cfg.validate()?;
    Ok(cfg)
}
