use std::collections::BTreeMap;

use serde::Deserialize;
use metricweave_core::error::{MetricsError, Result};

/// How the declaring type appears in derived metric namespaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeNameStyle {
    /// Full path, e.g. `billing::ledger::Ledger`.
    #[default]
    Qualified,
    /// Last path segment only, e.g. `Ledger`.
    Simple,
}

/// When gauge call-sites sample their callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GaugeMode {
    /// Exporters poll the callback when they read a snapshot.
    #[default]
    Pull,
    /// The engine polls the callback after every invocation.
    Push,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetricsConfig {
    pub version: u32,

    /// Namespace prefix applied to every metric.
    #[serde(default)]
    pub prefix: Option<String>,

    /// Tags merged into every metric identity.
    #[serde(default)]
    pub tags: BTreeMap<String, String>,

    #[serde(default)]
    pub type_names: TypeNameStyle,

    #[serde(default)]
    pub gauge_mode: GaugeMode,

    /// Upper bound on distinct identities; unbounded when absent.
    #[serde(default)]
    pub max_metrics: Option<usize>,

    /// Minimum spacing between recording-failure warnings of one call-site.
    #[serde(default = "default_warn_interval_ms")]
    pub warn_interval_ms: u64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            version: 1,
            prefix: None,
            tags: BTreeMap::new(),
            type_names: TypeNameStyle::default(),
            gauge_mode: GaugeMode::default(),
            max_metrics: None,
            warn_interval_ms: default_warn_interval_ms(),
        }
    }
}

impl MetricsConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(MetricsError::UnsupportedVersion);
        }
        if let Some(prefix) = &self.prefix {
            if prefix.is_empty() || prefix.chars().any(char::is_whitespace) {
                return Err(MetricsError::InvalidConfig(
                    "prefix must be non-empty and contain no whitespace".into(),
                ));
            }
        }
        if self.tags.keys().any(|k| k.is_empty()) {
            return Err(MetricsError::InvalidConfig("tag keys must not be empty".into()));
        }
        if self.max_metrics == Some(0) {
            return Err(MetricsError::InvalidConfig("max_metrics must be at least 1".into()));
        }
        if !(100..=3_600_000).contains(&self.warn_interval_ms) {
            return Err(MetricsError::InvalidConfig(
                "warn_interval_ms must be between 100 and 3600000".into(),
            ));
        }
        Ok(())
    }
}

fn default_warn_interval_ms() -> u64 {
    10_000
}
