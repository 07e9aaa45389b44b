//! Metric identity and kind.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::tags::Tags;

/// Separator between namespace and label in rendered names.
pub const SEPARATOR: char = '.';

/// Label suffix of the counter that tracks classified failures of a metric.
pub const FAILURE_SUFFIX: &str = "failures";

/// Statistical shape of a metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Counter,
    Timer,
    Meter,
    Gauge,
}

impl MetricKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MetricKind::Counter => "counter",
            MetricKind::Timer => "timer",
            MetricKind::Meter => "meter",
            MetricKind::Gauge => "gauge",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Registry lookup key. Equal iff namespace, label and tags are equal.
///
/// Equality is structural, not textual: `("a.b", "c")` and `("a", "b.c")`
/// are two metrics even though both render as `a.b.c`. Exporters that key on
/// [`MetricIdentity::name`] should keep namespace and label apart.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct MetricIdentity {
    namespace: String,
    label: String,
    tags: Tags,
}

impl MetricIdentity {
    pub fn new(namespace: impl Into<String>, label: impl Into<String>, tags: Tags) -> Self {
        Self {
            namespace: namespace.into(),
            label: label.into(),
            tags,
        }
    }

    /// Identity without a namespace; the label is the whole name.
    pub fn named(label: impl Into<String>) -> Self {
        Self::new(String::new(), label, Tags::empty())
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn tags(&self) -> &Tags {
        &self.tags
    }

    /// Rendered name, `namespace.label`, or just the label without a namespace.
    pub fn name(&self) -> String {
        if self.namespace.is_empty() {
            self.label.clone()
        } else {
            format!("{}{}{}", self.namespace, SEPARATOR, self.label)
        }
    }

    /// Same identity with extra tags merged on top.
    pub fn with_tags(&self, extra: &Tags) -> Self {
        if extra.is_empty() {
            return self.clone();
        }
        Self {
            namespace: self.namespace.clone(),
            label: self.label.clone(),
            tags: self.tags.merged(extra),
        }
    }

    /// Identity of the failure counter paired with this metric.
    ///
    /// Its label is this label plus `.failures`, so a user metric labelled
    /// `op.failures` with the same namespace and tags is the same identity.
    /// Both are counters only if the user metric is one; otherwise resolving
    /// the failure counter is a kind conflict.
    pub fn failures(&self) -> Self {
        Self {
            namespace: self.namespace.clone(),
            label: format!("{}{}{}", self.label, SEPARATOR, FAILURE_SUFFIX),
            tags: self.tags.clone(),
        }
    }
}

impl fmt::Display for MetricIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())?;
        if !self.tags.is_empty() {
            write!(f, "{{{}}}", self.tags)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_joins_namespace_and_label() {
        let id = MetricIdentity::new("billing::Ledger", "post", Tags::empty());
        assert_eq!(id.name(), "billing::Ledger.post");
        assert_eq!(MetricIdentity::named("custom").name(), "custom");
    }

    #[test]
    fn failures_identity_keeps_tags() {
        let id = MetricIdentity::new("ns", "op", Tags::of(&[("a", "b")]));
        let f = id.failures();
        assert_eq!(f.name(), "ns.op.failures");
        assert_eq!(f.tags(), id.tags());
        assert_ne!(f, id);
    }

    #[test]
    fn failure_label_is_an_ordinary_label() {
        let id = MetricIdentity::new("ns", "op", Tags::empty());
        assert_eq!(id.failures(), MetricIdentity::new("ns", "op.failures", Tags::empty()));
    }

    #[test]
    fn display_includes_tags() {
        let id = MetricIdentity::new("ns", "op", Tags::of(&[("k", "v")]));
        assert_eq!(id.to_string(), "ns.op{k=v}");
    }
}
