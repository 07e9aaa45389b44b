//! Tag sets attached to metric identities.
//!
//! Tags are kept in a `BTreeMap` so two sets with the same pairs compare and
//! hash equal regardless of the order they were added in.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{MetricsError, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tags {
    pairs: BTreeMap<String, String>,
}

impl Tags {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build from key/value pairs. Later duplicates win.
    pub fn of(pairs: &[(&str, &str)]) -> Self {
        let mut tags = Self::empty();
        for (k, v) in pairs {
            tags.add(*k, *v);
        }
        tags
    }

    /// Build from a flat `[k1, v1, k2, v2, ...]` list.
    pub fn from_flat(flat: &[&str]) -> Result<Self> {
        if flat.len() % 2 != 0 {
            return Err(MetricsError::InvalidTags(format!(
                "tags must be key/value pairs, got {} items",
                flat.len()
            )));
        }
        let mut tags = Self::empty();
        for kv in flat.chunks_exact(2) {
            tags.add(kv[0], kv[1]);
        }
        Ok(tags)
    }

    /// Insert or overwrite one tag in place.
    pub fn add(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.pairs.insert(key.into(), value.into());
        self
    }

    /// Merge `other` into this set; `other` wins on key collisions.
    pub fn merge(&mut self, other: &Tags) -> &mut Self {
        for (k, v) in &other.pairs {
            self.pairs.insert(k.clone(), v.clone());
        }
        self
    }

    /// Copy of this set with `other` merged on top. `self` is unchanged.
    pub fn merged(&self, other: &Tags) -> Tags {
        let mut out = self.clone();
        out.merge(other);
        out
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

impl From<BTreeMap<String, String>> for Tags {
    fn from(pairs: BTreeMap<String, String>) -> Self {
        Self { pairs }
    }
}

impl fmt::Display for Tags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (k, v) in &self.pairs {
            if !first {
                f.write_str(",")?;
            }
            write!(f, "{k}={v}")?;
            first = false;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insertion_order_is_irrelevant() {
        let a = Tags::of(&[("region", "eu"), ("svc", "billing")]);
        let b = Tags::of(&[("svc", "billing"), ("region", "eu")]);
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "region=eu,svc=billing");
    }

    #[test]
    fn odd_flat_list_is_rejected() {
        let err = Tags::from_flat(&["a", "b", "c"]).unwrap_err();
        assert!(matches!(err, MetricsError::InvalidTags(_)));
    }

    #[test]
    fn merged_leaves_original_untouched() {
        let base = Tags::of(&[("a", "1")]);
        let merged = base.merged(&Tags::of(&[("a", "2"), ("b", "3")]));
        assert_eq!(base.get("a"), Some("1"));
        assert_eq!(merged.get("a"), Some("2"));
        assert_eq!(merged.len(), 2);
    }
}
