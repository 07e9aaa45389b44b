//! Call-site metadata and metric naming.

use metricweave_core::identity::SEPARATOR;
use metricweave_core::{MetricIdentity, Tags};

pub use crate::config::schema::TypeNameStyle;

/// Static description of one instrumented operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallSite {
    type_name: &'static str,
    operation: &'static str,
}

impl CallSite {
    pub const fn new(type_name: &'static str, operation: &'static str) -> Self {
        Self {
            type_name,
            operation,
        }
    }

    /// Call-site declared on `T`, named after `T`'s type path.
    ///
    /// The path comes from `std::any::type_name`, whose output is not
    /// guaranteed to be stable across compiler versions. Names that must
    /// survive a toolchain upgrade should use [`CallSite::new`] with a fixed
    /// type name, or an explicit `Measure::named` override.
    pub fn of<T: ?Sized>(operation: &'static str) -> Self {
        Self::new(std::any::type_name::<T>(), operation)
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn operation(&self) -> &'static str {
        self.operation
    }

    /// Last path segment of the type name, generic arguments stripped.
    pub fn simple_type_name(&self) -> &'static str {
        let base = self
            .type_name
            .split_once('<')
            .map_or(self.type_name, |(head, _)| head);
        base.rsplit("::").next().unwrap_or(base)
    }
}

/// Build a [`CallSite`].
///
/// `call_site!(Type, "op")` names the site after `Type` (see [`CallSite::of`]
/// for the stability of that name); `call_site!("op")` names it after the
/// enclosing module, for free functions.
#[macro_export]
macro_rules! call_site {
    ($ty:ty, $op:expr) => {
        $crate::naming::CallSite::of::<$ty>($op)
    };
    ($op:expr) => {
        $crate::naming::CallSite::new(::std::module_path!(), $op)
    };
}

/// Maps call-site metadata to a metric identity.
///
/// Implementations must be deterministic: the same inputs give an equal
/// identity on every call and across restarts.
pub trait NamingStrategy: Send + Sync {
    fn resolve(&self, site: &CallSite, override_name: Option<&str>, tags: &Tags) -> MetricIdentity;
}

/// `[prefix.]Type` / `operation`, or the override verbatim as label.
#[derive(Debug, Clone, Default)]
pub struct DefaultNaming {
    prefix: Option<String>,
    style: TypeNameStyle,
    default_tags: Tags,
}

impl DefaultNaming {
    pub fn new(prefix: Option<String>, style: TypeNameStyle, default_tags: Tags) -> Self {
        Self {
            prefix,
            style,
            default_tags,
        }
    }

    fn type_part<'a>(&self, site: &'a CallSite) -> &'a str {
        match self.style {
            TypeNameStyle::Qualified => site.type_name(),
            TypeNameStyle::Simple => site.simple_type_name(),
        }
    }
}

impl NamingStrategy for DefaultNaming {
    fn resolve(&self, site: &CallSite, override_name: Option<&str>, tags: &Tags) -> MetricIdentity {
        let tags = self.default_tags.merged(tags);
        match (override_name, &self.prefix) {
            (Some(name), Some(prefix)) => MetricIdentity::new(prefix.clone(), name, tags),
            (Some(name), None) => MetricIdentity::new(String::new(), name, tags),
            (None, Some(prefix)) => MetricIdentity::new(
                format!("{prefix}{SEPARATOR}{}", self.type_part(site)),
                site.operation(),
                tags,
            ),
            (None, None) => MetricIdentity::new(self.type_part(site), site.operation(), tags),
        }
    }
}
