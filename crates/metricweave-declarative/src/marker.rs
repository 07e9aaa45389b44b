//! Declarative markers: what to measure at a call-site and what counts as a
//! failure.
//!
//! ```
//! use metricweave_declarative::marker::{FailureRule, Measure};
//!
//! #[derive(Debug)]
//! enum CalcError { Overflow, DivideByZero }
//!
//! let m = Measure::timer()
//!     .named("totals")
//!     .tag("unit", "cents")
//!     .failing_on(FailureRule::when(|e: &CalcError| matches!(e, CalcError::DivideByZero)));
//! assert!(m.failure_rule().is_some());
//! ```

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use metricweave_core::{MetricKind, Sampler, Tags};

pub use crate::config::schema::GaugeMode;

/// How an intercepted call ended.
#[derive(Clone, Copy)]
pub enum Exit<'a> {
    /// The operation returned this value.
    Success(&'a dyn Any),
    /// The operation returned an error value.
    Error(&'a dyn Any),
    /// The operation never returned: it panicked, or its future was dropped.
    Aborted,
}

impl Exit<'_> {
    pub fn is_failure(&self) -> bool {
        !matches!(self, Exit::Success(_))
    }
}

impl fmt::Debug for Exit<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Exit::Success(_) => f.write_str("Success(..)"),
            Exit::Error(_) => f.write_str("Error(..)"),
            Exit::Aborted => f.write_str("Aborted"),
        }
    }
}

type Predicate = Arc<dyn Fn(&dyn Any) -> bool + Send + Sync>;

/// Tags derived from a result or error value. `None` when the value is not
/// of the type the generator was written for.
pub type TagGenerator = Arc<dyn Fn(&dyn Any) -> Option<Tags> + Send + Sync>;

pub(crate) fn typed_generator<V: 'static>(f: impl Fn(&V) -> Tags + Send + Sync + 'static) -> TagGenerator {
    Arc::new(move |value: &dyn Any| value.downcast_ref::<V>().map(&f))
}

#[derive(Clone)]
enum Matcher {
    AnyError,
    Aborted,
    Predicate(Predicate),
}

/// Decides which failed exits increment a call-site's failure counter.
///
/// A rule is a list of matchers; it matches when any of them does.
#[derive(Clone)]
pub struct FailureRule {
    matchers: Vec<Matcher>,
}

impl fmt::Debug for FailureRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FailureRule")
            .field("matchers", &self.matchers.len())
            .finish()
    }
}

impl FailureRule {
    /// Every error and every aborted exit.
    pub fn any() -> Self {
        Self {
            matchers: vec![Matcher::AnyError, Matcher::Aborted],
        }
    }

    /// Panics and cancellations only.
    pub fn aborted() -> Self {
        Self {
            matchers: vec![Matcher::Aborted],
        }
    }

    /// Any error value of type `E`.
    pub fn of_type<E: 'static>() -> Self {
        Self::when(|_: &E| true)
    }

    /// Error values of type `E` for which `pred` holds. Errors of another
    /// type never match.
    pub fn when<E: 'static>(pred: impl Fn(&E) -> bool + Send + Sync + 'static) -> Self {
        let p: Predicate = Arc::new(move |err: &dyn Any| err.downcast_ref::<E>().is_some_and(&pred));
        Self {
            matchers: vec![Matcher::Predicate(p)],
        }
    }

    /// Rule matching when either rule matches.
    pub fn or(mut self, other: FailureRule) -> Self {
        self.matchers.extend(other.matchers);
        self
    }

    pub fn matches(&self, exit: Exit<'_>) -> bool {
        self.matchers.iter().any(|m| match (m, exit) {
            (_, Exit::Success(_)) => false,
            (Matcher::AnyError, Exit::Error(_)) => true,
            (Matcher::Aborted, Exit::Aborted) => true,
            (Matcher::Predicate(p), Exit::Error(err)) => p(err),
            _ => false,
        })
    }
}

/// Marker attached to one call-site.
#[derive(Clone)]
pub struct Measure {
    kind: MetricKind,
    name: Option<String>,
    tags: Tags,
    failure: Option<FailureRule>,
    sampler: Option<Sampler>,
    gauge_mode: Option<GaugeMode>,
    success_tags: Option<TagGenerator>,
    error_tags: Option<TagGenerator>,
}

impl fmt::Debug for Measure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Measure")
            .field("kind", &self.kind)
            .field("name", &self.name)
            .field("tags", &self.tags)
            .field("failure", &self.failure)
            .field("gauge_mode", &self.gauge_mode)
            .field("tags_on_success", &self.success_tags.is_some())
            .field("tags_on_error", &self.error_tags.is_some())
            .finish()
    }
}

impl Measure {
    fn of_kind(kind: MetricKind) -> Self {
        Self {
            kind,
            name: None,
            tags: Tags::empty(),
            failure: None,
            sampler: None,
            gauge_mode: None,
            success_tags: None,
            error_tags: None,
        }
    }

    /// Record the duration of every call.
    pub fn timer() -> Self {
        Self::of_kind(MetricKind::Timer)
    }

    /// Count every call.
    pub fn counter() -> Self {
        Self::of_kind(MetricKind::Counter)
    }

    /// Track the call rate.
    pub fn meter() -> Self {
        Self::of_kind(MetricKind::Meter)
    }

    /// Expose the value produced by `sampler`.
    pub fn gauge(sampler: impl Fn() -> f64 + Send + Sync + 'static) -> Self {
        let mut m = Self::of_kind(MetricKind::Gauge);
        m.sampler = Some(Arc::new(sampler));
        m
    }

    /// Use `name` verbatim as the metric label instead of the derived one.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.add(key, value);
        self
    }

    pub fn tags(mut self, tags: &Tags) -> Self {
        self.tags.merge(tags);
        self
    }

    pub fn failing_on(mut self, rule: FailureRule) -> Self {
        self.failure = Some(rule);
        self
    }

    /// Override the facade's gauge mode for this call-site.
    pub fn gauge_mode(mut self, mode: GaugeMode) -> Self {
        self.gauge_mode = Some(mode);
        self
    }

    /// Tag each successful call with tags derived from its `T` result.
    /// Results of another type fall back to the facade's result generators.
    pub fn tags_on_success<T: 'static>(mut self, f: impl Fn(&T) -> Tags + Send + Sync + 'static) -> Self {
        self.success_tags = Some(typed_generator(f));
        self
    }

    /// Tag each failed call with tags derived from its `E` error. Errors of
    /// another type fall back to the facade's default error generator.
    pub fn tags_on_error<E: 'static>(mut self, f: impl Fn(&E) -> Tags + Send + Sync + 'static) -> Self {
        self.error_tags = Some(typed_generator(f));
        self
    }

    pub fn kind(&self) -> MetricKind {
        self.kind
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn marker_tags(&self) -> &Tags {
        &self.tags
    }

    pub fn failure_rule(&self) -> Option<&FailureRule> {
        self.failure.as_ref()
    }

    pub fn sampler(&self) -> Option<&Sampler> {
        self.sampler.as_ref()
    }

    pub fn declared_gauge_mode(&self) -> Option<GaugeMode> {
        self.gauge_mode
    }

    pub fn success_tags(&self) -> Option<&TagGenerator> {
        self.success_tags.as_ref()
    }

    pub fn error_tags(&self) -> Option<&TagGenerator> {
        self.error_tags.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    enum CalcError {
        DivideByZero,
        Overflow,
    }

    #[test]
    fn typed_rule_matches_only_its_predicate() {
        let rule = FailureRule::when(|e: &CalcError| *e == CalcError::DivideByZero);
        assert!(rule.matches(Exit::Error(&CalcError::DivideByZero)));
        assert!(!rule.matches(Exit::Error(&CalcError::Overflow)));
        assert!(!rule.matches(Exit::Error(&"other type")));
        assert!(!rule.matches(Exit::Aborted));
        assert!(!rule.matches(Exit::Success(&0u8)));
    }

    #[test]
    fn or_combines_class_lists() {
        let rule = FailureRule::of_type::<CalcError>().or(FailureRule::of_type::<std::io::Error>());
        let io = std::io::Error::other("x");
        assert!(rule.matches(Exit::Error(&CalcError::Overflow)));
        assert!(rule.matches(Exit::Error(&io)));
        assert!(!rule.matches(Exit::Error(&42u8)));
    }

    #[test]
    fn any_rule_includes_aborts() {
        let rule = FailureRule::any();
        assert!(rule.matches(Exit::Aborted));
        assert!(rule.matches(Exit::Error(&1u32)));
        assert!(!FailureRule::aborted().matches(Exit::Error(&1u32)));
    }

    #[test]
    fn tag_generators_only_fire_for_their_type() {
        let m = Measure::timer()
            .tags_on_success(|n: &u32| Tags::of(&[("size", if *n > 10 { "large" } else { "small" })]))
            .tags_on_error(|e: &CalcError| Tags::of(&[("error", if *e == CalcError::Overflow { "overflow" } else { "other" })]));

        let on_ok = m.success_tags().unwrap();
        assert_eq!(on_ok(&42u32), Some(Tags::of(&[("size", "large")])));
        assert_eq!(on_ok(&"not a u32"), None);

        let on_err = m.error_tags().unwrap();
        assert_eq!(on_err(&CalcError::Overflow), Some(Tags::of(&[("error", "overflow")])));
        assert_eq!(on_err(&std::io::Error::other("x")), None);
    }
}
