//! Facade-wide tag generators.
//!
//! Call-sites without their own generator fall back to these: result
//! generators are looked up by the result's concrete type, errors go through
//! a single default generator.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use metricweave_core::error::{MetricsError, Result};
use metricweave_core::Tags;

use crate::marker::{typed_generator, TagGenerator};

#[derive(Clone, Default)]
pub struct TagGenerators {
    by_result_type: HashMap<TypeId, TagGenerator>,
    default_error: Option<TagGenerator>,
}

impl std::fmt::Debug for TagGenerators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TagGenerators")
            .field("result_types", &self.by_result_type.len())
            .field("default_error", &self.default_error.is_some())
            .finish()
    }
}

impl TagGenerators {
    /// Register the generator used for results of type `T`. Replaces any
    /// earlier one for the same type.
    pub fn register<T: 'static>(&mut self, f: impl Fn(&T) -> Tags + Send + Sync + 'static) {
        self.by_result_type.insert(TypeId::of::<T>(), typed_generator(f));
    }

    pub fn deregister<T: 'static>(&mut self) {
        self.by_result_type.remove(&TypeId::of::<T>());
    }

    pub fn set_default_error(&mut self, f: impl Fn(&dyn Any) -> Tags + Send + Sync + 'static) {
        self.default_error = Some(Arc::new(move |err: &dyn Any| Some(f(err))));
    }

    pub fn for_result(&self, value: &dyn Any) -> Option<&TagGenerator> {
        self.by_result_type.get(&value.type_id())
    }

    pub fn for_error(&self) -> Option<&TagGenerator> {
        self.default_error.as_ref()
    }
}

/// Run a user generator. A panic becomes a recording failure.
pub(crate) fn generate(generator: &TagGenerator, value: &dyn Any) -> Result<Option<Tags>> {
    catch_unwind(AssertUnwindSafe(|| generator(value)))
        .map_err(|_| MetricsError::RecordingFailure("tag generator panicked".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_generators_are_keyed_by_type() {
        let mut g = TagGenerators::default();
        g.register(|n: &u64| Tags::of(&[("even", if n % 2 == 0 { "yes" } else { "no" })]));

        let gen = g.for_result(&4u64).unwrap();
        assert_eq!(generate(gen, &4u64).unwrap(), Some(Tags::of(&[("even", "yes")])));
        assert!(g.for_result(&4u32).is_none());

        g.deregister::<u64>();
        assert!(g.for_result(&4u64).is_none());
    }

    #[test]
    fn panicking_generator_is_a_recording_failure() {
        let mut g = TagGenerators::default();
        g.set_default_error(|_| -> Tags { panic!("broken generator") });
        let err = generate(g.for_error().unwrap(), &"boom").unwrap_err();
        assert!(matches!(err, MetricsError::RecordingFailure(_)));
    }
}
