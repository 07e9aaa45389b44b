//! Interface-based wrapping.
//!
//! Operations implemented against [`Operation`] (or [`AsyncOperation`]) can
//! be wrapped in [`Instrumented`], a proxy implementing the same trait that
//! measures every call. Callers hold the proxy and never see the engine.

use std::marker::PhantomData;

use async_trait::async_trait;
use metricweave_core::MetricsError;

use crate::engine::Interceptor;
use crate::facade::MetricsFacade;
use crate::marker::Measure;
use crate::naming::CallSite;

/// A synchronous, fallible operation.
pub trait Operation {
    type Input;
    type Output;
    type Error;

    fn call(&self, input: Self::Input) -> Result<Self::Output, Self::Error>;
}

/// An asynchronous, fallible operation.
#[async_trait]
pub trait AsyncOperation: Send + Sync {
    type Input: Send;
    type Output: Send;
    type Error: Send;

    async fn call_async(&self, input: Self::Input) -> Result<Self::Output, Self::Error>;
}

/// Adapts a closure to [`Operation`].
pub struct FnOperation<F, I, O, E> {
    f: F,
    _sig: PhantomData<fn(I) -> Result<O, E>>,
}

pub fn from_fn<F, I, O, E>(f: F) -> FnOperation<F, I, O, E>
where
    F: Fn(I) -> Result<O, E>,
{
    FnOperation { f, _sig: PhantomData }
}

impl<F, I, O, E> Operation for FnOperation<F, I, O, E>
where
    F: Fn(I) -> Result<O, E>,
{
    type Input = I;
    type Output = O;
    type Error = E;

    fn call(&self, input: I) -> Result<O, E> {
        (self.f)(input)
    }
}

/// Measuring proxy around an operation.
pub struct Instrumented<O> {
    inner: O,
    interceptor: Interceptor,
}

impl<O> Instrumented<O> {
    pub fn new(inner: O, facade: &MetricsFacade, site: CallSite, measure: Measure) -> Self {
        Self {
            inner,
            interceptor: facade.interceptor(site, measure),
        }
    }

    pub fn inner(&self) -> &O {
        &self.inner
    }

    pub fn interceptor(&self) -> &Interceptor {
        &self.interceptor
    }

    pub fn into_inner(self) -> O {
        self.inner
    }
}

impl<O> Operation for Instrumented<O>
where
    O: Operation,
    O::Output: 'static,
    O::Error: From<MetricsError> + 'static,
{
    type Input = O::Input;
    type Output = O::Output;
    type Error = O::Error;

    fn call(&self, input: Self::Input) -> Result<Self::Output, Self::Error> {
        self.interceptor.invoke(|| self.inner.call(input))
    }
}

#[async_trait]
impl<O> AsyncOperation for Instrumented<O>
where
    O: AsyncOperation,
    O::Output: 'static,
    O::Error: From<MetricsError> + 'static,
{
    type Input = O::Input;
    type Output = O::Output;
    type Error = O::Error;

    async fn call_async(&self, input: Self::Input) -> Result<Self::Output, Self::Error> {
        self.interceptor
            .invoke_async(self.inner.call_async(input))
            .await
    }
}
