//! Process-wide facade slot for the composition root.
//!
//! Libraries should take a [`MetricsFacade`] as a parameter. The slot exists
//! for `measured!` call-sites, which have nowhere to receive one from. Until
//! a facade is installed those call-sites run their operation unmeasured.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{OnceLock, RwLock};

use metricweave_core::MetricsError;

use crate::engine::Interceptor;
use crate::facade::MetricsFacade;
use crate::marker::Measure;
use crate::naming::CallSite;

static FACADE: RwLock<Option<MetricsFacade>> = RwLock::new(None);
static INSTALLED: AtomicBool = AtomicBool::new(false);

/// Install `facade` as the process-wide facade.
///
/// Installing twice replaces the facade for call-sites not yet resolved and
/// logs a warning; already-resolved call-sites keep recording into the
/// facade they resolved against.
pub fn install(facade: MetricsFacade) {
    let Ok(mut slot) = FACADE.write() else {
        tracing::error!("global facade lock poisoned; install ignored");
        return;
    };
    tracing::info!(?facade, "installing global metrics facade");
    *slot = Some(facade);
    if INSTALLED.swap(true, Ordering::AcqRel) {
        tracing::warn!("global metrics facade installed more than once");
    }
}

/// The installed facade, if any.
pub fn facade() -> Option<MetricsFacade> {
    FACADE.read().ok().and_then(|slot| slot.clone())
}

pub fn is_installed() -> bool {
    INSTALLED.load(Ordering::Acquire)
}

/// Lazily bound interceptor for a `measured!` call-site.
pub struct StaticSite {
    interceptor: OnceLock<Interceptor>,
}

impl Default for StaticSite {
    fn default() -> Self {
        Self::new()
    }
}

impl StaticSite {
    pub const fn new() -> Self {
        Self {
            interceptor: OnceLock::new(),
        }
    }

    /// Bound interceptor, if this site has been invoked with a facade installed.
    pub fn interceptor(&self) -> Option<&Interceptor> {
        self.interceptor.get()
    }

    fn bind(&self, site: CallSite, measure: impl FnOnce() -> Measure) -> Option<&Interceptor> {
        if let Some(i) = self.interceptor.get() {
            return Some(i);
        }
        let facade = facade()?;
        Some(
            self.interceptor
                .get_or_init(|| facade.interceptor(site, measure())),
        )
    }

    pub fn invoke<T, E, F>(&self, site: CallSite, measure: impl FnOnce() -> Measure, op: F) -> Result<T, E>
    where
        T: 'static,
        E: From<MetricsError> + 'static,
        F: FnOnce() -> Result<T, E>,
    {
        match self.bind(site, measure) {
            Some(interceptor) => interceptor.invoke(op),
            None => {
                tracing::trace!(
                    type_name = site.type_name(),
                    operation = site.operation(),
                    "no global facade; running unmeasured"
                );
                op()
            }
        }
    }
}

/// Measure an expression at a call-site bound to the global facade.
///
/// ```
/// use metricweave_declarative::{measured, Measure, MetricsError};
///
/// struct Inventory;
///
/// impl Inventory {
///     fn reserve(&self, n: u32) -> Result<u32, MetricsError> {
///         measured!(Inventory, "reserve", Measure::counter(), {
///             Ok(n * 2)
///         })
///     }
/// }
///
/// assert_eq!(Inventory.reserve(2).unwrap(), 4);
/// ```
///
/// Each expansion owns one `static` site. Inside generic code that site is
/// shared by every instantiation.
#[macro_export]
macro_rules! measured {
    ($ty:ty, $op:expr, $measure:expr, $body:expr) => {{
        static SITE: $crate::global::StaticSite = $crate::global::StaticSite::new();
        SITE.invoke(
            $crate::naming::CallSite::of::<$ty>($op),
            || $measure,
            || $body,
        )
    }};
}
