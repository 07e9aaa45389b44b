//! The composition object call-sites are built against.
//!
//! A `MetricsFacade` bundles the registry, the naming strategy and the
//! engine-wide settings. It is cheap to clone and is meant to be constructed
//! once at startup and handed to whatever creates interceptors.

use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use metricweave_core::error::Result;
use metricweave_core::{Clock, MetricRegistry, Tags};

use crate::config::{GaugeMode, MetricsConfig, TypeNameStyle};
use crate::engine::Interceptor;
use crate::generators::TagGenerators;
use crate::marker::Measure;
use crate::naming::{CallSite, DefaultNaming, NamingStrategy};

#[derive(Clone)]
pub struct MetricsFacade {
    inner: Arc<FacadeInner>,
}

struct FacadeInner {
    registry: Arc<MetricRegistry>,
    naming: Arc<dyn NamingStrategy>,
    gauge_mode: GaugeMode,
    warn_interval: Duration,
    generators: TagGenerators,
}

impl std::fmt::Debug for MetricsFacade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsFacade")
            .field("registry", &self.inner.registry)
            .field("gauge_mode", &self.inner.gauge_mode)
            .field("warn_interval", &self.inner.warn_interval)
            .field("generators", &self.inner.generators)
            .finish()
    }
}

impl MetricsFacade {
    /// Facade over `registry` with default naming and settings.
    pub fn new(registry: Arc<MetricRegistry>) -> Self {
        Self::builder().registry(registry).build()
    }

    pub fn builder() -> MetricsFacadeBuilder {
        MetricsFacadeBuilder::default()
    }

    /// Build a facade and a fresh registry from validated config.
    pub fn from_config(cfg: &MetricsConfig) -> Result<Self> {
        cfg.validate()?;
        let mut registry = MetricRegistry::new();
        if let Some(limit) = cfg.max_metrics {
            registry = registry.with_max_metrics(limit);
        }
        let mut b = Self::builder()
            .registry(Arc::new(registry))
            .tags(&Tags::from(cfg.tags.clone()))
            .type_names(cfg.type_names)
            .gauge_mode(cfg.gauge_mode)
            .warn_interval(Duration::from_millis(cfg.warn_interval_ms));
        if let Some(prefix) = &cfg.prefix {
            b = b.prefix(prefix.clone());
        }
        Ok(b.build())
    }

    /// Interceptor for one call-site. Nothing is resolved until its first
    /// invocation.
    pub fn interceptor(&self, site: CallSite, measure: Measure) -> Interceptor {
        Interceptor::new(self.clone(), site, measure)
    }

    pub fn registry(&self) -> &Arc<MetricRegistry> {
        &self.inner.registry
    }

    pub fn naming(&self) -> &dyn NamingStrategy {
        self.inner.naming.as_ref()
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        self.inner.registry.clock()
    }

    pub fn gauge_mode(&self) -> GaugeMode {
        self.inner.gauge_mode
    }

    pub fn warn_interval(&self) -> Duration {
        self.inner.warn_interval
    }

    /// Tag generators used by call-sites that declare none of their own.
    pub fn generators(&self) -> &TagGenerators {
        &self.inner.generators
    }
}

pub struct MetricsFacadeBuilder {
    registry: Option<Arc<MetricRegistry>>,
    naming: Option<Arc<dyn NamingStrategy>>,
    prefix: Option<String>,
    tags: Tags,
    type_names: TypeNameStyle,
    gauge_mode: GaugeMode,
    warn_interval: Duration,
    generators: TagGenerators,
}

impl Default for MetricsFacadeBuilder {
    fn default() -> Self {
        let cfg = MetricsConfig::default();
        Self {
            registry: None,
            naming: None,
            prefix: None,
            tags: Tags::empty(),
            type_names: cfg.type_names,
            gauge_mode: cfg.gauge_mode,
            warn_interval: Duration::from_millis(cfg.warn_interval_ms),
            generators: TagGenerators::default(),
        }
    }
}

impl MetricsFacadeBuilder {
    pub fn registry(mut self, registry: Arc<MetricRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Replace the default naming entirely; `prefix`, `tag(s)` and
    /// `type_names` are then ignored.
    pub fn naming(mut self, naming: Arc<dyn NamingStrategy>) -> Self {
        self.naming = Some(naming);
        self
    }

    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
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

    pub fn type_names(mut self, style: TypeNameStyle) -> Self {
        self.type_names = style;
        self
    }

    pub fn gauge_mode(mut self, mode: GaugeMode) -> Self {
        self.gauge_mode = mode;
        self
    }

    pub fn warn_interval(mut self, interval: Duration) -> Self {
        self.warn_interval = interval;
        self
    }

    /// Tags derived from every successful result of type `T`.
    pub fn result_tags<T: 'static>(mut self, f: impl Fn(&T) -> Tags + Send + Sync + 'static) -> Self {
        self.generators.register(f);
        self
    }

    /// Tags derived from any error a call-site does not tag itself.
    pub fn error_tags(mut self, f: impl Fn(&dyn Any) -> Tags + Send + Sync + 'static) -> Self {
        self.generators.set_default_error(f);
        self
    }

    pub fn build(self) -> MetricsFacade {
        let registry = self
            .registry
            .unwrap_or_else(|| Arc::new(MetricRegistry::new()));
        let naming = self.naming.unwrap_or_else(|| {
            Arc::new(DefaultNaming::new(self.prefix.clone(), self.type_names, self.tags.clone()))
        });
        tracing::info!(
            prefix = ?self.prefix,
            tags = %self.tags,
            type_names = ?self.type_names,
            gauge_mode = ?self.gauge_mode,
            "metrics facade built"
        );
        MetricsFacade {
            inner: Arc::new(FacadeInner {
                registry,
                naming,
                gauge_mode: self.gauge_mode,
                warn_interval: self.warn_interval,
                generators: self.generators,
            }),
        }
    }
}
