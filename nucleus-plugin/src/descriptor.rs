use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

use crate::context::PluginContext;
use crate::error::{KernelError, Result};
use crate::loader::LoadedPlugin;

/// Version assigned to descriptors that do not declare one.
pub const DEFAULT_VERSION: &str = "0.0.0";

/// Startup timeout carried as descriptor metadata. Enforced (if at all) by
/// the hosting orchestrator, not by the kernel.
pub const DEFAULT_STARTUP_TIMEOUT_MS: u64 = 30_000;

/// An effectful lifecycle operation invoked with the plugin's context.
pub type LifecycleHook = Arc<dyn Fn(Arc<dyn PluginContext>) -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// Teardown hook; runs without a context.
pub type ShutdownHook = Arc<dyn Fn() -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// Optional plugin-supplied health probe.
pub type HealthCheck = Arc<dyn Fn() -> BoxFuture<'static, Result<HealthReport>> + Send + Sync>;

fn lifecycle_hook<F, Fut>(hook: F) -> LifecycleHook
where
    F: Fn(Arc<dyn PluginContext>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    Arc::new(move |context| -> BoxFuture<'static, Result<()>> { Box::pin(hook(context)) })
}

fn shutdown_hook<F, Fut>(hook: F) -> ShutdownHook
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    Arc::new(move || -> BoxFuture<'static, Result<()>> { Box::pin(hook()) })
}

fn health_check<F, Fut>(check: F) -> HealthCheck
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<HealthReport>> + Send + 'static,
{
    Arc::new(move || -> BoxFuture<'static, Result<HealthReport>> { Box::pin(check()) })
}

/// Outcome of a health probe. Health checks never raise; failures are
/// reported through this shape instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub healthy: bool,
    pub message: Option<String>,
    pub details: Option<serde_json::Value>,
}

impl HealthReport {
    pub fn healthy() -> Self {
        Self {
            healthy: true,
            message: None,
            details: None,
        }
    }

    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self {
            healthy: false,
            message: Some(message.into()),
            details: None,
        }
    }
}

/// A plugin as handed to the loader. `init` is optional here so an
/// ill-formed descriptor is representable; `load_plugin` rejects it.
#[derive(Clone)]
pub struct PluginDescriptor {
    pub name: String,
    pub version: Option<String>,
    pub dependencies: Vec<String>,
    pub init: Option<LifecycleHook>,
    pub start: Option<LifecycleHook>,
    pub destroy: Option<ShutdownHook>,
    pub health_check: Option<HealthCheck>,
    pub startup_timeout_ms: u64,
    pub hot_reloadable: bool,
    pub signature: Option<String>,
}

impl PluginDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: None,
            dependencies: Vec::new(),
            init: None,
            start: None,
            destroy: None,
            health_check: None,
            startup_timeout_ms: DEFAULT_STARTUP_TIMEOUT_MS,
            hot_reloadable: false,
            signature: None,
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_dependencies<I, S>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = dependencies.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_init<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(Arc<dyn PluginContext>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.init = Some(lifecycle_hook(hook));
        self
    }

    pub fn with_start<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(Arc<dyn PluginContext>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.start = Some(lifecycle_hook(hook));
        self
    }

    pub fn with_destroy<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.destroy = Some(shutdown_hook(hook));
        self
    }

    pub fn with_health_check<F, Fut>(mut self, check: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HealthReport>> + Send + 'static,
    {
        self.health_check = Some(health_check(check));
        self
    }

    pub fn with_startup_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.startup_timeout_ms = timeout_ms;
        self
    }

    pub fn with_hot_reloadable(mut self, hot_reloadable: bool) -> Self {
        self.hot_reloadable = hot_reloadable;
        self
    }

    pub fn with_signature(mut self, signature: impl Into<String>) -> Self {
        self.signature = Some(signature.into());
        self
    }
}

impl fmt::Debug for PluginDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginDescriptor")
            .field("name", &self.name)
            .field("version", &self.version)
            .field("dependencies", &self.dependencies)
            .field("startup_timeout_ms", &self.startup_timeout_ms)
            .field("hot_reloadable", &self.hot_reloadable)
            .field("signature", &self.signature)
            .finish_non_exhaustive()
    }
}

/// Validate a version string against the strict
/// `major.minor.patch[-prerelease][+build]` grammar.
pub fn validate_version(raw: &str) -> Result<semver::Version> {
    semver::Version::parse(raw)
        .map_err(|err| KernelError::Validation(format!("invalid semantic version '{raw}': {err}")))
}

/// Structured outcome of `load_plugin`. Loading never raises; failures are
/// reported here with the plugin left unregistered.
#[derive(Debug, Clone)]
pub struct LoadResult {
    pub success: bool,
    pub plugin: Option<Arc<LoadedPlugin>>,
    pub error: Option<String>,
    pub load_time_ms: u64,
}

impl LoadResult {
    pub(crate) fn loaded(plugin: Arc<LoadedPlugin>, load_time_ms: u64) -> Self {
        Self {
            success: true,
            plugin: Some(plugin),
            error: None,
            load_time_ms,
        }
    }

    pub(crate) fn rejected(error: impl Into<String>, load_time_ms: u64) -> Self {
        Self {
            success: false,
            plugin: None,
            error: Some(error.into()),
            load_time_ms,
        }
    }
}
