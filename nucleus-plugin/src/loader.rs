use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use tracing::{debug, warn};

use crate::descriptor::{
    DEFAULT_VERSION, HealthReport, LoadResult, PluginDescriptor, validate_version,
};
use crate::error::{KernelError, Result};
use crate::lifecycle::{LifecycleEvent, LifecycleTracker, PluginState};
use crate::registry::{ServiceHandle, ServiceRegistry};

/// A validated, stored plugin. The descriptor's version is backfilled to
/// [`DEFAULT_VERSION`] when absent; nothing else is ever mutated.
#[derive(Debug, Clone)]
pub struct LoadedPlugin {
    descriptor: PluginDescriptor,
}

impl LoadedPlugin {
    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn version(&self) -> &str {
        self.descriptor.version.as_deref().unwrap_or(DEFAULT_VERSION)
    }

    pub fn descriptor(&self) -> &PluginDescriptor {
        &self.descriptor
    }
}

/// Validates and stores plugin descriptors, and orchestrates service
/// resolution through the registry. Lifecycle sequencing across plugins is
/// the hosting orchestrator's job.
pub struct PluginLoader {
    registry: Arc<ServiceRegistry>,
    plugins: Mutex<HashMap<String, Arc<LoadedPlugin>>>,
    lifecycle: Mutex<LifecycleTracker>,
}

impl PluginLoader {
    pub fn new(registry: Arc<ServiceRegistry>) -> Self {
        Self {
            registry,
            plugins: Mutex::new(HashMap::new()),
            lifecycle: Mutex::new(LifecycleTracker::new()),
        }
    }

    fn plugins(&self) -> MutexGuard<'_, HashMap<String, Arc<LoadedPlugin>>> {
        self.plugins.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lifecycle(&self) -> MutexGuard<'_, LifecycleTracker> {
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn registry(&self) -> &Arc<ServiceRegistry> {
        &self.registry
    }

    /// Resolve a service through the kernel's registry.
    pub async fn get_service(&self, name: &str, scope: Option<&str>) -> Result<ServiceHandle> {
        self.registry.get_service(name, scope).await
    }

    /// Validate and store a descriptor. Never raises; failures land in the
    /// result with the plugin left unregistered.
    pub fn load_plugin(&self, descriptor: PluginDescriptor) -> LoadResult {
        let started = Instant::now();
        match self.validate_and_store(descriptor) {
            Ok(plugin) => {
                debug!(plugin = %plugin.name(), version = %plugin.version(), "plugin loaded");
                LoadResult::loaded(plugin, elapsed_ms(started))
            }
            Err(err) => {
                warn!("plugin load rejected: {err}");
                LoadResult::rejected(err.to_string(), elapsed_ms(started))
            }
        }
    }

    fn validate_and_store(&self, mut descriptor: PluginDescriptor) -> Result<Arc<LoadedPlugin>> {
        if descriptor.name.trim().is_empty() {
            return Err(KernelError::Validation("plugin name is required".into()));
        }
        if descriptor.init.is_none() {
            return Err(KernelError::Validation(format!(
                "plugin '{}' is missing an init hook",
                descriptor.name
            )));
        }
        let version = descriptor
            .version
            .take()
            .unwrap_or_else(|| DEFAULT_VERSION.to_string());
        validate_version(&version)?;
        descriptor.version = Some(version);

        let mut plugins = self.plugins();
        if plugins.contains_key(&descriptor.name) {
            return Err(KernelError::AlreadyRegistered(format!(
                "plugin '{}'",
                descriptor.name
            )));
        }
        let plugin = Arc::new(LoadedPlugin { descriptor });
        plugins.insert(plugin.name().to_string(), plugin.clone());
        Ok(plugin)
    }

    pub fn get(&self, name: &str) -> Option<Arc<LoadedPlugin>> {
        self.plugins().get(name).cloned()
    }

    pub fn list(&self) -> Vec<Arc<LoadedPlugin>> {
        let mut plugins: Vec<Arc<LoadedPlugin>> = self.plugins().values().cloned().collect();
        plugins.sort_by(|a, b| a.name().cmp(b.name()));
        plugins
    }

    /// Remove a stored plugin and its lifecycle history.
    pub fn unregister_plugin(&self, name: &str) -> Result<()> {
        let removed = self.plugins().remove(name);
        if removed.is_none() {
            return Err(KernelError::NotFound(format!("plugin '{name}'")));
        }
        self.lifecycle().forget(name);
        debug!(plugin = %name, "plugin unregistered");
        Ok(())
    }

    /// Run the plugin's health probe. Probes never propagate errors; a
    /// failure becomes an unhealthy report. Plugins without a probe report
    /// healthy.
    pub async fn check_plugin_health(&self, name: &str) -> Result<HealthReport> {
        let plugin = self
            .get(name)
            .ok_or_else(|| KernelError::NotFound(format!("plugin '{name}'")))?;
        let Some(check) = plugin.descriptor().health_check.clone() else {
            return Ok(HealthReport {
                healthy: true,
                message: Some(format!("plugin '{name}' has no health check registered")),
                details: None,
            });
        };
        match check().await {
            Ok(report) => Ok(report),
            Err(err) => Ok(HealthReport::unhealthy(err.to_string())),
        }
    }

    pub fn mark_state(&self, name: &str, state: PluginState) {
        self.lifecycle().transition(name, state);
    }

    pub fn mark_failed(&self, name: &str, error: &str) {
        warn!(plugin = %name, "plugin transition failed: {error}");
        self.lifecycle().transition_failed(name, error);
    }

    pub fn state_of(&self, name: &str) -> PluginState {
        self.lifecycle().state_of(name)
    }

    pub fn events_for(&self, name: &str) -> Vec<LifecycleEvent> {
        self.lifecycle().events_for(name)
    }

    pub fn running_plugins(&self) -> Vec<String> {
        self.lifecycle().running_plugins()
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
