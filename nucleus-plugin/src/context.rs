use std::collections::HashMap;
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{KernelError, Result};
use crate::hook::{HookBus, HookHandler};
use crate::kernel::PluginKernel;
use crate::registry::{ServiceHandle, ServiceRegistry};

/// Structured logging handle tagged with the plugin that owns it.
#[derive(Debug, Clone)]
pub struct PluginLogger {
    plugin: String,
}

impl PluginLogger {
    pub fn new(plugin: impl Into<String>) -> Self {
        Self {
            plugin: plugin.into(),
        }
    }

    pub fn plugin(&self) -> &str {
        &self.plugin
    }

    pub fn debug(&self, message: &str) {
        tracing::debug!(plugin = %self.plugin, "{message}");
    }

    pub fn info(&self, message: &str) {
        tracing::info!(plugin = %self.plugin, "{message}");
    }

    pub fn warn(&self, message: &str) {
        tracing::warn!(plugin = %self.plugin, "{message}");
    }

    pub fn error(&self, message: &str) {
        tracing::error!(plugin = %self.plugin, "{message}");
    }
}

/// The execution surface handed to plugin code. The kernel installs one
/// base implementation; the permission enforcer wraps it per plugin.
#[async_trait]
pub trait PluginContext: Send + Sync {
    fn register_service(&self, name: &str, instance: ServiceHandle) -> Result<()>;

    fn replace_service(&self, name: &str, instance: ServiceHandle) -> Result<()>;

    async fn get_service(&self, name: &str) -> Result<ServiceHandle>;

    fn get_services(&self) -> HashMap<String, ServiceHandle>;

    fn hook(&self, name: &str, handler: HookHandler);

    async fn trigger(&self, name: &str, args: Value) -> Result<()>;

    fn logger(&self) -> PluginLogger;

    fn get_kernel(&self) -> Result<Arc<PluginKernel>>;
}

/// Base context implementation backed by the kernel's registry and hook
/// bus.
pub struct KernelContext {
    registry: Arc<ServiceRegistry>,
    hooks: Arc<HookBus>,
    kernel: Weak<PluginKernel>,
    label: String,
}

impl KernelContext {
    pub fn new(
        registry: Arc<ServiceRegistry>,
        hooks: Arc<HookBus>,
        kernel: Weak<PluginKernel>,
        label: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            hooks,
            kernel,
            label: label.into(),
        }
    }
}

#[async_trait]
impl PluginContext for KernelContext {
    fn register_service(&self, name: &str, instance: ServiceHandle) -> Result<()> {
        self.registry.register_instance(name, instance)
    }

    fn replace_service(&self, name: &str, instance: ServiceHandle) -> Result<()> {
        self.registry.replace_instance(name, instance)
    }

    async fn get_service(&self, name: &str) -> Result<ServiceHandle> {
        self.registry.get_service(name, None).await
    }

    fn get_services(&self) -> HashMap<String, ServiceHandle> {
        self.registry.services()
    }

    fn hook(&self, name: &str, handler: HookHandler) {
        self.hooks.hook(name, handler);
    }

    async fn trigger(&self, name: &str, args: Value) -> Result<()> {
        self.hooks.trigger(name, args).await
    }

    fn logger(&self) -> PluginLogger {
        PluginLogger::new(&self.label)
    }

    fn get_kernel(&self) -> Result<Arc<PluginKernel>> {
        self.kernel.upgrade().ok_or_else(|| {
            KernelError::Configuration("the kernel handle is no longer alive".into())
        })
    }
}
