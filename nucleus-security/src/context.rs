use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use nucleus_plugin::context::{PluginContext, PluginLogger};
use nucleus_plugin::error::Result;
use nucleus_plugin::hook::HookHandler;
use nucleus_plugin::kernel::PluginKernel;
use nucleus_plugin::registry::ServiceHandle;

use crate::permission::PermissionEnforcer;

/// Permission-gated view of a base context, bound to one plugin identity.
/// Consuming another plugin's services or hooks goes through the enforcer;
/// declaring one's own services and hooks passes through unchecked.
pub struct SecurePluginContext {
    inner: Arc<dyn PluginContext>,
    plugin: String,
    enforcer: Arc<PermissionEnforcer>,
}

impl SecurePluginContext {
    pub fn new(
        inner: Arc<dyn PluginContext>,
        plugin: impl Into<String>,
        enforcer: Arc<PermissionEnforcer>,
    ) -> Self {
        Self {
            inner,
            plugin: plugin.into(),
            enforcer,
        }
    }

    pub fn plugin(&self) -> &str {
        &self.plugin
    }
}

#[async_trait]
impl PluginContext for SecurePluginContext {
    fn register_service(&self, name: &str, instance: ServiceHandle) -> Result<()> {
        self.inner.register_service(name, instance)
    }

    fn replace_service(&self, name: &str, instance: ServiceHandle) -> Result<()> {
        self.enforcer.enforce_service_access(&self.plugin, name)?;
        self.inner.replace_service(name, instance)
    }

    async fn get_service(&self, name: &str) -> Result<ServiceHandle> {
        self.enforcer.enforce_service_access(&self.plugin, name)?;
        self.inner.get_service(name).await
    }

    fn get_services(&self) -> HashMap<String, ServiceHandle> {
        self.inner.get_services()
    }

    fn hook(&self, name: &str, handler: HookHandler) {
        self.inner.hook(name, handler);
    }

    async fn trigger(&self, name: &str, args: Value) -> Result<()> {
        self.enforcer.enforce_hook_trigger(&self.plugin, name)?;
        self.inner.trigger(name, args).await
    }

    fn logger(&self) -> PluginLogger {
        PluginLogger::new(&self.plugin)
    }

    fn get_kernel(&self) -> Result<Arc<PluginKernel>> {
        self.inner.get_kernel()
    }
}
