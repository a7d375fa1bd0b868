use std::fmt;
use std::sync::{Arc, Weak};

use crate::context::{KernelContext, PluginContext};
use crate::hook::HookBus;
use crate::loader::PluginLoader;
use crate::registry::ServiceRegistry;

/// One assembled kernel instance: registry, hook bus, loader, and the base
/// plugin context, wired together at construction. All registries live on
/// the instance; nothing is process-global.
pub struct PluginKernel {
    registry: Arc<ServiceRegistry>,
    hooks: Arc<HookBus>,
    loader: PluginLoader,
    context: Arc<dyn PluginContext>,
}

impl fmt::Debug for PluginKernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginKernel").finish_non_exhaustive()
    }
}

impl PluginKernel {
    /// Build a kernel with its context already installed, so factories can
    /// run as soon as the caller registers them.
    pub fn new() -> Arc<Self> {
        Arc::new_cyclic(|kernel: &Weak<PluginKernel>| {
            let registry = ServiceRegistry::new();
            let hooks = Arc::new(HookBus::new());
            let context: Arc<dyn PluginContext> = Arc::new(KernelContext::new(
                registry.clone(),
                hooks.clone(),
                kernel.clone(),
                "kernel",
            ));
            registry.install_context(&context);
            Self {
                loader: PluginLoader::new(registry.clone()),
                registry,
                hooks,
                context,
            }
        })
    }

    pub fn registry(&self) -> &Arc<ServiceRegistry> {
        &self.registry
    }

    pub fn hooks(&self) -> &Arc<HookBus> {
        &self.hooks
    }

    pub fn loader(&self) -> &PluginLoader {
        &self.loader
    }

    /// The base context. Wrap it per plugin before handing it to plugin
    /// code; the raw context performs no permission checks.
    pub fn context(&self) -> Arc<dyn PluginContext> {
        self.context.clone()
    }
}
