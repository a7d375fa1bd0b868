pub mod context;
pub mod descriptor;
pub mod error;
pub mod hook;
pub mod kernel;
pub mod lifecycle;
pub mod loader;
pub mod registry;

// Re-export key types for convenience.
pub use context::{KernelContext, PluginContext, PluginLogger};
pub use descriptor::{
    DEFAULT_STARTUP_TIMEOUT_MS, DEFAULT_VERSION, HealthCheck, HealthReport, LifecycleHook,
    LoadResult, PluginDescriptor, ShutdownHook, validate_version,
};
pub use error::{KernelError, Result};
pub use hook::{HookBus, HookHandler, hook_handler};
pub use kernel::PluginKernel;
pub use lifecycle::{LifecycleEvent, LifecycleTracker, PluginState};
pub use loader::{LoadedPlugin, PluginLoader};
pub use registry::{
    ServiceFactory, ServiceHandle, ServiceLifecycle, ServiceRegistration, ServiceRegistry,
    downcast_service,
};
