pub mod config;
pub mod runtime;
pub mod usage;

// Re-export key types for convenience.
pub use config::{
    CpuLimits, FilesystemMode, FilesystemPolicy, IsolationLevel, MemoryLimits, NetworkMode,
    NetworkPolicy, ProcessPolicy, ResourceCaps, ResourceKind, RuntimeLimits, SandboxConfig,
};
pub use runtime::{MemoryProbe, SandboxContext, SandboxRuntime};
pub use usage::ResourceUsage;
