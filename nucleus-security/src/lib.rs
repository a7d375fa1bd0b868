pub mod audit;
pub mod capability;
pub mod context;
pub mod permission;

// Re-export key types for convenience.
pub use audit::{AuditEntry, AuditLog};
pub use capability::{
    Capability, CapabilityMetadata, GrantScope, ParsedCapability, PathPattern, Protocol,
    parse_capability,
};
pub use context::SecurePluginContext;
pub use permission::{PermissionEnforcer, PermissionSet, PluginPermissions};
