/// Errors produced by kernel operations.
#[derive(Debug, thiserror::Error)]
pub enum KernelError {
    /// A descriptor or version string failed validation.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A plugin or service name is already taken.
    #[error("already registered: {0}")]
    AlreadyRegistered(String),

    /// The named plugin, service, or sandbox does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Reentrant construction or a cycle in declared service dependencies.
    #[error("circular dependency: {}", .path.join(" -> "))]
    CircularDependency { path: Vec<String> },

    /// A capability check failed, or no capabilities were registered.
    #[error("permission denied for '{plugin}' on {resource}: {reason}")]
    PermissionDenied {
        plugin: String,
        resource: String,
        reason: String,
    },

    /// A scoped service was resolved without a scope id.
    #[error("scoped service '{0}' requires a scope id")]
    ScopeRequired(String),

    /// The kernel is not wired up for the requested operation.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// An error surfaced from plugin-provided code.
    #[error("{0}")]
    Plugin(String),
}

pub type Result<T> = std::result::Result<T, KernelError>;
