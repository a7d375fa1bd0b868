use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, warn};

use nucleus_plugin::error::{KernelError, Result};

use crate::audit::{AuditEntry, AuditLog};
use crate::capability::{Capability, ParsedCapability, PathPattern, parse_capability};

/// A plugin's capabilities compiled into matchable grants.
#[derive(Debug, Clone, Default)]
pub struct PermissionSet {
    grants: Vec<ParsedCapability>,
}

impl PermissionSet {
    pub fn compile(capabilities: &[Capability]) -> Self {
        Self {
            grants: capabilities.iter().flat_map(parse_capability).collect(),
        }
    }

    pub fn allows_service(&self, service: &str) -> bool {
        let category = service.split('.').next().unwrap_or(service);
        self.grants.iter().any(|grant| {
            matches!(grant, ParsedCapability::Service(scope) if scope.allows(service, category))
        })
    }

    pub fn allows_hook(&self, hook: &str) -> bool {
        let category = hook.split(':').next().unwrap_or(hook);
        self.grants.iter().any(|grant| {
            matches!(grant, ParsedCapability::Hook(scope) if scope.allows(hook, category))
        })
    }

    pub fn allows_file_read(&self, path: &str) -> bool {
        self.grants.iter().any(|grant| match grant {
            ParsedCapability::FilesystemRead(patterns) => path_allowed(patterns.as_deref(), path),
            _ => false,
        })
    }

    pub fn allows_file_write(&self, path: &str) -> bool {
        self.grants.iter().any(|grant| match grant {
            ParsedCapability::FilesystemWrite(patterns) => path_allowed(patterns.as_deref(), path),
            _ => false,
        })
    }

    pub fn allows_network(&self, url: &str) -> bool {
        self.grants.iter().any(|grant| match grant {
            ParsedCapability::Network(hosts) => hosts
                .as_ref()
                .is_none_or(|fragments| fragments.iter().any(|fragment| url.contains(fragment))),
            _ => false,
        })
    }
}

fn path_allowed(patterns: Option<&[PathPattern]>, path: &str) -> bool {
    patterns.is_none_or(|list| list.iter().any(|pattern| pattern.matches(path)))
}

/// The raw capability list and its compiled form, kept together so both
/// can be inspected and revoked as one unit.
#[derive(Debug, Clone)]
pub struct PluginPermissions {
    pub capabilities: Vec<Capability>,
    pub compiled: PermissionSet,
}

/// Compiles capability declarations per plugin and answers enforcement
/// calls. Absence of a registered set is itself a denial. Every denial is
/// logged and audited before the error is raised; grants are only
/// debug-logged.
#[derive(Default)]
pub struct PermissionEnforcer {
    plugins: Mutex<HashMap<String, PluginPermissions>>,
    audit: Mutex<AuditLog>,
}

impl PermissionEnforcer {
    pub fn new() -> Self {
        Self::default()
    }

    fn plugins(&self) -> MutexGuard<'_, HashMap<String, PluginPermissions>> {
        self.plugins.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn audit(&self) -> MutexGuard<'_, AuditLog> {
        self.audit.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Compile and store a plugin's capability list. Re-registration
    /// replaces the previous set.
    pub fn register_plugin_permissions(&self, plugin: &str, capabilities: Vec<Capability>) {
        let compiled = PermissionSet::compile(&capabilities);
        debug!(plugin, grants = capabilities.len(), "permissions registered");
        self.plugins().insert(
            plugin.to_string(),
            PluginPermissions {
                capabilities,
                compiled,
            },
        );
    }

    /// Hard removal: raw list and compiled set both go. Subsequent checks
    /// behave as if the plugin was never registered.
    pub fn revoke_permissions(&self, plugin: &str) {
        self.plugins().remove(plugin);
        debug!(plugin, "permissions revoked");
    }

    pub fn capabilities_of(&self, plugin: &str) -> Option<Vec<Capability>> {
        self.plugins()
            .get(plugin)
            .map(|permissions| permissions.capabilities.clone())
    }

    pub fn enforce_service_access(&self, plugin: &str, service: &str) -> Result<()> {
        self.enforce(plugin, &format!("service '{service}'"), |set| {
            set.allows_service(service)
        })
    }

    pub fn enforce_hook_trigger(&self, plugin: &str, hook: &str) -> Result<()> {
        self.enforce(plugin, &format!("hook '{hook}'"), |set| set.allows_hook(hook))
    }

    pub fn enforce_file_read(&self, plugin: &str, path: &str) -> Result<()> {
        self.enforce(plugin, &format!("file read '{path}'"), |set| {
            set.allows_file_read(path)
        })
    }

    pub fn enforce_file_write(&self, plugin: &str, path: &str) -> Result<()> {
        self.enforce(plugin, &format!("file write '{path}'"), |set| {
            set.allows_file_write(path)
        })
    }

    pub fn enforce_network(&self, plugin: &str, url: &str) -> Result<()> {
        self.enforce(plugin, &format!("network '{url}'"), |set| {
            set.allows_network(url)
        })
    }

    fn enforce(
        &self,
        plugin: &str,
        resource: &str,
        check: impl Fn(&PermissionSet) -> bool,
    ) -> Result<()> {
        let allowed = self
            .plugins()
            .get(plugin)
            .map(|permissions| check(&permissions.compiled));
        match allowed {
            Some(true) => {
                debug!(plugin, resource, "access granted");
                Ok(())
            }
            Some(false) => self.deny(plugin, resource, "no capability grants this access"),
            None => self.deny(plugin, resource, "permissions not registered"),
        }
    }

    fn deny(&self, plugin: &str, resource: &str, reason: &str) -> Result<()> {
        warn!(plugin, resource, reason, "access denied");
        self.audit().record(resource, plugin, "deny", Some(reason));
        Err(KernelError::PermissionDenied {
            plugin: plugin.to_string(),
            resource: resource.to_string(),
            reason: reason.to_string(),
        })
    }

    /// Snapshot of the audit buffer, oldest first.
    pub fn audit_entries(&self) -> Vec<AuditEntry> {
        self.audit().entries().to_vec()
    }
}
