use serde::{Deserialize, Serialize};

/// How aggressively a plugin is confined. `None` bypasses every policy
/// check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IsolationLevel {
    None,
    #[default]
    Standard,
    Strict,
    Paranoid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilesystemMode {
    None,
    ReadOnly,
    ReadWrite,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkMode {
    None,
    Outbound,
    Full,
}

/// The resource classes `check_resource_access` dispatches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    File,
    Network,
    Process,
    Env,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryLimits {
    pub max_heap_bytes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CpuLimits {
    pub max_cpu_percent: f64,
}

/// Paths are matched by prefix. Callers that need a hard boundary must
/// canonicalize paths first; `..` traversal is not resolved here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilesystemPolicy {
    pub mode: FilesystemMode,
    #[serde(default)]
    pub allowed_paths: Vec<String>,
    #[serde(default)]
    pub denied_paths: Vec<String>,
}

/// Hosts are matched by substring containment in the requested URL, not by
/// parsing the URL's host component.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkPolicy {
    pub mode: NetworkMode,
    #[serde(default)]
    pub allowed_hosts: Vec<String>,
    #[serde(default)]
    pub denied_hosts: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_connections: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessPolicy {
    pub allow_spawn: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeLimits {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_limits: Option<ResourceCaps>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceCaps {
    pub max_cpu: f64,
}

/// Full sandbox configuration for one plugin. Every section is optional;
/// absent sections deny the corresponding access class once the isolation
/// level is above `None`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SandboxConfig {
    #[serde(default)]
    pub level: IsolationLevel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<MemoryLimits>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<CpuLimits>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<NetworkPolicy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filesystem: Option<FilesystemPolicy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub process: Option<ProcessPolicy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime: Option<RuntimeLimits>,
}

impl SandboxConfig {
    pub fn new(level: IsolationLevel) -> Self {
        Self {
            level,
            ..Self::default()
        }
    }

    pub fn with_memory_limit(mut self, max_heap_bytes: u64) -> Self {
        self.memory = Some(MemoryLimits { max_heap_bytes });
        self
    }

    pub fn with_cpu_limit(mut self, max_cpu_percent: f64) -> Self {
        self.cpu = Some(CpuLimits { max_cpu_percent });
        self
    }

    pub fn with_network(mut self, policy: NetworkPolicy) -> Self {
        self.network = Some(policy);
        self
    }

    pub fn with_filesystem(mut self, policy: FilesystemPolicy) -> Self {
        self.filesystem = Some(policy);
        self
    }

    pub fn with_process(mut self, allow_spawn: bool) -> Self {
        self.process = Some(ProcessPolicy { allow_spawn });
        self
    }

    pub fn with_runtime_cpu_cap(mut self, max_cpu: f64) -> Self {
        self.runtime = Some(RuntimeLimits {
            resource_limits: Some(ResourceCaps { max_cpu }),
        });
        self
    }
}
