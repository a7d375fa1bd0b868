use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use nucleus_plugin::error::{KernelError, Result};

use crate::config::{FilesystemMode, IsolationLevel, NetworkMode, ResourceKind, SandboxConfig};
use crate::usage::ResourceUsage;

const DEFAULT_SAMPLE_INTERVAL: Duration = Duration::from_secs(5);

/// Reads the current memory footprint attributed to a plugin, fed into the
/// periodic sampler.
pub type MemoryProbe = Arc<dyn Fn(&str) -> Option<u64> + Send + Sync>;

/// Everything the runtime tracks for one plugin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxContext {
    pub plugin_id: String,
    pub config: SandboxConfig,
    pub started_at: DateTime<Utc>,
    pub usage: ResourceUsage,
}

/// Tracks per-plugin resource usage and answers access policy questions.
/// Tracking only: enforcement (throttling, termination) is the caller's
/// decision.
pub struct SandboxRuntime {
    sandboxes: Arc<Mutex<HashMap<String, SandboxContext>>>,
    samplers: Mutex<HashMap<String, JoinHandle<()>>>,
    sample_interval: Duration,
    memory_probe: Option<MemoryProbe>,
}

impl Default for SandboxRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl SandboxRuntime {
    pub fn new() -> Self {
        Self {
            sandboxes: Arc::new(Mutex::new(HashMap::new())),
            samplers: Mutex::new(HashMap::new()),
            sample_interval: DEFAULT_SAMPLE_INTERVAL,
            memory_probe: None,
        }
    }

    pub fn with_sample_interval(mut self, interval: Duration) -> Self {
        self.sample_interval = interval;
        self
    }

    pub fn with_memory_probe<F>(mut self, probe: F) -> Self
    where
        F: Fn(&str) -> Option<u64> + Send + Sync + 'static,
    {
        self.memory_probe = Some(Arc::new(probe));
        self
    }

    fn sandboxes(&self) -> MutexGuard<'_, HashMap<String, SandboxContext>> {
        self.sandboxes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn samplers(&self) -> MutexGuard<'_, HashMap<String, JoinHandle<()>>> {
        self.samplers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Allocate a sandbox and start its resource sampler. One sandbox per
    /// plugin id. Must run inside a tokio runtime.
    pub fn create_sandbox(&self, plugin_id: &str, config: SandboxConfig) -> Result<SandboxContext> {
        let context = {
            let mut sandboxes = self.sandboxes();
            if sandboxes.contains_key(plugin_id) {
                return Err(KernelError::AlreadyRegistered(format!(
                    "sandbox '{plugin_id}'"
                )));
            }
            let context = SandboxContext {
                plugin_id: plugin_id.to_string(),
                config,
                started_at: Utc::now(),
                usage: ResourceUsage::default(),
            };
            sandboxes.insert(plugin_id.to_string(), context.clone());
            context
        };
        self.spawn_sampler(plugin_id);
        debug!(plugin = plugin_id, "sandbox created");
        Ok(context)
    }

    fn spawn_sampler(&self, plugin_id: &str) {
        let plugin_id = plugin_id.to_string();
        let sandboxes = self.sandboxes.clone();
        let probe = self.memory_probe.clone();
        let interval = self.sample_interval;
        let task_plugin_id = plugin_id.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                sample(&sandboxes, &task_plugin_id, probe.as_ref());
            }
        });
        self.samplers().insert(plugin_id, handle);
    }

    /// Stop the sampler and drop all state. A no-op for unknown ids.
    pub fn destroy_sandbox(&self, plugin_id: &str) {
        if let Some(handle) = self.samplers().remove(plugin_id) {
            handle.abort();
        }
        if self.sandboxes().remove(plugin_id).is_some() {
            debug!(plugin = plugin_id, "sandbox destroyed");
        }
    }

    /// Feed a usage sample from instrumented code.
    pub fn record_usage(
        &self,
        plugin_id: &str,
        memory_bytes: Option<u64>,
        cpu_percent: Option<f64>,
        connections: Option<u32>,
    ) -> Result<()> {
        let mut sandboxes = self.sandboxes();
        let context = sandboxes
            .get_mut(plugin_id)
            .ok_or_else(|| KernelError::NotFound(format!("sandbox '{plugin_id}'")))?;
        if let Some(bytes) = memory_bytes {
            context.usage.record_memory(bytes);
        }
        if let Some(percent) = cpu_percent {
            context.usage.record_cpu(percent);
        }
        if let Some(count) = connections {
            context.usage.set_connections(count);
        }
        Ok(())
    }

    /// Answer one access policy question. `Ok(false)` is a policy denial
    /// (logged); an unknown sandbox id is an error.
    pub fn check_resource_access(
        &self,
        plugin_id: &str,
        kind: ResourceKind,
        resource: Option<&str>,
    ) -> Result<bool> {
        let sandboxes = self.sandboxes();
        let context = sandboxes
            .get(plugin_id)
            .ok_or_else(|| KernelError::NotFound(format!("sandbox '{plugin_id}'")))?;
        let decision = match kind {
            ResourceKind::File => check_file(context, resource),
            ResourceKind::Network => check_network(context, resource),
            ResourceKind::Process => check_process(context),
            ResourceKind::Env => check_env(context),
        };
        match decision {
            Ok(()) => {
                debug!(plugin = plugin_id, ?kind, resource, "access allowed");
                Ok(true)
            }
            Err(reason) => {
                warn!(plugin = plugin_id, ?kind, resource, reason, "access denied");
                Ok(false)
            }
        }
    }

    /// Compare current usage against configured limits. Violations are
    /// logged and returned; nothing is raised for an over-limit plugin.
    pub fn check_resource_limits(&self, plugin_id: &str) -> Result<Vec<String>> {
        let sandboxes = self.sandboxes();
        let context = sandboxes
            .get(plugin_id)
            .ok_or_else(|| KernelError::NotFound(format!("sandbox '{plugin_id}'")))?;
        let violations = context.usage.violations(&context.config);
        if !violations.is_empty() {
            warn!(
                plugin = plugin_id,
                "resource limits exceeded: {}",
                violations.join("; ")
            );
        }
        Ok(violations)
    }

    pub fn snapshot(&self, plugin_id: &str) -> Result<SandboxContext> {
        self.sandboxes()
            .get(plugin_id)
            .cloned()
            .ok_or_else(|| KernelError::NotFound(format!("sandbox '{plugin_id}'")))
    }

    pub fn active_sandboxes(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.sandboxes().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Cancel every sampler and clear all sandbox state.
    pub fn shutdown(&self) {
        for (_, handle) in self.samplers().drain() {
            handle.abort();
        }
        self.sandboxes().clear();
        debug!("sandbox runtime shut down");
    }
}

impl Drop for SandboxRuntime {
    fn drop(&mut self) {
        for (_, handle) in self.samplers().drain() {
            handle.abort();
        }
    }
}

fn sample(
    sandboxes: &Mutex<HashMap<String, SandboxContext>>,
    plugin_id: &str,
    probe: Option<&MemoryProbe>,
) {
    let mut guard = sandboxes.lock().unwrap_or_else(PoisonError::into_inner);
    let Some(context) = guard.get_mut(plugin_id) else {
        return;
    };
    if let Some(probe) = probe {
        if let Some(bytes) = probe(plugin_id) {
            context.usage.record_memory(bytes);
        }
    }
    let violations = context.usage.violations(&context.config);
    if !violations.is_empty() {
        warn!(
            plugin = plugin_id,
            "resource limits exceeded: {}",
            violations.join("; ")
        );
    }
}

fn check_file(context: &SandboxContext, path: Option<&str>) -> std::result::Result<(), String> {
    if context.config.level == IsolationLevel::None {
        return Ok(());
    }
    let Some(policy) = &context.config.filesystem else {
        return Err("no filesystem policy configured".into());
    };
    if policy.mode == FilesystemMode::None {
        return Err("filesystem access is disabled".into());
    }
    let Some(path) = path else {
        return Ok(());
    };
    if !policy.allowed_paths.is_empty()
        && !policy
            .allowed_paths
            .iter()
            .any(|allowed| path.starts_with(allowed.as_str()))
    {
        return Err(format!("path '{path}' is outside the allowed paths"));
    }
    // Deny wins, checked after the allow list.
    if let Some(denied) = policy
        .denied_paths
        .iter()
        .find(|denied| path.starts_with(denied.as_str()))
    {
        return Err(format!("path '{path}' matches denied path '{denied}'"));
    }
    Ok(())
}

fn check_network(context: &SandboxContext, url: Option<&str>) -> std::result::Result<(), String> {
    if context.config.level == IsolationLevel::None {
        return Ok(());
    }
    let Some(policy) = &context.config.network else {
        return Err("no network policy configured".into());
    };
    if policy.mode == NetworkMode::None {
        return Err("network access is disabled".into());
    }
    let Some(url) = url else {
        return Ok(());
    };
    if !policy.allowed_hosts.is_empty()
        && !policy
            .allowed_hosts
            .iter()
            .any(|host| url.contains(host.as_str()))
    {
        return Err(format!("url '{url}' matches no allowed host"));
    }
    if let Some(denied) = policy
        .denied_hosts
        .iter()
        .find(|host| url.contains(host.as_str()))
    {
        return Err(format!("url '{url}' matches denied host '{denied}'"));
    }
    Ok(())
}

fn check_process(context: &SandboxContext) -> std::result::Result<(), String> {
    if context.config.level == IsolationLevel::None {
        return Ok(());
    }
    match &context.config.process {
        Some(policy) if policy.allow_spawn => Ok(()),
        Some(_) => Err("process spawning is disabled".into()),
        None => Err("no process policy configured".into()),
    }
}

// TODO: env access is all-or-nothing on the process policy; a per-variable
// allowlist is still missing.
fn check_env(context: &SandboxContext) -> std::result::Result<(), String> {
    if context.config.level == IsolationLevel::None {
        return Ok(());
    }
    if context.config.process.is_some() {
        return Ok(());
    }
    Err("no process policy configured".into())
}
