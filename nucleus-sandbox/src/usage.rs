use serde::{Deserialize, Serialize};

use crate::config::SandboxConfig;

/// Live resource usage for one sandboxed plugin. Current and peak memory,
/// current and running-average cpu, and the open connection count.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceUsage {
    pub memory_bytes: u64,
    pub peak_memory_bytes: u64,
    pub cpu_percent: f64,
    pub avg_cpu_percent: f64,
    pub connections: u32,
    #[serde(skip)]
    cpu_samples: u64,
}

impl ResourceUsage {
    pub fn record_memory(&mut self, bytes: u64) {
        self.memory_bytes = bytes;
        self.peak_memory_bytes = self.peak_memory_bytes.max(bytes);
    }

    pub fn record_cpu(&mut self, percent: f64) {
        self.cpu_percent = percent;
        self.cpu_samples += 1;
        self.avg_cpu_percent += (percent - self.avg_cpu_percent) / self.cpu_samples as f64;
    }

    pub fn set_connections(&mut self, count: u32) {
        self.connections = count;
    }

    /// Compare the snapshot against configured limits. Returns one
    /// human-readable string per exceeded limit; deciding what to do about
    /// them (log, throttle, terminate) is the caller's business.
    pub fn violations(&self, config: &SandboxConfig) -> Vec<String> {
        let mut violations = Vec::new();
        if let Some(memory) = &config.memory {
            if self.memory_bytes > memory.max_heap_bytes {
                violations.push(format!(
                    "memory usage {} bytes exceeds limit {} bytes",
                    self.memory_bytes, memory.max_heap_bytes
                ));
            }
        }
        if let Some(cpu) = &config.cpu {
            if self.cpu_percent > cpu.max_cpu_percent {
                violations.push(format!(
                    "cpu usage {}% exceeds limit {}%",
                    self.cpu_percent, cpu.max_cpu_percent
                ));
            }
        }
        if let Some(caps) = config
            .runtime
            .as_ref()
            .and_then(|runtime| runtime.resource_limits.as_ref())
        {
            if self.cpu_percent > caps.max_cpu {
                violations.push(format!(
                    "cpu usage {}% exceeds runtime cap {}%",
                    self.cpu_percent, caps.max_cpu
                ));
            }
        }
        if let Some(network) = &config.network {
            if let Some(max_connections) = network.max_connections {
                if self.connections > max_connections {
                    violations.push(format!(
                        "connection count {} exceeds limit {}",
                        self.connections, max_connections
                    ));
                }
            }
        }
        violations
    }
}
