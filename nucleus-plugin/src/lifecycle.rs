use std::collections::HashMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Plugin runtime state. Transitions are driven by the hosting
/// orchestrator; the kernel only records them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PluginState {
    Registered,
    Initializing,
    Running,
    Stopped,
    Error,
}

/// One recorded transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleEvent {
    pub plugin_name: String,
    pub from_state: PluginState,
    pub to_state: PluginState,
    pub timestamp: String,
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
struct PluginHistory {
    state: PluginState,
    events: Vec<LifecycleEvent>,
}

/// Per-plugin state journal. Unknown plugins read as `Registered`.
#[derive(Debug, Clone, Default)]
pub struct LifecycleTracker {
    histories: HashMap<String, PluginHistory>,
}

impl LifecycleTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transition(&mut self, plugin_name: &str, to_state: PluginState) {
        self.record(plugin_name, to_state, None);
    }

    /// Record a failed transition; the plugin lands in `Error` with the
    /// message attached to the event.
    pub fn transition_failed(&mut self, plugin_name: &str, error: &str) {
        self.record(plugin_name, PluginState::Error, Some(error.to_string()));
    }

    fn record(&mut self, plugin_name: &str, to_state: PluginState, error: Option<String>) {
        let history = self
            .histories
            .entry(plugin_name.to_string())
            .or_insert_with(|| PluginHistory {
                state: PluginState::Registered,
                events: Vec::new(),
            });
        let from_state = history.state;
        history.state = to_state;
        history.events.push(LifecycleEvent {
            plugin_name: plugin_name.to_string(),
            from_state,
            to_state,
            timestamp: Utc::now().to_rfc3339(),
            error,
        });
    }

    pub fn state_of(&self, plugin_name: &str) -> PluginState {
        self.histories
            .get(plugin_name)
            .map_or(PluginState::Registered, |history| history.state)
    }

    pub fn events_for(&self, plugin_name: &str) -> Vec<LifecycleEvent> {
        self.histories
            .get(plugin_name)
            .map(|history| history.events.clone())
            .unwrap_or_default()
    }

    pub fn running_plugins(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .histories
            .iter()
            .filter(|(_, history)| history.state == PluginState::Running)
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }

    /// Drop all recorded state for an unregistered plugin.
    pub fn forget(&mut self, plugin_name: &str) {
        self.histories.remove(plugin_name);
    }
}
