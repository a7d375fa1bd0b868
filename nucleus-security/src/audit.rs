use chrono::Utc;
use serde::{Deserialize, Serialize};

const DEFAULT_MAX_ENTRIES: usize = 10_000;

/// A single recorded access decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: u64,
    pub action: String,
    pub actor: String,
    pub decision: String,
    pub reason: Option<String>,
    pub timestamp: String,
}

/// Bounded in-memory audit buffer. Oldest entries are evicted first; ids
/// stay monotonic across eviction.
#[derive(Debug, Clone)]
pub struct AuditLog {
    entries: Vec<AuditEntry>,
    max_entries: usize,
    next_id: u64,
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ENTRIES)
    }
}

impl AuditLog {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: Vec::new(),
            max_entries,
            next_id: 1,
        }
    }

    pub fn record(&mut self, action: &str, actor: &str, decision: &str, reason: Option<&str>) {
        let id = self.next_id;
        self.next_id += 1;
        self.entries.push(AuditEntry {
            id,
            action: action.into(),
            actor: actor.into(),
            decision: decision.into(),
            reason: reason.map(Into::into),
            timestamp: Utc::now().to_rfc3339(),
        });
        if self.entries.len() > self.max_entries {
            self.entries.remove(0);
        }
    }

    pub fn entries(&self) -> &[AuditEntry] {
        &self.entries
    }

    pub fn entries_for(&self, actor: &str) -> Vec<&AuditEntry> {
        self.entries
            .iter()
            .filter(|entry| entry.actor == actor)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
