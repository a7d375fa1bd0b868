use regex::Regex;
use serde::{Deserialize, Serialize};

const SERVICE_MARKER: &str = "protocol.service.";
const HOOK_MARKER: &str = "protocol.hook.";
const FILESYSTEM_READ_MARKER: &str = "protocol.filesystem.read";
const FILESYSTEM_WRITE_MARKER: &str = "protocol.filesystem.write";
const NETWORK_MARKER: &str = "protocol.network";

/// A declarative grant as delivered by the external manifest loader.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Capability {
    pub protocol: Protocol,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<CapabilityMetadata>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Protocol {
    pub id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CapabilityMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paths: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hosts: Option<Vec<String>>,
}

impl Capability {
    pub fn new(protocol_id: impl Into<String>) -> Self {
        Self {
            protocol: Protocol {
                id: protocol_id.into(),
            },
            metadata: None,
        }
    }

    pub fn with_paths<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.metadata.get_or_insert_with(CapabilityMetadata::default).paths =
            Some(paths.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_hosts<I, S>(mut self, hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.metadata.get_or_insert_with(CapabilityMetadata::default).hosts =
            Some(hosts.into_iter().map(Into::into).collect());
        self
    }
}

/// What a service or hook grant covers: everything, or one name/category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GrantScope {
    All,
    Named(String),
}

impl GrantScope {
    fn from_suffix(suffix: &str) -> Self {
        if suffix == "all" {
            Self::All
        } else {
            Self::Named(suffix.to_string())
        }
    }

    /// A named grant covers the exact name or its category.
    pub fn allows(&self, name: &str, category: &str) -> bool {
        match self {
            Self::All => true,
            Self::Named(value) => value == name || value == category,
        }
    }
}

/// A compiled path glob: `**` spans separators, `*` does not, everything
/// else is literal. Anchored to the full string.
#[derive(Debug, Clone)]
pub struct PathPattern {
    raw: String,
    regex: Regex,
}

impl PathPattern {
    pub fn compile(pattern: &str) -> Result<Self, regex::Error> {
        let mut translated = String::from("^");
        let mut chars = pattern.chars().peekable();
        while let Some(ch) = chars.next() {
            if ch == '*' {
                if chars.peek() == Some(&'*') {
                    chars.next();
                    translated.push_str(".*");
                } else {
                    translated.push_str("[^/]*");
                }
            } else {
                translated.push_str(&regex::escape(&ch.to_string()));
            }
        }
        translated.push('$');
        Ok(Self {
            raw: pattern.to_string(),
            regex: Regex::new(&translated)?,
        })
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn matches(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }
}

/// One capability, parsed into its matchable form at registration time.
/// A single protocol id can yield several grants.
#[derive(Debug, Clone)]
pub enum ParsedCapability {
    Service(GrantScope),
    Hook(GrantScope),
    /// `None` = any path.
    FilesystemRead(Option<Vec<PathPattern>>),
    FilesystemWrite(Option<Vec<PathPattern>>),
    /// `None` = any host; entries match by substring containment in the
    /// requested URL.
    Network(Option<Vec<String>>),
}

/// Parse a capability into its grants. Missing or empty path/host lists
/// mean "any".
pub fn parse_capability(capability: &Capability) -> Vec<ParsedCapability> {
    let id = &capability.protocol.id;
    let mut parsed = Vec::new();

    if let Some(index) = id.find(SERVICE_MARKER) {
        let suffix = &id[index + SERVICE_MARKER.len()..];
        parsed.push(ParsedCapability::Service(GrantScope::from_suffix(suffix)));
    }
    if let Some(index) = id.find(HOOK_MARKER) {
        let suffix = &id[index + HOOK_MARKER.len()..];
        parsed.push(ParsedCapability::Hook(GrantScope::from_suffix(suffix)));
    }
    if id.contains(FILESYSTEM_READ_MARKER) {
        parsed.push(ParsedCapability::FilesystemRead(path_patterns(capability)));
    }
    if id.contains(FILESYSTEM_WRITE_MARKER) {
        parsed.push(ParsedCapability::FilesystemWrite(path_patterns(capability)));
    }
    if id.contains(NETWORK_MARKER) {
        parsed.push(ParsedCapability::Network(host_fragments(capability)));
    }
    parsed
}

fn path_patterns(capability: &Capability) -> Option<Vec<PathPattern>> {
    let paths = capability.metadata.as_ref()?.paths.as_ref()?;
    if paths.is_empty() {
        return None;
    }
    Some(
        paths
            .iter()
            .filter_map(|pattern| PathPattern::compile(pattern).ok())
            .collect(),
    )
}

fn host_fragments(capability: &Capability) -> Option<Vec<String>> {
    let hosts = capability.metadata.as_ref()?.hosts.as_ref()?;
    if hosts.is_empty() {
        return None;
    }
    Some(hosts.clone())
}
