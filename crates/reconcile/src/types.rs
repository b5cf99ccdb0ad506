//! Core types shared by the graph, state store, planner and executor

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Metadata key holding the last applied configuration snapshot
pub const METADATA_CONFIG: &str = "config";

/// Metadata key holding the error text of the last failed action
pub const METADATA_ERROR: &str = "error";

/// Action metadata key holding the human-readable reason
pub const METADATA_REASON: &str = "reason";

/// Unique identifier of a resource instance
///
/// Identifiers are opaque strings, conventionally composed from the kind and
/// the kind-specific key, e.g. `package:apt:nginx` or `host:web1`.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(String);

impl ResourceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Compose an id from a kind and its key parts, joined with `:`
    pub fn compose(kind: &str, parts: &[&str]) -> Self {
        let mut id = kind.to_string();
        for part in parts {
            id.push(':');
            id.push_str(part);
        }
        Self(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ResourceId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ResourceId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl AsRef<str> for ResourceId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Ordered tier constraining which resources may depend on which
///
/// Lower tiers are more foundational. A resource may only require resources
/// at its own tier or below.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layer {
    Foundation,
    Platform,
    Infrastructure,
    Application,
    Configuration,
    Runtime,
}

impl Layer {
    pub const ALL: [Layer; 6] = [
        Layer::Foundation,
        Layer::Platform,
        Layer::Infrastructure,
        Layer::Application,
        Layer::Configuration,
        Layer::Runtime,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Foundation => "foundation",
            Self::Platform => "platform",
            Self::Infrastructure => "infrastructure",
            Self::Application => "application",
            Self::Configuration => "configuration",
            Self::Runtime => "runtime",
        }
    }

    /// Whether a resource in `self` may require a resource in `target`
    pub fn may_depend_on(self, target: Layer) -> bool {
        self >= target
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of relation a dependency edge expresses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeType {
    DependsOn,
    Configures,
    Monitors,
    Triggers,
}

impl fmt::Display for EdgeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::DependsOn => "depends_on",
            Self::Configures => "configures",
            Self::Monitors => "monitors",
            Self::Triggers => "triggers",
        })
    }
}

/// A declared edge from a resource to another resource
///
/// Only `required` edges take part in ordering, cycle and layer checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    pub target: ResourceId,
    pub edge: EdgeType,
    pub required: bool,
}

impl Dependency {
    pub fn required(target: impl Into<ResourceId>, edge: EdgeType) -> Self {
        Self {
            target: target.into(),
            edge,
            required: true,
        }
    }

    pub fn informational(target: impl Into<ResourceId>, edge: EdgeType) -> Self {
        Self {
            target: target.into(),
            edge,
            required: false,
        }
    }
}

/// Persisted status of a resource
///
/// `Drifted`, `Skipped` and `Unknown` are reserved and never assigned by
/// the engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateStatus {
    #[default]
    Pending,
    Applied,
    Failed,
    Drifted,
    Skipped,
    Unknown,
}

impl StateStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Applied => "applied",
            Self::Failed => "failed",
            Self::Drifted => "drifted",
            Self::Skipped => "skipped",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for StateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for StateStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "applied" => Ok(Self::Applied),
            "failed" => Ok(Self::Failed),
            "drifted" => Ok(Self::Drifted),
            "skipped" => Ok(Self::Skipped),
            "unknown" => Ok(Self::Unknown),
            other => Err(format!("unknown status '{other}'")),
        }
    }
}

/// Last known state of a resource, as persisted in the state file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceState {
    pub status: StateStatus,
    pub last_applied: DateTime<Utc>,
    #[serde(default)]
    pub checksum: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl ResourceState {
    /// The configuration recorded by the last successful apply
    pub fn config_snapshot(&self) -> Option<&serde_json::Value> {
        self.metadata.get(METADATA_CONFIG)
    }

    /// The error text recorded by the last failed action
    pub fn error_message(&self) -> Option<&str> {
        self.metadata.get(METADATA_ERROR).and_then(|v| v.as_str())
    }
}

/// Operation decided for one resource in one plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Create,
    Update,
    Delete,
    NoOp,
}

impl ActionType {
    pub const ALL: [ActionType; 4] = [
        ActionType::Create,
        ActionType::Update,
        ActionType::Delete,
        ActionType::NoOp,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::NoOp => "no_op",
        }
    }

    /// Whether the action touches the target system
    pub fn is_change(&self) -> bool {
        !matches!(self, Self::NoOp)
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A field-level change
///
/// Drift is detected for whole resources, so plans currently never carry
/// changes; the type exists so the plan document format is stable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Change {
    pub field: String,
    pub old_value: serde_json::Value,
    pub new_value: serde_json::Value,
}

/// The decided operation for one resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub resource_id: ResourceId,
    #[serde(rename = "type")]
    pub action_type: ActionType,
    #[serde(default)]
    pub changes: Vec<Change>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl Action {
    pub fn new(resource_id: ResourceId, action_type: ActionType, reason: &str) -> Self {
        let mut metadata = BTreeMap::new();
        metadata.insert(METADATA_REASON.to_string(), reason.to_string());
        Self {
            resource_id,
            action_type,
            changes: Vec::new(),
            metadata,
        }
    }

    pub fn reason(&self) -> &str {
        self.metadata
            .get(METADATA_REASON)
            .map_or("", String::as_str)
    }
}

/// A remote machine resources are applied to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Host {
    pub name: String,
    pub hostname: String,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub key_file: Option<PathBuf>,
    #[serde(default)]
    pub group: Option<String>,
}

fn default_port() -> u16 {
    22
}

impl Host {
    pub fn new(name: impl Into<String>, hostname: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            hostname: hostname.into(),
            user: None,
            port: default_port(),
            key_file: None,
            group: None,
        }
    }

    /// `user@hostname`, or just the hostname when no user is set
    pub fn destination(&self) -> String {
        match &self.user {
            Some(user) => format!("{user}@{}", self.hostname),
            None => self.hostname.clone(),
        }
    }
}

impl fmt::Display for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}:{})", self.name, self.hostname, self.port)
    }
}

/// Output of a command run through a transport
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Combined stdout and stderr
    pub output: String,
    pub exit_code: i32,
}

impl CommandOutput {
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            exit_code: 0,
        }
    }

    pub fn is_success(&self) -> bool {
        self.exit_code == 0
    }

    /// Output with surrounding whitespace removed
    pub fn trimmed(&self) -> &str {
        self.output.trim()
    }
}
