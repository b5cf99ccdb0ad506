//! Error types for reconciliation.
//!
//! Every error carries the identity of the resource it concerns (where one
//! applies) and maps to the [`Phase`] of the run it surfaced in, so callers
//! can report both without inspecting variants.

use crate::context::TransportError;
use crate::types::{Layer, ResourceId};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Phase of a run in which an error surfaced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Resource and graph validation, before any plan exists
    Validation,
    /// Drift comparison while computing a plan
    Planning,
    /// Applying or destroying resources
    Execution,
    /// Reading or writing the state file
    Persistence,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::Planning => "planning",
            Self::Execution => "execution",
            Self::Persistence => "persistence",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur while validating, planning or executing.
#[derive(Debug, Error)]
pub enum Error {
    /// Structurally malformed resource
    #[error("invalid resource '{id}': {message}")]
    Validation {
        /// Offending resource (may be empty when the id itself is missing)
        id: ResourceId,
        /// What is wrong with it
        message: String,
    },

    /// A required edge points at a resource that is not in the graph
    #[error("resource {id} depends on {target}, which is not declared")]
    MissingDependency {
        /// Resource declaring the edge
        id: ResourceId,
        /// Undeclared edge target
        target: ResourceId,
    },

    /// The required-edge subgraph is not acyclic
    #[error("circular dependency detected among: {}", join_ids(.remaining))]
    Cycle {
        /// Resources that could not be ordered
        remaining: Vec<ResourceId>,
    },

    /// A required edge points to a less foundational layer
    #[error("resource {id}: resource in layer {from} cannot depend on layer {to} ({target})")]
    LayerViolation {
        /// Resource declaring the edge
        id: ResourceId,
        /// Edge target
        target: ResourceId,
        /// Layer of the declaring resource
        from: Layer,
        /// Layer of the target
        to: Layer,
    },

    /// Configuration could not be serialized for comparison
    #[error("drift detection failed for {id}: {source}")]
    DriftDetection {
        /// Resource whose configuration failed to serialize
        id: ResourceId,
        /// Underlying serialization error
        source: serde_json::Error,
    },

    /// An apply or destroy call failed
    #[error("{id}: {message}")]
    Execution {
        /// Resource being applied or destroyed
        id: ResourceId,
        /// Failure description, including command output where available
        message: String,
    },

    /// A plan action names a resource absent from the graph
    #[error("resource {0} not found")]
    ResourceNotFound(ResourceId),

    /// A remote command exceeded the read timeout
    #[error("{id}: command timed out after {}s", .after.as_secs())]
    TimedOut {
        /// Resource being applied or destroyed
        id: ResourceId,
        /// Timeout that elapsed
        after: Duration,
    },

    /// The run was cancelled while the action was pending or in flight
    #[error("{id}: cancelled")]
    Cancelled {
        /// Resource being applied or destroyed
        id: ResourceId,
    },

    /// State or plan file unreadable, malformed, or unwritable
    #[error("{}: {source}", .path.display())]
    Persistence {
        /// File involved
        path: PathBuf,
        /// Underlying I/O or format error
        source: std::io::Error,
    },
}

impl Error {
    pub fn validation(id: &ResourceId, message: impl Into<String>) -> Self {
        Error::Validation {
            id: id.clone(),
            message: message.into(),
        }
    }

    pub fn execution(id: &ResourceId, message: impl Into<String>) -> Self {
        Error::Execution {
            id: id.clone(),
            message: message.into(),
        }
    }

    pub fn persistence(path: impl Into<PathBuf>, source: impl Into<std::io::Error>) -> Self {
        Error::Persistence {
            path: path.into(),
            source: source.into(),
        }
    }

    /// Attribute a transport outcome to the resource being worked on.
    pub fn from_transport(id: &ResourceId, err: TransportError) -> Self {
        match err {
            TransportError::TimedOut(after) => Error::TimedOut {
                id: id.clone(),
                after,
            },
            TransportError::Cancelled => Error::Cancelled { id: id.clone() },
            TransportError::Failed { exit_code, output } => Error::Execution {
                id: id.clone(),
                message: if output.trim().is_empty() {
                    format!("command exited with status {exit_code}")
                } else {
                    format!("command exited with status {exit_code}: {}", output.trim())
                },
            },
            TransportError::Connect(message) => Error::Execution {
                id: id.clone(),
                message: format!("connection failed: {message}"),
            },
        }
    }

    /// The phase this error belongs to.
    pub fn phase(&self) -> Phase {
        match self {
            Error::Validation { .. }
            | Error::MissingDependency { .. }
            | Error::Cycle { .. }
            | Error::LayerViolation { .. } => Phase::Validation,
            Error::DriftDetection { .. } => Phase::Planning,
            Error::Execution { .. }
            | Error::ResourceNotFound(_)
            | Error::TimedOut { .. }
            | Error::Cancelled { .. } => Phase::Execution,
            Error::Persistence { .. } => Phase::Persistence,
        }
    }

    /// The resource this error concerns, if any.
    pub fn resource_id(&self) -> Option<&ResourceId> {
        match self {
            Error::Validation { id, .. }
            | Error::MissingDependency { id, .. }
            | Error::LayerViolation { id, .. }
            | Error::DriftDetection { id, .. }
            | Error::Execution { id, .. }
            | Error::TimedOut { id, .. }
            | Error::Cancelled { id } => Some(id),
            Error::ResourceNotFound(id) => Some(id),
            Error::Cycle { .. } | Error::Persistence { .. } => None,
        }
    }

    /// Whether the error came from an interrupted remote operation.
    pub fn is_interrupted(&self) -> bool {
        matches!(self, Error::TimedOut { .. } | Error::Cancelled { .. })
    }
}

fn join_ids(ids: &[ResourceId]) -> String {
    ids.iter()
        .map(ResourceId::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Result type for reconciliation operations.
pub type Result<T> = std::result::Result<T, Error>;
