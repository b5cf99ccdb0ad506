//! Error types for remote command execution.
//!
//! Errors are categorized so callers can tell configuration mistakes from
//! unreachable hosts, and both from commands that ran and failed.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Exit status the ssh client uses for its own failures
pub const SSH_ERROR_EXIT: i32 = 255;

/// Categories of ssh errors for user feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Endpoint or key file is misconfigured
    Config,
    /// The remote side rejected our credentials
    Auth,
    /// Host unreachable or connection dropped
    Network,
    /// The command exceeded the read timeout
    Timeout,
    /// The command was aborted by the caller
    Cancelled,
    /// The remote command ran and failed
    Command,
    /// Other/unknown errors
    Other,
}

impl ErrorCategory {
    /// Whether the host itself could not be used.
    pub fn is_connection_problem(&self) -> bool {
        matches!(self, Self::Auth | Self::Network)
    }

    /// Get a user-friendly description of this error category.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Config => "Invalid connection settings",
            Self::Auth => "Authentication failed",
            Self::Network => "Host unreachable",
            Self::Timeout => "Command timed out",
            Self::Cancelled => "Cancelled",
            Self::Command => "Remote command failed",
            Self::Other => "Unexpected error",
        }
    }

    /// Get actionable advice for resolving this error category.
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Config => "Check the host entry and key file in your declarations",
            Self::Auth => "Verify the user and that the key is in the remote authorized_keys",
            Self::Network => "Check that the host is up and reachable on its ssh port",
            Self::Timeout => "The remote operation may still be running; inspect the host",
            Self::Cancelled => "Re-run to continue where this run stopped",
            Self::Command => "Check the command output above for details",
            Self::Other => "Check the error details for more information",
        }
    }
}

/// Errors that can occur while talking to a remote host.
#[derive(Debug, Error)]
pub enum Error {
    /// Host name, port or user is invalid
    #[error("invalid endpoint: {message}")]
    InvalidEndpoint {
        /// What is wrong with the endpoint
        message: String,
    },

    /// Key file missing, unreadable, too permissive, or too large
    #[error("key file {}: {message}", .path.display())]
    KeyFile {
        /// Path of the key file
        path: PathBuf,
        /// What is wrong with it
        message: String,
    },

    /// The ssh client could not be started
    #[error("failed to start ssh: {0}")]
    Spawn(#[source] std::io::Error),

    /// The command exited non-zero
    #[error("command exited with status {exit_code}")]
    CommandFailed {
        /// Exit status (255 means ssh itself failed)
        exit_code: i32,
        /// Combined stdout and stderr
        output: String,
    },

    /// The command did not finish within the read timeout
    #[error("command timed out after {}s", .after.as_secs())]
    TimedOut {
        /// Timeout that elapsed
        after: Duration,
    },

    /// The command was aborted by the caller
    #[error("command cancelled")]
    Cancelled,

    /// IO error while supervising the child process
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Get the error category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::InvalidEndpoint { .. } | Error::KeyFile { .. } => ErrorCategory::Config,
            Error::CommandFailed { exit_code, output } if *exit_code == SSH_ERROR_EXIT => {
                let lower = output.to_lowercase();
                if lower.contains("permission denied") || lower.contains("host key verification") {
                    ErrorCategory::Auth
                } else {
                    ErrorCategory::Network
                }
            }
            Error::CommandFailed { .. } => ErrorCategory::Command,
            Error::TimedOut { .. } => ErrorCategory::Timeout,
            Error::Cancelled => ErrorCategory::Cancelled,
            Error::Spawn(_) | Error::Io(_) => ErrorCategory::Other,
        }
    }

    pub(crate) fn endpoint(message: impl Into<String>) -> Self {
        Error::InvalidEndpoint {
            message: message.into(),
        }
    }
}

/// Result type for ssh operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ssh_failure_categories() {
        let auth = Error::CommandFailed {
            exit_code: 255,
            output: "deploy@10.0.0.5: Permission denied (publickey).".into(),
        };
        assert_eq!(auth.category(), ErrorCategory::Auth);
        assert!(auth.category().is_connection_problem());

        let network = Error::CommandFailed {
            exit_code: 255,
            output: "ssh: connect to host 10.0.0.5 port 22: Connection refused".into(),
        };
        assert_eq!(network.category(), ErrorCategory::Network);
    }

    #[test]
    fn test_remote_command_failure_category() {
        let err = Error::CommandFailed {
            exit_code: 100,
            output: "E: Unable to locate package nginxx".into(),
        };
        assert_eq!(err.category(), ErrorCategory::Command);
        assert!(!err.category().is_connection_problem());
    }

    #[test]
    fn test_category_advice() {
        for category in [
            ErrorCategory::Config,
            ErrorCategory::Auth,
            ErrorCategory::Network,
            ErrorCategory::Timeout,
            ErrorCategory::Cancelled,
            ErrorCategory::Command,
            ErrorCategory::Other,
        ] {
            assert!(!category.description().is_empty());
            assert!(!category.advice().is_empty());
        }
    }

    #[test]
    fn test_timeout_message() {
        let err = Error::TimedOut {
            after: Duration::from_secs(60),
        };
        assert_eq!(err.to_string(), "command timed out after 60s");
        assert_eq!(err.category(), ErrorCategory::Timeout);
    }
}
