//! Apply context and collaborator traits
//!
//! These traits let the engine drive remote machines and report progress
//! without depending on a specific transport or UI.

use crate::error::{Error, Result};
use crate::executor::{ActionOutcome, ExecutionResult};
use crate::types::{Action, CommandOutput, Host, ResourceId};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use thiserror::Error;

/// Outcome of a transport operation that did not succeed
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// The command ran and exited non-zero
    #[error("command exited with status {exit_code}")]
    Failed {
        /// Exit status reported by the remote side
        exit_code: i32,
        /// Combined stdout and stderr
        output: String,
    },

    /// The command did not finish within the read timeout and was killed
    #[error("command timed out after {0:?}")]
    TimedOut(Duration),

    /// The command was aborted because the run was cancelled
    #[error("command cancelled")]
    Cancelled,

    /// A connection could not be established
    #[error("{0}")]
    Connect(String),
}

/// Cooperative cancellation flag shared between a run and its transports
///
/// Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A command channel bound to one host
///
/// Implementations must bound every command by a read timeout and abort it
/// once `cancel` fires.
pub trait Transport: Send {
    /// Run a command, returning its combined output on success
    fn run(
        &self,
        command: &str,
        cancel: &CancelToken,
    ) -> std::result::Result<CommandOutput, TransportError>;

    /// Release the connection
    fn close(&mut self) {}
}

/// Opens transports to hosts
pub trait Connector: Send + Sync {
    fn connect(&self, host: &Host) -> std::result::Result<Box<dyn Transport>, TransportError>;
}

/// Kind of progress step reported while applying a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    Info,
    Command,
    Output,
    Success,
    Warning,
    Failure,
}

/// One progress notification from inside an apply or destroy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub kind: StepKind,
    pub message: String,
}

/// Receiver of structured progress notifications
///
/// Observers are pure sinks: nothing they do can influence control flow.
/// Every method has an empty default so implementations override only what
/// they render.
pub trait Observer {
    /// Called once before the first action
    fn on_execution_start(&mut self, _actions: &[Action]) {}

    /// Called before an action runs (`index` is zero-based)
    fn on_action_start(&mut self, _index: usize, _total: usize, _action: &Action) {}

    /// Called for every step a resource reports
    fn on_step(&mut self, _resource: &ResourceId, _step: &Step) {}

    /// Called after an action succeeded or failed
    fn on_action_complete(&mut self, _outcome: &ActionOutcome) {}

    /// Called once after the run finished or halted
    fn on_execution_complete(&mut self, _result: &ExecutionResult) {}
}

/// Observer that discards everything
pub struct NoObserver;

impl Observer for NoObserver {}

/// Context passed to resource apply and destroy operations
pub struct ApplyContext<'a> {
    resource: &'a ResourceId,
    host: Option<&'a Host>,
    connector: &'a dyn Connector,
    observer: &'a mut dyn Observer,
    cancel: &'a CancelToken,
}

impl<'a> ApplyContext<'a> {
    pub fn new(
        resource: &'a ResourceId,
        host: Option<&'a Host>,
        connector: &'a dyn Connector,
        observer: &'a mut dyn Observer,
        cancel: &'a CancelToken,
    ) -> Self {
        Self {
            resource,
            host,
            connector,
            observer,
            cancel,
        }
    }

    pub fn resource_id(&self) -> &ResourceId {
        self.resource
    }

    pub fn host(&self) -> Option<&'a Host> {
        self.host
    }

    /// Get the bound host, or error if none is available
    pub fn require_host(&self) -> Result<&'a Host> {
        self.host
            .ok_or_else(|| Error::execution(self.resource, "no host available to apply to"))
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Report a progress step to the observer
    pub fn step(&mut self, kind: StepKind, message: impl Into<String>) {
        let step = Step {
            kind,
            message: message.into(),
        };
        self.observer.on_step(self.resource, &step);
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.step(StepKind::Info, message);
    }

    pub fn success(&mut self, message: impl Into<String>) {
        self.step(StepKind::Success, message);
    }

    /// Open a transport to the bound host
    pub fn connect(&mut self) -> Result<Box<dyn Transport>> {
        let host = self.require_host()?;
        if self.is_cancelled() {
            return Err(Error::Cancelled {
                id: self.resource.clone(),
            });
        }
        self.info(format!("connecting to {host}"));
        self.connector.connect(host).map_err(|e| {
            self.step(StepKind::Failure, format!("connection to {} failed: {e}", host.name));
            Error::from_transport(self.resource, e)
        })
    }

    /// Run a command that must succeed
    ///
    /// Non-zero exits, timeouts and cancellation all become errors
    /// attributed to the current resource.
    pub fn run(&mut self, transport: &dyn Transport, command: &str) -> Result<CommandOutput> {
        self.step(StepKind::Command, command);
        match transport.run(command, self.cancel) {
            Ok(out) => {
                if !out.trimmed().is_empty() {
                    self.step(StepKind::Output, out.trimmed().to_string());
                }
                Ok(out)
            }
            Err(e) => {
                if let TransportError::Failed { output, .. } = &e
                    && !output.trim().is_empty()
                {
                    self.step(StepKind::Output, output.trim().to_string());
                }
                self.step(StepKind::Failure, e.to_string());
                Err(Error::from_transport(self.resource, e))
            }
        }
    }

    /// Run a check command whose exit status is the answer
    ///
    /// A non-zero exit yields `false`; timeouts, cancellation and
    /// connection failures are still errors.
    pub fn probe(&mut self, transport: &dyn Transport, command: &str) -> Result<bool> {
        self.step(StepKind::Command, command);
        match transport.run(command, self.cancel) {
            Ok(_) => Ok(true),
            Err(TransportError::Failed { .. }) => Ok(false),
            Err(e) => {
                self.step(StepKind::Failure, e.to_string());
                Err(Error::from_transport(self.resource, e))
            }
        }
    }
}
