//! Fakes shared by the unit tests

use crate::context::{ApplyContext, Connector, Observer, Step, Transport, TransportError};
use crate::error::{Error, Result};
use crate::executor::{ActionOutcome, ExecutionResult};
use crate::resource::{Resource, ResourceMeta};
use crate::types::{
    Action, CommandOutput, Dependency, EdgeType, Host, Layer, ResourceId,
};
use crate::CancelToken;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct FakeState {
    responses: HashMap<String, std::result::Result<String, TransportError>>,
    commands: Vec<String>,
    connected: Vec<String>,
    refuse: bool,
}

/// Connector whose transports answer from a canned response table
#[derive(Clone, Default)]
pub struct FakeConnector {
    state: Arc<Mutex<FakeState>>,
}

impl FakeConnector {
    pub fn respond(&self, command: &str, response: std::result::Result<&str, TransportError>) {
        self.state
            .lock()
            .unwrap()
            .responses
            .insert(command.to_string(), response.map(str::to_string));
    }

    pub fn refuse_connections(&self) {
        self.state.lock().unwrap().refuse = true;
    }

    pub fn commands(&self) -> Vec<String> {
        self.state.lock().unwrap().commands.clone()
    }

    pub fn connected_hosts(&self) -> Vec<String> {
        self.state.lock().unwrap().connected.clone()
    }
}

impl Connector for FakeConnector {
    fn connect(&self, host: &Host) -> std::result::Result<Box<dyn Transport>, TransportError> {
        let mut state = self.state.lock().unwrap();
        if state.refuse {
            return Err(TransportError::Connect(format!("{}: connection refused", host.hostname)));
        }
        state.connected.push(host.name.clone());
        Ok(Box::new(FakeTransport {
            state: Arc::clone(&self.state),
        }))
    }
}

struct FakeTransport {
    state: Arc<Mutex<FakeState>>,
}

impl Transport for FakeTransport {
    fn run(
        &self,
        command: &str,
        cancel: &CancelToken,
    ) -> std::result::Result<CommandOutput, TransportError> {
        if cancel.is_cancelled() {
            return Err(TransportError::Cancelled);
        }
        let mut state = self.state.lock().unwrap();
        state.commands.push(command.to_string());
        state
            .responses
            .get(command)
            .cloned()
            .unwrap_or_else(|| Ok(String::new()))
            .map(CommandOutput::success)
    }
}

/// Observer that records every notification
#[derive(Default)]
pub struct RecordingObserver {
    pub started: Vec<ResourceId>,
    pub steps: Vec<(ResourceId, Step)>,
    pub completed: Vec<(ResourceId, bool)>,
    pub finished: Option<bool>,
}

impl Observer for RecordingObserver {
    fn on_action_start(&mut self, _index: usize, _total: usize, action: &Action) {
        self.started.push(action.resource_id.clone());
    }

    fn on_step(&mut self, resource: &ResourceId, step: &Step) {
        self.steps.push((resource.clone(), step.clone()));
    }

    fn on_action_complete(&mut self, outcome: &ActionOutcome) {
        self.completed
            .push((outcome.action.resource_id.clone(), outcome.is_success()));
    }

    fn on_execution_complete(&mut self, result: &ExecutionResult) {
        self.finished = Some(result.success);
    }
}

/// Configurable resource for graph, planner and executor tests
#[derive(Debug)]
pub struct TestResource {
    meta: ResourceMeta,
    pub value: String,
    pub command: Option<String>,
    pub fail_with: Option<String>,
    pub broken_config: bool,
    pub host: Option<Host>,
}

impl TestResource {
    pub fn new(id: &str, layer: Layer) -> Self {
        Self {
            meta: ResourceMeta::new(id.into(), "test", layer),
            value: "v1".into(),
            command: None,
            fail_with: None,
            broken_config: false,
            host: None,
        }
    }

    pub fn requires(mut self, target: &str) -> Self {
        self.meta
            .dependencies
            .push(Dependency::required(target, EdgeType::DependsOn));
        self
    }

    pub fn informs(mut self, target: &str) -> Self {
        self.meta
            .dependencies
            .push(Dependency::informational(target, EdgeType::Monitors));
        self
    }

    pub fn with_value(mut self, value: &str) -> Self {
        self.value = value.into();
        self
    }

    pub fn running(mut self, command: &str) -> Self {
        self.command = Some(command.into());
        self
    }

    pub fn failing(mut self, message: &str) -> Self {
        self.fail_with = Some(message.into());
        self
    }

    pub fn with_broken_config(mut self) -> Self {
        self.broken_config = true;
        self
    }

    pub fn as_host(mut self, host: Host) -> Self {
        self.host = Some(host);
        self
    }
}

impl Resource for TestResource {
    fn meta(&self) -> &ResourceMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut ResourceMeta {
        &mut self.meta
    }

    fn config(&self) -> serde_json::Result<serde_json::Value> {
        if self.broken_config {
            return serde_json::from_str::<serde_json::Value>("{");
        }
        Ok(serde_json::json!({ "value": self.value }))
    }

    fn apply(&self, ctx: &mut ApplyContext<'_>) -> Result<()> {
        if let Some(command) = &self.command {
            let transport = ctx.connect()?;
            ctx.run(transport.as_ref(), command)?;
        }
        match &self.fail_with {
            Some(message) => Err(Error::execution(self.id(), message.clone())),
            None => Ok(()),
        }
    }

    fn destroy(&self, ctx: &mut ApplyContext<'_>) -> Result<()> {
        self.apply(ctx)
    }

    fn host(&self) -> Option<&Host> {
        self.host.as_ref()
    }
}
