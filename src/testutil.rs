//! Test doubles for resource and driver tests

use reconcile::{
    ApplyContext, CancelToken, CommandOutput, Connector, Host, Observer, ResourceId, Step,
    Transport, TransportError,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct Script {
    responses: HashMap<String, Result<String, TransportError>>,
    commands: Vec<String>,
}

/// Connector answering commands from a script; unknown commands succeed
#[derive(Clone, Default)]
pub struct ScriptedConnector {
    script: Arc<Mutex<Script>>,
}

impl ScriptedConnector {
    pub fn respond(&self, command: &str, response: Result<&str, TransportError>) {
        self.script
            .lock()
            .unwrap()
            .responses
            .insert(command.to_string(), response.map(str::to_string));
    }

    /// Make `command` exit with status 1
    pub fn fail(&self, command: &str) {
        self.respond(
            command,
            Err(TransportError::Failed {
                exit_code: 1,
                output: String::new(),
            }),
        );
    }

    pub fn commands(&self) -> Vec<String> {
        self.script.lock().unwrap().commands.clone()
    }
}

impl Connector for ScriptedConnector {
    fn connect(&self, _host: &Host) -> Result<Box<dyn Transport>, TransportError> {
        Ok(Box::new(ScriptedTransport {
            script: Arc::clone(&self.script),
        }))
    }
}

struct ScriptedTransport {
    script: Arc<Mutex<Script>>,
}

impl Transport for ScriptedTransport {
    fn run(&self, command: &str, cancel: &CancelToken) -> Result<CommandOutput, TransportError> {
        if cancel.is_cancelled() {
            return Err(TransportError::Cancelled);
        }
        let mut script = self.script.lock().unwrap();
        script.commands.push(command.to_string());
        script
            .responses
            .get(command)
            .cloned()
            .unwrap_or_else(|| Ok(String::new()))
            .map(CommandOutput::success)
    }
}

/// Observer keeping every step
#[derive(Default)]
pub struct StepLog {
    pub steps: Vec<Step>,
}

impl Observer for StepLog {
    fn on_step(&mut self, _resource: &ResourceId, step: &Step) {
        self.steps.push(step.clone());
    }
}

impl StepLog {
    pub fn messages(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.message.as_str()).collect()
    }
}

/// Call `f` with an apply context bound to a throwaway host
pub fn with_context<T>(
    connector: &ScriptedConnector,
    id: &ResourceId,
    f: impl FnOnce(&mut ApplyContext<'_>) -> T,
) -> (T, StepLog) {
    let host = Host::new("web1", "10.0.0.5");
    let cancel = CancelToken::new();
    let mut log = StepLog::default();
    let result = {
        let mut ctx = ApplyContext::new(id, Some(&host), connector, &mut log, &cancel);
        f(&mut ctx)
    };
    (result, log)
}
