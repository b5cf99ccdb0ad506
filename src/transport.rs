//! SSH transport: adapts sshkit onto the engine's connector traits

use reconcile::{CancelToken, CommandOutput, Connector, Host, Transport, TransportError};
use sshkit::{Client, Endpoint};
use std::time::Duration;

/// Opens ssh transports to declared hosts
#[derive(Debug, Clone)]
pub struct SshConnector {
    program: Option<String>,
    read_timeout: Duration,
}

impl Default for SshConnector {
    fn default() -> Self {
        Self {
            program: None,
            read_timeout: sshkit::READ_TIMEOUT,
        }
    }
}

impl SshConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a different ssh executable
    pub fn program(mut self, program: impl Into<String>) -> Self {
        self.program = Some(program.into());
        self
    }

    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// A validated client for `host`
    pub fn client(&self, host: &Host) -> sshkit::Result<Client> {
        let mut client = Client::new(endpoint(host))?.read_timeout(self.read_timeout);
        if let Some(program) = &self.program {
            client = client.program(program.clone());
        }
        Ok(client)
    }
}

impl Connector for SshConnector {
    fn connect(&self, host: &Host) -> Result<Box<dyn Transport>, TransportError> {
        let client = self
            .client(host)
            .map_err(|e| TransportError::Connect(format!("{}: {e}", host.name)))?;
        log::debug!("Opened ssh transport to {}", client.endpoint().destination());
        Ok(Box::new(SshTransport { client }))
    }
}

/// Endpoint for a declared host
pub fn endpoint(host: &Host) -> Endpoint {
    let mut endpoint = Endpoint::new(host.hostname.as_str()).port(host.port);
    if let Some(user) = &host.user {
        endpoint = endpoint.user(user.as_str());
    }
    if let Some(key_file) = &host.key_file {
        endpoint = endpoint.key_file(key_file);
    }
    endpoint
}

struct SshTransport {
    client: Client,
}

impl Transport for SshTransport {
    fn run(&self, command: &str, cancel: &CancelToken) -> Result<CommandOutput, TransportError> {
        self.client
            .run(command, &|| cancel.is_cancelled())
            .map(|out| CommandOutput {
                output: out.output,
                exit_code: out.exit_code,
            })
            .map_err(into_transport_error)
    }
}

/// ssh's own failures are connection problems, not command failures
fn into_transport_error(err: sshkit::Error) -> TransportError {
    if err.category().is_connection_problem() {
        let category = err.category();
        return match err {
            sshkit::Error::CommandFailed { output, .. } => TransportError::Connect(format!(
                "{}: {}",
                category.description(),
                output.trim()
            )),
            other => TransportError::Connect(other.to_string()),
        };
    }

    match err {
        sshkit::Error::CommandFailed { exit_code, output } => {
            TransportError::Failed { exit_code, output }
        }
        sshkit::Error::TimedOut { after } => TransportError::TimedOut(after),
        sshkit::Error::Cancelled => TransportError::Cancelled,
        other => TransportError::Connect(other.to_string()),
    }
}
