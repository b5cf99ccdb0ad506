//! Connectivity checks

use crate::client::Client;
use crate::error::Error;
use std::time::{Duration, Instant};

/// Result of probing one endpoint
#[derive(Debug)]
pub struct PingResult {
    pub destination: String,
    pub latency: Duration,
    pub error: Option<Error>,
}

impl PingResult {
    pub fn is_reachable(&self) -> bool {
        self.error.is_none()
    }
}

/// Run a no-op command on the endpoint to prove it accepts connections
pub fn ping(client: &Client) -> PingResult {
    let started = Instant::now();
    let error = client.run("true", &|| false).err();
    PingResult {
        destination: client.endpoint().destination(),
        latency: started.elapsed(),
        error,
    }
}
