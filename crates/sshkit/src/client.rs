//! Remote command execution through the system `ssh` client.

use crate::endpoint::Endpoint;
use crate::error::{Error, Result};
use std::io::Read;
use std::process::{Child, Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// How long ssh may take to establish a connection
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// How long a single remote command may run
pub const READ_TIMEOUT: Duration = Duration::from_secs(60);

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Output of a remote command that exited successfully
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Output {
    /// Combined stdout and stderr
    pub output: String,
    pub exit_code: i32,
    pub duration: Duration,
}

/// Runs commands on one endpoint
#[derive(Debug, Clone)]
pub struct Client {
    endpoint: Endpoint,
    key_file: Option<std::path::PathBuf>,
    program: String,
    connect_timeout: Duration,
    read_timeout: Duration,
}

impl Client {
    /// Create a client for a validated endpoint
    ///
    /// When no key file is configured the first existing default key is
    /// used, if any; otherwise ssh falls back to its own configuration.
    pub fn new(endpoint: Endpoint) -> Result<Self> {
        endpoint.validate()?;
        let key_file = endpoint.resolved_key_file();
        if let Some(path) = &key_file
            && endpoint.key_file.is_none()
        {
            log::debug!("Using default key {} for {}", path.display(), endpoint.host);
        }
        Ok(Self {
            endpoint,
            key_file,
            program: "ssh".to_string(),
            connect_timeout: CONNECT_TIMEOUT,
            read_timeout: READ_TIMEOUT,
        })
    }

    /// Use a different ssh executable
    pub fn program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Arguments passed to the ssh client for `command`
    pub fn args(&self, command: &str) -> Vec<String> {
        let mut args = vec![
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            format!("ConnectTimeout={}", self.connect_timeout.as_secs()),
            "-o".to_string(),
            "StrictHostKeyChecking=accept-new".to_string(),
            "-p".to_string(),
            self.endpoint.port.to_string(),
        ];
        if let Some(key) = &self.key_file {
            args.push("-i".to_string());
            args.push(key.display().to_string());
        }
        args.push(self.endpoint.destination());
        args.push("--".to_string());
        args.push(command.to_string());
        args
    }

    /// Run a command, failing on a non-zero exit
    ///
    /// The command is killed when the read timeout elapses or as soon as
    /// `abort` returns true; `abort` is polled while the command runs.
    pub fn run(&self, command: &str, abort: &dyn Fn() -> bool) -> Result<Output> {
        log::debug!("ssh {}: {command}", self.endpoint.destination());

        let started = Instant::now();
        let mut cmd = Command::new(&self.program);
        cmd.args(self.args(command))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        // Keep terminal signals away from ssh; `abort` decides when it stops
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }
        let mut child = cmd.spawn().map_err(Error::Spawn)?;

        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let status = loop {
            if let Some(status) = child.try_wait()? {
                // An interrupt may have reached the command before the flag was set
                if !status.success() && abort() {
                    log::debug!("ssh {}: cancelled", self.endpoint.destination());
                    return Err(Error::Cancelled);
                }
                break status;
            }
            if abort() {
                terminate(&mut child);
                log::debug!("ssh {}: cancelled", self.endpoint.destination());
                return Err(Error::Cancelled);
            }
            if started.elapsed() >= self.read_timeout {
                terminate(&mut child);
                log::warn!(
                    "ssh {}: command timed out after {}s",
                    self.endpoint.destination(),
                    self.read_timeout.as_secs()
                );
                return Err(Error::TimedOut {
                    after: self.read_timeout,
                });
            }
            thread::sleep(POLL_INTERVAL);
        };

        let mut output = collect(stdout);
        output.push_str(&collect(stderr));
        let exit_code = status.code().unwrap_or(-1);

        if !status.success() {
            return Err(Error::CommandFailed { exit_code, output });
        }

        Ok(Output {
            output,
            exit_code,
            duration: started.elapsed(),
        })
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<JoinHandle<Vec<u8>>> {
    pipe.map(|mut pipe| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = pipe.read_to_end(&mut buf);
            buf
        })
    })
}

fn collect(handle: Option<JoinHandle<Vec<u8>>>) -> String {
    handle
        .and_then(|h| h.join().ok())
        .map(|buf| String::from_utf8_lossy(&buf).into_owned())
        .unwrap_or_default()
}

fn terminate(child: &mut Child) {
    if let Err(e) = child.kill() {
        log::debug!("kill failed: {e}");
    }
    let _ = child.wait();
}
