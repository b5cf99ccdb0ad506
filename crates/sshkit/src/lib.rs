//! # sshkit
//!
//! Run commands on remote hosts through the system `ssh` client.
//!
//! This crate provides functionality for:
//! - Validating endpoints (host name syntax, port, private key permissions and size)
//! - Running a command with a connect timeout, a read timeout, and caller-driven cancellation
//! - Probing hosts for connectivity
//! - Quoting values for the remote shell
//!
//! Host aliases, known hosts and agent keys are resolved by ssh itself from
//! the user's `~/.ssh/config`.
//!
//! ## Example
//!
//! ```no_run
//! use sshkit::{Client, Endpoint};
//!
//! let endpoint = Endpoint::new("10.0.0.5").user("deploy").port(22);
//! let client = Client::new(endpoint).expect("invalid endpoint");
//!
//! let out = client.run("uname -a", &|| false).expect("command failed");
//! println!("{}", out.output);
//! ```

pub mod client;
pub mod endpoint;
pub mod error;
pub mod ping;
pub mod shell;

pub use client::{CONNECT_TIMEOUT, Client, Output, READ_TIMEOUT};
pub use endpoint::{Endpoint, validate_hostname, validate_key_file};
pub use error::{Error, ErrorCategory, Result};
pub use ping::{PingResult, ping};
pub use shell::quote;
