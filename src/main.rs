mod cli;
mod commands;
mod declarations;
mod drivers;
mod observer;
mod paths;
mod progress;
mod resource;
#[cfg(test)]
mod testutil;
mod transport;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use std::io;
use std::time::Duration;

/// Global context for the application
pub struct Context {
    pub verbose: u8,
    pub quiet: bool,
    /// Declarations file from `--file`
    pub file: Option<String>,
    /// ssh executable from `--ssh`
    pub ssh: Option<String>,
    /// Read timeout from `--timeout`
    pub timeout: Option<Duration>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    let ctx = Context {
        verbose: cli.verbose,
        quiet: cli.quiet,
        file: cli.file,
        ssh: cli.ssh,
        timeout: cli.timeout.map(Duration::from_secs),
    };

    match cli.command {
        Command::Ping { host, group } => {
            commands::ping::run(&ctx, host.as_deref(), group.as_deref())
        }
        Command::Plan { output } => commands::plan::run(&ctx, output.as_deref()),
        Command::Apply { yes } => commands::apply::run(&ctx, yes),
        Command::Clean { yes } => commands::clean::run(&ctx, yes),
        Command::State { status, prune } => commands::state::run(&ctx, status, prune),
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "settle", &mut io::stdout());
            Ok(())
        }
    }
}
