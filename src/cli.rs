use clap::{Parser, Subcommand};
use clap_complete::Shell;
use reconcile::StateStatus;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "settle")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Declarative, dependency-ordered configuration of remote hosts", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Declarations file [default: settle.toml, or $SETTLE_FILE]
    #[arg(short, long, global = true)]
    pub file: Option<String>,

    /// ssh executable to run
    #[arg(long, env = "SETTLE_SSH", global = true, value_name = "PROGRAM")]
    pub ssh: Option<String>,

    /// Seconds a remote command may run before it is killed
    #[arg(long, global = true, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Check that declared hosts accept ssh connections
    Ping {
        /// Only this host
        #[arg(short = 'H', long)]
        host: Option<String>,

        /// Only hosts in this group
        #[arg(short = 'G', long)]
        group: Option<String>,
    },

    /// Show what apply would change
    Plan {
        /// Also write the plan as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Converge declared hosts to the declarations
    Apply {
        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Remove every declared resource from the hosts
    Clean {
        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Show recorded resource state
    State {
        /// Only entries with this status (applied, failed, ...)
        #[arg(long)]
        status: Option<StateStatus>,

        /// Drop entries for resources no longer declared
        #[arg(long, conflicts_with = "status")]
        prune: bool,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}
