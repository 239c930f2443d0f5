//! Command definitions and dispatch.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;

pub mod completions;
pub mod conflicts;
pub mod run;
pub mod utils;
pub mod verify;

/// pushcheck - verify push request branches and detect pickme conflicts.
#[derive(Parser)]
#[command(name = "pushcheck")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Configuration file.
    #[arg(long, global = true, default_value = "pushcheck.toml")]
    pub config: PathBuf,

    /// Log at debug level unless PUSHCHECK_LOG says otherwise.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress informational output.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Where requests are read from and messages are written to.
#[derive(Args, Debug, Clone)]
pub struct DataFiles {
    /// JSON snapshot of requests and pushes.
    #[arg(long, default_value = "pushcheck-store.json")]
    pub store: PathBuf,

    /// JSON lines file receiving queued emails and chat messages.
    #[arg(long, default_value = "pushcheck-outbox.jsonl")]
    pub outbox: PathBuf,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Process jobs read as JSON lines from stdin until EOF and the queue is idle.
    ///
    /// Each line is a job such as {"kind": "VERIFY_BRANCH", "request": 7}.
    Run {
        #[command(flatten)]
        files: DataFiles,
    },

    /// Verify one request's branch and record its revision.
    Verify {
        #[command(flatten)]
        files: DataFiles,

        /// Request id.
        id: u64,
    },

    /// Test pickmes for conflicts with master and with each other.
    #[command(group(
        clap::ArgGroup::new("target").required(true).args(["id", "push"])
    ))]
    Conflicts {
        #[command(flatten)]
        files: DataFiles,

        /// Test a single request.
        id: Option<u64>,

        /// Test every request in this push.
        #[arg(long)]
        push: Option<u64>,
    },

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        #[arg(value_enum)]
        shell: Shell,
    },
}
