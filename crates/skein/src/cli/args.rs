//! CLI argument structs for all commands.

use clap::{Parser, Subcommand, ValueEnum};

use crate::github::SyncDirection;

/// Output format of the `graph` command
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GraphFormat {
    /// Levelled text view
    #[default]
    Ascii,
    /// Mermaid flowchart
    Mermaid,
    /// Graphviz DOT
    Dot,
}

/// Arguments for the `graph` command
#[derive(Parser, Debug, Clone)]
pub struct GraphArgs {
    /// Output format
    #[arg(short, long, value_enum, default_value_t = GraphFormat::Ascii)]
    pub format: GraphFormat,

    /// Include closed tasks
    #[arg(long)]
    pub include_closed: bool,

    /// Lay out Mermaid/DOT output left to right
    #[arg(long)]
    pub horizontal: bool,
}

/// Arguments for the `watch` command
#[derive(Parser, Debug, Clone)]
pub struct WatchArgs {
    /// Run a sync pass every interval while watching
    #[arg(long)]
    pub auto_sync: bool,

    /// Override the debounce window, in milliseconds
    #[arg(long)]
    pub debounce_ms: Option<u64>,
}

/// Sync direction for CLI arguments
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncDirectionArg {
    /// Push local tasks to GitHub
    ToGithub,
    /// Pull GitHub issues into the store
    FromGithub,
    /// Push, then pull
    Bidirectional,
}

impl From<SyncDirectionArg> for SyncDirection {
    fn from(arg: SyncDirectionArg) -> Self {
        match arg {
            SyncDirectionArg::ToGithub => Self::ToGitHub,
            SyncDirectionArg::FromGithub => Self::FromGitHub,
            SyncDirectionArg::Bidirectional => Self::Bidirectional,
        }
    }
}

/// Arguments for the `github` command
#[derive(Parser, Debug, Clone)]
pub struct GitHubArgs {
    /// GitHub action
    #[command(subcommand)]
    pub command: GitHubCommand,
}

/// GitHub actions
#[derive(Subcommand, Debug, Clone)]
pub enum GitHubCommand {
    /// Sync tasks and issues
    Sync {
        /// Which way to sync
        #[arg(short, long, value_enum, default_value_t = SyncDirectionArg::Bidirectional)]
        direction: SyncDirectionArg,
    },

    /// Link a task to an existing issue
    Link {
        /// Task ID
        task_id: String,
        /// Issue URL (https://github.com/<owner>/<repo>/issues/<number>)
        url: String,
    },

    /// Remove a task's link
    Unlink {
        /// Task ID
        task_id: String,
    },

    /// List links
    Links,
}
