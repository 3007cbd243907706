//! CLI argument parsing and command dispatch.
//!
//! # Commands
//!
//! - `graph`: Render the dependency graph (ASCII, Mermaid, or DOT)
//! - `watch`: Watch the store directory and print sync events
//! - `github sync|link|unlink|links`: Reconcile with GitHub Issues
//!
//! # Example
//!
//! ```bash
//! skein graph --format mermaid
//! skein github sync --direction to-github
//! skein github link bd-a1b2 https://github.com/octo/widgets/issues/42
//! ```

mod args;
mod execute;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};

pub use args::{GitHubArgs, GitHubCommand, GraphArgs, GraphFormat, SyncDirectionArg, WatchArgs};

/// Skein - dependency-tracked issues with sync
///
/// Reads issues from `.beads/*.jsonl` in the nearest enclosing directory
/// that has a `.beads` folder.
#[derive(Parser, Debug)]
#[command(name = "skein")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Render the dependency graph
    ///
    /// Shows tasks by dependency level with the critical path, blocked and
    /// ready tasks marked. Mermaid and DOT output can be piped into other
    /// tools.
    Graph(GraphArgs),

    /// Watch the store for changes
    ///
    /// Rescans the store after each burst of file changes and prints every
    /// sync event until interrupted.
    Watch(WatchArgs),

    /// Reconcile with GitHub Issues through the `gh` CLI
    #[command(name = "github")]
    GitHub(GitHubArgs),
}

impl Cli {
    /// Parse CLI arguments from command line
    pub fn parse_args() -> Self {
        <Self as Parser>::parse()
    }

    /// Parse CLI arguments from an iterator (for testing)
    ///
    /// # Errors
    ///
    /// Returns the clap error for invalid arguments.
    pub fn try_parse_from<I, T>(iter: I) -> std::result::Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(iter)
    }

    /// Execute the CLI command
    ///
    /// # Errors
    ///
    /// Returns any failure of the command.
    pub async fn execute(&self) -> Result<()> {
        let ctx = execute::Context::discover(!self.no_color).await?;
        match &self.command {
            Commands::Graph(args) => execute::execute_graph(&ctx, args).await,
            Commands::Watch(args) => execute::execute_watch(&ctx, args).await,
            Commands::GitHub(args) => execute::execute_github(&ctx, args).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_graph_format() {
        let cli = Cli::try_parse_from(["skein", "graph", "--format", "dot", "--include-closed"]).unwrap();
        let Commands::Graph(args) = cli.command else {
            panic!("expected graph command");
        };
        assert_eq!(args.format, GraphFormat::Dot);
        assert!(args.include_closed);
    }

    #[test]
    fn parses_github_subcommands() {
        let cli = Cli::try_parse_from(["skein", "github", "sync", "--direction", "from-github"]).unwrap();
        let Commands::GitHub(GitHubArgs {
            command: GitHubCommand::Sync { direction },
        }) = cli.command
        else {
            panic!("expected github sync");
        };
        assert_eq!(direction, SyncDirectionArg::FromGithub);

        let cli = Cli::try_parse_from([
            "skein",
            "github",
            "link",
            "bd-1",
            "https://github.com/octo/widgets/issues/3",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Commands::GitHub(GitHubArgs {
                command: GitHubCommand::Link { .. }
            })
        ));
    }

    #[test]
    fn unknown_format_is_rejected() {
        assert!(Cli::try_parse_from(["skein", "graph", "--format", "svg"]).is_err());
    }
}
