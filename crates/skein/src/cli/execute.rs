//! Command execution logic.

use anyhow::{Context as _, Result, anyhow};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

use super::args::{GitHubArgs, GitHubCommand, GraphArgs, GraphFormat, WatchArgs};
use super::output::{self, Palette};
use crate::config::{find_root, SkeinConfig, BEADS_DIR_NAME, CONFIG_FILE_NAME};
use crate::domain::IssueId;
use crate::github::{GhCli, GitHubSync, LinkStore};
use crate::graph::render::{self, DotOptions, MermaidDirection, MermaidOptions};
use crate::graph::{DependencyGraph, GraphOptions};
use crate::store::{IssueRepository, JsonlStore};
use crate::sync::SyncManager;

/// Link table file inside `.beads`
const LINKS_FILE_NAME: &str = "github-links.json";

/// Repository location and settings shared by every command.
pub(super) struct Context {
    root: PathBuf,
    config: SkeinConfig,
    palette: Palette,
}

impl Context {
    /// Find the enclosing `.beads` directory and load its configuration.
    pub(super) async fn discover(colors: bool) -> Result<Self> {
        let cwd = std::env::current_dir()?;
        let root = find_root(&cwd).ok_or_else(|| {
            anyhow!(
                "no {BEADS_DIR_NAME} directory found in {} or any parent",
                cwd.display()
            )
        })?;
        let config_path = root.join(BEADS_DIR_NAME).join(CONFIG_FILE_NAME);
        let config = SkeinConfig::load_or_default(&config_path)
            .await
            .with_context(|| format!("failed to load {}", config_path.display()))?
            .rooted_at(&root);

        tracing::debug!(root = %root.display(), "Using repository");
        Ok(Self {
            root,
            config,
            palette: Palette::new(colors),
        })
    }

    fn store(&self) -> JsonlStore {
        let sync = &self.config.sync;
        JsonlStore::new(&sync.watch_dir, &sync.issues_file, &sync.extension)
    }

    fn links_path(&self) -> PathBuf {
        self.root.join(BEADS_DIR_NAME).join(LINKS_FILE_NAME)
    }
}

/// Execute the graph command
pub(super) async fn execute_graph(ctx: &Context, args: &GraphArgs) -> Result<()> {
    let (store, warnings) = ctx.store().load_all().await?;
    for warning in &warnings {
        tracing::warn!(%warning, "Skipped store entry");
    }

    let graph = DependencyGraph::from_store(
        &store,
        GraphOptions {
            include_closed: args.include_closed,
            ..GraphOptions::default()
        },
    );

    let stdout = io::stdout();
    let mut out = stdout.lock();
    match args.format {
        GraphFormat::Ascii => render::write_ascii(&mut out, &graph)?,
        GraphFormat::Mermaid => {
            let direction = if args.horizontal {
                MermaidDirection::LeftRight
            } else {
                MermaidDirection::TopDown
            };
            render::write_mermaid(&mut out, &graph, MermaidOptions { direction })?;
        }
        GraphFormat::Dot => {
            let options = DotOptions {
                rankdir: if args.horizontal { "LR" } else { "TB" }.to_string(),
                ..DotOptions::default()
            };
            render::write_dot(&mut out, &graph, &options)?;
        }
    }
    out.flush()?;
    Ok(())
}

/// Execute the watch command
pub(super) async fn execute_watch(ctx: &Context, args: &WatchArgs) -> Result<()> {
    let mut config = ctx.config.sync.clone();
    config.auto_sync |= args.auto_sync;
    if let Some(ms) = args.debounce_ms {
        config.debounce_ms = ms;
    }

    let manager = SyncManager::new(config);
    let mut events = manager.subscribe();
    manager.start().await?;
    println!("Watching {} (Ctrl-C to stop)", manager.config().watch_dir.display());

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = events.recv() => match event {
                Ok(event) => println!("{}", output::event_line(&event, ctx.palette)),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Event stream lagged");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    manager.stop().await;
    Ok(())
}

/// Execute the github command
pub(super) async fn execute_github(ctx: &Context, args: &GitHubArgs) -> Result<()> {
    let links_path = ctx.links_path();
    let links = Arc::new(LinkStore::load(&links_path).await?);

    if matches!(args.command, GitHubCommand::Links) {
        if links.is_empty() {
            println!("No links.");
        }
        for link in links.export() {
            println!("{}", output::link_line(&link, ctx.palette));
        }
        return Ok(());
    }

    let repository: Arc<dyn IssueRepository> = Arc::new(ctx.store());
    let github = GitHubSync::new(
        Arc::new(GhCli::new(ctx.config.github.timeout())),
        Arc::clone(&links),
        repository,
        ctx.config.github.clone(),
        ctx.config.issue_prefix.clone(),
    );

    match &args.command {
        GitHubCommand::Sync { direction } => {
            github
                .check_auth()
                .await
                .context("gh is not authenticated; run `gh auth login`")?;
            let report = github.sync((*direction).into()).await;
            // Links recorded before a structural failure are still kept.
            links.save(&links_path).await?;
            let report = report?;

            println!(
                "{} pushed {}, pulled {}",
                ctx.palette.success("GitHub sync:"),
                report.pushed_to_github,
                report.pulled_from_github
            );
            if !report.is_success() {
                println!("{}", ctx.palette.warning(&format!("{} item(s) failed:", report.errors.len())));
                for error in &report.errors {
                    println!("{}", output::item_error_line(error, ctx.palette));
                }
            }
        }
        GitHubCommand::Link { task_id, url } => {
            let link = github.link_issue(&IssueId::new(task_id.as_str()), url).await?;
            links.save(&links_path).await?;
            println!("{} {}", ctx.palette.success("Linked"), output::link_line(&link, ctx.palette));
        }
        GitHubCommand::Unlink { task_id } => {
            let link = github.unlink_issue(&IssueId::new(task_id.as_str()))?;
            links.save(&links_path).await?;
            println!(
                "{} {} from #{}",
                ctx.palette.success("Unlinked"),
                ctx.palette.info(task_id),
                link.issue_number
            );
        }
        GitHubCommand::Links => {}
    }
    Ok(())
}
