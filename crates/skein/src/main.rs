//! Skein CLI binary.

use anyhow::Result;
use skein::cli::Cli;
use tracing_subscriber::EnvFilter;

/// Uses tokio's current_thread runtime; every command is sequential I/O.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Example: RUST_LOG=skein=debug,skein_jsonl=trace skein watch
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("skein=info,skein_jsonl=info")),
        )
        .with_target(false)
        .init();

    tracing::debug!("Starting skein CLI");

    let cli = Cli::parse_args();
    cli.execute().await?;

    tracing::debug!("Skein CLI completed successfully");
    Ok(())
}
