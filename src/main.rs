//! owl-gaia CLI entry point.
//!
//! Initializes logging and delegates to the CLI module for the run.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments first to get log_level
    let cli = owl_gaia::cli::parse_cli();

    // Priority: RUST_LOG env var > --log-level CLI arg > default "info"
    let log_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| cli.log_level.clone());

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_filter)))
        .init();

    if let Err(e) = owl_gaia::cli::run_with_cli(cli).await {
        tracing::error!(error = %format!("{:#}", e), "Run failed");
        return Err(e);
    }
    Ok(())
}
