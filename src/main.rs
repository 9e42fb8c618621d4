use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use motchill_ng::cli::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    info!("Starting motchill-ng v{}", env!("CARGO_PKG_VERSION"));

    cli.run().await?;

    Ok(())
}
