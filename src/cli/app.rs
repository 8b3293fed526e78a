use anyhow::Result;
use clap::Parser;
use tracing::{error, info, warn};

use super::context::CliContext;
use super::dispatch::dispatch;
use super::env::CliArgs;
use super::runtime::{apply_cli_overrides, init_logging, load_config};

pub async fn run() -> Result<()> {
    let cli = CliArgs::parse();

    init_logging(&cli.log_level, cli.debug, cli.log_json)?;

    info!("Starting devtools-dom v{}", env!("CARGO_PKG_VERSION"));

    let mut config = load_config(cli.config.as_ref()).await?;
    apply_cli_overrides(&mut config, &cli);
    if cli.metrics {
        devtools_session::metrics::register();
    }
    let cli_context = CliContext::new(config, cli.url.clone());

    let outcome = dispatch(&cli, &cli_context).await;
    cli_context.shutdown().await;

    if cli.metrics {
        // stderr keeps command output on stdout parseable
        match devtools_session::metrics::render() {
            Ok(text) => eprint!("{text}"),
            Err(err) => warn!("Failed to render metrics: {}", err),
        }
    }

    match outcome {
        Ok(()) => {
            info!("Command completed successfully");
            Ok(())
        }
        Err(err) => {
            error!("Command failed: {}", err);
            Err(err)
        }
    }
}
