mod config;
mod evaluator;
mod models;
mod monitor;
mod notifier;
mod rpc;
mod scheduler;
mod utils;


use eyre::WrapErr;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::notifier::SlackNotifier;
use crate::rpc::RpcClient;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stdout)
        .with_target(false)
        .init();

    info!("Balance monitor starting...");

    let path = config::config_path();
    let cfg = config::load(&path)
        .wrap_err("failed to load configuration")?;

    let reader = RpcClient::connect(&cfg.rpc_url, cfg.request_timeout())
        .await
        .wrap_err("failed to connect to the RPC endpoint")?;
    let notifier = SlackNotifier::new(&cfg.slack_webhook, cfg.request_timeout())
        .wrap_err("failed to build the webhook client")?;

    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            match signal::ctrl_c().await {
                Ok(()) => {
                    info!("Shutdown signal received, stopping after the current cycle...");
                    shutdown.cancel();
                }
                Err(e) => error!("Unable to listen for shutdown signal: {}", e),
            }
        }
    });

    monitor::run_until_cancelled(&cfg, reader, notifier, shutdown).await;

    info!("Balance monitor stopped.");
    Ok(())
}
