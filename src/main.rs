use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use dotenvy::dotenv;
use tracing::{info, warn};

use evm_rpc_facade::api::create_router_with_rate_limit;
use evm_rpc_facade::app::AppState;
use evm_rpc_facade::config::{AppConfig, LogFormat};
use evm_rpc_facade::infra::{LocalKeySigner, PrivateKeyProvider, init_metrics_handle, init_tracing};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv().ok();

    let config = AppConfig::from_env().context("invalid configuration")?;
    init_tracing(config.log_format == LogFormat::Json);

    let signer = match config.wallet_private_key {
        Some(key) => LocalKeySigner::new(key).context("invalid WALLET_PRIVATE_KEY")?,
        None => {
            warn!("WALLET_PRIVATE_KEY not set, generating ephemeral key; set a real key for anything beyond development");
            LocalKeySigner::random()
        }
    };
    info!(address = %signer.address(), "Using wallet account");

    let provider = PrivateKeyProvider::new(config.chain, signer, config.provider)
        .context("failed to create wallet provider")?;

    let metrics_handle = init_metrics_handle();
    if metrics_handle.is_none() {
        warn!("Prometheus recorder unavailable, /metrics disabled");
    }

    let app_state =
        Arc::new(AppState::new(Arc::new(provider), config.api_auth_key).with_metrics(metrics_handle));
    let router = create_router_with_rate_limit(app_state, config.rate_limit);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    info!(addr = %config.bind_addr, "Server starting");

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
    }
}
