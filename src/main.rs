use std::net::SocketAddr;
use std::sync::Arc;

use storefront_payments::api::{self, AppState};
use storefront_payments::config::AppConfig;
use storefront_payments::database::{self, InMemoryLedgerStore, LedgerStore};
use storefront_payments::logging::init_tracing;
use storefront_payments::payments::GatewayRegistry;
use tokio::signal;
use tracing::{error, info, warn};

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;
    init_tracing(&config.logging);
    config.validate()?;

    info!(
        payment_gateway = %config.gateways.payment_gateway,
        payout_gateway = %config.gateways.payout_gateway,
        currency = %config.gateways.currency,
        request_timeout_secs = config.server.request_timeout,
        "Starting storefront payments service"
    );

    let store: Arc<dyn LedgerStore> = if config.skip_externals {
        warn!("SKIP_EXTERNALS=true, using the in-memory ledger store");
        Arc::new(InMemoryLedgerStore::new())
    } else {
        Arc::new(database::open_ledger(&config.database).await?)
    };

    let gateways = GatewayRegistry::from_config(&config.gateways)?;
    let state = AppState::new(
        store,
        gateways,
        &config.gateways.currency,
        config.gateways.xendit.callback_token.clone(),
        config.server.request_deadline(),
    );
    if config.gateways.xendit.callback_token.is_none() {
        warn!("XENDIT_CALLBACK_TOKEN not set, callbacks are accepted without a token");
    }

    let app = api::router(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
        error!("Failed to bind to address {}: {}", addr, e);
        e
    })?;

    info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}
