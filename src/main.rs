use std::sync::Arc;
use std::time::Duration;

use axum_server::Handle;
use clap::Parser;
use kube::Client;
use tokio::signal;
use tracing::{error, info, warn};

use namespace_limiter::health::{HealthState, health_server_exit, spawn_health_server};
use namespace_limiter::{
    Config, KubeNamespaceStore, NamespaceLimiter, WebhookState, run_webhook_server,
};

/// Grace period for in-flight admission requests during shutdown
const SHUTDOWN_GRACE_PERIOD_SECS: u64 = 5;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Install the TLS crypto provider before any TLS operations
    if rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .is_err()
        && rustls::crypto::CryptoProvider::get_default().is_none()
    {
        return Err("Failed to install rustls crypto provider and no provider is available".into());
    }

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("namespace_limiter=info".parse()?)
                .add_directive("kube=info".parse()?),
        )
        .init();

    let config = Config::parse();
    config.validate()?;

    // An invalid regex is a policy we cannot evaluate: refuse to start
    let pattern = config.pattern()?;
    info!(
        regex = %pattern,
        limit = config.namespace_max,
        failure_policy = ?config.failure_policy,
        "Starting namespace-limiter"
    );
    if config.namespace_max == 0 {
        warn!("namespace-max is 0: every namespace creation will be denied");
    }

    let client = Client::try_default().await?;
    info!("Connected to Kubernetes cluster");

    let mut store = KubeNamespaceStore::new(client).with_page_size(config.list_page_size);
    if let Some(timeout) = config.list_timeout() {
        store = store.with_timeout(timeout);
    }

    let limiter = Arc::new(NamespaceLimiter::new(
        pattern,
        config.namespace_max,
        Arc::new(store),
    ));

    let health_state = Arc::new(HealthState::new());

    // Start health server immediately (liveness should work before TLS is up)
    let health_handle = spawn_health_server(health_state.clone(), config.health_addr);

    let webhook_state = Arc::new(
        WebhookState::new(limiter, config.failure_policy).with_health(health_state.clone()),
    );
    let server_handle = Handle::new();

    // Mark ready once the TLS listener is bound
    {
        let health_state = health_state.clone();
        let server_handle = server_handle.clone();
        tokio::spawn(async move {
            if server_handle.listening().await.is_some() {
                health_state.set_ready(true).await;
            }
        });
    }

    let webhook_future = run_webhook_server(
        webhook_state,
        config.listen_addr,
        &config.tls_cert_file,
        &config.tls_key_file,
        server_handle.clone(),
    );
    tokio::pin!(webhook_future);

    let shutdown_requested = tokio::select! {
        result = &mut webhook_future => {
            // TLS or bind failures end up here before any request is served
            result?;
            false
        }
        result = health_handle => {
            // The health server never stops on its own; treat any exit as fatal
            let err = health_server_exit(result);
            error!("Health server stopped: {}", err);
            return Err(err.into());
        }
        _ = shutdown_signal() => true,
    };

    if shutdown_requested {
        info!("Received shutdown signal, initiating graceful shutdown...");
        health_state.set_ready(false).await;

        info!(
            "Waiting up to {}s for in-flight admission requests to complete...",
            SHUTDOWN_GRACE_PERIOD_SECS
        );
        server_handle.graceful_shutdown(Some(Duration::from_secs(SHUTDOWN_GRACE_PERIOD_SECS)));
        webhook_future.await?;
    }

    info!("namespace-limiter stopped");
    Ok(())
}

/// Wait for shutdown signal (SIGTERM or SIGINT)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
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
}
