// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! `vrouter serve`: HTTP API plus the task worker pool

use anyhow::{Context, Result};
use clap::Args;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info, warn};

use vrouter_core::application::{DispatcherConfig, RouterService, TaskDispatcher};
use vrouter_core::domain::node_config::{resolve_secret, RouterNodeConfig};
use vrouter_core::infrastructure::{build_platform, FilesystemImageCatalog, InMemoryTaskRepository};
use vrouter_core::presentation::api::{app, AppState};
use vrouter_core::presentation::auth::TokenVerifier;

#[derive(Args)]
pub struct ServeArgs {
    /// Bind address (overrides spec.api.bind_address)
    #[arg(long, env = "VROUTER_BIND")]
    bind: Option<String>,

    /// HTTP port (overrides spec.api.port)
    #[arg(long, env = "VROUTER_PORT")]
    port: Option<u16>,
}

pub async fn run(args: ServeArgs, config: Result<RouterNodeConfig>) -> Result<()> {
    let mut config = config.context("Failed to load configuration")?;
    if let Some(bind) = args.bind {
        config.spec.api.bind_address = bind;
    }
    if let Some(port) = args.port {
        config.spec.api.port = port;
    }
    config
        .validate()
        .context("Configuration validation failed")?;

    info!(
        node = %config.metadata.name,
        backend = ?config.spec.platform.backend,
        images = %config.spec.images.dir.display(),
        "vrouter starting"
    );

    let metrics = &config.spec.observability.metrics;
    if metrics.enabled {
        let addr = SocketAddr::from(([0, 0, 0, 0], metrics.port));
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .context("Failed to install Prometheus exporter")?;
        info!("Metrics exporter listening on {}", addr);
    }

    let platform = build_platform(&config.spec.platform)?;
    let catalog = Arc::new(FilesystemImageCatalog::new(&config.spec.images.dir));
    let service = Arc::new(RouterService::new(
        platform,
        catalog,
        config.spec.provisioning.cleanup_on_failure,
    ));
    let dispatcher = TaskDispatcher::start(
        service,
        Arc::new(InMemoryTaskRepository::new()),
        DispatcherConfig::from(&config.spec.workers),
    );

    let verifier = match &config.spec.api.auth.secret {
        Some(secret) => {
            let secret = resolve_secret(secret).context("Failed to resolve spec.api.auth.secret")?;
            TokenVerifier::new(&secret)
        }
        None => {
            warn!("No spec.api.auth.secret configured; X-Auth tokens are NOT signature-checked");
            TokenVerifier::unverified()
        }
    };

    let state = AppState {
        dispatcher: dispatcher.clone(),
        verifier: Arc::new(verifier),
        base_url: config.spec.api.base_url.trim_end_matches('/').to_string(),
        start_time: Instant::now(),
    };

    let addr = format!("{}:{}", config.spec.api.bind_address, config.spec.api.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("API listening on {}", addr);

    let served = axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed");

    info!("Draining task workers");
    dispatcher.shutdown().await;
    info!("vrouter stopped");

    served
}

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
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}
