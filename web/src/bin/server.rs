//! Conference backend HTTP server.
//!
//! Serves the conference API, a Prometheus scrape endpoint, the periodic
//! announcement refresh and the notification worker, and drains them in
//! order on shutdown.

use anyhow::Context;
use axum::{Router, routing::get};
use conference_runtime::metrics::MetricsServer;
use conference_runtime::{LogEmailSender, NotificationWorker, announcements};
use conference_web::{AppState, Config, bootstrap};
use std::sync::Arc;
use tokio::signal;
use tokio::sync::oneshot;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,conference_web=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting conference server");

    let config = Config::from_env()?;
    let http_addr = config.http_addr()?;
    let metrics_addr = config.metrics_addr()?;
    info!(
        store_backend = ?config.store_backend,
        %http_addr,
        %metrics_addr,
        "Configuration loaded"
    );

    // Metrics
    let mut metrics = MetricsServer::new(metrics_addr);
    metrics.start().context("Failed to start metrics")?;
    let handle = metrics.handle().cloned();
    let metrics_app = Router::new().route(
        "/metrics",
        get(move || {
            let payload = handle.as_ref().map(|h| h.render()).unwrap_or_default();
            async move { payload }
        }),
    );
    let metrics_listener = tokio::net::TcpListener::bind(metrics_addr)
        .await
        .context("Failed to bind metrics listener")?;
    tokio::spawn(async move {
        if let Err(err) = axum::serve(metrics_listener, metrics_app).await {
            error!(error = %err, "Metrics server failed");
        }
    });

    // Service
    let store = bootstrap::connect_store(&config).await?;
    let (service, notifications) = bootstrap::build_service(store, &config);

    let refresh = announcements::spawn_periodic_refresh(
        service.clone(),
        config.announcement_refresh_interval(),
    );

    let (stop_worker, worker_stopped) = oneshot::channel::<()>();
    let worker = NotificationWorker::new(service.clone(), Arc::new(LogEmailSender));
    let worker_handle = tokio::spawn(worker.run_until(notifications, async move {
        worker_stopped.await.ok();
    }));

    // HTTP API
    let app = conference_web::router(AppState::new(service));
    let listener = tokio::net::TcpListener::bind(http_addr)
        .await
        .with_context(|| format!("Failed to bind {http_addr}"))?;
    info!(%http_addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("HTTP server stopped, draining background work");
    refresh.abort();
    stop_worker.send(()).ok();
    match tokio::time::timeout(config.shutdown_timeout(), worker_handle).await {
        Ok(Ok(())) => info!("Notification worker drained"),
        Ok(Err(err)) => error!(error = %err, "Notification worker panicked"),
        Err(_) => warn!("Notification worker did not drain before the shutdown timeout"),
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or, on unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!(error = %err, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                error!(error = %err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl+C signal"),
        () = terminate => info!("Received SIGTERM signal"),
    }
}
