//! actorlens actor state aggregator
//!
//! Keeps an in-memory view of every actor announced on the actor channel and
//! serves it over HTTP.

use std::time::Duration;

use actorlens_aggregator::{
    aggregator::{spawn_ingestion, AggregatorConfig},
    api, config,
    state::AppState,
    subscriber::{HttpSubscriber, Readiness, SubscriberConfig},
    view::new_view,
};
use anyhow::Result;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let config = config::Config::from_env()?;

    // Prefer RUST_LOG, fall back to ACTORLENS_LOG_LEVEL
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| config.log_level.clone().into()))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("Starting actorlens actor aggregator");
    info!(
        listen_addr = %config.listen_addr,
        broker_url = %config.broker_url,
        max_actors_to_cache = config.max_actors_to_cache,
        test_module = config.enable_test_module,
        "Configuration loaded"
    );

    let subscriber = HttpSubscriber::new(&config.broker_url)?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (writer, view) = new_view(config.max_actors_to_cache);
    let readiness = Readiness::new();

    // The subscriber can be blocked in a long poll (plus the HTTP grace) when
    // shutdown arrives; the aggregator must outlast that to keep its events.
    let drain_timeout = config.poll_timeout + Duration::from_secs(10);

    let ingestion = spawn_ingestion(
        subscriber,
        writer,
        readiness.clone(),
        config.event_buffer,
        SubscriberConfig {
            poll_timeout: config.poll_timeout,
            ..SubscriberConfig::default()
        },
        AggregatorConfig {
            drain_timeout,
            ..AggregatorConfig::default()
        },
        shutdown_rx.clone(),
    );

    let state = AppState::new(view, readiness, config.enable_test_module);
    let app = api::create_router(state);

    let listener = match tokio::net::TcpListener::bind(&config.listen_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(error = %e, addr = %config.listen_addr, "Failed to bind query listener");
            let _ = shutdown_tx.send(true);
            ingestion.join(Duration::from_secs(5)).await;
            return Err(e.into());
        }
    };
    info!(addr = %config.listen_addr, "Listening for connections");

    let server_handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let mut shutdown_rx = shutdown_rx;
                loop {
                    if *shutdown_rx.borrow() {
                        break;
                    }
                    if shutdown_rx.changed().await.is_err() {
                        break;
                    }
                }
                info!("HTTP server shutting down");
            })
            .await
    });

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
        result = server_handle => {
            match result {
                Ok(Ok(())) => info!("Server exited normally"),
                Ok(Err(e)) => error!(error = %e, "Server error"),
                Err(e) => error!(error = %e, "Server task panicked"),
            }
        }
    }

    let _ = shutdown_tx.send(true);

    info!("Waiting for ingestion to shut down...");
    ingestion.join(drain_timeout + Duration::from_secs(5)).await;

    info!("Actor aggregator shutdown complete");
    Ok(())
}
