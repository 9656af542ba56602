// redactgate - response cache and rate limiting edge for the redaction API

use anyhow::Result;
use clap::Parser;
use redactgate::cli::Args;
use redactgate::clock::{Clock, SystemClock};
use redactgate::config::AppConfig;
use redactgate::maintenance::MaintenanceTask;
use redactgate::server::{create_router, AppState};
use redactgate::utils::logging;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::info;

fn main() -> Result<()> {
    // Parse CLI arguments
    let args = Args::parse();

    // Phase 1: Load configuration
    let mut config = AppConfig::load(args.config.as_deref())?;
    args.apply(&mut config);

    if args.print_config {
        println!("{}", toml::to_string_pretty(&config)?);
        return Ok(());
    }

    // Phase 2: Build the runtime sized by configuration
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.server.workers.max(1))
        .enable_all()
        .build()?;

    runtime.block_on(serve(config))
}

async fn serve(config: AppConfig) -> Result<()> {
    // Phase 3: Initialize logging
    logging::init(&config.logging)?;
    info!("Starting redactgate v{}", env!("CARGO_PKG_VERSION"));

    // Phase 4: Shared state and counting backend
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let state = AppState::new(config.clone(), clock)?;
    state.limiter.store().warm_up().await;

    // Phase 5: Background maintenance
    let maintenance = MaintenanceTask::spawn(
        state.cache().clone(),
        state.limiter.store().clone(),
        Duration::from_secs(config.cache.cleanup_interval_secs),
    );

    // Phase 6: Build and start HTTP server
    let app = create_router(state);
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;

    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Phase 7: Run server with graceful shutdown
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    maintenance.shutdown().await;
    info!("Server shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
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
