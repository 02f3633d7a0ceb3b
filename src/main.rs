use anyhow::{Context, Result};
use tokio::{net::TcpListener, signal};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use air_station_service::{
    api,
    config::Config,
    generator::{Generator, ReadingSink},
    store::{JsonFiles, Persistence, ReadingStore},
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env (ignore error if file absent; env vars may be set externally)
    let _ = dotenvy::dotenv();

    // Initialise tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Load config
    let config = Config::from_env()?;

    // Shared store of the current reading and its bounded history
    let store = match &config.data_dir {
        Some(dir) => {
            let store = ReadingStore::open(
                config.history_capacity,
                Persistence::JsonFiles(JsonFiles::new(dir)),
            )
            .await
            .with_context(|| format!("failed to prepare data directory {}", dir.display()))?;
            info!(dir = %dir.display(), capacity = store.capacity(), "JSON-file store ready");
            store
        }
        None => {
            let store = ReadingStore::in_memory(config.history_capacity);
            info!(capacity = store.capacity(), "In-memory store ready");
            store
        }
    };

    // Spawn the synthetic feed when no real sensor is attached
    if config.generator.enabled {
        let generator = Generator::new(
            ReadingSink::Store(store.clone()),
            config.generator.fields.clone(),
            config.generator.interval,
        );
        tokio::spawn(generator.run());
    }

    // Start HTTP server
    let addr = format!("{}:{}", config.server_host, config.server_port);
    let listener = TcpListener::bind(&addr).await?;
    info!(addr = %addr, "HTTP server listening");

    axum::serve(listener, api::router(store))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM. In-flight requests finish; the generator
/// task is simply dropped with the runtime.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let received = tokio::select! {
        _ = ctrl_c => "ctrl_c",
        _ = terminate => "sigterm",
    };

    info!(signal = received, "Shutdown signal received, stopping air station service");
}
