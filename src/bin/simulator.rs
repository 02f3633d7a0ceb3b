//! Stand-alone synthetic sensor feed.
//!
//! Posts one randomly generated reading per interval to a running service,
//! standing in for the physical station.
//!
//! Usage:
//!   SIMULATOR_TARGET_URL=http://localhost:5000/readings cargo run --bin simulator

use anyhow::Result;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use air_station_service::{
    config::Config,
    generator::{Generator, ReadingSink, RemoteSink},
};

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env()?;
    // A submission never outlives its cycle.
    let sink = RemoteSink::new(&config.simulator_target_url, config.generator.interval)?;
    let generator = Generator::new(
        ReadingSink::Remote(sink),
        config.generator.fields,
        config.generator.interval,
    );

    tokio::select! {
        _ = generator.run() => {},
        res = signal::ctrl_c() => {
            res?;
            info!(target_url = %config.simulator_target_url, "Simulator stopped");
        }
    }

    Ok(())
}
