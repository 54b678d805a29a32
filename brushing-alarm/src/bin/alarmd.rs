//! Brushing alarm daemon.
//!
//! Serves the alarm HTTP API and rings at the scheduled time until a
//! toothbrush photo is verified. Stops cleanly on SIGINT or SIGTERM.

use anyhow::{Context, Result};
use tokio::signal::unix::{SignalKind, signal};
use tokio_util::sync::CancellationToken;

use brushing_alarm::config::Config;
use brushing_alarm::tracing::prelude::*;
use brushing_alarm::{daemon, tracing};

#[tokio::main]
async fn main() -> Result<()> {
    tracing::init();

    let config = Config::from_env().context("invalid configuration")?;
    let shutdown = CancellationToken::new();

    let mut sigterm = signal(SignalKind::terminate()).context("failed to install SIGTERM handler")?;
    let on_signal = shutdown.clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => info!("Received SIGINT"),
            _ = sigterm.recv() => info!("Received SIGTERM"),
        }
        on_signal.cancel();
    });

    daemon::run(config, shutdown).await?;
    Ok(())
}
