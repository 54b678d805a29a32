//! Daemon wiring.
//!
//! Builds the real collaborators from [`Config`], starts the alarm
//! service and serves the HTTP API until shutdown.

use tokio_util::sync::CancellationToken;

use crate::alarm::AlarmController;
use crate::api::{self, SharedState};
use crate::clock::SystemClock;
use crate::config::Config;
use crate::error::Result;
use crate::playback::SoundPlayer;
use crate::service;
use crate::tracing::prelude::*;
use crate::verifier::GeminiVerifier;
use crate::wake::LocalWakeService;

/// Run the daemon until `shutdown` is cancelled.
///
/// Fails before anything starts when no verifier is configured: an alarm
/// that cannot be dismissed must not be armable.
pub async fn run(config: Config, shutdown: CancellationToken) -> Result<()> {
    let verifier = GeminiVerifier::new(config.require_verifier()?);

    let player = SoundPlayer::new(config.player.clone(), config.sound_path.clone());
    let wake = LocalWakeService::new(SystemClock, player);
    let wake_events = wake.subscribe();

    let controller = AlarmController::new(wake, verifier, SystemClock)
        .with_verify_timeout(config.verify_timeout);
    let (alarm, service_task) = service::spawn(controller, wake_events, shutdown.clone());

    info!(
        player = %config.player,
        sound = ?config.sound_path,
        verify_timeout = ?config.verify_timeout,
        "Brushing alarm started"
    );

    let served = api::serve(config.api_addr, SharedState { alarm }, shutdown.clone()).await;

    // The API may have failed on its own; take the service down with it.
    shutdown.cancel();
    service_task.await?;

    served?;
    info!("Brushing alarm stopped");
    Ok(())
}
