//! The alarm service task.
//!
//! Owns the [`AlarmController`] and is the only code that calls it. API
//! handlers and other callers talk to it through an [`AlarmHandle`],
//! which sends [`AlarmCommand`]s and reads published snapshots. Commands
//! and wake events are handled one at a time, in arrival order, so
//! operations never interleave.
//!
//! ```text
//!   AlarmHandle ──AlarmCommand──►┐
//!                                 ├─► service task ─► AlarmController
//!   WakeSubscription ─WakeEvent──►┘         │
//!                                           ▼
//!   AlarmHandle ◄──── watch<AlarmSnapshot> ─┘
//! ```

use bytes::Bytes;
use time::OffsetDateTime;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::alarm::{AlarmController, AlarmError, WakeOutcome};
use crate::api::commands::{AlarmCommand, Reply};
use crate::api_client::types::AlarmSnapshot;
use crate::clock::Clock;
use crate::tracing::prelude::*;
use crate::verifier::ImageVerifier;
use crate::wake::{WakeEvent, WakeService, WakeSubscription};

const COMMAND_QUEUE_DEPTH: usize = 16;

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error(transparent)]
    Alarm(#[from] AlarmError),

    #[error("alarm service is not running")]
    Stopped,
}

/// Cloneable access to a running alarm service.
#[derive(Clone)]
pub struct AlarmHandle {
    command_tx: mpsc::Sender<AlarmCommand>,
    state_rx: watch::Receiver<AlarmSnapshot>,
}

impl AlarmHandle {
    /// The most recently published alarm state.
    pub fn snapshot(&self) -> AlarmSnapshot {
        self.state_rx.borrow().clone()
    }

    /// A receiver that is notified on every state change.
    pub fn watch(&self) -> watch::Receiver<AlarmSnapshot> {
        self.state_rx.clone()
    }

    pub async fn schedule(
        &self,
        target_time: OffsetDateTime,
    ) -> Result<AlarmSnapshot, CommandError> {
        self.request(|reply| AlarmCommand::Schedule { target_time, reply })
            .await
    }

    pub async fn cancel(&self) -> Result<AlarmSnapshot, CommandError> {
        self.request(|reply| AlarmCommand::Cancel { reply }).await
    }

    pub async fn request_dismiss(&self) -> Result<AlarmSnapshot, CommandError> {
        self.request(|reply| AlarmCommand::RequestDismiss { reply })
            .await
    }

    pub async fn attempt_dismiss(&self, photo: Bytes) -> Result<AlarmSnapshot, CommandError> {
        self.request(|reply| AlarmCommand::AttemptDismiss { photo, reply })
            .await
    }

    async fn request(
        &self,
        command: impl FnOnce(Reply) -> AlarmCommand,
    ) -> Result<AlarmSnapshot, CommandError> {
        let (tx, rx) = oneshot::channel();
        self.command_tx
            .send(command(tx))
            .await
            .map_err(|_| CommandError::Stopped)?;
        Ok(rx.await.map_err(|_| CommandError::Stopped)??)
    }
}

/// Start the service task.
///
/// The task runs until `shutdown` is cancelled or every handle is
/// dropped. On exit it disarms any pending wake signal, silences the
/// alarm, and drops `wake_events`, unsubscribing from the wake service.
pub fn spawn<W, V, C>(
    controller: AlarmController<W, V, C>,
    wake_events: WakeSubscription,
    shutdown: CancellationToken,
) -> (AlarmHandle, JoinHandle<()>)
where
    W: WakeService + 'static,
    V: ImageVerifier + 'static,
    C: Clock + 'static,
{
    let (command_tx, command_rx) = mpsc::channel(COMMAND_QUEUE_DEPTH);
    let handle = AlarmHandle {
        command_tx,
        state_rx: controller.subscribe(),
    };
    let task = tokio::spawn(run(controller, wake_events, command_rx, shutdown));
    (handle, task)
}

async fn run<W, V, C>(
    mut controller: AlarmController<W, V, C>,
    mut wake_events: WakeSubscription,
    mut commands: mpsc::Receiver<AlarmCommand>,
    shutdown: CancellationToken,
) where
    W: WakeService,
    V: ImageVerifier,
    C: Clock,
{
    trace!("Alarm service started.");

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("Alarm service shutdown requested");
                break;
            }

            Some(event) = wake_events.recv() => {
                handle_wake(&mut controller, event).await;
            }

            command = commands.recv() => match command {
                // Shutdown preempts a command still waiting on the verifier.
                Some(command) => tokio::select! {
                    _ = handle_command(&mut controller, command) => {}
                    _ = shutdown.cancelled() => {
                        info!("Alarm service shutdown requested, abandoning command");
                        break;
                    }
                },
                None => {
                    debug!("All alarm handles dropped");
                    break;
                }
            }
        }
    }

    controller.shutdown().await;
    drop(wake_events);

    trace!("Alarm service stopped.");
}

async fn handle_wake<W, V, C>(controller: &mut AlarmController<W, V, C>, event: WakeEvent)
where
    W: WakeService,
    V: ImageVerifier,
    C: Clock,
{
    let WakeEvent::Fired(handle) = event;
    match controller.on_wake_signal(handle).await {
        Ok(WakeOutcome::Ringing) => info!("Alarm ringing"),
        Ok(WakeOutcome::Ignored) => {}
        Err(e) => error!(error = %e, "Alarm is ringing but the sound did not start"),
    }
}

async fn handle_command<W, V, C>(controller: &mut AlarmController<W, V, C>, command: AlarmCommand)
where
    W: WakeService,
    V: ImageVerifier,
    C: Clock,
{
    let (result, reply) = match command {
        AlarmCommand::Schedule { target_time, reply } => {
            (controller.schedule(target_time).await, reply)
        }
        AlarmCommand::Cancel { reply } => (controller.cancel().await, reply),
        AlarmCommand::RequestDismiss { reply } => (controller.request_dismiss(), reply),
        AlarmCommand::AttemptDismiss { photo, reply } => {
            (controller.attempt_dismiss(&photo).await, reply)
        }
    };

    if let Err(e) = &result {
        debug!(error = %e, state = %controller.state(), "Alarm command refused");
    }

    if reply.send(result.map(|()| controller.snapshot())).is_err() {
        debug!("Alarm command requester went away");
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use time::macros::datetime;

    use super::*;
    use crate::alarm::AlarmState;
    use crate::clock::ManualClock;
    use crate::testing::{FixedVerifier, SharedPlayer};
    use crate::wake::LocalWakeService;

    const NOW: OffsetDateTime = datetime!(2024-03-01 06:59 UTC);

    struct Fixture {
        alarm: AlarmHandle,
        task: JoinHandle<()>,
        shutdown: CancellationToken,
        player: SharedPlayer,
        clock: ManualClock,
    }

    fn start(verifier: FixedVerifier) -> Fixture {
        let clock = ManualClock::new(NOW);
        let player = SharedPlayer::default();
        let wake = LocalWakeService::new(clock.clone(), player.clone());
        let events = wake.subscribe();
        let controller = AlarmController::new(wake, verifier, clock.clone());
        let shutdown = CancellationToken::new();
        let (alarm, task) = spawn(controller, events, shutdown.clone());

        Fixture {
            alarm,
            task,
            shutdown,
            player,
            clock,
        }
    }

    /// Wait until the published state reaches `state`.
    async fn wait_for(alarm: &AlarmHandle, state: AlarmState) {
        let mut rx = alarm.watch();
        rx.wait_for(|s| s.state == state).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn full_cycle_through_service() {
        let f = start(FixedVerifier::accepting());
        let target = NOW + time::Duration::seconds(60);

        let snapshot = f.alarm.schedule(target).await.unwrap();
        assert_eq!(snapshot.state, AlarmState::Armed);
        assert_eq!(snapshot.target_time, Some(target));

        f.clock.set(target);
        tokio::time::sleep(Duration::from_secs(60)).await;
        wait_for(&f.alarm, AlarmState::Ringing).await;
        assert!(f.player.playing());

        let snapshot = f.alarm.request_dismiss().await.unwrap();
        assert_eq!(snapshot.state, AlarmState::Dismissing);

        let snapshot = f
            .alarm
            .attempt_dismiss(Bytes::from_static(b"photo"))
            .await
            .unwrap();
        assert_eq!(snapshot.state, AlarmState::Idle);
        assert_eq!(snapshot.last_verification, Some(true));
        assert!(!f.player.playing());
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_photo_reports_error_and_keeps_ringing() {
        let f = start(FixedVerifier::rejecting());
        f.alarm
            .schedule(NOW + time::Duration::seconds(1))
            .await
            .unwrap();
        wait_for(&f.alarm, AlarmState::Ringing).await;

        f.alarm.request_dismiss().await.unwrap();
        let err = f
            .alarm
            .attempt_dismiss(Bytes::from_static(b"photo"))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            CommandError::Alarm(AlarmError::VerificationFailed)
        ));
        assert_eq!(f.alarm.snapshot().state, AlarmState::Ringing);
        assert!(f.player.playing());
    }

    #[tokio::test(start_paused = true)]
    async fn unreachable_verifier_reports_service_error() {
        let f = start(FixedVerifier::failing());
        f.alarm
            .schedule(NOW + time::Duration::seconds(1))
            .await
            .unwrap();
        wait_for(&f.alarm, AlarmState::Ringing).await;

        f.alarm.request_dismiss().await.unwrap();
        let err = f
            .alarm
            .attempt_dismiss(Bytes::from_static(b"photo"))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            CommandError::Alarm(AlarmError::VerificationService(_))
        ));
        assert_eq!(f.alarm.snapshot().state, AlarmState::Ringing);
    }

    #[tokio::test(start_paused = true)]
    async fn photo_before_dismissal_request_skips_verifier() {
        let verifier = FixedVerifier::accepting();
        let clock = ManualClock::new(NOW);
        let wake = LocalWakeService::new(clock.clone(), SharedPlayer::default());
        let events = wake.subscribe();
        let controller = AlarmController::new(wake, verifier.clone(), clock);
        let (alarm, _task) = spawn(controller, events, CancellationToken::new());

        alarm
            .schedule(NOW + time::Duration::seconds(1))
            .await
            .unwrap();
        wait_for(&alarm, AlarmState::Ringing).await;

        let err = alarm
            .attempt_dismiss(Bytes::from_static(b"photo"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CommandError::Alarm(AlarmError::InvalidState { .. })
        ));
        assert_eq!(verifier.calls(), 0);
        assert_eq!(alarm.snapshot().state, AlarmState::Ringing);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_interrupts_pending_verification() {
        let verifier = FixedVerifier::hanging();
        let clock = ManualClock::new(NOW);
        let player = SharedPlayer::default();
        let wake = LocalWakeService::new(clock.clone(), player.clone());
        let events = wake.subscribe();
        let controller = AlarmController::new(wake, verifier.clone(), clock);
        let shutdown = CancellationToken::new();
        let (alarm, task) = spawn(controller, events, shutdown.clone());

        alarm
            .schedule(NOW + time::Duration::seconds(1))
            .await
            .unwrap();
        wait_for(&alarm, AlarmState::Ringing).await;
        alarm.request_dismiss().await.unwrap();

        let attempt = tokio::spawn({
            let alarm = alarm.clone();
            async move { alarm.attempt_dismiss(Bytes::from_static(b"photo")).await }
        });
        while verifier.calls() == 0 {
            tokio::task::yield_now().await;
        }

        let started = tokio::time::Instant::now();
        shutdown.cancel();
        task.await.unwrap();

        assert!(started.elapsed() < Duration::from_secs(1));
        assert!(matches!(
            attempt.await.unwrap(),
            Err(CommandError::Stopped)
        ));
        assert!(!player.playing());
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_schedules_only_one_succeeds() {
        let f = start(FixedVerifier::accepting());
        let target = NOW + time::Duration::hours(1);

        let (a, b) = tokio::join!(f.alarm.schedule(target), f.alarm.schedule(target));

        assert!(a.is_ok() != b.is_ok());
        let err = a.err().or(b.err()).unwrap();
        assert!(matches!(
            err,
            CommandError::Alarm(AlarmError::InvalidState { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_prevents_ringing() {
        let f = start(FixedVerifier::accepting());
        f.alarm
            .schedule(NOW + time::Duration::seconds(30))
            .await
            .unwrap();
        f.alarm.cancel().await.unwrap();

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(f.alarm.snapshot().state, AlarmState::Idle);
        assert!(!f.player.playing());
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_silences_and_stops_task() {
        let f = start(FixedVerifier::accepting());
        f.alarm
            .schedule(NOW + time::Duration::seconds(1))
            .await
            .unwrap();
        wait_for(&f.alarm, AlarmState::Ringing).await;

        f.shutdown.cancel();
        f.task.await.unwrap();

        assert!(!f.player.playing());
        assert!(matches!(
            f.alarm.cancel().await,
            Err(CommandError::Stopped)
        ));
    }
}
