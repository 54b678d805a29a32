use std::time::Duration;

use time::OffsetDateTime;
use tokio::sync::watch;

use super::{Alarm, AlarmError, AlarmState, Operation, Phase};
use crate::api_client::types::AlarmSnapshot;
use crate::clock::{Clock, SystemClock};
use crate::tracing::prelude::*;
use crate::verifier::{ImageVerifier, VerifierError};
use crate::wake::{WakeHandle, WakeService};

pub const DEFAULT_VERIFY_TIMEOUT: Duration = Duration::from_secs(30);

/// What a wake signal did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeOutcome {
    /// The armed alarm fired and is now ringing.
    Ringing,
    /// The signal did not match the armed alarm (duplicate, late after a
    /// cancel, or stale) and changed nothing.
    Ignored,
}

/// Owns the alarm and performs every state transition.
///
/// Operations take `&mut self`, so a controller has exactly one writer.
/// Share it through [`crate::service`] when several callers need it.
///
/// After each transition a fresh [`AlarmSnapshot`] is published to
/// receivers obtained from [`subscribe`](Self::subscribe).
pub struct AlarmController<W, V, C = SystemClock> {
    alarm: Alarm,
    wake: W,
    verifier: V,
    clock: C,
    verify_timeout: Duration,
    state_tx: watch::Sender<AlarmSnapshot>,
}

impl<W, V, C> AlarmController<W, V, C>
where
    W: WakeService,
    V: ImageVerifier,
    C: Clock,
{
    pub fn new(wake: W, verifier: V, clock: C) -> Self {
        let alarm = Alarm::new();
        let (state_tx, _) = watch::channel(alarm.snapshot());
        Self {
            alarm,
            wake,
            verifier,
            clock,
            verify_timeout: DEFAULT_VERIFY_TIMEOUT,
            state_tx,
        }
    }

    /// Bound how long a dismissal attempt waits for the verifier.
    pub fn with_verify_timeout(mut self, timeout: Duration) -> Self {
        self.verify_timeout = timeout;
        self
    }

    pub fn alarm(&self) -> &Alarm {
        &self.alarm
    }

    pub fn state(&self) -> AlarmState {
        self.alarm.state()
    }

    pub fn snapshot(&self) -> AlarmSnapshot {
        self.alarm.snapshot()
    }

    /// Receive a snapshot after every state change.
    pub fn subscribe(&self) -> watch::Receiver<AlarmSnapshot> {
        self.state_tx.subscribe()
    }

    pub fn wake_service(&self) -> &W {
        &self.wake
    }

    pub fn verifier(&self) -> &V {
        &self.verifier
    }

    /// Arm the alarm for `target_time`.
    ///
    /// The time must be strictly in the future, and the alarm must be
    /// idle: an armed or ringing alarm has to be cancelled or dismissed
    /// first, so a pending wake signal is never orphaned.
    pub async fn schedule(&mut self, target_time: OffsetDateTime) -> Result<(), AlarmError> {
        let now = self.clock.now();
        if target_time <= now {
            return Err(AlarmError::InvalidTime {
                target: target_time,
                now,
            });
        }

        if self.alarm.phase != Phase::Idle {
            return Err(self.invalid_state(Operation::Schedule));
        }

        let handle = self.wake.arm(target_time).await?;
        self.alarm.last_verification = None;
        self.transition(Phase::Armed {
            target_time,
            handle,
        });
        Ok(())
    }

    /// Drop the pending alarm. Only an armed alarm can be cancelled; a
    /// ringing one must be dismissed with a photo.
    pub async fn cancel(&mut self) -> Result<(), AlarmError> {
        let Phase::Armed { handle, .. } = self.alarm.phase else {
            return Err(self.invalid_state(Operation::Cancel));
        };

        self.wake.disarm(handle).await?;
        self.transition(Phase::Idle);
        Ok(())
    }

    /// Handle a wake signal from the wake service.
    ///
    /// Only the signal for the currently armed alarm has an effect. If
    /// the sound fails to start the alarm is still ringing and the
    /// playback error is returned.
    pub async fn on_wake_signal(&mut self, handle: WakeHandle) -> Result<WakeOutcome, AlarmError> {
        let target_time = match self.alarm.phase {
            Phase::Armed {
                target_time,
                handle: armed,
            } if armed == handle => target_time,
            _ => {
                debug!(
                    ?handle,
                    state = %self.alarm.state(),
                    "Ignoring wake signal"
                );
                return Ok(WakeOutcome::Ignored);
            }
        };

        self.transition(Phase::Ringing {
            target_time,
            fired_at: self.clock.now(),
        });
        self.wake.start_playback().await?;
        Ok(WakeOutcome::Ringing)
    }

    /// Begin the photo dismissal flow. The sound keeps playing.
    pub fn request_dismiss(&mut self) -> Result<(), AlarmError> {
        let Phase::Ringing {
            target_time,
            fired_at,
        } = self.alarm.phase
        else {
            return Err(self.invalid_state(Operation::RequestDismiss));
        };

        self.transition(Phase::Dismissing {
            target_time,
            fired_at,
        });
        Ok(())
    }

    /// Submit a photo to silence the alarm.
    ///
    /// The alarm goes back to idle only when the verifier confirms a
    /// toothbrush. A negative verdict and a verifier failure both return
    /// the alarm to ringing, with distinct errors.
    pub async fn attempt_dismiss(&mut self, image: &[u8]) -> Result<(), AlarmError> {
        let Phase::Dismissing {
            target_time,
            fired_at,
        } = self.alarm.phase
        else {
            return Err(self.invalid_state(Operation::AttemptDismiss));
        };

        let verdict = tokio::time::timeout(self.verify_timeout, self.verifier.verify(image))
            .await
            .unwrap_or(Err(VerifierError::Timeout(self.verify_timeout)));

        match verdict {
            Ok(true) => {
                self.alarm.last_verification = Some(true);
                self.transition(Phase::Idle);
                self.wake.stop_playback().await?;
                Ok(())
            }
            Ok(false) => {
                info!("Photo rejected, alarm keeps ringing");
                self.alarm.last_verification = Some(false);
                self.transition(Phase::Ringing {
                    target_time,
                    fired_at,
                });
                Err(AlarmError::VerificationFailed)
            }
            Err(e) => {
                warn!(error = %e, "Photo verification failed");
                self.transition(Phase::Ringing {
                    target_time,
                    fired_at,
                });
                Err(AlarmError::VerificationService(e))
            }
        }
    }

    /// Release external resources: disarm a pending signal and silence
    /// the sound. Leaves the alarm idle.
    pub async fn shutdown(&mut self) {
        match self.alarm.phase {
            Phase::Idle => return,
            Phase::Armed { handle, .. } => {
                if let Err(e) = self.wake.disarm(handle).await {
                    warn!(error = %e, "Failed to disarm wake signal on shutdown");
                }
            }
            Phase::Ringing { .. } | Phase::Dismissing { .. } => {
                if let Err(e) = self.wake.stop_playback().await {
                    warn!(error = %e, "Failed to stop playback on shutdown");
                }
            }
        }
        self.transition(Phase::Idle);
    }

    fn invalid_state(&self, operation: Operation) -> AlarmError {
        AlarmError::InvalidState {
            operation,
            state: self.alarm.state(),
        }
    }

    fn transition(&mut self, next: Phase) {
        let from = self.alarm.state();
        self.alarm.phase = next;
        let to = self.alarm.state();

        info!(
            %from,
            %to,
            target_time = ?self.alarm.target_time(),
            "Alarm state changed"
        );

        self.state_tx.send_replace(self.alarm.snapshot());
    }
}
