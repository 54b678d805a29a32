//! The alarm and its lifecycle.
//!
//! There is exactly one [`Alarm`]. It cycles through four states and
//! never terminates:
//!
//! ```text
//!               schedule(t > now)             wake signal
//!   Idle ──────────────────────────► Armed ─────────────────► Ringing
//!    ▲  ◄──────────────────────────────┘                       │   ▲
//!    │               cancel()                 request_dismiss() │   │ verdict false
//!    │                                                          ▼   │ or verifier error
//!    └────────────────────────────────────────────────────── Dismissing
//!                        verdict true
//! ```
//!
//! - **Idle:** nothing scheduled.
//! - **Armed:** a wake signal is pending for `target_time`.
//! - **Ringing:** the signal fired and the alarm sound is playing.
//! - **Dismissing:** the user is submitting a photo; the sound keeps
//!   playing until a verdict arrives.
//!
//! All transitions go through [`AlarmController`].

mod controller;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use utoipa::ToSchema;

pub use controller::{AlarmController, DEFAULT_VERIFY_TIMEOUT, WakeOutcome};

use crate::api_client::types::AlarmSnapshot;
use crate::playback::PlaybackError;
use crate::verifier::VerifierError;
use crate::wake::WakeHandle;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, ToSchema, strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AlarmState {
    Idle,
    Armed,
    Ringing,
    Dismissing,
}

/// Controller operations, named in [`AlarmError::InvalidState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum Operation {
    Schedule,
    Cancel,
    RequestDismiss,
    AttemptDismiss,
}

#[derive(Debug, thiserror::Error)]
pub enum AlarmError {
    #[error("alarm time {target} is not after the current time {now}")]
    InvalidTime {
        target: OffsetDateTime,
        now: OffsetDateTime,
    },

    #[error("cannot {operation} while the alarm is {state}")]
    InvalidState {
        operation: Operation,
        state: AlarmState,
    },

    #[error("no toothbrush in the photo, try again")]
    VerificationFailed,

    #[error("photo could not be verified: {0}")]
    VerificationService(#[source] VerifierError),

    #[error("alarm sound or timer failure: {0}")]
    Playback(#[from] PlaybackError),
}

/// Where the alarm is in its cycle, with the data each state carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Armed {
        target_time: OffsetDateTime,
        handle: WakeHandle,
    },
    Ringing {
        target_time: OffsetDateTime,
        fired_at: OffsetDateTime,
    },
    Dismissing {
        target_time: OffsetDateTime,
        fired_at: OffsetDateTime,
    },
}

/// The single reminder.
#[derive(Debug, Clone)]
pub struct Alarm {
    phase: Phase,
    last_verification: Option<bool>,
}

impl Default for Alarm {
    fn default() -> Self {
        Self::new()
    }
}

impl Alarm {
    pub fn new() -> Self {
        Self {
            phase: Phase::Idle,
            last_verification: None,
        }
    }

    pub fn state(&self) -> AlarmState {
        match self.phase {
            Phase::Idle => AlarmState::Idle,
            Phase::Armed { .. } => AlarmState::Armed,
            Phase::Ringing { .. } => AlarmState::Ringing,
            Phase::Dismissing { .. } => AlarmState::Dismissing,
        }
    }

    /// The time the alarm is (or was, once ringing) set for.
    pub fn target_time(&self) -> Option<OffsetDateTime> {
        match self.phase {
            Phase::Idle => None,
            Phase::Armed { target_time, .. }
            | Phase::Ringing { target_time, .. }
            | Phase::Dismissing { target_time, .. } => Some(target_time),
        }
    }

    /// When the wake signal arrived, while ringing or dismissing.
    pub fn fired_at(&self) -> Option<OffsetDateTime> {
        match self.phase {
            Phase::Ringing { fired_at, .. } | Phase::Dismissing { fired_at, .. } => Some(fired_at),
            _ => None,
        }
    }

    /// Verdict of the most recent dismissal attempt, if one completed.
    pub fn last_verification(&self) -> Option<bool> {
        self.last_verification
    }

    pub fn snapshot(&self) -> AlarmSnapshot {
        AlarmSnapshot {
            state: self.state(),
            target_time: self.target_time(),
            fired_at: self.fired_at(),
            last_verification: self.last_verification,
        }
    }
}
