//! Wake signals and audible playback.
//!
//! The controller never keeps time itself. It asks a [`WakeService`] to
//! arm a one-shot signal and later receives a [`WakeEvent`] through a
//! [`WakeSubscription`]. Whatever delivers the signal (a tokio timer
//! here, an OS notification elsewhere) only has to honor the contract:
//!
//! - `arm(t)` returns a fresh [`WakeHandle`] and delivers
//!   `WakeEvent::Fired(handle)` at most once, at approximately `t`.
//! - `disarm(handle)` guarantees no event for `handle` is delivered
//!   afterwards. Disarming an unknown or already-fired handle succeeds.

mod local;
mod subscription;

use async_trait::async_trait;
use time::OffsetDateTime;

pub use local::LocalWakeService;
pub use subscription::{WakeListener, WakeSubscription};

use crate::playback::PlaybackError;

slotmap::new_key_type! {
    /// Identifies one armed wake signal.
    pub struct WakeHandle;
}

/// Events delivered by a wake service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeEvent {
    /// The signal armed under this handle is due.
    Fired(WakeHandle),
}

/// The notification and playback service the controller drives.
#[async_trait]
pub trait WakeService: Send {
    /// Arm a one-shot wake signal for `at`.
    async fn arm(&mut self, at: OffsetDateTime) -> Result<WakeHandle, PlaybackError>;

    /// Drop a pending wake signal.
    async fn disarm(&mut self, handle: WakeHandle) -> Result<(), PlaybackError>;

    /// Start the alarm sound.
    async fn start_playback(&mut self) -> Result<(), PlaybackError>;

    /// Silence the alarm sound.
    async fn stop_playback(&mut self) -> Result<(), PlaybackError>;
}
