//! Command types sent from API handlers to the alarm service.
//!
//! Each command carries a oneshot reply channel so the handler can
//! await the result and translate it into an HTTP response.

use bytes::Bytes;
use time::OffsetDateTime;
use tokio::sync::oneshot;

use crate::alarm::AlarmError;
use crate::api_client::types::AlarmSnapshot;

/// Reply to every alarm command: the state after the operation, or why
/// it was refused.
pub type Reply = oneshot::Sender<Result<AlarmSnapshot, AlarmError>>;

/// Commands to the alarm service.
pub enum AlarmCommand {
    /// Arm the alarm for a future time.
    Schedule {
        target_time: OffsetDateTime,
        reply: Reply,
    },

    /// Drop the pending alarm.
    Cancel { reply: Reply },

    /// Start the photo dismissal flow.
    RequestDismiss { reply: Reply },

    /// Submit a photo to silence the alarm.
    AttemptDismiss { photo: Bytes, reply: Reply },
}
