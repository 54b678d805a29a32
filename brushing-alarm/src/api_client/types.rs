//! API data transfer objects.
//!
//! These types define the API contract shared between the server and
//! clients.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use utoipa::ToSchema;

pub use crate::alarm::AlarmState;

/// Alarm state snapshot.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize, ToSchema)]
pub struct AlarmSnapshot {
    pub state: AlarmState,
    /// Time the alarm is set for. Kept while ringing; absent when idle.
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub target_time: Option<OffsetDateTime>,
    /// When the alarm started ringing.
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub fired_at: Option<OffsetDateTime>,
    /// Verdict of the last completed photo check.
    pub last_verification: Option<bool>,
}

impl Default for AlarmSnapshot {
    fn default() -> Self {
        Self {
            state: AlarmState::Idle,
            target_time: None,
            fired_at: None,
            last_verification: None,
        }
    }
}

/// Request body for scheduling the alarm.
#[derive(Clone, Debug, Deserialize, Serialize, ToSchema)]
pub struct ScheduleRequest {
    /// RFC 3339 timestamp, strictly in the future.
    #[serde(with = "time::serde::rfc3339")]
    pub target_time: OffsetDateTime,
}

/// Machine-readable error category.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize, ToSchema, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    InvalidTime,
    InvalidState,
    VerificationFailed,
    VerificationService,
    Playback,
    InvalidRequest,
    Unavailable,
}

/// Error response body.
#[derive(Clone, Debug, Deserialize, Serialize, ToSchema)]
pub struct ErrorBody {
    pub kind: ErrorKind,
    pub message: String,
}
