//! Wall-clock source.
//!
//! The controller only needs "now" to validate schedule requests, so the
//! clock is a trait and tests substitute a [`ManualClock`].

use std::sync::Arc;

use parking_lot::Mutex;
use time::format_description::well_known::Rfc3339;
use time::{Date, OffsetDateTime, PrimitiveDateTime, Time, UtcOffset};

pub trait Clock: Send + Sync {
    fn now(&self) -> OffsetDateTime;
}

/// The system clock in UTC.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

/// A clock that only moves when told to.
///
/// Clones share the same time, so a test can keep one handle while the
/// code under test owns another.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<OffsetDateTime>>,
}

impl ManualClock {
    pub fn new(start: OffsetDateTime) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    pub fn set(&self, now: OffsetDateTime) {
        *self.now.lock() = now;
    }

    pub fn advance(&self, by: time::Duration) {
        *self.now.lock() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> OffsetDateTime {
        *self.now.lock()
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("{input:?} is not HH:MM, +SECONDS or an RFC 3339 timestamp")]
pub struct TimeParseError {
    input: String,
}

/// Resolve a user-supplied alarm time relative to `now`.
///
/// Accepts `HH:MM` (the next occurrence of that wall-clock time, so a time
/// that already passed today means tomorrow), `+SECONDS` from now, or a
/// full RFC 3339 timestamp taken as is.
///
/// `local_offset` gives the UTC offset in force at an instant. `HH:MM` is
/// placed in the offset of the day it lands on, so tomorrow's 07:00 stays
/// 07:00 across a daylight saving change tonight.
pub fn parse_target_time(
    input: &str,
    now: OffsetDateTime,
    local_offset: impl Fn(OffsetDateTime) -> UtcOffset,
) -> Result<OffsetDateTime, TimeParseError> {
    let input = input.trim();
    let malformed = || TimeParseError {
        input: input.to_string(),
    };

    if let Some(secs) = input.strip_prefix('+') {
        let secs: u32 = secs.parse().map_err(|_| malformed())?;
        return Ok(now + time::Duration::seconds(secs.into()));
    }

    if let Ok(at) = OffsetDateTime::parse(input, &Rfc3339) {
        return Ok(at);
    }

    let (hour, minute) = input.split_once(':').ok_or_else(malformed)?;
    let hour: u8 = hour.parse().map_err(|_| malformed())?;
    let minute: u8 = minute.parse().map_err(|_| malformed())?;
    let wall = Time::from_hms(hour, minute, 0).map_err(|_| malformed())?;

    let at_wall_time = |date: Date| {
        let local = PrimitiveDateTime::new(date, wall);
        local.assume_offset(local_offset(local.assume_offset(now.offset())))
    };

    let today = at_wall_time(now.date());
    if today > now {
        return Ok(today);
    }
    let tomorrow = now.date().next_day().ok_or_else(malformed)?;
    Ok(at_wall_time(tomorrow))
}

#[cfg(test)]
mod tests {
    use test_case::test_case;
    use time::macros::{datetime, offset};

    use super::*;

    const NOW: OffsetDateTime = datetime!(2024-03-01 06:45:10 +01:00);

    fn fixed(_: OffsetDateTime) -> UtcOffset {
        offset!(+01:00)
    }

    #[test_case("07:30", datetime!(2024-03-01 07:30 +01:00); "later today")]
    #[test_case("06:00", datetime!(2024-03-02 06:00 +01:00); "earlier means tomorrow")]
    #[test_case("06:45", datetime!(2024-03-02 06:45 +01:00); "current minute means tomorrow")]
    #[test_case("+90", datetime!(2024-03-01 06:46:40 +01:00); "relative seconds")]
    #[test_case(
        "2024-03-05T07:00:00Z",
        datetime!(2024-03-05 07:00 UTC);
        "rfc3339 timestamp"
    )]
    fn parses_target_time(input: &str, expected: OffsetDateTime) {
        assert_eq!(parse_target_time(input, NOW, fixed), Ok(expected));
    }

    #[test_case(""; "empty")]
    #[test_case("7"; "hour only")]
    #[test_case("24:00"; "hour out of range")]
    #[test_case("07:60"; "minute out of range")]
    #[test_case("+-5"; "negative offset")]
    #[test_case("tomorrow"; "word")]
    fn rejects_malformed_time(input: &str) {
        assert!(parse_target_time(input, NOW, fixed).is_err());
    }

    #[test]
    fn wall_clock_time_keeps_offset() {
        let at = parse_target_time("07:00", NOW, fixed).unwrap();
        assert_eq!(at.offset(), offset!(+01:00));
    }

    /// Central European time: +01:00, +02:00 from 2024-03-31 01:00 UTC.
    fn cet(at: OffsetDateTime) -> UtcOffset {
        if at < datetime!(2024-03-31 01:00 UTC) {
            offset!(+01:00)
        } else {
            offset!(+02:00)
        }
    }

    #[test]
    fn tomorrow_uses_offset_after_dst_change() {
        let now = datetime!(2024-03-30 08:00 +01:00);
        let at = parse_target_time("07:00", now, cet).unwrap();
        assert_eq!(at, datetime!(2024-03-31 07:00 +02:00));
        assert_eq!(at.offset(), offset!(+02:00));
    }

    #[test]
    fn today_uses_offset_after_dst_change() {
        let now = datetime!(2024-03-31 00:30 +01:00);
        let at = parse_target_time("07:00", now, cet).unwrap();
        assert_eq!(at, datetime!(2024-03-31 07:00 +02:00));
    }

    #[test]
    fn manual_clock_clones_share_time() {
        let clock = ManualClock::new(datetime!(2024-03-01 07:00 UTC));
        let other = clock.clone();

        clock.advance(time::Duration::minutes(5));
        assert_eq!(other.now(), datetime!(2024-03-01 07:05 UTC));

        other.set(datetime!(2024-03-02 06:30 UTC));
        assert_eq!(clock.now(), datetime!(2024-03-02 06:30 UTC));
    }
}
