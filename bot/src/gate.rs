//! Blackout-hour gate.
//!
//! Hours are evaluated in the service's reference timezone, a fixed UTC offset.

use chrono::{DateTime, Duration, FixedOffset, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

pub const HOURS_PER_DAY: u32 = 24;
pub const MINUTES_PER_DAY: u32 = HOURS_PER_DAY * 60;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateError {
    #[error("every hour of the day is blacked out")]
    NoAllowedHour,
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("invalid blackout hour: {0} (expected 0-23)")]
pub struct InvalidHour(pub u8);

/// Hours of the day (0-23) during which play is suppressed.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<u8>", into = "Vec<u8>")]
pub struct BlackoutHours(BTreeSet<u8>);

impl BlackoutHours {
    pub fn new(hours: impl IntoIterator<Item = u8>) -> Result<Self, InvalidHour> {
        let mut set = BTreeSet::new();
        for hour in hours {
            if u32::from(hour) >= HOURS_PER_DAY {
                return Err(InvalidHour(hour));
            }
            set.insert(hour);
        }
        Ok(Self(set))
    }

    pub fn contains(&self, hour: u32) -> bool {
        u8::try_from(hour).is_ok_and(|hour| self.0.contains(&hour))
    }

    pub fn is_full_day(&self) -> bool {
        self.0.len() == HOURS_PER_DAY as usize
    }

    pub fn iter(&self) -> impl Iterator<Item = u8> + '_ {
        self.0.iter().copied()
    }
}

impl TryFrom<Vec<u8>> for BlackoutHours {
    type Error = InvalidHour;

    fn try_from(hours: Vec<u8>) -> Result<Self, Self::Error> {
        Self::new(hours)
    }
}

impl From<BlackoutHours> for Vec<u8> {
    fn from(hours: BlackoutHours) -> Self {
        hours.0.into_iter().collect()
    }
}

/// Source of wall-clock time in the reference timezone.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> DateTime<FixedOffset>;
}

/// A fixed instant never advances, which is what tests want.
impl Clock for DateTime<FixedOffset> {
    fn now(&self) -> DateTime<FixedOffset> {
        *self
    }
}

#[derive(Clone, Copy, Debug)]
pub struct SystemClock {
    offset: FixedOffset,
}

impl SystemClock {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        Utc::now().with_timezone(&self.offset)
    }
}

/// Returns false iff the hour of `now` is blacked out.
pub fn is_play_allowed_at(now: &DateTime<FixedOffset>, blackout: &BlackoutHours) -> bool {
    !blackout.contains(now.hour())
}

/// Whole minutes (rounded up) from `now` until the top of the next hour after the current
/// one that is not blacked out.
///
/// The search wraps past midnight and looks at most one day ahead, so the result is always
/// in `1..=1440`.
pub fn minutes_until_next_allowed_at(
    now: &DateTime<FixedOffset>,
    blackout: &BlackoutHours,
) -> Result<u32, GateError> {
    let current = now.hour();
    let hours_ahead = (1..=HOURS_PER_DAY)
        .find(|ahead| !blackout.contains((current + ahead) % HOURS_PER_DAY))
        .ok_or(GateError::NoAllowedHour)?;

    let top_of_hour = *now
        - Duration::minutes(i64::from(now.minute()))
        - Duration::seconds(i64::from(now.second()))
        - Duration::nanoseconds(i64::from(now.nanosecond()));
    let next_start = top_of_hour + Duration::hours(i64::from(hours_ahead));

    let remaining = next_start - *now;
    let mut minutes = remaining.num_minutes();
    if remaining > Duration::minutes(minutes) {
        minutes += 1;
    }
    Ok(u32::try_from(minutes).unwrap_or(MINUTES_PER_DAY).min(MINUTES_PER_DAY))
}

/// Decides whether a session may play right now.
#[derive(Clone, Debug)]
pub struct TimeWindowGate<C> {
    clock: C,
}

impl<C: Clock> TimeWindowGate<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }

    pub fn is_play_allowed(&self, blackout: &BlackoutHours) -> bool {
        is_play_allowed_at(&self.clock.now(), blackout)
    }

    pub fn minutes_until_next_allowed(&self, blackout: &BlackoutHours) -> Result<u32, GateError> {
        minutes_until_next_allowed_at(&self.clock.now(), blackout)
    }
}

#[cfg(test)]
pub(crate) fn at(hour: u32, minute: u32, second: u32) -> DateTime<FixedOffset> {
    use chrono::TimeZone;

    let offset = FixedOffset::east_opt(7 * 3600).unwrap();
    offset
        .with_ymd_and_hms(2024, 10, 16, hour, minute, second)
        .unwrap()
}
