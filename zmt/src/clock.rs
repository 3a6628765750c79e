// Copyright (c) 2024 Botho Foundation

//! Time sources for accrual and calendar-day rules.
//!
//! "Now" is unix seconds; "today" is the calendar date at a fixed UTC offset.

use chrono::{DateTime, FixedOffset, NaiveDate, Offset, Utc};
use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::{SystemTime, UNIX_EPOCH},
};

use crate::ledger::Timestamp;

pub trait Clock: Send + Sync {
    /// Current unix time in seconds.
    fn now(&self) -> Timestamp;

    /// Offset used to turn timestamps into calendar days.
    fn utc_offset(&self) -> FixedOffset;

    /// Calendar date of `now()`.
    fn today(&self) -> NaiveDate {
        day_of(self.now(), self.utc_offset())
    }
}

/// Calendar date of a unix timestamp at the given offset.
pub fn day_of(ts: Timestamp, offset: FixedOffset) -> NaiveDate {
    let secs = i64::try_from(ts).unwrap_or(i64::MAX);
    DateTime::from_timestamp(secs, 0)
        .unwrap_or_default()
        .with_timezone(&offset)
        .date_naive()
}

/// Build an offset from minutes east of UTC, falling back to UTC when out of range.
pub fn offset_from_minutes(minutes: i32) -> FixedOffset {
    minutes
        .checked_mul(60)
        .and_then(FixedOffset::east_opt)
        .unwrap_or_else(utc)
}

fn utc() -> FixedOffset {
    Utc.fix()
}

/// Wall clock.
#[derive(Clone, Debug)]
pub struct SystemClock {
    offset: FixedOffset,
}

impl SystemClock {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs()
    }

    fn utc_offset(&self) -> FixedOffset {
        self.offset
    }
}

/// Clock that only moves when told to; used by simulations and tests.
#[derive(Debug)]
pub struct ManualClock {
    now: AtomicU64,
    offset: FixedOffset,
}

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        Self::with_offset(start, utc())
    }

    pub fn with_offset(start: Timestamp, offset: FixedOffset) -> Self {
        Self {
            now: AtomicU64::new(start),
            offset,
        }
    }

    pub fn advance(&self, secs: u64) {
        self.now.fetch_add(secs, Ordering::SeqCst);
    }

    pub fn advance_days(&self, days: u64) {
        self.advance(days * 86_400);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        self.now.load(Ordering::SeqCst)
    }

    fn utc_offset(&self) -> FixedOffset {
        self.offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 2024-03-01T23:30:00Z
    const LATE_EVENING: Timestamp = 1_709_335_800;

    #[test]
    fn test_day_boundary_respects_offset() {
        let utc_day = day_of(LATE_EVENING, offset_from_minutes(0));
        assert_eq!(utc_day, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());

        // One hour east of UTC it is already the next day
        let cet_day = day_of(LATE_EVENING, offset_from_minutes(60));
        assert_eq!(cet_day, NaiveDate::from_ymd_opt(2024, 3, 2).unwrap());
    }

    #[test]
    fn test_manual_clock_moves_on_demand() {
        let clock = ManualClock::new(LATE_EVENING);
        assert_eq!(clock.now(), LATE_EVENING);
        clock.advance(1_800);
        assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2024, 3, 2).unwrap());
        clock.advance_days(2);
        assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2024, 3, 4).unwrap());
    }

    #[test]
    fn test_out_of_range_offset_falls_back_to_utc() {
        assert_eq!(offset_from_minutes(100_000), offset_from_minutes(0));
    }
}
