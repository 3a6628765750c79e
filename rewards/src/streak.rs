// Copyright (c) 2024 Botho Foundation

//! Consecutive-day login streaks.
//!
//! Days are plain day numbers (days since an arbitrary epoch) so the rule is
//! independent of calendar or timezone handling, which belongs to the caller.

/// Outcome of recording a login.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreakUpdate {
    /// Already logged in today; nothing changes.
    Unchanged,
    /// Logged in the day after the previous login.
    Extended(u32),
    /// First login, or at least one day was skipped.
    Reset,
}

impl StreakUpdate {
    /// Streak value after applying the update to `current`.
    pub fn apply(self, current: u32) -> u32 {
        match self {
            Self::Unchanged => current,
            Self::Extended(streak) => streak,
            Self::Reset => 1,
        }
    }
}

/// Decide how a login on `today` changes a streak whose last login was
/// `last_login`.
///
/// A `last_login` in the future (clock skew) is treated as a gap.
pub fn on_login(last_login: Option<i64>, current: u32, today: i64) -> StreakUpdate {
    match last_login {
        Some(last) if last == today => StreakUpdate::Unchanged,
        Some(last) if last + 1 == today => StreakUpdate::Extended(current.saturating_add(1)),
        _ => StreakUpdate::Reset,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_login_starts_at_one() {
        assert_eq!(on_login(None, 0, 100).apply(0), 1);
    }

    #[test]
    fn test_consecutive_days_extend() {
        let mut streak = 0;
        let mut last = None;
        for day in 10..15 {
            streak = on_login(last, streak, day).apply(streak);
            last = Some(day);
        }
        assert_eq!(streak, 5);
    }

    #[test]
    fn test_same_day_is_noop() {
        assert_eq!(on_login(Some(7), 3, 7), StreakUpdate::Unchanged);
        assert_eq!(StreakUpdate::Unchanged.apply(3), 3);
    }

    #[test]
    fn test_gap_resets() {
        assert_eq!(on_login(Some(7), 3, 9), StreakUpdate::Reset);
        assert_eq!(on_login(Some(9), 3, 7), StreakUpdate::Reset);
    }
}
