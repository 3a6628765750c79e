// Copyright (c) 2024 Botho Foundation

//! Time-based mining accrual with boost multipliers.
//!
//! ## Formula
//!
//! ```text
//! earned = min(elapsed, max_session) × rate × multiplier_bps(level) / 10000
//! multiplier_bps(level) = 10000 + level × step_bps
//! ```
//!
//! The multiplier is a pure, monotonic function of the boost level. Callers
//! evaluate it once when a session starts and pass the frozen level back in at
//! settlement, so a boost bought mid-session only affects the next session.

use crate::amount::Amount;

/// Multiplier scale: 10000 bps = 1.0x
pub const MULTIPLIER_SCALE_BPS: u64 = 10_000;

/// Boost multiplier configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BoostCurve {
    /// Multiplier added per boost level, in basis points.
    /// Default: 5000 bps (each level adds 0.5x)
    pub step_bps: u64,
}

impl Default for BoostCurve {
    fn default() -> Self {
        Self { step_bps: 5_000 }
    }
}

impl BoostCurve {
    pub fn new(step_bps: u64) -> Self {
        Self { step_bps }
    }

    /// Multiplier for a boost level in basis points (10000 = 1.0x).
    pub fn multiplier_bps(&self, level: u32) -> u64 {
        MULTIPLIER_SCALE_BPS.saturating_add((level as u64).saturating_mul(self.step_bps))
    }
}

/// Mining accrual parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Accrual {
    /// Mining rate in picos per second.
    pub rate_per_sec: Amount,
    /// Multiplier frozen at session start, in basis points.
    pub multiplier_bps: u64,
    /// Upper bound on the elapsed seconds that can be credited.
    pub max_elapsed_secs: u64,
}

impl Accrual {
    /// Seconds that count towards the reward for a session opened at
    /// `started_at` and settled at `now` (both unix seconds).
    ///
    /// A clock that moved backwards yields zero rather than wrapping.
    pub fn credited_secs(&self, started_at: u64, now: u64) -> u64 {
        now.saturating_sub(started_at).min(self.max_elapsed_secs)
    }

    /// Amount earned for the session, or `None` on overflow.
    pub fn earned(&self, started_at: u64, now: u64) -> Option<Amount> {
        let secs = self.credited_secs(started_at, now) as u128;
        let wide = secs
            .checked_mul(self.rate_per_sec.picos() as u128)?
            .checked_mul(self.multiplier_bps as u128)?
            / MULTIPLIER_SCALE_BPS as u128;
        u64::try_from(wide).ok().map(Amount::from_picos)
    }
}
