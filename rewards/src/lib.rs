// Copyright (c) 2024 Botho Foundation

//! ZMT reward policy.
//!
//! Pure fixed-point math shared by the ledger engine and its tooling:
//!
//! | Concern  | Rule                                                        |
//! |----------|-------------------------------------------------------------|
//! | Mining   | `elapsed × rate × multiplier`, elapsed clamped per session  |
//! | Boosts   | `multiplier = 1 + level × step` (default step 0.5x)         |
//! | Exchange | `fee = amount × fee_bps`, `external = (amount - fee) × rate` |
//! | Streaks  | +1 on the next calendar day, reset to 1 after a gap         |
//!
//! Nothing in this crate performs I/O or reads a clock; callers pass in the
//! timestamps and day numbers they have already resolved.

mod accrual;
mod amount;
mod fee;
mod streak;

pub use accrual::{Accrual, BoostCurve, MULTIPLIER_SCALE_BPS};
pub use amount::{Amount, ParseAmountError, AMOUNT_DECIMALS, PICO_PER_ZMT};
pub use fee::{quote, ExchangeQuote, ExchangeRate, FeeRateBps, BPS_SCALE, RATE_SCALE_PPM};
pub use streak::{on_login, StreakUpdate};
