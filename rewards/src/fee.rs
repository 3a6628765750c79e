// Copyright (c) 2024 Botho Foundation

//! Exchange fee and quote calculation.
//!
//! ```text
//! fee             = zmt_amount × fee_bps / 10000
//! external_amount = (zmt_amount - fee) × rate_ppm / 1_000_000
//! ```
//!
//! The fee is withheld from the converted amount rather than charged on top,
//! so the ledger debit for an exchange is exactly `zmt_amount`.

use crate::amount::Amount;

/// Fee rate as a fixed-point value (basis points, 1/10000).
///
/// 10000 = 100%, 100 = 1%, 1 = 0.01%
pub type FeeRateBps = u32;

/// Basis point denominator.
pub const BPS_SCALE: u64 = 10_000;

/// Rate scale: 1_000_000 ppm = 1 external unit per ZMT
pub const RATE_SCALE_PPM: u64 = 1_000_000;

/// External units per ZMT, in parts per million.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ExchangeRate {
    pub ppm: u64,
}

impl ExchangeRate {
    pub const fn from_ppm(ppm: u64) -> Self {
        Self { ppm }
    }
}

/// Breakdown of a single exchange.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExchangeQuote {
    /// ZMT leaving the balance (fee included).
    pub zmt_amount: Amount,
    /// Portion of `zmt_amount` withheld as fee.
    pub fee: Amount,
    /// External-currency amount owed to the account holder.
    pub external_amount: Amount,
}

/// Quote an exchange. Returns `None` for a fee rate above 100% or overflow.
pub fn quote(zmt_amount: Amount, fee_bps: FeeRateBps, rate: ExchangeRate) -> Option<ExchangeQuote> {
    if fee_bps as u64 > BPS_SCALE {
        return None;
    }
    let fee = zmt_amount.mul_ratio(fee_bps as u64, BPS_SCALE)?;
    let net = zmt_amount.checked_sub(fee)?;
    let external_amount = net.mul_ratio(rate.ppm, RATE_SCALE_PPM)?;
    Some(ExchangeQuote {
        zmt_amount,
        fee,
        external_amount,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_percent_fee_at_two_to_one() {
        let q = quote(Amount::from_zmt(100), 100, ExchangeRate::from_ppm(2_000_000)).unwrap();
        assert_eq!(q.fee, Amount::from_zmt(1));
        assert_eq!(q.external_amount, Amount::from_zmt(198));
        assert_eq!(q.zmt_amount, Amount::from_zmt(100));
    }

    #[test]
    fn test_fee_rounds_down() {
        // 1% of 99 picos is 0.99 picos
        let q = quote(Amount::from_picos(99), 100, ExchangeRate::from_ppm(RATE_SCALE_PPM)).unwrap();
        assert_eq!(q.fee, Amount::ZERO);
        assert_eq!(q.external_amount, Amount::from_picos(99));
    }

    #[test]
    fn test_zero_and_full_fee() {
        let rate = ExchangeRate::from_ppm(RATE_SCALE_PPM);
        let q = quote(Amount::from_zmt(5), 0, rate).unwrap();
        assert_eq!(q.fee, Amount::ZERO);
        assert_eq!(q.external_amount, Amount::from_zmt(5));

        let q = quote(Amount::from_zmt(5), 10_000, rate).unwrap();
        assert_eq!(q.fee, Amount::from_zmt(5));
        assert_eq!(q.external_amount, Amount::ZERO);

        assert!(quote(Amount::from_zmt(5), 10_001, rate).is_none());
    }
}
