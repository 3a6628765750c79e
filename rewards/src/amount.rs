// Copyright (c) 2024 Botho Foundation

//! Fixed-point ZMT amounts.
//!
//! Balances, rates and fees are all carried as integer pico-ZMT so that
//! accrual and fee arithmetic is exact and reproducible. Parsing goes straight
//! from the decimal string to picos without an `f64` detour.

use core::fmt;
use core::str::FromStr;

/// Picos per whole ZMT (10^12) - internal precision
pub const PICO_PER_ZMT: u64 = 1_000_000_000_000;

/// Number of fractional digits carried by an [`Amount`].
pub const AMOUNT_DECIMALS: usize = 12;

/// A non-negative quantity of currency in pico units.
///
/// The same scale is used for ZMT balances and for the externally denominated
/// side of an exchange.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Amount(u64);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    /// Construct from raw pico units.
    pub const fn from_picos(picos: u64) -> Self {
        Self(picos)
    }

    /// Construct from whole ZMT, saturating at `u64::MAX` picos.
    pub const fn from_zmt(zmt: u64) -> Self {
        Self(zmt.saturating_mul(PICO_PER_ZMT))
    }

    pub const fn picos(self) -> u64 {
        self.0
    }

    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, rhs: Amount) -> Option<Amount> {
        self.0.checked_add(rhs.0).map(Amount)
    }

    pub fn checked_sub(self, rhs: Amount) -> Option<Amount> {
        self.0.checked_sub(rhs.0).map(Amount)
    }

    pub fn saturating_add(self, rhs: Amount) -> Amount {
        Amount(self.0.saturating_add(rhs.0))
    }

    /// Multiply by `numerator / denominator`, truncating toward zero.
    ///
    /// Returns `None` if the denominator is zero or the result does not fit.
    pub fn mul_ratio(self, numerator: u64, denominator: u64) -> Option<Amount> {
        if denominator == 0 {
            return None;
        }
        let wide = (self.0 as u128) * (numerator as u128) / (denominator as u128);
        u64::try_from(wide).ok().map(Amount)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / PICO_PER_ZMT;
        let frac = self.0 % PICO_PER_ZMT;
        if frac == 0 {
            return write!(f, "{}", whole);
        }
        let digits = format!("{:012}", frac);
        write!(f, "{}.{}", whole, digits.trim_end_matches('0'))
    }
}

/// Error returned when an amount string cannot be parsed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParseAmountError {
    Empty,
    InvalidDigit,
    TooManyDecimals,
    Overflow,
}

impl fmt::Display for ParseAmountError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "empty amount"),
            Self::InvalidDigit => write!(f, "invalid digit in amount"),
            Self::TooManyDecimals => {
                write!(f, "amount has more than {} decimal places", AMOUNT_DECIMALS)
            }
            Self::Overflow => write!(f, "amount too large"),
        }
    }
}

impl std::error::Error for ParseAmountError {}

impl FromStr for Amount {
    type Err = ParseAmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ParseAmountError::Empty);
        }

        let (whole_str, frac_str) = match s.split_once('.') {
            Some((w, f)) => (w, f),
            None => (s, ""),
        };
        if whole_str.is_empty() && frac_str.is_empty() {
            return Err(ParseAmountError::Empty);
        }
        if frac_str.len() > AMOUNT_DECIMALS {
            return Err(ParseAmountError::TooManyDecimals);
        }
        let all_digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
        if !all_digits(whole_str) || !all_digits(frac_str) {
            return Err(ParseAmountError::InvalidDigit);
        }

        let whole: u64 = if whole_str.is_empty() {
            0
        } else {
            whole_str.parse().map_err(|_| ParseAmountError::Overflow)?
        };
        let frac: u64 = if frac_str.is_empty() {
            0
        } else {
            let padded = format!("{:0<width$}", frac_str, width = AMOUNT_DECIMALS);
            padded.parse().map_err(|_| ParseAmountError::InvalidDigit)?
        };

        whole
            .checked_mul(PICO_PER_ZMT)
            .and_then(|w| w.checked_add(frac))
            .map(Amount)
            .ok_or(ParseAmountError::Overflow)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_whole_and_fractional() {
        assert_eq!("1".parse::<Amount>().unwrap(), Amount::from_zmt(1));
        assert_eq!("0.000001".parse::<Amount>().unwrap(), Amount::from_picos(1_000_000));
        assert_eq!("1.5".parse::<Amount>().unwrap(), Amount::from_picos(1_500_000_000_000));
        assert_eq!(".25".parse::<Amount>().unwrap(), Amount::from_picos(250_000_000_000));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!("".parse::<Amount>(), Err(ParseAmountError::Empty));
        assert_eq!(".".parse::<Amount>(), Err(ParseAmountError::Empty));
        assert_eq!("-1".parse::<Amount>(), Err(ParseAmountError::InvalidDigit));
        assert_eq!("1e3".parse::<Amount>(), Err(ParseAmountError::InvalidDigit));
        assert_eq!(
            "0.0000000000001".parse::<Amount>(),
            Err(ParseAmountError::TooManyDecimals)
        );
        assert_eq!("99999999".parse::<Amount>(), Err(ParseAmountError::Overflow));
    }

    #[test]
    fn test_display_trims_trailing_zeros() {
        assert_eq!(Amount::from_zmt(198).to_string(), "198");
        assert_eq!(Amount::from_picos(1_500_000_000_000).to_string(), "1.5");
        assert_eq!(Amount::from_picos(5_000_000).to_string(), "0.000005");
        assert_eq!(Amount::ZERO.to_string(), "0");
    }

    #[test]
    fn test_mul_ratio() {
        let a = Amount::from_zmt(99);
        assert_eq!(a.mul_ratio(2_000_000, 1_000_000), Some(Amount::from_zmt(198)));
        assert_eq!(a.mul_ratio(1, 0), None);
        assert_eq!(Amount::from_picos(u64::MAX).mul_ratio(2, 1), None);
    }
}
