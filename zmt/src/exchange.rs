// Copyright (c) 2024 Botho Foundation

//! Exchange of ZMT for an external-currency claim.
//!
//! `pending -> completed | failed`. The ZMT leaves the balance in the same
//! critical section that creates the pending record; a failed settlement
//! refunds it once.

use rand::RngCore;
use std::{fmt, str::FromStr, sync::Arc};
use tracing::info;
use zmt_rewards::{quote, Amount, ExchangeRate, FeeRateBps};

use crate::{
    config::ExchangeConfig,
    error::EngineError,
    ledger::{Account, AccountId, Exchange, ExchangeStatus, Ledger, Reason, META_NEXT_EXCHANGE},
};

/// Supplies the external rate at request time.
pub trait RateSource: Send + Sync {
    fn current_rate(&self) -> Result<ExchangeRate, EngineError>;
}

/// A rate that never changes.
#[derive(Clone, Copy, Debug)]
pub struct FixedRate(pub ExchangeRate);

impl RateSource for FixedRate {
    fn current_rate(&self) -> Result<ExchangeRate, EngineError> {
        Ok(self.0)
    }
}

/// Result reported by the settlement process.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Completed,
    Failed,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for Outcome {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "completed" | "complete" => Ok(Self::Completed),
            "failed" | "fail" => Ok(Self::Failed),
            other => Err(format!("unknown outcome '{}', expected completed or failed", other)),
        }
    }
}

pub struct Exchanges {
    ledger: Arc<Ledger>,
    fee_bps: FeeRateBps,
    rates: Arc<dyn RateSource>,
}

impl Exchanges {
    pub fn new(ledger: Arc<Ledger>, config: &ExchangeConfig, rates: Arc<dyn RateSource>) -> Self {
        Self {
            ledger,
            fee_bps: config.fee_bps,
            rates,
        }
    }

    pub fn request_exchange(
        &self,
        id: AccountId,
        zmt_amount: Amount,
    ) -> Result<(Exchange, Account), EngineError> {
        if zmt_amount.is_zero() {
            return Err(EngineError::InvalidAmount);
        }
        // Resolved before locking
        let rate = self.rates.current_rate()?;
        let quoted = quote(zmt_amount, self.fee_bps, rate).ok_or(EngineError::InvalidAmount)?;

        self.ledger.with_lock(id, |txn| {
            let seq = txn.next_id(META_NEXT_EXCHANGE)?;
            let code = exchange_code(id, seq);
            txn.debit(id, zmt_amount, Reason::ExchangeDebit(code.clone()))?;

            let exchange = Exchange {
                code,
                account: id,
                seq,
                zmt_amount,
                external_amount: quoted.external_amount,
                fee_amount: quoted.fee,
                rate_ppm: rate.ppm,
                status: ExchangeStatus::Pending,
                created_at: txn.now(),
                settled_at: None,
            };
            txn.insert_exchange(&exchange)?;

            info!(
                account = %id,
                code = %exchange.code,
                amount = %zmt_amount,
                fee = %quoted.fee,
                external = %quoted.external_amount,
                "Requested exchange"
            );
            Ok((exchange, txn.account(id)?))
        })
    }

    pub fn settle_exchange(
        &self,
        code: &str,
        outcome: Outcome,
    ) -> Result<(Exchange, Account), EngineError> {
        let owner = self
            .ledger
            .exchange_by_code(code)?
            .ok_or_else(|| EngineError::ExchangeNotFound(code.to_string()))?
            .account;

        self.ledger.with_lock(owner, |txn| {
            let mut exchange = txn
                .exchange_by_code(code)?
                .ok_or_else(|| EngineError::ExchangeNotFound(code.to_string()))?;
            if exchange.status != ExchangeStatus::Pending {
                return Err(EngineError::ExchangeNotPending(code.to_string()));
            }

            exchange.status = match outcome {
                Outcome::Completed => ExchangeStatus::Completed,
                Outcome::Failed => ExchangeStatus::Failed,
            };
            exchange.settled_at = Some(txn.now());
            txn.put(&exchange)?;

            if outcome == Outcome::Failed {
                txn.credit(owner, exchange.zmt_amount, Reason::ExchangeRefund(code.to_string()))?;
            }

            info!(account = %owner, code, %outcome, "Settled exchange");
            Ok((exchange, txn.account(owner)?))
        })
    }

    pub fn exchange(&self, code: &str) -> Result<Option<Exchange>, EngineError> {
        self.ledger.exchange_by_code(code)
    }

    pub fn exchanges(&self, id: AccountId) -> Result<Vec<Exchange>, EngineError> {
        self.ledger.records_of(id)
    }
}

/// `ZX-<account>-<seq>-<random>`, all hex. Unique through the global `seq`.
fn exchange_code(account: AccountId, seq: u64) -> String {
    let mut tail = [0u8; 2];
    rand::thread_rng().fill_bytes(&mut tail);
    format!("ZX-{:x}-{:x}-{}", account.0, seq, hex::encode(tail))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_format() {
        let code = exchange_code(AccountId(255), 16);
        let parts: Vec<&str> = code.split('-').collect();
        assert_eq!(parts[0], "ZX");
        assert_eq!(parts[1], "ff");
        assert_eq!(parts[2], "10");
        assert_eq!(parts[3].len(), 4);
    }

    #[test]
    fn test_outcome_parsing() {
        assert_eq!("Completed".parse::<Outcome>().unwrap(), Outcome::Completed);
        assert_eq!("fail".parse::<Outcome>().unwrap(), Outcome::Failed);
        assert!("pending".parse::<Outcome>().is_err());
    }
}
