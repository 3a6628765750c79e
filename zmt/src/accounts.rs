// Copyright (c) 2024 Botho Foundation

//! Account registration and lookup.

use std::sync::Arc;
use tracing::info;
use zmt_rewards::Amount;

use crate::{
    error::EngineError,
    ledger::{Account, AccountId, Ledger, NewAccount},
    referral::link_referrer,
};

/// Longest accepted username
pub const MAX_USERNAME_LEN: usize = 32;

/// Prefix of generated referral codes
pub const REFERRAL_CODE_PREFIX: &str = "ZMT";

pub struct Accounts {
    ledger: Arc<Ledger>,
    default_rate: Amount,
}

impl Accounts {
    pub fn new(ledger: Arc<Ledger>, default_rate: Amount) -> Self {
        Self {
            ledger,
            default_rate,
        }
    }

    /// Create an account, optionally linked to a referrer.
    ///
    /// A bad referral code fails the whole registration.
    pub fn register(
        &self,
        username: &str,
        referral_code: Option<&str>,
    ) -> Result<Account, EngineError> {
        validate_username(username)?;

        let account = self.ledger.with_locks(&[], |txn| {
            let account = txn.create_account(NewAccount {
                username: username.to_string(),
                referral_code: referral_code_for(username),
                mining_rate: self.default_rate,
            })?;
            if let Some(code) = referral_code {
                link_referrer(txn, account.id, code)?;
            }
            txn.account(account.id)
        })?;

        info!(
            id = %account.id,
            username = %account.username,
            code = %account.referral_code,
            "Registered account"
        );
        Ok(account)
    }

    pub fn get(&self, id: AccountId) -> Result<Account, EngineError> {
        self.ledger.account(id)
    }

    pub fn by_username(&self, username: &str) -> Result<Option<Account>, EngineError> {
        match self.ledger.account_by_username(username)? {
            Some(id) => self.ledger.account(id).map(Some),
            None => Ok(None),
        }
    }

    pub fn all(&self) -> Result<Vec<Account>, EngineError> {
        self.ledger.all()
    }
}

fn validate_username(username: &str) -> Result<(), EngineError> {
    let valid = !username.is_empty()
        && username.len() <= MAX_USERNAME_LEN
        && username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.');
    if valid {
        Ok(())
    } else {
        Err(EngineError::InvalidUsername(username.to_string()))
    }
}

/// Referral code derived from a username; the ledger suffixes it on collision.
pub fn referral_code_for(username: &str) -> String {
    format!("{}{}", REFERRAL_CODE_PREFIX, username.to_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_username_rules() {
        assert!(validate_username("alice_01").is_ok());
        assert!(validate_username("a.b-c").is_ok());
        assert!(validate_username("").is_err());
        assert!(validate_username("has space").is_err());
        assert!(validate_username(&"x".repeat(MAX_USERNAME_LEN + 1)).is_err());
    }

    #[test]
    fn test_referral_code_format() {
        assert_eq!(referral_code_for("alice"), "ZMTALICE");
    }
}
