// Copyright (c) 2024 Botho Foundation

//! Engine error taxonomy.

use thiserror::Error;
use zmt_rewards::Amount;

use crate::ledger::{AccountId, SessionId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("Amount must be positive and within range")]
    InvalidAmount,

    #[error("Insufficient balance: {available} available, {requested} requested")]
    InsufficientBalance { available: Amount, requested: Amount },

    #[error("A mining session is already active")]
    AlreadyMining,

    #[error("No active mining session")]
    NotMining,

    #[error("Mining session {0} is already closed")]
    SessionAlreadyClosed(SessionId),

    #[error("Boost level {0} is not in the catalog")]
    InvalidBoostLevel(u32),

    #[error("Unknown referral code: {0}")]
    UnknownReferralCode(String),

    #[error("An account cannot refer itself")]
    SelfReferral,

    #[error("Account already has a referrer")]
    AlreadyReferred,

    #[error("Task {0} already claimed today")]
    AlreadyClaimedToday(String),

    #[error("Task {0} already claimed")]
    AlreadyClaimed(String),

    #[error("Unknown task type: {0}")]
    UnknownTaskType(String),

    #[error("Exchange {0} is not pending")]
    ExchangeNotPending(String),

    #[error("Exchange not found: {0}")]
    ExchangeNotFound(String),

    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),

    #[error("Username already taken: {0}")]
    UsernameTaken(String),

    #[error("Invalid username: {0}")]
    InvalidUsername(String),

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Corrupt record: {0}")]
    Corrupt(String),

    #[error("Account {0} mutated outside its critical section")]
    LockNotHeld(AccountId),
}

impl EngineError {
    /// Transient persistence or lock failures that the critical-section
    /// wrapper retries.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StorageUnavailable(_))
    }

    /// Caller-visible business failures (as opposed to internal faults).
    pub fn is_business(&self) -> bool {
        !matches!(
            self,
            Self::StorageUnavailable(_) | Self::Corrupt(_) | Self::LockNotHeld(_)
        )
    }
}

impl From<lmdb::Error> for EngineError {
    fn from(e: lmdb::Error) -> Self {
        EngineError::StorageUnavailable(e.to_string())
    }
}

impl From<bincode::Error> for EngineError {
    fn from(e: bincode::Error) -> Self {
        EngineError::Corrupt(e.to_string())
    }
}
