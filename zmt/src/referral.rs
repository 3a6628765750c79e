// Copyright (c) 2024 Botho Foundation

//! Referral cascade.
//!
//! The referrer relation is a plain foreign key set once per account. A
//! referrer is rewarded at most once per referred account: the reward record
//! is keyed by the referred id and its existence is the idempotency guard.

use std::sync::Arc;
use tracing::{debug, info};
use zmt_rewards::Amount;

use crate::{
    config::ReferralConfig,
    error::EngineError,
    ledger::{Account, AccountId, Ledger, LedgerTxn, Reason, ReferralReward},
};

pub struct Referrals {
    ledger: Arc<Ledger>,
    config: ReferralConfig,
}

impl Referrals {
    pub fn new(ledger: Arc<Ledger>, config: ReferralConfig) -> Self {
        Self { ledger, config }
    }

    /// Attach `account` to the owner of `code`.
    pub fn register_referral(
        &self,
        account: AccountId,
        code: &str,
    ) -> Result<Account, EngineError> {
        self.ledger.with_lock(account, |txn| {
            link_referrer(txn, account, code)?;
            txn.account(account)
        })
    }

    /// Credit the referrer of `referred`, once.
    ///
    /// Returns `None` when the account has no referrer or was already
    /// rewarded for.
    pub fn grant_referral_reward(
        &self,
        referred: AccountId,
    ) -> Result<Option<ReferralReward>, EngineError> {
        let Some(referrer) = self.ledger.account(referred)?.referred_by else {
            return Ok(None);
        };
        let reward = self.config.reward;
        self.ledger
            .with_locks(&[referred, referrer], |txn| grant_in(txn, referred, reward))
    }

    pub fn referral_reward(
        &self,
        referred: AccountId,
    ) -> Result<Option<ReferralReward>, EngineError> {
        self.ledger.get(&ReferralReward::key_for(referred))
    }

    pub fn reward(&self) -> Amount {
        self.config.reward
    }
}

/// Set `referred_by` on a locked account.
pub(crate) fn link_referrer(
    txn: &mut LedgerTxn<'_>,
    account: AccountId,
    code: &str,
) -> Result<AccountId, EngineError> {
    let referrer = txn
        .account_by_referral_code(code)?
        .ok_or_else(|| EngineError::UnknownReferralCode(code.to_string()))?;
    if referrer == account {
        return Err(EngineError::SelfReferral);
    }

    let mut record = txn.account(account)?;
    if record.referred_by.is_some() {
        return Err(EngineError::AlreadyReferred);
    }
    record.referred_by = Some(referrer);
    txn.put_account(&record)?;

    info!(%account, %referrer, "Registered referral");
    Ok(referrer)
}

/// Grant inside an existing critical section.
///
/// A referrer whose lock is not held by this section (its link appeared
/// after the caller chose which accounts to lock) is left for a later grant.
/// A zero reward grants nothing and never fails the enclosing section.
pub(crate) fn grant_in(
    txn: &mut LedgerTxn<'_>,
    referred: AccountId,
    reward_amount: Amount,
) -> Result<Option<ReferralReward>, EngineError> {
    if reward_amount.is_zero() {
        return Ok(None);
    }
    let Some(referrer) = txn.account(referred)?.referred_by else {
        return Ok(None);
    };
    if !txn.holds(referrer) {
        debug!(%referred, %referrer, "Referrer not locked, deferring reward");
        return Ok(None);
    }
    if txn.get::<ReferralReward>(&ReferralReward::key_for(referred))?.is_some() {
        return Ok(None);
    }

    let reward = ReferralReward {
        referrer,
        referred,
        reward_amount,
        created_at: txn.now(),
        is_claimed: true,
    };
    txn.put(&reward)?;
    txn.credit(referrer, reward_amount, Reason::ReferralBonus(referred))?;

    let mut account = txn.account(referrer)?;
    account.total_referrals += 1;
    account.referral_earnings = account.referral_earnings.saturating_add(reward_amount);
    txn.put_account(&account)?;

    info!(%referrer, %referred, amount = %reward_amount, "Granted referral reward");
    Ok(Some(reward))
}
