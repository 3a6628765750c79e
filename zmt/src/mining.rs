// Copyright (c) 2024 Botho Foundation

//! Mining accrual engine.
//!
//! An account is either idle or has exactly one active session. The boost
//! multiplier is frozen into the session when it starts; a claim settles the
//! session at that multiplier and returns the account to idle. Stopping a
//! session early forfeits its accrual.

use std::sync::Arc;
use tracing::{debug, info};
use zmt_rewards::{Accrual, Amount};

use crate::{
    config::{MiningConfig, ReferralConfig},
    error::EngineError,
    ledger::{
        Account, AccountId, Ledger, LedgerTxn, MiningSession, Reason, ReferralReward, SessionId,
        META_NEXT_SESSION,
    },
    referral,
};

/// Result of settling a session.
#[derive(Clone, Debug)]
pub struct Settlement {
    pub session: MiningSession,
    pub earned: Amount,
    /// Reward granted to this account's referrer by this claim, if any
    pub referral_reward: Option<ReferralReward>,
    pub account: Account,
}

pub struct Mining {
    ledger: Arc<Ledger>,
    config: MiningConfig,
    referral_reward: Amount,
}

impl Mining {
    pub fn new(ledger: Arc<Ledger>, config: MiningConfig, referral: &ReferralConfig) -> Self {
        Self {
            ledger,
            config,
            referral_reward: referral.reward,
        }
    }

    pub fn start_mining(&self, id: AccountId) -> Result<(MiningSession, Account), EngineError> {
        let curve = self.config.boost_curve();
        self.ledger.with_lock(id, |txn| {
            let mut account = txn.account(id)?;
            if account.is_mining {
                return Err(EngineError::AlreadyMining);
            }

            let now = txn.now();
            let session = MiningSession {
                id: SessionId(txn.next_id(META_NEXT_SESSION)?),
                account: id,
                start_time: now,
                end_time: None,
                amount_mined: Amount::ZERO,
                boost_level_at_start: account.boost_level,
                multiplier_bps: curve.multiplier_bps(account.boost_level),
                is_active: true,
            };
            txn.put(&session)?;

            account.is_mining = true;
            account.active_session = Some(session.id);
            account.mining_started_at = Some(now);
            txn.put_account(&account)?;

            info!(
                account = %id,
                session = %session.id,
                multiplier_bps = session.multiplier_bps,
                "Started mining"
            );
            Ok((session, account))
        })
    }

    /// Settle the account's active session.
    pub fn claim(&self, id: AccountId) -> Result<Settlement, EngineError> {
        let locks = self.lock_set(id)?;
        self.ledger.with_locks(&locks, |txn| {
            let account = txn.account(id)?;
            let session_id = account.active_session.ok_or(EngineError::NotMining)?;
            let session = self.session_in(txn, id, session_id)?;
            self.settle(txn, account, session)
        })
    }

    /// Settle a specific session; a closed session is rejected.
    pub fn claim_session(
        &self,
        id: AccountId,
        session_id: SessionId,
    ) -> Result<Settlement, EngineError> {
        let locks = self.lock_set(id)?;
        self.ledger.with_locks(&locks, |txn| {
            let account = txn.account(id)?;
            let session = self.session_in(txn, id, session_id)?;
            if !session.is_active {
                return Err(EngineError::SessionAlreadyClosed(session_id));
            }
            self.settle(txn, account, session)
        })
    }

    /// Close the active session without crediting anything.
    pub fn stop_mining(&self, id: AccountId) -> Result<(MiningSession, Account), EngineError> {
        self.ledger.with_lock(id, |txn| {
            let mut account = txn.account(id)?;
            let session_id = account.active_session.ok_or(EngineError::NotMining)?;
            let mut session = self.session_in(txn, id, session_id)?;
            if !session.is_active {
                return Err(EngineError::SessionAlreadyClosed(session_id));
            }

            session.end_time = Some(txn.now());
            session.is_active = false;
            txn.put(&session)?;

            clear_mining(&mut account);
            txn.put_account(&account)?;

            info!(account = %id, session = %session_id, "Stopped mining, accrual forfeited");
            Ok((session, account))
        })
    }

    pub fn sessions(&self, id: AccountId) -> Result<Vec<MiningSession>, EngineError> {
        self.ledger.records_of(id)
    }

    /// What a claim would credit right now, without settling.
    pub fn pending_earnings(&self, id: AccountId) -> Result<Amount, EngineError> {
        let account = self.ledger.account(id)?;
        let Some(session_id) = account.active_session else {
            return Ok(Amount::ZERO);
        };
        let session: MiningSession = self
            .ledger
            .get(&MiningSession::key_for(id, session_id))?
            .ok_or(EngineError::NotMining)?;
        self.accrual(&account, &session)
            .earned(session.start_time, self.ledger.clock().now())
            .ok_or(EngineError::InvalidAmount)
    }

    /// The account plus its referrer, so a first claim can reward both in one section.
    fn lock_set(&self, id: AccountId) -> Result<Vec<AccountId>, EngineError> {
        let account = self.ledger.account(id)?;
        Ok(std::iter::once(id).chain(account.referred_by).collect())
    }

    fn session_in(
        &self,
        txn: &LedgerTxn<'_>,
        id: AccountId,
        session_id: SessionId,
    ) -> Result<MiningSession, EngineError> {
        txn.get(&MiningSession::key_for(id, session_id))?
            .ok_or(EngineError::NotMining)
    }

    fn accrual(&self, account: &Account, session: &MiningSession) -> Accrual {
        Accrual {
            rate_per_sec: account.mining_rate,
            multiplier_bps: session.multiplier_bps,
            max_elapsed_secs: self.config.max_session_secs,
        }
    }

    fn settle(
        &self,
        txn: &mut LedgerTxn<'_>,
        mut account: Account,
        mut session: MiningSession,
    ) -> Result<Settlement, EngineError> {
        let now = txn.now();
        let accrual = self.accrual(&account, &session);
        let earned = accrual
            .earned(session.start_time, now)
            .ok_or(EngineError::InvalidAmount)?;
        debug!(
            account = %account.id,
            session = %session.id,
            secs = accrual.credited_secs(session.start_time, now),
            multiplier_bps = session.multiplier_bps,
            %earned,
            "Computed accrual"
        );

        session.end_time = Some(now);
        session.amount_mined = earned;
        session.is_active = false;
        txn.put(&session)?;

        if !earned.is_zero() {
            txn.credit(account.id, earned, Reason::MiningClaim(session.id))?;
        }
        clear_mining(&mut account);
        account.last_claim_time = Some(now);
        account.total_mined = account
            .total_mined
            .checked_add(earned)
            .ok_or(EngineError::InvalidAmount)?;
        txn.put_account(&account)?;

        let referral_reward = if earned.is_zero() {
            None
        } else {
            referral::grant_in(txn, account.id, self.referral_reward)?
        };

        info!(account = %account.id, session = %session.id, %earned, "Claimed mining session");
        Ok(Settlement {
            session,
            earned,
            referral_reward,
            account: txn.account(account.id)?,
        })
    }
}

fn clear_mining(account: &mut Account) {
    account.is_mining = false;
    account.active_session = None;
    account.mining_started_at = None;
}
