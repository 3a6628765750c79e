// Copyright (c) 2024 Botho Foundation

//! One entry point per operation.
//!
//! Callers pass an already-resolved account id; each operation returns a
//! receipt carrying the updated [`AccountSnapshot`] or a typed [`EngineError`].

use chrono::NaiveDate;
use serde::Serialize;
use std::{path::Path, sync::Arc};
use zmt_rewards::{Amount, BoostCurve};

use crate::{
    accounts::Accounts,
    boost::Boosts,
    clock::{offset_from_minutes, Clock, SystemClock},
    config::{BoostTier, Config, TaskReward},
    error::EngineError,
    exchange::{Exchanges, FixedRate, Outcome, RateSource},
    ledger::{
        Account, AccountId, AuditEntry, DailyTask, Exchange, Ledger, MiningSession, Purchase,
        ReferralReward, SessionId, Timestamp,
    },
    mining::{Mining, Settlement},
    referral::Referrals,
    tasks::Tasks,
};

/// Account state as returned to callers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AccountSnapshot {
    pub id: AccountId,
    pub username: String,
    pub referral_code: String,
    pub referred_by: Option<AccountId>,
    pub balance: Amount,
    pub mining_rate: Amount,
    pub boost_level: u32,
    /// Multiplier the next session would start with
    pub multiplier_bps: u64,
    pub is_mining: bool,
    pub mining_started_at: Option<Timestamp>,
    pub total_mined: Amount,
    pub total_referrals: u32,
    pub referral_earnings: Amount,
    pub login_streak: u32,
    pub last_login_date: Option<NaiveDate>,
}

impl AccountSnapshot {
    fn new(account: Account, curve: &BoostCurve) -> Self {
        Self {
            multiplier_bps: curve.multiplier_bps(account.boost_level),
            id: account.id,
            username: account.username,
            referral_code: account.referral_code,
            referred_by: account.referred_by,
            balance: account.balance,
            mining_rate: account.mining_rate,
            boost_level: account.boost_level,
            is_mining: account.is_mining,
            mining_started_at: account.mining_started_at,
            total_mined: account.total_mined,
            total_referrals: account.total_referrals,
            referral_earnings: account.referral_earnings,
            login_streak: account.login_streak,
            last_login_date: account.last_login_date,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct SessionReceipt {
    pub session: MiningSession,
    pub account: AccountSnapshot,
}

#[derive(Clone, Debug, Serialize)]
pub struct ClaimReceipt {
    pub session: MiningSession,
    pub earned: Amount,
    pub referral_reward: Option<ReferralReward>,
    pub account: AccountSnapshot,
}

#[derive(Clone, Debug, Serialize)]
pub struct PurchaseReceipt {
    pub purchase: Purchase,
    pub account: AccountSnapshot,
}

#[derive(Clone, Debug, Serialize)]
pub struct TaskReceipt {
    pub task: DailyTask,
    pub account: AccountSnapshot,
}

#[derive(Clone, Debug, Serialize)]
pub struct ExchangeReceipt {
    pub exchange: Exchange,
    pub account: AccountSnapshot,
}

/// The reward engine: a ledger plus the components that mutate it.
pub struct Engine {
    ledger: Arc<Ledger>,
    curve: BoostCurve,
    accounts: Accounts,
    mining: Mining,
    boosts: Boosts,
    referrals: Referrals,
    tasks: Tasks,
    exchanges: Exchanges,
}

impl Engine {
    /// Open the ledger at `ledger_dir` with the wall clock and the configured fixed rate.
    pub fn open(config: &Config, ledger_dir: &Path) -> Result<Self, EngineError> {
        let clock = Arc::new(SystemClock::new(offset_from_minutes(
            config.clock.utc_offset_minutes,
        )));
        let rates = Arc::new(FixedRate(config.exchange.rate()));
        Self::with_parts(config, ledger_dir, clock, rates)
    }

    pub fn with_parts(
        config: &Config,
        ledger_dir: &Path,
        clock: Arc<dyn Clock>,
        rates: Arc<dyn RateSource>,
    ) -> Result<Self, EngineError> {
        let ledger = Arc::new(Ledger::open(ledger_dir, config.ledger.clone(), clock)?);
        let curve = config.mining.boost_curve();

        Ok(Self {
            accounts: Accounts::new(ledger.clone(), config.mining.default_rate),
            mining: Mining::new(ledger.clone(), config.mining.clone(), &config.referral),
            boosts: Boosts::new(ledger.clone(), config.boosts.clone(), curve),
            referrals: Referrals::new(ledger.clone(), config.referral.clone()),
            tasks: Tasks::new(ledger.clone(), config.tasks.clone()),
            exchanges: Exchanges::new(ledger.clone(), &config.exchange, rates),
            curve,
            ledger,
        })
    }

    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }

    fn snapshot(&self, account: Account) -> AccountSnapshot {
        AccountSnapshot::new(account, &self.curve)
    }

    // Accounts

    pub fn register_account(
        &self,
        username: &str,
        referral_code: Option<&str>,
    ) -> Result<AccountSnapshot, EngineError> {
        let account = self.accounts.register(username, referral_code)?;
        Ok(self.snapshot(account))
    }

    pub fn profile(&self, id: AccountId) -> Result<AccountSnapshot, EngineError> {
        Ok(self.snapshot(self.accounts.get(id)?))
    }

    pub fn account_by_username(
        &self,
        username: &str,
    ) -> Result<Option<AccountSnapshot>, EngineError> {
        Ok(self.accounts.by_username(username)?.map(|a| self.snapshot(a)))
    }

    pub fn accounts(&self) -> Result<Vec<AccountSnapshot>, EngineError> {
        Ok(self
            .accounts
            .all()?
            .into_iter()
            .map(|a| self.snapshot(a))
            .collect())
    }

    // Mining

    pub fn start_mining(&self, id: AccountId) -> Result<SessionReceipt, EngineError> {
        let (session, account) = self.mining.start_mining(id)?;
        Ok(SessionReceipt {
            session,
            account: self.snapshot(account),
        })
    }

    pub fn claim(&self, id: AccountId) -> Result<ClaimReceipt, EngineError> {
        let settlement = self.mining.claim(id)?;
        Ok(self.claim_receipt(settlement))
    }

    pub fn claim_session(
        &self,
        id: AccountId,
        session: SessionId,
    ) -> Result<ClaimReceipt, EngineError> {
        let settlement = self.mining.claim_session(id, session)?;
        Ok(self.claim_receipt(settlement))
    }

    fn claim_receipt(&self, settlement: Settlement) -> ClaimReceipt {
        ClaimReceipt {
            session: settlement.session,
            earned: settlement.earned,
            referral_reward: settlement.referral_reward,
            account: self.snapshot(settlement.account),
        }
    }

    pub fn stop_mining(&self, id: AccountId) -> Result<SessionReceipt, EngineError> {
        let (session, account) = self.mining.stop_mining(id)?;
        Ok(SessionReceipt {
            session,
            account: self.snapshot(account),
        })
    }

    pub fn pending_earnings(&self, id: AccountId) -> Result<Amount, EngineError> {
        self.mining.pending_earnings(id)
    }

    pub fn sessions(&self, id: AccountId) -> Result<Vec<MiningSession>, EngineError> {
        self.mining.sessions(id)
    }

    // Boosts

    pub fn boost_catalog(&self) -> &[BoostTier] {
        self.boosts.catalog()
    }

    pub fn boost_multiplier_bps(&self, level: u32) -> u64 {
        self.boosts.multiplier_bps(level)
    }

    pub fn purchase_boost(
        &self,
        id: AccountId,
        level: u32,
    ) -> Result<PurchaseReceipt, EngineError> {
        let (purchase, account) = self.boosts.purchase_boost(id, level)?;
        Ok(PurchaseReceipt {
            purchase,
            account: self.snapshot(account),
        })
    }

    pub fn purchases(&self, id: AccountId) -> Result<Vec<Purchase>, EngineError> {
        self.boosts.purchases(id)
    }

    // Referrals

    pub fn register_referral(
        &self,
        id: AccountId,
        code: &str,
    ) -> Result<AccountSnapshot, EngineError> {
        Ok(self.snapshot(self.referrals.register_referral(id, code)?))
    }

    pub fn grant_referral_reward(
        &self,
        referred: AccountId,
    ) -> Result<Option<ReferralReward>, EngineError> {
        self.referrals.grant_referral_reward(referred)
    }

    pub fn referral_reward(
        &self,
        referred: AccountId,
    ) -> Result<Option<ReferralReward>, EngineError> {
        self.referrals.referral_reward(referred)
    }

    pub fn referral_reward_amount(&self) -> Amount {
        self.referrals.reward()
    }

    // Daily tasks

    pub fn task_catalog(&self) -> &[TaskReward] {
        self.tasks.catalog()
    }

    pub fn record_login(&self, id: AccountId) -> Result<AccountSnapshot, EngineError> {
        Ok(self.snapshot(self.tasks.record_login(id)?))
    }

    pub fn claim_task(&self, id: AccountId, task_type: &str) -> Result<TaskReceipt, EngineError> {
        let (task, account) = self.tasks.claim_task(id, task_type)?;
        Ok(TaskReceipt {
            task,
            account: self.snapshot(account),
        })
    }

    pub fn tasks(&self, id: AccountId) -> Result<Vec<DailyTask>, EngineError> {
        self.tasks.tasks(id)
    }

    // Exchange

    pub fn request_exchange(
        &self,
        id: AccountId,
        zmt_amount: Amount,
    ) -> Result<ExchangeReceipt, EngineError> {
        let (exchange, account) = self.exchanges.request_exchange(id, zmt_amount)?;
        Ok(ExchangeReceipt {
            exchange,
            account: self.snapshot(account),
        })
    }

    pub fn settle_exchange(
        &self,
        code: &str,
        outcome: Outcome,
    ) -> Result<ExchangeReceipt, EngineError> {
        let (exchange, account) = self.exchanges.settle_exchange(code, outcome)?;
        Ok(ExchangeReceipt {
            exchange,
            account: self.snapshot(account),
        })
    }

    pub fn exchange(&self, code: &str) -> Result<Option<Exchange>, EngineError> {
        self.exchanges.exchange(code)
    }

    pub fn exchanges(&self, id: AccountId) -> Result<Vec<Exchange>, EngineError> {
        self.exchanges.exchanges(id)
    }

    // Audit

    pub fn audit_trail(&self, id: AccountId) -> Result<Vec<AuditEntry>, EngineError> {
        self.ledger.audit_trail(id)
    }
}
