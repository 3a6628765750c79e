// Copyright (c) 2024 Botho Foundation

//! Persisted entities and their LMDB key layout.
//!
//! Every record owned by an account is keyed `account_id (8 bytes BE) || ...`
//! so that an account's history is a single prefix scan.

use chrono::{Datelike, NaiveDate};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fmt;
use zmt_rewards::Amount;

/// Unix timestamp in seconds
pub type Timestamp = u64;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AccountId(pub u64);

impl AccountId {
    pub fn to_key(self) -> [u8; 8] {
        self.0.to_be_bytes()
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PurchaseId(pub u64);

/// Named LMDB databases holding records.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Table {
    Accounts,
    Sessions,
    Purchases,
    Exchanges,
    DailyTasks,
    ReferralRewards,
    Audit,
}

/// A value stored in one of the ledger tables.
pub trait Record: Serialize + DeserializeOwned {
    const TABLE: Table;

    /// Full LMDB key of this record.
    fn key(&self) -> Vec<u8>;

    /// Account whose critical section must be held to write this record.
    fn owner(&self) -> AccountId;
}

fn compound_key(account: AccountId, suffix: &[u8]) -> Vec<u8> {
    let mut key = Vec::with_capacity(8 + suffix.len());
    key.extend_from_slice(&account.to_key());
    key.extend_from_slice(suffix);
    key
}

/// User account state. Only the ledger writes `balance`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub username: String,
    pub referral_code: String,
    pub referred_by: Option<AccountId>,

    /// Current balance (never negative by construction)
    pub balance: Amount,

    /// Picos earned per second of mining
    pub mining_rate: Amount,

    /// Highest purchased boost level
    pub boost_level: u32,

    pub is_mining: bool,
    pub active_session: Option<SessionId>,

    /// Start of the active session; `None` while idle
    pub mining_started_at: Option<Timestamp>,
    pub last_claim_time: Option<Timestamp>,

    /// Lifetime mining credits
    pub total_mined: Amount,
    pub total_referrals: u32,
    pub referral_earnings: Amount,

    pub login_streak: u32,
    pub last_login_date: Option<NaiveDate>,

    pub created_at: Timestamp,
}

impl Account {
    pub fn key_for(id: AccountId) -> Vec<u8> {
        id.to_key().to_vec()
    }
}

impl Record for Account {
    const TABLE: Table = Table::Accounts;

    fn key(&self) -> Vec<u8> {
        Self::key_for(self.id)
    }

    fn owner(&self) -> AccountId {
        self.id
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MiningSession {
    pub id: SessionId,
    pub account: AccountId,
    pub start_time: Timestamp,
    pub end_time: Option<Timestamp>,
    pub amount_mined: Amount,
    pub boost_level_at_start: u32,
    /// Multiplier frozen when the session started, in basis points
    pub multiplier_bps: u64,
    pub is_active: bool,
}

impl MiningSession {
    pub fn key_for(account: AccountId, id: SessionId) -> Vec<u8> {
        compound_key(account, &id.0.to_be_bytes())
    }
}

impl Record for MiningSession {
    const TABLE: Table = Table::Sessions;

    fn key(&self) -> Vec<u8> {
        Self::key_for(self.account, self.id)
    }

    fn owner(&self) -> AccountId {
        self.account
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Purchase {
    pub id: PurchaseId,
    pub account: AccountId,
    pub boost_level: u32,
    /// Multiplier granted by the purchased level, in basis points
    pub boost_amount_bps: u64,
    pub price: Amount,
    pub purchase_date: Timestamp,
    pub is_active: bool,
}

impl Record for Purchase {
    const TABLE: Table = Table::Purchases;

    fn key(&self) -> Vec<u8> {
        compound_key(self.account, &self.id.0.to_be_bytes())
    }

    fn owner(&self) -> AccountId {
        self.account
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExchangeStatus {
    Pending,
    Completed,
    Failed,
}

impl fmt::Display for ExchangeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exchange {
    pub code: String,
    pub account: AccountId,
    /// Global sequence number, also the per-account key suffix
    pub seq: u64,
    pub zmt_amount: Amount,
    pub external_amount: Amount,
    pub fee_amount: Amount,
    pub rate_ppm: u64,
    pub status: ExchangeStatus,
    pub created_at: Timestamp,
    pub settled_at: Option<Timestamp>,
}

impl Exchange {
    pub fn key_for(account: AccountId, seq: u64) -> Vec<u8> {
        compound_key(account, &seq.to_be_bytes())
    }
}

impl Record for Exchange {
    const TABLE: Table = Table::Exchanges;

    fn key(&self) -> Vec<u8> {
        Self::key_for(self.account, self.seq)
    }

    fn owner(&self) -> AccountId {
        self.account
    }
}

/// How often a task pays out.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskCadence {
    /// Once per calendar day
    #[default]
    Daily,
    /// Once per account, ever
    Once,
}

impl fmt::Display for TaskCadence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            Self::Daily => "daily",
            Self::Once => "once",
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyTask {
    pub account: AccountId,
    pub task_type: String,
    pub cadence: TaskCadence,
    pub reward_amount: Amount,
    pub completed_date: NaiveDate,
    pub is_claimed: bool,
}

/// Day slot used by one-time tasks; no calendar date maps to it.
const ONCE_DAY_SLOT: u32 = 0;

impl DailyTask {
    /// `account || day || task_type`
    pub fn key_for(account: AccountId, day: NaiveDate, task_type: &str) -> Vec<u8> {
        Self::slot_key(account, day.num_days_from_ce() as u32, task_type)
    }

    /// `account || 0 || task_type`
    pub fn once_key_for(account: AccountId, task_type: &str) -> Vec<u8> {
        Self::slot_key(account, ONCE_DAY_SLOT, task_type)
    }

    /// Key of the claim a task of this cadence would occupy on `day`.
    pub fn claim_key(
        account: AccountId,
        cadence: TaskCadence,
        day: NaiveDate,
        task_type: &str,
    ) -> Vec<u8> {
        match cadence {
            TaskCadence::Daily => Self::key_for(account, day, task_type),
            TaskCadence::Once => Self::once_key_for(account, task_type),
        }
    }

    fn slot_key(account: AccountId, slot: u32, task_type: &str) -> Vec<u8> {
        let mut suffix = slot.to_be_bytes().to_vec();
        suffix.extend_from_slice(task_type.as_bytes());
        compound_key(account, &suffix)
    }
}

impl Record for DailyTask {
    const TABLE: Table = Table::DailyTasks;

    fn key(&self) -> Vec<u8> {
        Self::claim_key(self.account, self.cadence, self.completed_date, &self.task_type)
    }

    fn owner(&self) -> AccountId {
        self.account
    }
}

/// One per referred account, ever.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferralReward {
    pub referrer: AccountId,
    pub referred: AccountId,
    pub reward_amount: Amount,
    pub created_at: Timestamp,
    pub is_claimed: bool,
}

impl ReferralReward {
    pub fn key_for(referred: AccountId) -> Vec<u8> {
        referred.to_key().to_vec()
    }
}

impl Record for ReferralReward {
    const TABLE: Table = Table::ReferralRewards;

    fn key(&self) -> Vec<u8> {
        Self::key_for(self.referred)
    }

    fn owner(&self) -> AccountId {
        self.referrer
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Credit,
    Debit,
}

/// Why a balance moved.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reason {
    MiningClaim(SessionId),
    BoostPurchase(PurchaseId),
    ReferralBonus(AccountId),
    DailyTask(String),
    ExchangeDebit(String),
    ExchangeRefund(String),
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MiningClaim(id) => write!(f, "mining claim (session {})", id),
            Self::BoostPurchase(id) => write!(f, "boost purchase #{}", id.0),
            Self::ReferralBonus(referred) => write!(f, "referral bonus (account {})", referred),
            Self::DailyTask(task) => write!(f, "daily task {}", task),
            Self::ExchangeDebit(code) => write!(f, "exchange {}", code),
            Self::ExchangeRefund(code) => write!(f, "exchange refund {}", code),
        }
    }
}

/// Append-only record of a single balance change.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub seq: u64,
    pub account: AccountId,
    pub kind: EntryKind,
    pub amount: Amount,
    pub reason: Reason,
    pub balance_after: Amount,
    pub at: Timestamp,
}

impl Record for AuditEntry {
    const TABLE: Table = Table::Audit;

    fn key(&self) -> Vec<u8> {
        compound_key(self.account, &self.seq.to_be_bytes())
    }

    fn owner(&self) -> AccountId {
        self.account
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_records_share_prefix() {
        let account = AccountId(42);
        let session = MiningSession::key_for(account, SessionId(7));
        let exchange = Exchange::key_for(account, 9);
        let day = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let task = DailyTask::key_for(account, day, "daily_login");

        for key in [&session, &exchange, &task] {
            assert!(key.starts_with(&account.to_key()));
        }
        assert!(!session.starts_with(&AccountId(43).to_key()));
    }

    #[test]
    fn test_task_keys_order_by_day() {
        let account = AccountId(1);
        let monday = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        let tuesday = monday.succ_opt().unwrap();
        assert!(
            DailyTask::key_for(account, monday, "zzz") < DailyTask::key_for(account, tuesday, "aaa")
        );
    }

    #[test]
    fn test_once_tasks_ignore_the_day() {
        let account = AccountId(1);
        let monday = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        let tuesday = monday.succ_opt().unwrap();

        let once = |day| DailyTask::claim_key(account, TaskCadence::Once, day, "telegram_join");
        let daily = |day| DailyTask::claim_key(account, TaskCadence::Daily, day, "telegram_join");
        assert_eq!(once(monday), once(tuesday));
        assert_ne!(daily(monday), daily(tuesday));
        assert_ne!(once(monday), daily(monday));
        assert!(once(monday).starts_with(&account.to_key()));
    }
}
