// Copyright (c) 2024 Botho Foundation

//! Account ledger: the only writer of account balances.
//!
//! Every read-modify-write against an account runs inside
//! [`Ledger::with_lock`] (or [`Ledger::with_locks`] for operations spanning
//! two accounts). A critical section holds the per-account mutexes in
//! ascending id order and exactly one LMDB write transaction; the transaction
//! commits only if the closure returns `Ok`, so an operation either lands in
//! full or not at all.

mod records;
mod store;

pub use records::{
    Account, AccountId, AuditEntry, DailyTask, EntryKind, Exchange, ExchangeStatus, MiningSession,
    Purchase, PurchaseId, Reason, Record, ReferralReward, SessionId, Table, TaskCadence, Timestamp,
};
pub(crate) use store::{META_NEXT_EXCHANGE, META_NEXT_PURCHASE, META_NEXT_SESSION};

use chrono::NaiveDate;
use dashmap::DashMap;
use lmdb::{RwTransaction, Transaction};
use parking_lot::Mutex;
use std::{
    collections::BTreeSet,
    path::Path,
    sync::Arc,
    thread,
    time::Duration,
};
use tracing::{debug, warn};
use zmt_rewards::Amount;

use crate::{clock::Clock, config::LedgerConfig, error::EngineError};
use store::{Store, META_NEXT_ACCOUNT, META_NEXT_AUDIT};

/// LMDB-backed account ledger with per-account critical sections.
pub struct Ledger {
    store: Store,
    locks: DashMap<AccountId, Arc<Mutex<()>>>,
    clock: Arc<dyn Clock>,
    config: LedgerConfig,
}

impl Ledger {
    /// Open or create a ledger in the given directory.
    pub fn open(
        path: &Path,
        config: LedgerConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, EngineError> {
        let map_size = (config.map_size_mb as usize).saturating_mul(1024 * 1024);
        let store = Store::open(path, map_size)?;
        Ok(Self {
            store,
            locks: DashMap::new(),
            clock,
            config,
        })
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Run `f` inside the critical section of one account.
    pub fn with_lock<T, F>(&self, id: AccountId, f: F) -> Result<T, EngineError>
    where
        F: FnMut(&mut LedgerTxn<'_>) -> Result<T, EngineError>,
    {
        self.with_locks(&[id], f)
    }

    /// Run `f` holding the critical sections of every listed account.
    ///
    /// Locks are taken in ascending id order. Storage and lock-timeout
    /// failures are retried up to `max_retries` times; business errors are
    /// returned on first occurrence. `f` may therefore run more than once and
    /// must not have effects outside the transaction it is handed.
    pub fn with_locks<T, F>(&self, ids: &[AccountId], mut f: F) -> Result<T, EngineError>
    where
        F: FnMut(&mut LedgerTxn<'_>) -> Result<T, EngineError>,
    {
        let mut attempt = 0u32;
        loop {
            match self.try_critical_section(ids, &mut f) {
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    attempt += 1;
                    warn!(
                        attempt,
                        max_retries = self.config.max_retries,
                        error = %e,
                        "Retrying ledger critical section"
                    );
                    thread::sleep(Duration::from_millis(
                        self.config.retry_backoff_ms.saturating_mul(attempt as u64),
                    ));
                }
                result => return result,
            }
        }
    }

    fn try_critical_section<T, F>(&self, ids: &[AccountId], f: &mut F) -> Result<T, EngineError>
    where
        F: FnMut(&mut LedgerTxn<'_>) -> Result<T, EngineError>,
    {
        let held: BTreeSet<AccountId> = ids.iter().copied().collect();

        // Clone the handles out of the map so no shard lock is held while waiting
        let handles: Vec<Arc<Mutex<()>>> = held
            .iter()
            .map(|id| self.locks.entry(*id).or_default().clone())
            .collect();

        let timeout = Duration::from_millis(self.config.lock_timeout_ms);
        let mut guards = Vec::with_capacity(handles.len());
        for (id, handle) in held.iter().zip(&handles) {
            let guard = handle.try_lock_for(timeout).ok_or_else(|| {
                EngineError::StorageUnavailable(format!("timed out locking account {}", id))
            })?;
            guards.push(guard);
        }

        let mut txn = LedgerTxn {
            store: &self.store,
            txn: self.store.begin_rw()?,
            held,
            now: self.clock.now(),
            today: self.clock.today(),
        };
        let out = f(&mut txn)?;
        txn.txn.commit()?;
        drop(guards);
        Ok(out)
    }

    /// Read an account without taking its lock.
    pub fn account(&self, id: AccountId) -> Result<Account, EngineError> {
        let txn = self.store.begin_ro()?;
        self.store
            .get(&txn, &Account::key_for(id))?
            .ok_or(EngineError::AccountNotFound(id))
    }

    pub fn account_by_username(&self, username: &str) -> Result<Option<AccountId>, EngineError> {
        let txn = self.store.begin_ro()?;
        Ok(self.store.username_owner(&txn, username)?.map(AccountId))
    }

    pub fn account_by_referral_code(&self, code: &str) -> Result<Option<AccountId>, EngineError> {
        let txn = self.store.begin_ro()?;
        Ok(self.store.referral_code_owner(&txn, code)?.map(AccountId))
    }

    /// Read a single record by key.
    pub fn get<T: Record>(&self, key: &[u8]) -> Result<Option<T>, EngineError> {
        let txn = self.store.begin_ro()?;
        self.store.get(&txn, key)
    }

    /// All records of type `T` owned by (keyed under) an account.
    pub fn records_of<T: Record>(&self, id: AccountId) -> Result<Vec<T>, EngineError> {
        let txn = self.store.begin_ro()?;
        self.store.scan_prefix(&txn, &id.to_key())
    }

    /// Every record of type `T`.
    pub fn all<T: Record>(&self) -> Result<Vec<T>, EngineError> {
        let txn = self.store.begin_ro()?;
        self.store.scan_all(&txn)
    }

    /// Balance changes of an account, oldest first.
    pub fn audit_trail(&self, id: AccountId) -> Result<Vec<AuditEntry>, EngineError> {
        self.records_of(id)
    }

    pub fn exchange_by_code(&self, code: &str) -> Result<Option<Exchange>, EngineError> {
        let txn = self.store.begin_ro()?;
        match self.store.exchange_key(&txn, code)? {
            Some(key) => self.store.get(&txn, &key),
            None => Ok(None),
        }
    }
}

/// Fields needed to create an account.
#[derive(Clone, Debug)]
pub struct NewAccount {
    pub username: String,
    pub referral_code: String,
    pub mining_rate: Amount,
}

/// A consistent view of the ledger inside a critical section.
///
/// Reads see the transaction's own writes. Writes to records owned by an
/// account whose lock is not held fail with [`EngineError::LockNotHeld`].
pub struct LedgerTxn<'a> {
    store: &'a Store,
    txn: RwTransaction<'a>,
    held: BTreeSet<AccountId>,
    now: Timestamp,
    today: NaiveDate,
}

impl<'a> LedgerTxn<'a> {
    /// Clock reading taken when the critical section was entered.
    pub fn now(&self) -> Timestamp {
        self.now
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }

    pub fn holds(&self, id: AccountId) -> bool {
        self.held.contains(&id)
    }

    fn ensure_held(&self, id: AccountId) -> Result<(), EngineError> {
        if self.holds(id) {
            Ok(())
        } else {
            Err(EngineError::LockNotHeld(id))
        }
    }

    pub fn account(&self, id: AccountId) -> Result<Account, EngineError> {
        self.store
            .get(&self.txn, &Account::key_for(id))?
            .ok_or(EngineError::AccountNotFound(id))
    }

    pub fn get<T: Record>(&self, key: &[u8]) -> Result<Option<T>, EngineError> {
        self.store.get(&self.txn, key)
    }

    /// Write a record. Balance changes must go through `credit`/`debit`,
    /// so an account write keeps the stored balance.
    pub fn put<T: Record>(&mut self, record: &T) -> Result<(), EngineError> {
        self.ensure_held(record.owner())?;
        self.store.put(&mut self.txn, record)
    }

    /// Persist non-balance account fields.
    pub fn put_account(&mut self, account: &Account) -> Result<(), EngineError> {
        let stored = self.account(account.id)?;
        let mut updated = account.clone();
        updated.balance = stored.balance;
        self.put(&updated)
    }

    pub fn next_id(&mut self, counter: &[u8]) -> Result<u64, EngineError> {
        self.store.next_counter(&mut self.txn, counter)
    }

    /// Increase a balance and append to the audit trail. Returns the new balance.
    pub fn credit(
        &mut self,
        id: AccountId,
        amount: Amount,
        reason: Reason,
    ) -> Result<Amount, EngineError> {
        if amount.is_zero() {
            return Err(EngineError::InvalidAmount);
        }
        self.ensure_held(id)?;
        let mut account = self.account(id)?;
        account.balance = account
            .balance
            .checked_add(amount)
            .ok_or(EngineError::InvalidAmount)?;
        self.store.put(&mut self.txn, &account)?;
        self.append_audit(id, EntryKind::Credit, amount, reason, account.balance)?;
        Ok(account.balance)
    }

    /// Decrease a balance and append to the audit trail. Returns the new balance.
    pub fn debit(
        &mut self,
        id: AccountId,
        amount: Amount,
        reason: Reason,
    ) -> Result<Amount, EngineError> {
        if amount.is_zero() {
            return Err(EngineError::InvalidAmount);
        }
        self.ensure_held(id)?;
        let mut account = self.account(id)?;
        account.balance = account.balance.checked_sub(amount).ok_or(
            EngineError::InsufficientBalance {
                available: account.balance,
                requested: amount,
            },
        )?;
        self.store.put(&mut self.txn, &account)?;
        self.append_audit(id, EntryKind::Debit, amount, reason, account.balance)?;
        Ok(account.balance)
    }

    fn append_audit(
        &mut self,
        account: AccountId,
        kind: EntryKind,
        amount: Amount,
        reason: Reason,
        balance_after: Amount,
    ) -> Result<(), EngineError> {
        let seq = self.next_id(META_NEXT_AUDIT)?;
        debug!(%account, ?kind, %amount, %reason, %balance_after, "Ledger entry");
        let entry = AuditEntry {
            seq,
            account,
            kind,
            amount,
            reason,
            balance_after,
            at: self.now,
        };
        self.store.put(&mut self.txn, &entry)
    }

    /// Create an account. The new account counts as locked for the rest of
    /// the critical section; it is invisible to others until commit.
    ///
    /// Fails with `UsernameTaken` if the username is registered. A taken
    /// referral code gets a numeric suffix.
    pub fn create_account(&mut self, new: NewAccount) -> Result<Account, EngineError> {
        if self.store.username_owner(&self.txn, &new.username)?.is_some() {
            return Err(EngineError::UsernameTaken(new.username));
        }

        let id = AccountId(self.next_id(META_NEXT_ACCOUNT)?);
        if !self.store.claim_username(&mut self.txn, &new.username, id.0)? {
            return Err(EngineError::UsernameTaken(new.username));
        }

        let mut referral_code = new.referral_code.clone();
        let mut suffix = 1u32;
        while !self.store.claim_referral_code(&mut self.txn, &referral_code, id.0)? {
            suffix += 1;
            referral_code = format!("{}{}", new.referral_code, suffix);
        }

        let account = Account {
            id,
            username: new.username,
            referral_code,
            referred_by: None,
            balance: Amount::ZERO,
            mining_rate: new.mining_rate,
            boost_level: 0,
            is_mining: false,
            active_session: None,
            mining_started_at: None,
            last_claim_time: None,
            total_mined: Amount::ZERO,
            total_referrals: 0,
            referral_earnings: Amount::ZERO,
            login_streak: 0,
            last_login_date: None,
            created_at: self.now,
        };
        self.held.insert(id);
        self.store.put(&mut self.txn, &account)?;
        Ok(account)
    }

    pub fn account_by_referral_code(&self, code: &str) -> Result<Option<AccountId>, EngineError> {
        Ok(self.store.referral_code_owner(&self.txn, code)?.map(AccountId))
    }

    pub fn exchange_by_code(&self, code: &str) -> Result<Option<Exchange>, EngineError> {
        match self.store.exchange_key(&self.txn, code)? {
            Some(key) => self.store.get(&self.txn, &key),
            None => Ok(None),
        }
    }

    /// Store a new exchange and index its code. A code collision is reported
    /// as a retryable storage failure so the whole section reruns.
    pub fn insert_exchange(&mut self, exchange: &Exchange) -> Result<(), EngineError> {
        self.ensure_held(exchange.account)?;
        let key = exchange.key();
        if !self.store.claim_exchange_code(&mut self.txn, &exchange.code, &key)? {
            return Err(EngineError::StorageUnavailable(format!(
                "exchange code collision: {}",
                exchange.code
            )));
        }
        self.store.put(&mut self.txn, exchange)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use tempfile::tempdir;

    fn open_ledger(dir: &Path) -> Ledger {
        let clock = Arc::new(ManualClock::new(1_000));
        Ledger::open(dir, LedgerConfig::default(), clock).unwrap()
    }

    fn register(ledger: &Ledger, name: &str) -> AccountId {
        ledger
            .with_locks(&[], |txn| {
                txn.create_account(NewAccount {
                    username: name.to_string(),
                    referral_code: format!("ZMT{}", name.to_uppercase()),
                    mining_rate: Amount::from_picos(1_000_000),
                })
            })
            .unwrap()
            .id
    }

    #[test]
    fn test_credit_and_debit() {
        let dir = tempdir().unwrap();
        let ledger = open_ledger(dir.path());
        let alice = register(&ledger, "alice");

        let reason = Reason::DailyTask("daily_login".into());
        let balance = ledger
            .with_lock(alice, |txn| txn.credit(alice, Amount::from_zmt(5), reason.clone()))
            .unwrap();
        assert_eq!(balance, Amount::from_zmt(5));

        let balance = ledger
            .with_lock(alice, |txn| {
                txn.debit(alice, Amount::from_zmt(2), Reason::ExchangeDebit("X".into()))
            })
            .unwrap();
        assert_eq!(balance, Amount::from_zmt(3));
        assert_eq!(ledger.account(alice).unwrap().balance, Amount::from_zmt(3));
    }

    #[test]
    fn test_invalid_amounts_rejected() {
        let dir = tempdir().unwrap();
        let ledger = open_ledger(dir.path());
        let alice = register(&ledger, "alice");

        let err = ledger
            .with_lock(alice, |txn| txn.credit(alice, Amount::ZERO, Reason::DailyTask("t".into())))
            .unwrap_err();
        assert_eq!(err, EngineError::InvalidAmount);

        let err = ledger
            .with_lock(alice, |txn| {
                txn.debit(alice, Amount::from_picos(1), Reason::ExchangeDebit("X".into()))
            })
            .unwrap_err();
        assert!(matches!(err, EngineError::InsufficientBalance { .. }));
        assert_eq!(ledger.account(alice).unwrap().balance, Amount::ZERO);
    }

    #[test]
    fn test_failed_section_rolls_back() {
        let dir = tempdir().unwrap();
        let ledger = open_ledger(dir.path());
        let alice = register(&ledger, "alice");

        let result: Result<(), _> = ledger.with_lock(alice, |txn| {
            txn.credit(alice, Amount::from_zmt(10), Reason::DailyTask("t".into()))?;
            Err(EngineError::AlreadyClaimedToday("t".into()))
        });
        assert!(result.is_err());

        assert_eq!(ledger.account(alice).unwrap().balance, Amount::ZERO);
        assert!(ledger.audit_trail(alice).unwrap().is_empty());
    }

    #[test]
    fn test_unlocked_account_cannot_be_mutated() {
        let dir = tempdir().unwrap();
        let ledger = open_ledger(dir.path());
        let alice = register(&ledger, "alice");
        let bob = register(&ledger, "bob");

        let err = ledger
            .with_lock(alice, |txn| {
                txn.credit(bob, Amount::from_zmt(1), Reason::DailyTask("t".into()))
            })
            .unwrap_err();
        assert_eq!(err, EngineError::LockNotHeld(bob));
    }

    #[test]
    fn test_put_account_preserves_balance() {
        let dir = tempdir().unwrap();
        let ledger = open_ledger(dir.path());
        let alice = register(&ledger, "alice");

        ledger
            .with_lock(alice, |txn| {
                let mut stale = txn.account(alice)?;
                txn.credit(alice, Amount::from_zmt(4), Reason::DailyTask("t".into()))?;
                stale.login_streak = 9;
                txn.put_account(&stale)
            })
            .unwrap();

        let account = ledger.account(alice).unwrap();
        assert_eq!(account.balance, Amount::from_zmt(4));
        assert_eq!(account.login_streak, 9);
    }

    #[test]
    fn test_audit_trail_records_every_change() {
        let dir = tempdir().unwrap();
        let ledger = open_ledger(dir.path());
        let alice = register(&ledger, "alice");

        ledger
            .with_lock(alice, |txn| {
                txn.credit(alice, Amount::from_zmt(3), Reason::DailyTask("a".into()))?;
                txn.debit(alice, Amount::from_zmt(1), Reason::ExchangeDebit("X".into()))
            })
            .unwrap();

        let trail = ledger.audit_trail(alice).unwrap();
        assert_eq!(trail.len(), 2);
        assert_eq!(trail[0].kind, EntryKind::Credit);
        assert_eq!(trail[1].kind, EntryKind::Debit);
        assert_eq!(trail[1].balance_after, Amount::from_zmt(2));
        assert_eq!(trail[1].at, 1_000);
    }

    #[test]
    fn test_duplicate_username_and_code_suffix() {
        let dir = tempdir().unwrap();
        let ledger = open_ledger(dir.path());
        register(&ledger, "alice");

        let err = ledger
            .with_locks(&[], |txn| {
                txn.create_account(NewAccount {
                    username: "ALICE".into(),
                    referral_code: "ZMTALICE".into(),
                    mining_rate: Amount::from_picos(1),
                })
            })
            .unwrap_err();
        assert_eq!(err, EngineError::UsernameTaken("ALICE".into()));

        let other = ledger
            .with_locks(&[], |txn| {
                txn.create_account(NewAccount {
                    username: "alice2".into(),
                    referral_code: "ZMTALICE".into(),
                    mining_rate: Amount::from_picos(1),
                })
            })
            .unwrap();
        assert_eq!(other.referral_code, "ZMTALICE2");
    }

    #[test]
    fn test_lock_timeout_is_storage_unavailable() {
        let dir = tempdir().unwrap();
        let clock = Arc::new(ManualClock::new(0));
        let config = LedgerConfig {
            lock_timeout_ms: 10,
            max_retries: 1,
            retry_backoff_ms: 1,
            ..LedgerConfig::default()
        };
        let ledger = Arc::new(Ledger::open(dir.path(), config, clock).unwrap());
        let alice = register(&ledger, "alice");

        let (entered_tx, entered_rx) = std::sync::mpsc::channel();
        let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();
        let holder = {
            let ledger = ledger.clone();
            thread::spawn(move || {
                let handle = ledger.locks.entry(alice).or_default().clone();
                let _guard = handle.lock();
                entered_tx.send(()).unwrap();
                release_rx.recv().unwrap();
            })
        };
        entered_rx.recv().unwrap();

        let err = ledger.with_lock(alice, |txn| txn.account(alice)).unwrap_err();
        assert!(err.is_retryable());

        release_tx.send(()).unwrap();
        holder.join().unwrap();
        assert!(ledger.with_lock(alice, |txn| txn.account(alice)).is_ok());
    }

    #[test]
    fn test_retry_commits_once_contention_clears() {
        let dir = tempdir().unwrap();
        let clock = Arc::new(ManualClock::new(0));
        let config = LedgerConfig {
            lock_timeout_ms: 10,
            max_retries: 5,
            retry_backoff_ms: 10,
            ..LedgerConfig::default()
        };
        let ledger = Arc::new(Ledger::open(dir.path(), config, clock).unwrap());
        let alice = register(&ledger, "alice");

        let (entered_tx, entered_rx) = std::sync::mpsc::channel();
        let holder = {
            let ledger = ledger.clone();
            thread::spawn(move || {
                let handle = ledger.locks.entry(alice).or_default().clone();
                let _guard = handle.lock();
                entered_tx.send(()).unwrap();
                thread::sleep(Duration::from_millis(40));
            })
        };
        entered_rx.recv().unwrap();

        // First attempts time out; a later one gets the lock and commits
        let mut runs = 0;
        let balance = ledger
            .with_lock(alice, |txn| {
                runs += 1;
                txn.credit(alice, Amount::from_zmt(5), Reason::DailyTask("t".into()))
            })
            .unwrap();
        holder.join().unwrap();

        assert_eq!(balance, Amount::from_zmt(5));
        assert_eq!(runs, 1);
        assert_eq!(ledger.account(alice).unwrap().balance, Amount::from_zmt(5));
        assert_eq!(ledger.audit_trail(alice).unwrap().len(), 1);
    }
}
