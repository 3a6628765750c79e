// Copyright (c) 2024 Botho Foundation

use lmdb::{
    Cursor, Database, DatabaseFlags, Environment, EnvironmentFlags, RwTransaction, Transaction,
    WriteFlags,
};
use std::fs;
use std::path::Path;
use tracing::info;

use super::records::{Record, Table};
use crate::error::EngineError;

// Metadata keys for monotonic counters
pub(crate) const META_NEXT_ACCOUNT: &[u8] = b"next_account";
pub(crate) const META_NEXT_SESSION: &[u8] = b"next_session";
pub(crate) const META_NEXT_PURCHASE: &[u8] = b"next_purchase";
pub(crate) const META_NEXT_EXCHANGE: &[u8] = b"next_exchange";
pub(crate) const META_NEXT_AUDIT: &[u8] = b"next_audit";

/// LMDB-backed record storage
pub struct Store {
    env: Environment,
    /// meta: counter name -> u64 (8 bytes LE)
    meta_db: Database,
    /// accounts: AccountId -> Account
    accounts_db: Database,
    /// usernames: lowercase username -> AccountId
    usernames_db: Database,
    /// referral_codes: code -> AccountId
    referral_codes_db: Database,
    /// sessions: (AccountId, SessionId) -> MiningSession
    sessions_db: Database,
    /// purchases: (AccountId, PurchaseId) -> Purchase
    purchases_db: Database,
    /// exchanges: (AccountId, seq) -> Exchange
    exchanges_db: Database,
    /// exchange_codes: code -> exchanges key (16 bytes)
    exchange_codes_db: Database,
    /// daily_tasks: (AccountId, day, task_type) -> DailyTask
    daily_tasks_db: Database,
    /// referral_rewards: referred AccountId -> ReferralReward
    referral_rewards_db: Database,
    /// audit: (AccountId, seq) -> AuditEntry
    audit_db: Database,
}

impl Store {
    /// Open or create the store inside `path`.
    pub fn open(path: &Path, map_size: usize) -> Result<Self, EngineError> {
        fs::create_dir_all(path).map_err(|e| {
            EngineError::StorageUnavailable(format!(
                "failed to create {}: {}",
                path.display(),
                e
            ))
        })?;

        let env = Environment::new()
            .set_flags(EnvironmentFlags::NO_SUB_DIR)
            .set_max_dbs(11)
            .set_map_size(map_size)
            .open(&path.join("ledger.mdb"))?;

        let create = |name: &str| env.create_db(Some(name), DatabaseFlags::empty());
        let meta_db = create("meta")?;
        let accounts_db = create("accounts")?;
        let usernames_db = create("usernames")?;
        let referral_codes_db = create("referral_codes")?;
        let sessions_db = create("sessions")?;
        let purchases_db = create("purchases")?;
        let exchanges_db = create("exchanges")?;
        let exchange_codes_db = create("exchange_codes")?;
        let daily_tasks_db = create("daily_tasks")?;
        let referral_rewards_db = create("referral_rewards")?;
        let audit_db = create("audit")?;

        info!(path = %path.display(), "Opened ZMT ledger store");

        Ok(Self {
            env,
            meta_db,
            accounts_db,
            usernames_db,
            referral_codes_db,
            sessions_db,
            purchases_db,
            exchanges_db,
            exchange_codes_db,
            daily_tasks_db,
            referral_rewards_db,
            audit_db,
        })
    }

    pub fn begin_ro(&self) -> Result<lmdb::RoTransaction<'_>, EngineError> {
        Ok(self.env.begin_ro_txn()?)
    }

    pub fn begin_rw(&self) -> Result<RwTransaction<'_>, EngineError> {
        Ok(self.env.begin_rw_txn()?)
    }

    fn table(&self, table: Table) -> Database {
        match table {
            Table::Accounts => self.accounts_db,
            Table::Sessions => self.sessions_db,
            Table::Purchases => self.purchases_db,
            Table::Exchanges => self.exchanges_db,
            Table::DailyTasks => self.daily_tasks_db,
            Table::ReferralRewards => self.referral_rewards_db,
            Table::Audit => self.audit_db,
        }
    }

    /// Fetch and decode a record by key.
    pub fn get<T: Record>(
        &self,
        txn: &impl Transaction,
        key: &[u8],
    ) -> Result<Option<T>, EngineError> {
        match txn.get(self.table(T::TABLE), &key) {
            Ok(bytes) => Ok(Some(bincode::deserialize(bytes)?)),
            Err(lmdb::Error::NotFound) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Encode and write a record, replacing any previous value.
    pub fn put<T: Record>(
        &self,
        txn: &mut RwTransaction<'_>,
        record: &T,
    ) -> Result<(), EngineError> {
        let bytes = bincode::serialize(record)?;
        txn.put(
            self.table(T::TABLE),
            &record.key(),
            &bytes,
            WriteFlags::empty(),
        )?;
        Ok(())
    }

    /// All records of type `T` whose key starts with `prefix`, in key order.
    pub fn scan_prefix<T: Record>(
        &self,
        txn: &impl Transaction,
        prefix: &[u8],
    ) -> Result<Vec<T>, EngineError> {
        let mut cursor = txn.open_ro_cursor(self.table(T::TABLE))?;
        let mut records = Vec::new();

        for item in cursor.iter_from(prefix) {
            let (key, value) = match item {
                Ok(kv) => kv,
                Err(lmdb::Error::NotFound) => break,
                Err(e) => return Err(e.into()),
            };
            if !key.starts_with(prefix) {
                break;
            }
            records.push(bincode::deserialize(value)?);
        }

        Ok(records)
    }

    /// Every record of type `T`, in key order.
    pub fn scan_all<T: Record>(&self, txn: &impl Transaction) -> Result<Vec<T>, EngineError> {
        let mut cursor = txn.open_ro_cursor(self.table(T::TABLE))?;
        let mut records = Vec::new();

        for item in cursor.iter_start() {
            let (_, value) = item?;
            records.push(bincode::deserialize(value)?);
        }

        Ok(records)
    }

    /// Read a counter and advance it. Counters start at 1.
    pub fn next_counter(
        &self,
        txn: &mut RwTransaction<'_>,
        name: &[u8],
    ) -> Result<u64, EngineError> {
        let current = match txn.get(self.meta_db, &name) {
            Ok(bytes) => {
                let raw: [u8; 8] = bytes.try_into().map_err(|_| {
                    EngineError::Corrupt(format!(
                        "counter {} is not 8 bytes",
                        String::from_utf8_lossy(name)
                    ))
                })?;
                u64::from_le_bytes(raw)
            }
            Err(lmdb::Error::NotFound) => 0,
            Err(e) => return Err(e.into()),
        };
        let next = current.checked_add(1).ok_or_else(|| {
            EngineError::Corrupt(format!("counter {} exhausted", String::from_utf8_lossy(name)))
        })?;
        txn.put(self.meta_db, &name, &next.to_le_bytes(), WriteFlags::empty())?;
        Ok(next)
    }

    fn lookup_id(
        &self,
        txn: &impl Transaction,
        db: Database,
        key: &[u8],
    ) -> Result<Option<u64>, EngineError> {
        match txn.get(db, &key) {
            Ok(bytes) => {
                let raw: [u8; 8] = bytes
                    .try_into()
                    .map_err(|_| EngineError::Corrupt("index entry is not 8 bytes".into()))?;
                Ok(Some(u64::from_be_bytes(raw)))
            }
            Err(lmdb::Error::NotFound) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Insert a unique index entry. Returns `false` if the key already exists.
    fn insert_unique(
        &self,
        txn: &mut RwTransaction<'_>,
        db: Database,
        key: &[u8],
        value: &[u8],
    ) -> Result<bool, EngineError> {
        match txn.put(db, &key, &value, WriteFlags::NO_OVERWRITE) {
            Ok(()) => Ok(true),
            Err(lmdb::Error::KeyExist) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    pub fn username_owner(
        &self,
        txn: &impl Transaction,
        username: &str,
    ) -> Result<Option<u64>, EngineError> {
        self.lookup_id(txn, self.usernames_db, username.to_lowercase().as_bytes())
    }

    pub fn claim_username(
        &self,
        txn: &mut RwTransaction<'_>,
        username: &str,
        id: u64,
    ) -> Result<bool, EngineError> {
        let db = self.usernames_db;
        self.insert_unique(txn, db, username.to_lowercase().as_bytes(), &id.to_be_bytes())
    }

    pub fn referral_code_owner(
        &self,
        txn: &impl Transaction,
        code: &str,
    ) -> Result<Option<u64>, EngineError> {
        self.lookup_id(txn, self.referral_codes_db, code.as_bytes())
    }

    pub fn claim_referral_code(
        &self,
        txn: &mut RwTransaction<'_>,
        code: &str,
        id: u64,
    ) -> Result<bool, EngineError> {
        let db = self.referral_codes_db;
        self.insert_unique(txn, db, code.as_bytes(), &id.to_be_bytes())
    }

    /// Key of the exchange record registered under `code`.
    pub fn exchange_key(
        &self,
        txn: &impl Transaction,
        code: &str,
    ) -> Result<Option<Vec<u8>>, EngineError> {
        match txn.get(self.exchange_codes_db, &code.as_bytes()) {
            Ok(bytes) => Ok(Some(bytes.to_vec())),
            Err(lmdb::Error::NotFound) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn claim_exchange_code(
        &self,
        txn: &mut RwTransaction<'_>,
        code: &str,
        exchange_key: &[u8],
    ) -> Result<bool, EngineError> {
        let db = self.exchange_codes_db;
        self.insert_unique(txn, db, code.as_bytes(), exchange_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::records::{Account, AccountId};
    use tempfile::tempdir;
    use zmt_rewards::Amount;

    fn account(id: u64) -> Account {
        Account {
            id: AccountId(id),
            username: format!("user{}", id),
            referral_code: format!("ZMTUSER{}", id),
            referred_by: None,
            balance: Amount::ZERO,
            mining_rate: Amount::from_picos(1_000_000),
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
            created_at: 0,
        }
    }

    #[test]
    fn test_put_get_and_scan() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path(), 16 * 1024 * 1024).unwrap();

        let mut txn = store.begin_rw().unwrap();
        for id in 1..=3 {
            store.put(&mut txn, &account(id)).unwrap();
        }
        txn.commit().unwrap();

        let txn = store.begin_ro().unwrap();
        let loaded: Account = store.get(&txn, &Account::key_for(AccountId(2))).unwrap().unwrap();
        assert_eq!(loaded.username, "user2");
        assert!(store.get::<Account>(&txn, &Account::key_for(AccountId(9))).unwrap().is_none());

        let all: Vec<Account> = store.scan_all(&txn).unwrap();
        assert_eq!(all.len(), 3);
        let one: Vec<Account> = store.scan_prefix(&txn, &AccountId(3).to_key()).unwrap();
        assert_eq!(one.len(), 1);
        let none: Vec<Account> = store.scan_prefix(&txn, &AccountId(7).to_key()).unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn test_counters_advance_only_on_commit() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path(), 16 * 1024 * 1024).unwrap();

        let mut txn = store.begin_rw().unwrap();
        assert_eq!(store.next_counter(&mut txn, META_NEXT_ACCOUNT).unwrap(), 1);
        assert_eq!(store.next_counter(&mut txn, META_NEXT_ACCOUNT).unwrap(), 2);
        txn.commit().unwrap();

        let mut txn = store.begin_rw().unwrap();
        assert_eq!(store.next_counter(&mut txn, META_NEXT_ACCOUNT).unwrap(), 3);
        txn.abort();

        let mut txn = store.begin_rw().unwrap();
        assert_eq!(store.next_counter(&mut txn, META_NEXT_ACCOUNT).unwrap(), 3);
        assert_eq!(store.next_counter(&mut txn, META_NEXT_SESSION).unwrap(), 1);
    }

    #[test]
    fn test_malformed_counter_is_corrupt() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path(), 16 * 1024 * 1024).unwrap();

        let mut txn = store.begin_rw().unwrap();
        txn.put(store.meta_db, &META_NEXT_AUDIT, &[1u8, 2, 3], WriteFlags::empty()).unwrap();
        assert!(matches!(
            store.next_counter(&mut txn, META_NEXT_AUDIT),
            Err(EngineError::Corrupt(_))
        ));

        txn.put(
            store.meta_db,
            &META_NEXT_SESSION,
            &u64::MAX.to_le_bytes(),
            WriteFlags::empty(),
        )
        .unwrap();
        assert!(matches!(
            store.next_counter(&mut txn, META_NEXT_SESSION),
            Err(EngineError::Corrupt(_))
        ));
    }

    #[test]
    fn test_unique_indexes() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path(), 16 * 1024 * 1024).unwrap();

        let mut txn = store.begin_rw().unwrap();
        assert!(store.claim_username(&mut txn, "Alice", 1).unwrap());
        assert!(!store.claim_username(&mut txn, "alice", 2).unwrap());
        assert!(store.claim_referral_code(&mut txn, "ZMTALICE", 1).unwrap());
        assert!(!store.claim_referral_code(&mut txn, "ZMTALICE", 2).unwrap());
        txn.commit().unwrap();

        let txn = store.begin_ro().unwrap();
        assert_eq!(store.username_owner(&txn, "ALICE").unwrap(), Some(1));
        assert_eq!(store.referral_code_owner(&txn, "ZMTALICE").unwrap(), Some(1));
        assert_eq!(store.referral_code_owner(&txn, "ZMTBOB").unwrap(), None);
    }
}
