// Copyright (c) 2024 Botho Foundation
//
//! Engine fixture.

use std::sync::Arc;
use tempfile::TempDir;

use zmt::{
    clock::ManualClock,
    config::Config,
    exchange::FixedRate,
    ledger::{AccountId, Reason},
    Amount, Engine,
};

use super::START;

pub struct TestEngine {
    pub engine: Arc<Engine>,
    pub clock: Arc<ManualClock>,
    pub config: Config,
    _dir: TempDir,
}

impl TestEngine {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let clock = Arc::new(ManualClock::new(START));
        let rates = Arc::new(FixedRate(config.exchange.rate()));
        let engine = Engine::with_parts(&config, dir.path(), clock.clone(), rates)
            .expect("Failed to open engine");
        Self {
            engine: Arc::new(engine),
            clock,
            config,
            _dir: dir,
        }
    }

    pub fn register(&self, username: &str) -> AccountId {
        self.engine
            .register_account(username, None)
            .expect("Failed to register account")
            .id
    }

    pub fn register_referred(&self, username: &str, code: &str) -> AccountId {
        self.engine
            .register_account(username, Some(code))
            .expect("Failed to register referred account")
            .id
    }

    /// Credit an account directly through the ledger.
    pub fn fund(&self, id: AccountId, amount: Amount) {
        self.engine
            .ledger()
            .with_lock(id, |txn| txn.credit(id, amount, Reason::DailyTask("test_funding".into())))
            .expect("Failed to fund account");
    }

    pub fn balance(&self, id: AccountId) -> Amount {
        self.engine.profile(id).expect("Failed to read account").balance
    }
}
