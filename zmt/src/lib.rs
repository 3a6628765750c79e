// Copyright (c) 2024 Botho Foundation

//! ZMT reward ledger - time-based mining, boosts, referrals, daily tasks and
//! exchange, settled against a single authoritative LMDB ledger.
//!
//! Every balance change goes through [`ledger::Ledger`]; the upper components
//! ([`mining`], [`boost`], [`referral`], [`tasks`], [`exchange`]) only run
//! read-modify-write sequences inside its per-account critical sections.
//! [`engine::Engine`] wires them together behind one call per operation.

#![deny(clippy::print_stdout)]

pub mod accounts;
pub mod boost;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod exchange;
pub mod ledger;
pub mod mining;
pub mod referral;
pub mod tasks;

// Re-export commands module for CLI binary
pub mod commands;

pub use engine::{
    AccountSnapshot, ClaimReceipt, Engine, ExchangeReceipt, PurchaseReceipt, SessionReceipt,
    TaskReceipt,
};
pub use error::EngineError;
pub use zmt_rewards::Amount;
