// Copyright (c) 2024 Botho Foundation

//! CLI command implementations.
//!
//! These modules implement the operator-facing CLI commands and legitimately
//! use stdout for output.

#![allow(clippy::print_stdout)]

pub mod account;
pub mod boost;
pub mod exchange;
pub mod history;
pub mod init;
pub mod mining;
pub mod tasks;

use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use std::path::Path;

use crate::{config::Config, engine::Engine, ledger::AccountId, AccountSnapshot};

/// Load the config and open the engine over its ledger.
pub fn open_engine(config_path: &Path) -> Result<Engine> {
    let config = Config::load(config_path).context("No config found. Run 'zmt init' first.")?;
    let ledger_path = config.ledger_path(config_path);
    Engine::open(&config, &ledger_path)
        .with_context(|| format!("Failed to open ledger at {}", ledger_path.display()))
}

/// Resolve a username to its account id.
pub fn resolve(engine: &Engine, username: &str) -> Result<AccountId> {
    engine
        .account_by_username(username)?
        .map(|a| a.id)
        .ok_or_else(|| anyhow!("No account named '{}'", username))
}

/// Print `value` as pretty JSON when requested, otherwise run `human`.
pub fn emit<T: Serialize>(json: bool, value: &T, human: impl FnOnce(&T)) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        human(value);
    }
    Ok(())
}

pub fn print_account(account: &AccountSnapshot) {
    println!("Account #{} ({})", account.id, account.username);
    println!("  Balance:        {} ZMT", account.balance);
    println!("  Mining rate:    {} ZMT/s", account.mining_rate);
    println!(
        "  Boost:          level {} ({}x)",
        account.boost_level,
        format_multiplier(account.multiplier_bps)
    );
    println!("  Mining:         {}", if account.is_mining { "yes" } else { "no" });
    println!("  Total mined:    {} ZMT", account.total_mined);
    println!("  Referral code:  {}", account.referral_code);
    if let Some(referrer) = account.referred_by {
        println!("  Referred by:    #{}", referrer);
    }
    println!(
        "  Referrals:      {} ({} ZMT earned)",
        account.total_referrals, account.referral_earnings
    );
    match account.last_login_date {
        Some(day) => println!("  Login streak:   {} (last {})", account.login_streak, day),
        None => println!("  Login streak:   0"),
    }
}

/// `15000` bps -> `1.5`
pub fn format_multiplier(bps: u64) -> String {
    let whole = bps / 10_000;
    let frac = bps % 10_000;
    if frac == 0 {
        whole.to_string()
    } else {
        format!("{}.{}", whole, format!("{:04}", frac).trim_end_matches('0'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_multiplier() {
        assert_eq!(format_multiplier(10_000), "1");
        assert_eq!(format_multiplier(15_000), "1.5");
        assert_eq!(format_multiplier(12_550), "1.255");
    }
}
