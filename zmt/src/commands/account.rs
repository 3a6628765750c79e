// Copyright (c) 2024 Botho Foundation

use anyhow::Result;
use std::path::Path;

use super::{emit, open_engine, print_account, resolve};

/// Register a new account
pub fn register(
    config_path: &Path,
    username: &str,
    referral_code: Option<&str>,
    json: bool,
) -> Result<()> {
    let engine = open_engine(config_path)?;
    let account = engine.register_account(username, referral_code)?;
    emit(json, &account, |account| {
        println!("Registered '{}'.", account.username);
        print_account(account);
    })
}

/// Show an account
pub fn profile(config_path: &Path, username: &str, json: bool) -> Result<()> {
    let engine = open_engine(config_path)?;
    let id = resolve(&engine, username)?;
    let account = engine.profile(id)?;
    let pending = engine.pending_earnings(id)?;
    emit(json, &account, |account| {
        print_account(account);
        if account.is_mining {
            println!("  Pending:        {} ZMT", pending);
        }
    })
}

/// List every account
pub fn list(config_path: &Path, json: bool) -> Result<()> {
    let engine = open_engine(config_path)?;
    let accounts = engine.accounts()?;
    emit(json, &accounts, |accounts| {
        println!(
            "{:<6} {:<20} {:>18} {:>6} {:>7}",
            "Id", "Username", "Balance (ZMT)", "Boost", "Mining"
        );
        for a in accounts {
            println!(
                "{:<6} {:<20} {:>18} {:>6} {:>7}",
                a.id,
                a.username,
                a.balance.to_string(),
                a.boost_level,
                if a.is_mining { "yes" } else { "no" }
            );
        }
    })
}
