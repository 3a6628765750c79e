// Copyright (c) 2024 Botho Foundation

use anyhow::{anyhow, Context, Result};
use std::path::Path;
use zmt_rewards::Amount;

use super::{emit, open_engine, resolve};
use crate::exchange::Outcome;

pub fn request(config_path: &Path, username: &str, amount: &str, json: bool) -> Result<()> {
    let amount: Amount = amount
        .parse()
        .with_context(|| format!("Invalid amount '{}'", amount))?;

    let engine = open_engine(config_path)?;
    let id = resolve(&engine, username)?;
    let receipt = engine.request_exchange(id, amount)?;
    emit(json, &receipt, |r| {
        println!("Exchange {} pending.", r.exchange.code);
        println!("  Debited:  {} ZMT", r.exchange.zmt_amount);
        println!("  Fee:      {} ZMT", r.exchange.fee_amount);
        println!("  Receives: {}", r.exchange.external_amount);
        println!("Balance: {} ZMT", r.account.balance);
    })
}

pub fn settle(config_path: &Path, code: &str, outcome: &str, json: bool) -> Result<()> {
    let outcome: Outcome = outcome.parse().map_err(|e: String| anyhow!(e))?;

    let engine = open_engine(config_path)?;
    let receipt = engine.settle_exchange(code, outcome)?;
    emit(json, &receipt, |r| {
        println!("Exchange {} {}.", r.exchange.code, r.exchange.status);
        if outcome == Outcome::Failed {
            println!("Refunded {} ZMT.", r.exchange.zmt_amount);
        }
        println!("Balance of #{}: {} ZMT", r.account.id, r.account.balance);
    })
}
