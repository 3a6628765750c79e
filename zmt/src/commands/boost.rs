// Copyright (c) 2024 Botho Foundation

use anyhow::Result;
use serde::Serialize;
use std::path::Path;
use zmt_rewards::Amount;

use super::{emit, format_multiplier, open_engine, resolve};

#[derive(Serialize)]
struct CatalogEntry {
    level: u32,
    price: Amount,
    multiplier_bps: u64,
}

/// List the boost catalog
pub fn list(config_path: &Path, json: bool) -> Result<()> {
    let engine = open_engine(config_path)?;
    let entries: Vec<CatalogEntry> = engine
        .boost_catalog()
        .iter()
        .map(|tier| CatalogEntry {
            level: tier.level,
            price: tier.price,
            multiplier_bps: engine.boost_multiplier_bps(tier.level),
        })
        .collect();

    emit(json, &entries, |entries| {
        println!("{:<6} {:>12} {:>10}", "Level", "Price (ZMT)", "Multiplier");
        for e in entries {
            println!(
                "{:<6} {:>12} {:>9}x",
                e.level,
                e.price.to_string(),
                format_multiplier(e.multiplier_bps)
            );
        }
    })
}

pub fn buy(config_path: &Path, username: &str, level: u32, json: bool) -> Result<()> {
    let engine = open_engine(config_path)?;
    let id = resolve(&engine, username)?;
    let receipt = engine.purchase_boost(id, level)?;
    emit(json, &receipt, |r| {
        println!("Bought boost level {} for {} ZMT.", r.purchase.boost_level, r.purchase.price);
        println!(
            "Effective level: {} ({}x from the next session)",
            r.account.boost_level,
            format_multiplier(r.account.multiplier_bps)
        );
        println!("Balance: {} ZMT", r.account.balance);
    })
}
