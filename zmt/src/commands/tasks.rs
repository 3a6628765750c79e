// Copyright (c) 2024 Botho Foundation

use anyhow::Result;
use std::path::Path;

use super::{emit, open_engine, resolve};

/// List the task catalog
pub fn list(config_path: &Path, json: bool) -> Result<()> {
    let engine = open_engine(config_path)?;
    let catalog = engine.task_catalog();
    emit(json, &catalog, |catalog| {
        println!("{:<16} {:>14} {:>8}", "Task", "Reward (ZMT)", "Cadence");
        for task in catalog.iter() {
            println!(
                "{:<16} {:>14} {:>8}",
                task.task_type,
                task.reward.to_string(),
                task.cadence.to_string()
            );
        }
    })
}

pub fn login(config_path: &Path, username: &str, json: bool) -> Result<()> {
    let engine = open_engine(config_path)?;
    let id = resolve(&engine, username)?;
    let account = engine.record_login(id)?;
    emit(json, &account, |a| {
        println!("Login recorded. Streak: {} day(s).", a.login_streak);
    })
}

pub fn claim(config_path: &Path, username: &str, task_type: &str, json: bool) -> Result<()> {
    let engine = open_engine(config_path)?;
    let id = resolve(&engine, username)?;
    let receipt = engine.claim_task(id, task_type)?;
    emit(json, &receipt, |r| {
        println!(
            "Task '{}' ({}) claimed on {}: +{} ZMT",
            r.task.task_type, r.task.cadence, r.task.completed_date, r.task.reward_amount
        );
        println!("Balance: {} ZMT", r.account.balance);
    })
}
