// Copyright (c) 2024 Botho Foundation

use anyhow::Result;
use std::path::Path;

use super::{emit, format_multiplier, open_engine, resolve};
use crate::ledger::SessionId;

pub fn start(config_path: &Path, username: &str, json: bool) -> Result<()> {
    let engine = open_engine(config_path)?;
    let id = resolve(&engine, username)?;
    let receipt = engine.start_mining(id)?;
    emit(json, &receipt, |r| {
        println!(
            "Mining session #{} started at {}x.",
            r.session.id,
            format_multiplier(r.session.multiplier_bps)
        );
    })
}

/// Claim the active session, or a specific one with `session`
pub fn claim(config_path: &Path, username: &str, session: Option<u64>, json: bool) -> Result<()> {
    let engine = open_engine(config_path)?;
    let id = resolve(&engine, username)?;
    let receipt = match session {
        Some(session) => engine.claim_session(id, SessionId(session))?,
        None => engine.claim(id)?,
    };
    emit(json, &receipt, |r| {
        println!("Claimed {} ZMT from session #{}.", r.earned, r.session.id);
        if let Some(reward) = &r.referral_reward {
            println!("Referrer #{} rewarded {} ZMT.", reward.referrer, reward.reward_amount);
        }
        println!("Balance: {} ZMT", r.account.balance);
    })
}

pub fn stop(config_path: &Path, username: &str, json: bool) -> Result<()> {
    let engine = open_engine(config_path)?;
    let id = resolve(&engine, username)?;
    let receipt = engine.stop_mining(id)?;
    emit(json, &receipt, |r| {
        println!("Mining session #{} stopped; accrued earnings were forfeited.", r.session.id);
    })
}
