// Copyright (c) 2024 Botho Foundation

use anyhow::Result;
use clap::ValueEnum;
use std::path::Path;

use super::{emit, open_engine, resolve};
use crate::ledger::EntryKind;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum HistoryKind {
    /// Every balance change
    Audit,
    Sessions,
    Purchases,
    Tasks,
    Exchanges,
}

pub fn run(config_path: &Path, username: &str, kind: HistoryKind, json: bool) -> Result<()> {
    let engine = open_engine(config_path)?;
    let id = resolve(&engine, username)?;

    match kind {
        HistoryKind::Audit => emit(json, &engine.audit_trail(id)?, |entries| {
            for e in entries {
                let sign = match e.kind {
                    EntryKind::Credit => '+',
                    EntryKind::Debit => '-',
                };
                println!(
                    "#{:<6} {}{:<18} {:<40} -> {}",
                    e.seq,
                    sign,
                    e.amount.to_string(),
                    e.reason.to_string(),
                    e.balance_after
                );
            }
        }),
        HistoryKind::Sessions => emit(json, &engine.sessions(id)?, |sessions| {
            for s in sessions {
                let state = if s.is_active { "active" } else { "closed" };
                println!(
                    "#{:<6} level {:<3} started {:<12} {:<7} mined {}",
                    s.id, s.boost_level_at_start, s.start_time, state, s.amount_mined
                );
            }
        }),
        HistoryKind::Purchases => emit(json, &engine.purchases(id)?, |purchases| {
            for p in purchases {
                println!(
                    "#{:<6} level {:<3} price {} at {}",
                    p.id.0, p.boost_level, p.price, p.purchase_date
                );
            }
        }),
        HistoryKind::Tasks => emit(json, &engine.tasks(id)?, |tasks| {
            for t in tasks {
                println!(
                    "{} {:<16} {:<6} +{}",
                    t.completed_date, t.task_type, t.cadence, t.reward_amount
                );
            }
        }),
        HistoryKind::Exchanges => emit(json, &engine.exchanges(id)?, |exchanges| {
            for x in exchanges {
                println!(
                    "{:<24} {:<9} {} ZMT -> {} (fee {})",
                    x.code, x.status.to_string(), x.zmt_amount, x.external_amount, x.fee_amount
                );
            }
        }),
    }
}
