// Copyright (c) 2024 Botho Foundation

//! Login streaks and task rewards.

use chrono::{Datelike, NaiveDate};
use std::sync::Arc;
use tracing::info;

use crate::{
    config::TaskReward,
    error::EngineError,
    ledger::{Account, AccountId, DailyTask, Ledger, Reason, TaskCadence},
};

pub struct Tasks {
    ledger: Arc<Ledger>,
    catalog: Vec<TaskReward>,
}

impl Tasks {
    pub fn new(ledger: Arc<Ledger>, catalog: Vec<TaskReward>) -> Self {
        Self { ledger, catalog }
    }

    pub fn catalog(&self) -> &[TaskReward] {
        &self.catalog
    }

    /// Update the login streak for today.
    pub fn record_login(&self, id: AccountId) -> Result<Account, EngineError> {
        self.ledger.with_lock(id, |txn| {
            let mut account = txn.account(id)?;
            let today = txn.today();
            let update = zmt_rewards::on_login(
                account.last_login_date.map(day_number),
                account.login_streak,
                day_number(today),
            );
            account.login_streak = update.apply(account.login_streak);
            account.last_login_date = Some(today);
            txn.put_account(&account)?;

            info!(account = %id, %today, streak = account.login_streak, "Recorded login");
            Ok(account)
        })
    }

    /// Claim a task reward. Daily tasks pay once per calendar day, one-time
    /// tasks once per account.
    pub fn claim_task(
        &self,
        id: AccountId,
        task_type: &str,
    ) -> Result<(DailyTask, Account), EngineError> {
        let entry = self
            .catalog
            .iter()
            .find(|task| task.task_type == task_type)
            .ok_or_else(|| EngineError::UnknownTaskType(task_type.to_string()))?;
        let (reward, cadence) = (entry.reward, entry.cadence);

        self.ledger.with_lock(id, |txn| {
            let today = txn.today();
            let key = DailyTask::claim_key(id, cadence, today, task_type);
            if let Some(existing) = txn.get::<DailyTask>(&key)? {
                if existing.is_claimed {
                    let task_type = task_type.to_string();
                    return Err(match cadence {
                        TaskCadence::Daily => EngineError::AlreadyClaimedToday(task_type),
                        TaskCadence::Once => EngineError::AlreadyClaimed(task_type),
                    });
                }
            }

            let task = DailyTask {
                account: id,
                task_type: task_type.to_string(),
                cadence,
                reward_amount: reward,
                completed_date: today,
                is_claimed: true,
            };
            txn.put(&task)?;
            txn.credit(id, reward, Reason::DailyTask(task_type.to_string()))?;

            info!(account = %id, task_type, %cadence, %today, %reward, "Claimed task");
            Ok((task, txn.account(id)?))
        })
    }

    pub fn tasks(&self, id: AccountId) -> Result<Vec<DailyTask>, EngineError> {
        self.ledger.records_of(id)
    }
}

fn day_number(day: NaiveDate) -> i64 {
    i64::from(day.num_days_from_ce())
}
