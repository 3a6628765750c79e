// Copyright (c) 2024 Botho Foundation

//! Boost catalog and purchases.
//!
//! A purchase raises the account's boost level to the purchased level if it
//! is higher (levels replace, they do not stack). Sessions already running
//! keep the multiplier they started with.

use std::sync::Arc;
use tracing::info;
use zmt_rewards::BoostCurve;

use crate::{
    config::BoostTier,
    error::EngineError,
    ledger::{Account, AccountId, Ledger, Purchase, PurchaseId, Reason, META_NEXT_PURCHASE},
};

pub struct Boosts {
    ledger: Arc<Ledger>,
    catalog: Vec<BoostTier>,
    curve: BoostCurve,
}

impl Boosts {
    pub fn new(ledger: Arc<Ledger>, mut catalog: Vec<BoostTier>, curve: BoostCurve) -> Self {
        catalog.sort_by_key(|tier| tier.level);
        Self {
            ledger,
            catalog,
            curve,
        }
    }

    pub fn catalog(&self) -> &[BoostTier] {
        &self.catalog
    }

    pub fn multiplier_bps(&self, level: u32) -> u64 {
        self.curve.multiplier_bps(level)
    }

    pub fn purchase_boost(
        &self,
        id: AccountId,
        level: u32,
    ) -> Result<(Purchase, Account), EngineError> {
        let tier = self
            .catalog
            .iter()
            .find(|tier| tier.level == level)
            .ok_or(EngineError::InvalidBoostLevel(level))?;

        self.ledger.with_lock(id, |txn| {
            let mut account = txn.account(id)?;
            let purchase_id = PurchaseId(txn.next_id(META_NEXT_PURCHASE)?);
            txn.debit(id, tier.price, Reason::BoostPurchase(purchase_id))?;

            let purchase = Purchase {
                id: purchase_id,
                account: id,
                boost_level: level,
                boost_amount_bps: self.curve.multiplier_bps(level),
                price: tier.price,
                purchase_date: txn.now(),
                is_active: true,
            };
            txn.put(&purchase)?;

            let previous = account.boost_level;
            account.boost_level = previous.max(level);
            txn.put_account(&account)?;

            info!(account = %id, level, previous, price = %tier.price, "Purchased boost");
            Ok((purchase, txn.account(id)?))
        })
    }

    pub fn purchases(&self, id: AccountId) -> Result<Vec<Purchase>, EngineError> {
        self.ledger.records_of(id)
    }
}
