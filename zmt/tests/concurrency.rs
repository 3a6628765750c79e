// Copyright (c) 2024 Botho Foundation
//
//! Concurrency Tests
//!
//! Races the same operation on one account from many threads and checks that
//! per-account critical sections keep every credit exactly-once.

mod common;

use std::{
    sync::{Arc, Barrier},
    thread,
};

use common::TestEngine;
use zmt::{Amount, Engine, EngineError};

const THREADS: usize = 8;

/// Run `op` on `THREADS` threads released together; collect the results.
fn race<T, F>(engine: &Arc<Engine>, op: F) -> Vec<Result<T, EngineError>>
where
    T: Send + 'static,
    F: Fn(&Engine) -> Result<T, EngineError> + Send + Sync + 'static,
{
    let barrier = Arc::new(Barrier::new(THREADS));
    let op = Arc::new(op);
    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let engine = engine.clone();
            let barrier = barrier.clone();
            let op = op.clone();
            thread::spawn(move || {
                barrier.wait();
                op(&engine)
            })
        })
        .collect();
    handles
        .into_iter()
        .map(|h| h.join().expect("worker panicked"))
        .collect()
}

#[test]
fn test_concurrent_claims_credit_once() {
    let t = TestEngine::new();
    let alice = t.register("alice");
    t.engine.start_mining(alice).unwrap();
    t.clock.advance(1_000_000);

    let results = race(&t.engine, move |e| e.claim(alice));

    let successes = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 1);
    for err in results.iter().filter_map(|r| r.as_ref().err()) {
        assert!(matches!(
            err,
            EngineError::NotMining | EngineError::SessionAlreadyClosed(_)
        ));
    }
    assert_eq!(t.balance(alice), Amount::from_zmt(1));
}

#[test]
fn test_concurrent_session_claims_credit_once() {
    let t = TestEngine::new();
    let alice = t.register("alice");
    let session = t.engine.start_mining(alice).unwrap().session.id;
    t.clock.advance(1_000_000);

    let results = race(&t.engine, move |e| e.claim_session(alice, session));

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    let closed = results
        .iter()
        .filter(|r| matches!(r, Err(EngineError::SessionAlreadyClosed(_))))
        .count();
    assert_eq!(closed, THREADS - 1);
    assert_eq!(t.balance(alice), Amount::from_zmt(1));
}

#[test]
fn test_concurrent_task_claims_credit_once() {
    let t = TestEngine::new();
    let alice = t.register("alice");

    let results = race(&t.engine, move |e| e.claim_task(alice, "daily_login"));

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|e| *e == EngineError::AlreadyClaimedToday("daily_login".into())));
    assert_eq!(t.balance(alice), t.config.tasks[0].reward);
}

#[test]
fn test_concurrent_referral_grants_credit_once() {
    let t = TestEngine::new();
    let alice = t.register("alice");
    let bob = t.register_referred("bob", "ZMTALICE");

    let results = race(&t.engine, move |e| e.grant_referral_reward(bob));

    let granted = results
        .iter()
        .filter(|r| matches!(r, Ok(Some(_))))
        .count();
    assert_eq!(granted, 1);
    assert_eq!(t.balance(alice), t.config.referral.reward);
    assert_eq!(t.engine.profile(alice).unwrap().total_referrals, 1);
}

#[test]
fn test_concurrent_exchanges_never_overdraw() {
    let t = TestEngine::new();
    let alice = t.register("alice");
    t.fund(alice, Amount::from_zmt(5));

    let results = race(&t.engine, move |e| e.request_exchange(alice, Amount::from_zmt(1)));

    let successes = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 5);
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|e| matches!(e, EngineError::InsufficientBalance { .. })));
    assert_eq!(t.balance(alice), Amount::ZERO);
    assert_eq!(t.engine.exchanges(alice).unwrap().len(), 5);
}

#[test]
fn test_claim_and_referrer_activity_interleave() {
    let t = TestEngine::new();
    let alice = t.register("alice");
    let bob = t.register_referred("bob", "ZMTALICE");
    let price = t.config.boosts[0].price;
    t.fund(alice, Amount::from_picos(price.picos() * THREADS as u64));
    t.engine.start_mining(bob).unwrap();
    t.clock.advance(1_000);

    // Bob's claim locks alice too; alice's own purchases must not be lost
    let engine = t.engine.clone();
    let claimer = thread::spawn(move || engine.claim(bob));
    let results = race(&t.engine, move |e| e.purchase_boost(alice, 1).map(|_| ()));
    claimer.join().unwrap().unwrap();

    assert!(results.iter().all(|r| r.is_ok()));
    assert_eq!(t.balance(alice), t.config.referral.reward);
    assert_eq!(t.engine.purchases(alice).unwrap().len(), THREADS);
}

#[test]
fn test_many_accounts_progress_in_parallel() {
    let t = TestEngine::new();
    let ids: Vec<_> = (0..THREADS)
        .map(|i| t.register(&format!("user{}", i)))
        .collect();
    for id in &ids {
        t.engine.start_mining(*id).unwrap();
    }
    t.clock.advance(1_000_000);

    let handles: Vec<_> = ids
        .iter()
        .map(|id| {
            let engine = t.engine.clone();
            let id = *id;
            thread::spawn(move || engine.claim(id))
        })
        .collect();
    for h in handles {
        assert_eq!(h.join().unwrap().unwrap().earned, Amount::from_zmt(1));
    }
}
