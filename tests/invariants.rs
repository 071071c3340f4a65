//! Ledger-wide properties that must hold after every call, successful or not.

mod common;

use alloy::primitives::U256;
use rust_decimal_macros::dec;

use common::*;
use strategy_settlement::error::GatingError;
use strategy_settlement::{
    EngineError, ErrorKind, FixedPointAmount, Order, OrderHash, OrderStatus, SettlementEngine,
};

fn assert_bounds(order: &Order) {
    assert!(
        order.executed_amount <= order.total_amount,
        "executed {} exceeds total {}",
        order.executed_amount,
        order.total_amount
    );
}

/// Everything observable about one order plus the maker's escrow
fn observe(engine: &SettlementEngine, hash: &OrderHash) -> (Order, FixedPointAmount, FixedPointAmount) {
    (
        engine.get_order(hash).unwrap(),
        engine.committed(maker(), token_x()),
        engine.committed(maker(), token_y()),
    )
}

#[test]
fn executed_never_exceeds_total() {
    let h = harness();
    let order = h
        .engine
        .create_order(&as_maker(T0), dca(dca_params()))
        .unwrap();

    // Hammer well past exhaustion; every observation stays within bounds
    for i in 1..=8u64 {
        let _ = h.engine.execute_order(
            &as_taker(T0 + 3600 * i),
            &order.order_hash,
            amt(dec!(200)),
            FixedPointAmount::from_units(2),
        );
        assert_bounds(&h.engine.get_order(&order.order_hash).unwrap());
    }
    let stored = h.engine.get_order(&order.order_hash).unwrap();
    assert_eq!(stored.executed_amount, stored.total_amount);
}

#[test]
fn failed_calls_leave_no_trace() {
    let h = harness();
    let order = h
        .engine
        .create_order(&as_maker(T0), twap(twap_params()))
        .unwrap();
    let before = observe(&h.engine, &order.order_hash);
    let events = h.events.events().len();
    let intents = h.transfers.intents().len();

    // Too early, then out of band, then an unauthorized cancel
    assert!(h
        .engine
        .execute_interval(&as_taker(T0 + 1), &order.order_hash, amt(dec!(100)))
        .is_err());
    assert!(h
        .engine
        .execute_interval(&as_taker(T0 + 3600), &order.order_hash, amt(dec!(200)))
        .is_err());
    assert!(h.engine.cancel(&as_taker(T0 + 3600), &order.order_hash).is_err());
    assert!(h
        .engine
        .book_fees(&as_taker(T0), &order.order_hash, amt(dec!(1)), amt(dec!(1)))
        .is_err());

    assert_eq!(observe(&h.engine, &order.order_hash), before);
    assert_eq!(h.events.events().len(), events);
    assert_eq!(h.transfers.intents().len(), intents);
}

#[test]
fn terminal_orders_are_immutable() {
    let h = harness();
    let order = h
        .engine
        .create_order(&as_maker(T0), grid(grid_params()))
        .unwrap();
    h.engine
        .execute_level(&as_taker(T0 + 1), &order.order_hash, 0, amt(dec!(980)))
        .unwrap();
    h.engine.cancel(&as_maker(T0 + 2), &order.order_hash).unwrap();
    let frozen = observe(&h.engine, &order.order_hash);

    let attempts: Vec<EngineError> = vec![
        h.engine
            .execute_level(&as_taker(T0 + 3), &order.order_hash, 1, amt(dec!(990)))
            .unwrap_err(),
        h.engine.cancel(&as_maker(T0 + 3), &order.order_hash).unwrap_err(),
        h.engine.expire(&as_maker(T0 + 3), &order.order_hash).unwrap_err(),
    ];
    for err in attempts {
        assert_eq!(err.kind(), ErrorKind::State, "unexpected error {err}");
    }
    assert_eq!(observe(&h.engine, &order.order_hash), frozen);
    assert_eq!(frozen.0.status, OrderStatus::Cancelled);
}

#[test]
fn escrow_moves_only_on_create_execute_and_release() {
    let h = harness();
    let committed = || h.engine.committed(maker(), token_x());

    let first = h
        .engine
        .create_order(&as_maker(T0), twap(twap_params()))
        .unwrap();
    assert_eq!(committed(), FixedPointAmount::from_units(1000));

    let second = h
        .engine
        .create_order(&as_maker(T0), dca(dca_params()))
        .unwrap();
    assert_eq!(committed(), FixedPointAmount::from_units(1500));

    h.engine
        .execute_interval(&as_taker(T0 + 3600), &first.order_hash, amt(dec!(100)))
        .unwrap();
    assert_eq!(committed(), FixedPointAmount::from_units(1400));

    h.engine.cancel(&as_maker(T0 + 3601), &second.order_hash).unwrap();
    assert_eq!(committed(), FixedPointAmount::from_units(900));

    // Committed always equals the sum of what active orders still hold
    let outstanding = h
        .engine
        .ledger()
        .orders()
        .values()
        .filter(|o| o.is_active())
        .try_fold(FixedPointAmount::ZERO, |acc, o| acc.checked_add(o.remaining()))
        .unwrap();
    assert_eq!(committed(), outstanding);
}

#[test]
fn twap_leaves_no_dust() {
    let h = harness();
    let mut params = twap_params();
    // 1000 base units over 3 intervals: 333, 333, 334
    params.total_amount = FixedPointAmount::from_raw(U256::from(1000u64));
    params.intervals = 3;
    params.min_price_per_token = FixedPointAmount::ZERO;
    params.max_price_per_token = FixedPointAmount::from_units(1_000_000);
    let order = h.engine.create_order(&as_maker(T0), twap(params)).unwrap();

    let mut chunks = Vec::new();
    for i in 1..=3u64 {
        let receipt = h
            .engine
            .execute_interval(
                &as_taker(T0 + 3600 * i),
                &order.order_hash,
                FixedPointAmount::from_raw(U256::from(333u64)),
            )
            .unwrap();
        chunks.push(receipt.amount_in.raw());
    }
    assert_eq!(
        chunks,
        vec![U256::from(333u64), U256::from(333u64), U256::from(334u64)]
    );
    assert_eq!(h.engine.committed(maker(), token_x()), FixedPointAmount::ZERO);
    assert_eq!(
        h.engine.get_order(&order.order_hash).unwrap().status,
        OrderStatus::Completed
    );
}

#[test]
fn interval_not_elapsed_is_idempotent() {
    let h = harness();
    let order = h
        .engine
        .create_order(&as_maker(T0), twap(twap_params()))
        .unwrap();
    let before = observe(&h.engine, &order.order_hash);

    for _ in 0..3 {
        let err = h
            .engine
            .execute_interval(&as_taker(T0 + 10), &order.order_hash, amt(dec!(100)))
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Gating(GatingError::IntervalNotElapsed {
                next_allowed_at
            }) if next_allowed_at == T0 + 3600
        ));
    }
    assert_eq!(observe(&h.engine, &order.order_hash), before);
}
