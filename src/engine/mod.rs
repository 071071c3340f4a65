//! Settlement engine: one instance owns a ledger, an escrow and a link
//! registry, and drives every order through its strategy state machine.
//!
//! All mutating entry points follow the same shape. They take the order's
//! lock through [`OrderLedger::mutate`] (or `update`), run every check on the
//! draft, apply the escrow batch as the last fallible step, then hand the
//! resulting transfer intents and exactly one event to the sinks before the
//! draft is swapped in. A failed call therefore leaves ledger, escrow and
//! sinks untouched.

pub mod dca;
pub mod grid;
pub mod liquidity;
pub mod option;
pub mod twap;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard};

use alloy::primitives::Address;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::adapters::{
    EventSink, TracingEventSink, TracingTransferSink, TransferIntent, TransferKind, TransferSink,
};
use crate::config::{EngineConfig, PolicyConfig};
use crate::crosschain::CrossChainRegistry;
use crate::domain::{
    CreateOrder, CrossChainOrderLink, EngineEvent, EventKind, ExecutionStep,
    FixedPointAmount, LinkStatus, Order, OrderHash, OrderHashInput, OrderHasher, OrderStatus,
    OrderStatusView, StrategyKind, StrategyRequest, StrategyState,
};
use crate::error::{EngineError, GatingError, Result, StateError, ValidationError};
use crate::escrow::{CollateralEscrow, EscrowOp};
use crate::ledger::OrderLedger;
use crate::persistence::LedgerSnapshot;
use crate::validation;

/// Caller-supplied context for every engine call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionContext {
    /// Trusted current time (block timestamp on-chain), seconds
    pub now: u64,
    /// Identity making the call: the maker on create/cancel, the taker on fills
    pub caller: Address,
}

impl ExecutionContext {
    pub fn new(now: u64, caller: Address) -> Self {
        Self { now, caller }
    }
}

/// Outcome of a successful execution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionReceipt {
    pub order_hash: OrderHash,
    pub kind: StrategyKind,
    pub step: ExecutionStep,
    /// Escrowed amount this step settled (or paid out, for options)
    pub amount_in: FixedPointAmount,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub amount_out: Option<FixedPointAmount>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub price: Option<FixedPointAmount>,
    pub executed_amount: FixedPointAmount,
    pub remaining: FixedPointAmount,
    pub status: OrderStatus,
}

impl ExecutionReceipt {
    fn new(order: &Order, step: ExecutionStep, fill: &Fill) -> Self {
        Self {
            order_hash: order.order_hash,
            kind: order.kind(),
            step,
            amount_in: fill.amount,
            amount_out: fill.amount_out,
            price: fill.price,
            executed_amount: order.executed_amount,
            remaining: order.remaining(),
            status: order.status,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == OrderStatus::Completed
    }
}

/// Strategy-specific execution request, routed by [`SettlementEngine::execute`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Execution {
    Interval {
        amount_out: FixedPointAmount,
    },
    Exercise {
        current_price: FixedPointAmount,
        paid_premium: FixedPointAmount,
    },
    Dca {
        amount_out: FixedPointAmount,
        reference_rate: FixedPointAmount,
    },
    Level {
        level: u32,
        amount_out: FixedPointAmount,
    },
    RemoveLiquidity,
}

impl Execution {
    pub fn strategy_kind(&self) -> StrategyKind {
        match self {
            Execution::Interval { .. } => StrategyKind::Twap,
            Execution::Exercise { .. } => StrategyKind::Option,
            Execution::Dca { .. } => StrategyKind::Dca,
            Execution::Level { .. } => StrategyKind::Grid,
            Execution::RemoveLiquidity => StrategyKind::ConcentratedLiquidity,
        }
    }
}

/// Amounts of one execution step, for receipts and events
#[derive(Debug, Clone, Copy)]
struct Fill {
    amount: FixedPointAmount,
    amount_out: Option<FixedPointAmount>,
    price: Option<FixedPointAmount>,
}

/// Event payload for one state transition, completed by `commit_transition`
#[derive(Debug, Clone, Copy)]
struct Transition {
    kind: EventKind,
    amount: FixedPointAmount,
    amount_out: Option<FixedPointAmount>,
    price: Option<FixedPointAmount>,
    step: Option<ExecutionStep>,
    link_status: Option<LinkStatus>,
}

impl Transition {
    fn new(kind: EventKind, amount: FixedPointAmount) -> Self {
        Self {
            kind,
            amount,
            amount_out: None,
            price: None,
            step: None,
            link_status: None,
        }
    }

    /// Executed, or Completed when the step filled the order
    fn fill(order: &Order, step: ExecutionStep, fill: &Fill) -> Self {
        let kind = if order.status == OrderStatus::Completed {
            EventKind::Completed
        } else {
            EventKind::Executed
        };
        Self {
            kind,
            amount: fill.amount,
            amount_out: fill.amount_out,
            price: fill.price,
            step: Some(step),
            link_status: None,
        }
    }
}

pub struct SettlementEngine {
    policy: PolicyConfig,
    ledger: OrderLedger,
    escrow: CollateralEscrow,
    links: CrossChainRegistry,
    hasher: Arc<dyn OrderHasher>,
    events: Arc<dyn EventSink>,
    transfers: Arc<dyn TransferSink>,
    sequence: AtomicU64,
    /// Mutations hold it shared; `snapshot` holds it exclusively so ledger,
    /// escrow and links are captured at one point in time.
    gate: RwLock<()>,
}

impl SettlementEngine {
    /// Empty engine with the configured policy and hasher, logging sinks
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            policy: config.policy.clone(),
            ledger: OrderLedger::new(),
            escrow: CollateralEscrow::new(),
            links: CrossChainRegistry::new(),
            hasher: config.hashing.hasher(),
            events: Arc::new(TracingEventSink),
            transfers: Arc::new(TracingTransferSink),
            sequence: AtomicU64::new(0),
            gate: RwLock::new(()),
        }
    }

    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    pub fn with_transfer_sink(mut self, transfers: Arc<dyn TransferSink>) -> Self {
        self.transfers = transfers;
        self
    }

    pub fn with_hasher(mut self, hasher: Arc<dyn OrderHasher>) -> Self {
        self.hasher = hasher;
        self
    }

    /// Rebuild an engine from a snapshot; event sequence numbers continue
    pub fn restore(config: &EngineConfig, snapshot: LedgerSnapshot) -> Result<Self> {
        let parts = snapshot.into_parts()?;
        let mut engine = Self::new(config);
        engine.ledger = OrderLedger::restore(parts.orders, parts.maker_index);
        engine.escrow = CollateralEscrow::restore(&parts.escrow);
        engine.links = CrossChainRegistry::restore(parts.links)?;
        engine.sequence = AtomicU64::new(parts.last_sequence);
        info!(
            "Engine restored: {} orders, {} escrow entries",
            engine.ledger.len(),
            engine.escrow.entries().len()
        );
        Ok(engine)
    }

    /// Point-in-time copy of ledger, escrow and links. Waits for in-flight
    /// mutations to finish and holds new ones back while capturing.
    pub fn snapshot(&self) -> LedgerSnapshot {
        let _quiesced = self.gate.write().unwrap_or_else(|p| p.into_inner());
        LedgerSnapshot::capture(
            &self.ledger,
            &self.escrow,
            &self.links,
            self.sequence.load(Ordering::SeqCst),
        )
    }

    pub fn policy(&self) -> &PolicyConfig {
        &self.policy
    }

    pub fn ledger(&self) -> &OrderLedger {
        &self.ledger
    }

    pub fn escrow(&self) -> &CollateralEscrow {
        &self.escrow
    }

    pub fn links(&self) -> &CrossChainRegistry {
        &self.links
    }

    pub fn hasher(&self) -> &dyn OrderHasher {
        self.hasher.as_ref()
    }

    /// Hash the order `maker` would get for `request` as their next order
    pub fn preview_order_hash(&self, maker: Address, request: &CreateOrder) -> OrderHash {
        let nonce = self.ledger.list_by_maker(&maker).len() as u64;
        self.hasher.order_hash(&OrderHashInput {
            maker,
            kind: request.strategy.kind(),
            nonce,
            salt: request.salt,
        })
    }

    // ==================== Creation ====================

    /// Validate, store and escrow a new order. The maker is `ctx.caller`.
    pub fn create_order(&self, ctx: &ExecutionContext, request: CreateOrder) -> Result<Order> {
        validation::validate_request(&request, ctx.now, &self.policy)?;
        let _admitted = self.admit();

        let maker = ctx.caller;
        let kind = request.strategy.kind();

        let order = self.ledger.create_with(
            maker,
            |nonce| {
                let order_hash = self.hasher.order_hash(&OrderHashInput {
                    maker,
                    kind,
                    nonce,
                    salt: request.salt,
                });
                let (strategy, total_amount) = initial_state(&request.strategy, ctx.now)?;
                Ok(Order {
                    order_hash,
                    maker,
                    nonce,
                    salt: request.salt,
                    status: OrderStatus::Active,
                    created_at: ctx.now,
                    deadline: request.deadline,
                    total_amount,
                    executed_amount: FixedPointAmount::ZERO,
                    strategy,
                })
            },
            |order| {
                let ops: Vec<EscrowOp> = order
                    .initial_commitment()
                    .into_iter()
                    .map(|(asset, amount)| EscrowOp::Commit {
                        maker,
                        asset,
                        amount,
                    })
                    .collect();
                self.commit_transition(
                    order,
                    &ops,
                    &[],
                    Transition::new(EventKind::Created, order.total_amount),
                    ctx.now,
                )
            },
        )?;

        info!(
            "Order {} created: {} total {} by {}",
            order.order_hash.short(),
            kind,
            order.total_amount,
            maker
        );
        Ok(order)
    }

    // ==================== Execution ====================

    /// Single execution entry point: routes to the strategy handler named by
    /// `execution`, which rejects orders of any other kind with `WrongStrategy`.
    pub fn execute(
        &self,
        ctx: &ExecutionContext,
        order_hash: &OrderHash,
        execution: Execution,
    ) -> Result<ExecutionReceipt> {
        match execution {
            Execution::Interval { amount_out } => {
                self.execute_interval(ctx, order_hash, amount_out)
            }
            Execution::Exercise {
                current_price,
                paid_premium,
            } => self.exercise(ctx, order_hash, current_price, paid_premium),
            Execution::Dca {
                amount_out,
                reference_rate,
            } => self.execute_order(ctx, order_hash, amount_out, reference_rate),
            Execution::Level { level, amount_out } => {
                self.execute_level(ctx, order_hash, level, amount_out)
            }
            Execution::RemoveLiquidity => self.remove_liquidity(ctx, order_hash),
        }
    }

    // ==================== Termination ====================

    /// Maker-initiated cancel: releases everything still escrowed
    pub fn cancel(&self, ctx: &ExecutionContext, order_hash: &OrderHash) -> Result<Order> {
        let _admitted = self.admit();
        let order = self.ledger.mutate(order_hash, |order| {
            ensure_maker(order, ctx.caller)?;
            self.terminate(order, OrderStatus::Cancelled, EventKind::Cancelled, ctx.now)?;
            Ok(order.clone())
        })?;

        info!(
            "Order {} cancelled: executed {} of {}",
            order.order_hash.short(),
            order.executed_amount,
            order.total_amount
        );
        Ok(order)
    }

    /// Expire an order past its option expiry or deadline. Callable by anyone.
    pub fn expire(&self, ctx: &ExecutionContext, order_hash: &OrderHash) -> Result<Order> {
        let _admitted = self.admit();
        let order = self.ledger.mutate(order_hash, |order| {
            match order.expires_after() {
                Some(at) if ctx.now > at => {}
                _ => return Err(GatingError::NotYetExpired { now: ctx.now }.into()),
            }
            self.terminate(order, OrderStatus::Expired, EventKind::Expired, ctx.now)?;
            Ok(order.clone())
        })?;

        info!("Order {} expired", order.order_hash.short());
        Ok(order)
    }

    fn terminate(
        &self,
        order: &mut Order,
        status: OrderStatus,
        kind: EventKind,
        now: u64,
    ) -> Result<()> {
        let released = order.remaining();
        let ops: Vec<EscrowOp> = order
            .outstanding_commitment()?
            .into_iter()
            .map(|(asset, amount)| EscrowOp::Release {
                maker: order.maker,
                asset,
                amount,
            })
            .collect();

        order.transition_to(status)?;
        self.commit_transition(order, &ops, &[], Transition::new(kind, released), now)
    }

    // ==================== Queries ====================

    pub fn get_order(&self, order_hash: &OrderHash) -> Option<Order> {
        self.ledger.get(order_hash)
    }

    pub fn get_order_status(&self, order_hash: &OrderHash) -> Result<OrderStatusView> {
        self.ledger
            .get(order_hash)
            .map(|order| OrderStatusView::from(&order))
            .ok_or_else(|| {
                StateError::OrderNotFound {
                    order_hash: *order_hash,
                }
                .into()
            })
    }

    pub fn list_by_maker(&self, maker: &Address) -> Vec<OrderHash> {
        self.ledger.list_by_maker(maker)
    }

    pub fn committed(&self, maker: Address, asset: Address) -> FixedPointAmount {
        self.escrow.committed(maker, asset)
    }

    // ==================== Cross-chain links ====================

    /// Attach counterpart-chain linkage to an existing order
    pub fn attach_link(
        &self,
        ctx: &ExecutionContext,
        order_hash: &OrderHash,
        link: CrossChainOrderLink,
    ) -> Result<CrossChainOrderLink> {
        let _admitted = self.admit();
        let link = self.ledger.update(order_hash, |order| {
            let link = CrossChainOrderLink {
                ethereum_order_hash: order.order_hash,
                ..link
            };
            self.links.attach(link.clone())?;

            let mut transition = Transition::new(EventKind::LinkAttached, link.amount);
            transition.link_status = Some(link.status);
            self.publish(order, transition, ctx.now);
            Ok(link)
        })?;

        info!(
            "Order {} linked to counterpart {}",
            link.ethereum_order_hash.short(),
            link.counterpart_order_hash.short()
        );
        Ok(link)
    }

    /// Advance a link's HTLC status. Re-applying the current status is a no-op.
    pub fn update_link_status(
        &self,
        ctx: &ExecutionContext,
        counterpart_order_hash: &OrderHash,
        status: LinkStatus,
    ) -> Result<CrossChainOrderLink> {
        let _admitted = self.admit();
        let order_hash = self
            .links
            .get(counterpart_order_hash)
            .map(|link| link.ethereum_order_hash)
            .ok_or(StateError::LinkNotFound {
                counterpart_order_hash: *counterpart_order_hash,
            })?;

        self.ledger.update(&order_hash, |order| {
            let (link, changed) = self.links.update_status(counterpart_order_hash, status)?;
            if changed {
                let mut transition = Transition::new(EventKind::LinkStatusChanged, link.amount);
                transition.link_status = Some(link.status);
                self.publish(order, transition, ctx.now);
            }
            Ok(link)
        })
    }

    // ==================== Shared plumbing ====================

    /// Shared hold on the snapshot gate for the duration of one mutation.
    /// Entry points take it once; they never call each other while holding it.
    fn admit(&self) -> RwLockReadGuard<'_, ()> {
        self.gate.read().unwrap_or_else(|p| p.into_inner())
    }

    /// Apply the escrow batch, then emit intents and the event.
    ///
    /// Must be the last fallible step of a mutation closure.
    fn commit_transition(
        &self,
        order: &Order,
        ops: &[EscrowOp],
        extra_intents: &[TransferIntent],
        transition: Transition,
        now: u64,
    ) -> Result<()> {
        self.escrow.apply(ops)?;

        for op in ops.iter().filter(|op| !op.amount().is_zero()) {
            self.transfers.submit(&intent_for(order.order_hash, op));
        }
        for intent in extra_intents {
            self.transfers.submit(intent);
        }

        self.publish(order, transition, now);
        Ok(())
    }

    fn publish(&self, order: &Order, transition: Transition, now: u64) {
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        self.events.publish(&EngineEvent {
            sequence,
            kind: transition.kind,
            order_hash: order.order_hash,
            maker: order.maker,
            strategy_kind: order.kind(),
            amount: transition.amount,
            amount_out: transition.amount_out,
            price: transition.price,
            executed_amount: order.executed_amount,
            total_amount: order.total_amount,
            status: order.status,
            step: transition.step,
            link_status: transition.link_status,
            timestamp: now,
        });
    }
}

fn intent_for(order_hash: OrderHash, op: &EscrowOp) -> TransferIntent {
    let (kind, maker, asset, amount, counterparty) = match *op {
        EscrowOp::Commit {
            maker,
            asset,
            amount,
        } => (TransferKind::Commit, maker, asset, amount, maker),
        EscrowOp::Release {
            maker,
            asset,
            amount,
        } => (TransferKind::Release, maker, asset, amount, maker),
        EscrowOp::Consume {
            maker,
            asset,
            amount,
            recipient,
        } => (TransferKind::Settle, maker, asset, amount, recipient),
    };
    TransferIntent {
        kind,
        order_hash,
        maker,
        asset,
        amount,
        counterparty,
    }
}

/// Strategy payload and total amount of a freshly created order
fn initial_state(
    request: &StrategyRequest,
    now: u64,
) -> Result<(StrategyState, FixedPointAmount)> {
    match request {
        StrategyRequest::Twap(p) => Ok(twap::initial_state(p, now)),
        StrategyRequest::Option(p) => Ok(option::initial_state(p)),
        StrategyRequest::Dca(p) => Ok(dca::initial_state(p, now)),
        StrategyRequest::Grid(p) => grid::initial_state(p),
        StrategyRequest::ConcentratedLiquidity(p) => liquidity::initial_state(p),
    }
}

fn ensure_maker(order: &Order, caller: Address) -> Result<()> {
    if order.maker != caller {
        return Err(StateError::Unauthorized {
            order_hash: order.order_hash,
            caller,
        }
        .into());
    }
    Ok(())
}

fn ensure_before_deadline(order: &Order, now: u64) -> Result<()> {
    match order.deadline {
        Some(deadline) if now > deadline => {
            Err(GatingError::DeadlinePassed { deadline, now }.into())
        }
        _ => Ok(()),
    }
}

fn wrong_strategy(order: &Order, expected: StrategyKind) -> EngineError {
    StateError::WrongStrategy {
        order_hash: order.order_hash,
        expected,
        actual: order.kind(),
    }
    .into()
}

fn invalid_amount(reason: impl Into<String>) -> EngineError {
    ValidationError::InvalidAmount {
        reason: reason.into(),
    }
    .into()
}
