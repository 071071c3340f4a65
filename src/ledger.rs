//! Order store: the single owner of every [`Order`] record.
//!
//! Each order sits behind its own mutex inside a concurrent map, so
//! operations on different orders never contend and operations on the same
//! order are serialized for their full duration. Mutations work on a cloned
//! draft that replaces the stored order only when the closure succeeds.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use alloy::primitives::Address;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::debug;

use crate::domain::{Order, OrderHash, StrategyKind};
use crate::error::{Result, StateError};

type OrderCell = Arc<Mutex<Order>>;

#[derive(Debug, Default)]
pub struct OrderLedger {
    orders: DashMap<OrderHash, OrderCell>,
    by_maker: DashMap<Address, Vec<OrderHash>>,
    by_kind: DashMap<StrategyKind, Vec<OrderHash>>,
}

impl OrderLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a fully-built order. Fails with `DuplicateOrder` if the hash is taken.
    pub fn create(&self, order: Order) -> Result<OrderHash> {
        let maker = order.maker;
        let mut maker_orders = self.by_maker.entry(maker).or_default();
        let hash = self.insert_indexed(order, &mut maker_orders, |_| Ok(()))?;
        Ok(hash)
    }

    /// Build and insert an order for `maker`, running `commit` before the insert.
    ///
    /// Creation is serialized per maker: `build` receives the maker's next
    /// nonce (its current order count), and `commit` (escrow) runs only once
    /// the hash is known to be free. If either fails nothing is stored.
    pub fn create_with<B, C>(&self, maker: Address, build: B, commit: C) -> Result<Order>
    where
        B: FnOnce(u64) -> Result<Order>,
        C: FnOnce(&Order) -> Result<()>,
    {
        let mut maker_orders = self.by_maker.entry(maker).or_default();
        let order = build(maker_orders.len() as u64)?;
        let snapshot = order.clone();
        self.insert_indexed(order, &mut maker_orders, commit)?;
        Ok(snapshot)
    }

    fn insert_indexed<C>(
        &self,
        order: Order,
        maker_orders: &mut Vec<OrderHash>,
        commit: C,
    ) -> Result<OrderHash>
    where
        C: FnOnce(&Order) -> Result<()>,
    {
        let hash = order.order_hash;
        let kind = order.kind();

        match self.orders.entry(hash) {
            Entry::Occupied(_) => {
                return Err(StateError::DuplicateOrder { order_hash: hash }.into());
            }
            Entry::Vacant(slot) => {
                commit(&order)?;
                slot.insert(Arc::new(Mutex::new(order)));
            }
        }

        maker_orders.push(hash);
        self.by_kind.entry(kind).or_default().push(hash);
        debug!(order = %hash.short(), %kind, "order stored");
        Ok(hash)
    }

    /// Consistent snapshot of an order; waits for an in-flight mutation on it
    pub fn get(&self, hash: &OrderHash) -> Option<Order> {
        let cell = self.cell(hash)?;
        let order = cell
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        Some(order)
    }

    pub fn contains(&self, hash: &OrderHash) -> bool {
        self.orders.contains_key(hash)
    }

    /// Run `f` on a draft of the order under its lock, whatever its status.
    ///
    /// The draft replaces the stored order only if `f` returns `Ok`.
    pub fn update<F, R>(&self, hash: &OrderHash, f: F) -> Result<R>
    where
        F: FnOnce(&mut Order) -> Result<R>,
    {
        let cell = self
            .cell(hash)
            .ok_or(StateError::OrderNotFound { order_hash: *hash })?;
        let mut guard = cell.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        let mut draft = guard.clone();
        let out = f(&mut draft)?;
        *guard = draft;
        Ok(out)
    }

    /// Like [`update`](Self::update), but refuses orders in a terminal state
    pub fn mutate<F, R>(&self, hash: &OrderHash, f: F) -> Result<R>
    where
        F: FnOnce(&mut Order) -> Result<R>,
    {
        self.update(hash, |order| {
            if !order.is_active() {
                return Err(StateError::OrderNotActive {
                    order_hash: order.order_hash,
                    status: order.status,
                }
                .into());
            }
            f(order)
        })
    }

    /// Order hashes of `maker`, in creation order
    pub fn list_by_maker(&self, maker: &Address) -> Vec<OrderHash> {
        self.by_maker
            .get(maker)
            .map(|hashes| hashes.clone())
            .unwrap_or_default()
    }

    pub fn list_by_kind(&self, kind: StrategyKind) -> Vec<OrderHash> {
        self.by_kind
            .get(&kind)
            .map(|hashes| hashes.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    /// Every order, keyed by hash
    pub fn orders(&self) -> BTreeMap<OrderHash, Order> {
        let cells: Vec<(OrderHash, OrderCell)> = self
            .orders
            .iter()
            .map(|entry| (*entry.key(), Arc::clone(entry.value())))
            .collect();

        cells
            .into_iter()
            .map(|(hash, cell)| {
                let order = cell
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner())
                    .clone();
                (hash, order)
            })
            .collect()
    }

    /// `maker -> [order_hash]`, makers without orders omitted
    pub fn maker_index(&self) -> BTreeMap<Address, Vec<OrderHash>> {
        self.by_maker
            .iter()
            .filter(|entry| !entry.value().is_empty())
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect()
    }

    /// Rebuild a ledger from persisted orders and maker index.
    ///
    /// The kind index is derived, ordered by creation time.
    pub fn restore(
        orders: BTreeMap<OrderHash, Order>,
        maker_index: BTreeMap<Address, Vec<OrderHash>>,
    ) -> Self {
        let ledger = Self::new();

        let mut by_creation: Vec<&Order> = orders.values().collect();
        by_creation.sort_by_key(|o| (o.created_at, o.maker, o.nonce));
        for order in by_creation {
            ledger
                .by_kind
                .entry(order.kind())
                .or_default()
                .push(order.order_hash);
        }

        for (maker, hashes) in maker_index {
            ledger.by_maker.insert(maker, hashes);
        }

        for (hash, order) in orders {
            ledger.orders.insert(hash, Arc::new(Mutex::new(order)));
        }

        ledger
    }

    fn cell(&self, hash: &OrderHash) -> Option<OrderCell> {
        self.orders.get(hash).map(|entry| Arc::clone(entry.value()))
    }
}
