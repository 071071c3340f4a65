//! Boundary collaborators: where engine events and token-movement intents go.

use std::sync::Mutex;

use alloy::primitives::Address;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::info;

use crate::domain::{codec, EngineEvent, FixedPointAmount, OrderHash};

/// Token movement requested from the custody layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferKind {
    /// Lock maker funds against an order
    Commit,
    /// Pay escrowed funds to a counterparty (fills, option payouts)
    Settle,
    /// Return escrowed funds to the maker
    Release,
    /// Option holder pays the premium to the maker
    Premium,
}

impl fmt::Display for TransferKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferKind::Commit => write!(f, "commit"),
            TransferKind::Settle => write!(f, "settle"),
            TransferKind::Release => write!(f, "release"),
            TransferKind::Premium => write!(f, "premium"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferIntent {
    pub kind: TransferKind,
    pub order_hash: OrderHash,
    #[serde(with = "codec::address")]
    pub maker: Address,
    #[serde(with = "codec::address")]
    pub asset: Address,
    pub amount: FixedPointAmount,
    /// Recipient for settle, payer for premium, the maker otherwise
    #[serde(with = "codec::address")]
    pub counterparty: Address,
}

/// Token custody collaborator.
///
/// Intents are submitted after the ledger-side bookkeeping has committed;
/// debiting, crediting and approval checks happen on the other side.
pub trait TransferSink: Send + Sync {
    fn submit(&self, intent: &TransferIntent);
}

/// Indexer/UI collaborator, one call per state transition
pub trait EventSink: Send + Sync {
    fn publish(&self, event: &EngineEvent);
}

/// Logs every event through `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn publish(&self, event: &EngineEvent) {
        info!(
            seq = event.sequence,
            kind = %event.kind,
            order = %event.order_hash.short(),
            strategy = %event.strategy_kind,
            amount = %event.amount,
            executed = %event.executed_amount,
            total = %event.total_amount,
            status = %event.status,
            "engine event"
        );
    }
}

/// Logs every transfer intent through `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingTransferSink;

impl TransferSink for TracingTransferSink {
    fn submit(&self, intent: &TransferIntent) {
        info!(
            kind = %intent.kind,
            order = %intent.order_hash.short(),
            asset = %intent.asset,
            amount = %intent.amount,
            counterparty = %intent.counterparty,
            "transfer intent"
        );
    }
}

/// Keeps published events in memory, in publication order
#[derive(Debug, Default)]
pub struct RecordingEventSink {
    events: Mutex<Vec<EngineEvent>>,
}

impl RecordingEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<EngineEvent> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn drain(&self) -> Vec<EngineEvent> {
        std::mem::take(
            &mut *self
                .events
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner()),
        )
    }
}

impl EventSink for RecordingEventSink {
    fn publish(&self, event: &EngineEvent) {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(event.clone());
    }
}

#[derive(Debug, Default)]
pub struct RecordingTransferSink {
    intents: Mutex<Vec<TransferIntent>>,
}

impl RecordingTransferSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intents(&self) -> Vec<TransferIntent> {
        self.intents
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn drain(&self) -> Vec<TransferIntent> {
        std::mem::take(
            &mut *self
                .intents
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner()),
        )
    }
}

impl TransferSink for RecordingTransferSink {
    fn submit(&self, intent: &TransferIntent) {
        self.intents
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(intent.clone());
    }
}
