//! Point-in-time snapshot of engine state (orders, escrow, links), stored as
//! a single JSON document.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use alloy::primitives::Address;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::crosschain::CrossChainRegistry;
use crate::domain::codec;
use crate::domain::{CrossChainOrderLink, Order, OrderHash};
use crate::error::{EngineError, Result};
use crate::escrow::{CollateralEscrow, EscrowEntry};
use crate::ledger::OrderLedger;

pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MakerIndexEntry {
    #[serde(with = "codec::address")]
    pub maker: Address,
    pub orders: Vec<OrderHash>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub version: u32,
    pub saved_at: DateTime<Utc>,
    /// Sequence number of the last published event
    pub last_sequence: u64,
    pub orders: BTreeMap<OrderHash, Order>,
    pub maker_index: Vec<MakerIndexEntry>,
    pub escrow: Vec<EscrowEntry>,
    #[serde(default)]
    pub links: Vec<CrossChainOrderLink>,
}

/// Checked contents of a snapshot, ready to rebuild an engine from
#[derive(Debug)]
pub struct SnapshotParts {
    pub orders: BTreeMap<OrderHash, Order>,
    pub maker_index: BTreeMap<Address, Vec<OrderHash>>,
    pub escrow: Vec<EscrowEntry>,
    pub links: Vec<CrossChainOrderLink>,
    pub last_sequence: u64,
}

impl LedgerSnapshot {
    pub fn capture(
        ledger: &OrderLedger,
        escrow: &CollateralEscrow,
        links: &CrossChainRegistry,
        last_sequence: u64,
    ) -> Self {
        let maker_index = ledger
            .maker_index()
            .into_iter()
            .map(|(maker, orders)| MakerIndexEntry { maker, orders })
            .collect();

        Self {
            version: SNAPSHOT_VERSION,
            saved_at: Utc::now(),
            last_sequence,
            orders: ledger.orders(),
            maker_index,
            escrow: escrow.entries(),
            links: links.links(),
        }
    }

    /// Check internal consistency and split into engine parts.
    ///
    /// Every indexed hash must name a stored order of that maker, every
    /// stored order must be indexed exactly once, and every link must point
    /// at a stored order.
    pub fn into_parts(self) -> Result<SnapshotParts> {
        if self.version != SNAPSHOT_VERSION {
            return Err(invalid(format!(
                "unsupported snapshot version {} (expected {})",
                self.version, SNAPSHOT_VERSION
            )));
        }

        for (hash, order) in &self.orders {
            if *hash != order.order_hash {
                return Err(invalid(format!(
                    "order stored under {} carries hash {}",
                    hash, order.order_hash
                )));
            }
        }

        let mut maker_index = BTreeMap::new();
        let mut indexed = BTreeSet::new();
        for entry in self.maker_index {
            for hash in &entry.orders {
                match self.orders.get(hash) {
                    Some(order) if order.maker == entry.maker => {}
                    Some(_) => {
                        return Err(invalid(format!(
                            "order {} indexed under the wrong maker {}",
                            hash, entry.maker
                        )))
                    }
                    None => return Err(invalid(format!("indexed order {} is missing", hash))),
                }
                if !indexed.insert(*hash) {
                    return Err(invalid(format!("order {} indexed twice", hash)));
                }
            }
            if maker_index.insert(entry.maker, entry.orders).is_some() {
                return Err(invalid(format!("maker {} indexed twice", entry.maker)));
            }
        }
        if indexed.len() != self.orders.len() {
            return Err(invalid(format!(
                "{} orders stored but {} indexed",
                self.orders.len(),
                indexed.len()
            )));
        }

        if let Some(link) = self
            .links
            .iter()
            .find(|link| !self.orders.contains_key(&link.ethereum_order_hash))
        {
            return Err(invalid(format!(
                "link {} points at unknown order {}",
                link.counterpart_order_hash, link.ethereum_order_hash
            )));
        }

        Ok(SnapshotParts {
            orders: self.orders,
            maker_index,
            escrow: self.escrow,
            links: self.links,
            last_sequence: self.last_sequence,
        })
    }

    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        info!(
            "Snapshot saved to {}: {} orders, {} escrow entries",
            path.display(),
            self.orders.len(),
            self.escrow.len()
        );
        Ok(())
    }

    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)?;
        let snapshot: Self = serde_json::from_str(&json)?;
        debug!(
            path = %path.display(),
            orders = snapshot.orders.len(),
            saved_at = %snapshot.saved_at,
            "snapshot loaded"
        );
        Ok(snapshot)
    }
}

fn invalid(reason: String) -> EngineError {
    EngineError::InvalidInput(format!("corrupt snapshot: {reason}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FixedPointAmount, OrderStatus, StrategyState};
    use alloy::primitives::B256;

    fn order(byte: u8, maker: Address) -> Order {
        Order {
            order_hash: OrderHash::from([byte; 32]),
            maker,
            nonce: 0,
            salt: B256::ZERO,
            status: OrderStatus::Active,
            created_at: 10,
            deadline: None,
            total_amount: FixedPointAmount::from_units(1000),
            executed_amount: FixedPointAmount::ZERO,
            strategy: StrategyState::Twap {
                token_in: Address::repeat_byte(0xaa),
                token_out: Address::repeat_byte(0xbb),
                intervals: 10,
                interval_duration: 3600,
                min_price_per_token: "0.95".parse().unwrap(),
                max_price_per_token: "1.05".parse().unwrap(),
                last_execution_time: 10,
                intervals_executed: 0,
            },
        }
    }

    fn populated() -> (OrderLedger, CollateralEscrow, CrossChainRegistry) {
        let maker = Address::repeat_byte(1);
        let ledger = OrderLedger::new();
        ledger.create(order(1, maker)).unwrap();

        let escrow = CollateralEscrow::new();
        escrow
            .commit(maker, Address::repeat_byte(0xaa), FixedPointAmount::from_units(1000))
            .unwrap();

        let links = CrossChainRegistry::new();
        links
            .attach(CrossChainOrderLink::pending(
                OrderHash::from([1u8; 32]),
                OrderHash::from([2u8; 32]),
                FixedPointAmount::from_units(1000),
                B256::repeat_byte(0x42),
                7_200,
            ))
            .unwrap();

        (ledger, escrow, links)
    }

    #[test]
    fn test_save_and_load() {
        let (ledger, escrow, links) = populated();
        let snapshot = LedgerSnapshot::capture(&ledger, &escrow, &links, 3);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot.json");
        snapshot.save_to(&path).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"0.95\""));

        let parts = LedgerSnapshot::load_from(&path)
            .unwrap()
            .into_parts()
            .unwrap();
        assert_eq!(parts.orders, ledger.orders());
        assert_eq!(parts.maker_index, ledger.maker_index());
        assert_eq!(parts.escrow, escrow.entries());
        assert_eq!(parts.links, links.links());
        assert_eq!(parts.last_sequence, 3);
    }

    #[test]
    fn test_unindexed_order_is_rejected() {
        let (ledger, escrow, links) = populated();
        let mut snapshot = LedgerSnapshot::capture(&ledger, &escrow, &links, 0);
        snapshot.maker_index.clear();

        let err = snapshot.into_parts().unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput(_)));
    }

    #[test]
    fn test_dangling_link_is_rejected() {
        let (ledger, escrow, links) = populated();
        let mut snapshot = LedgerSnapshot::capture(&ledger, &escrow, &links, 0);
        snapshot.links[0].ethereum_order_hash = OrderHash::from([9u8; 32]);

        assert!(snapshot.into_parts().is_err());
    }
}
