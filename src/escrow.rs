//! Ledger-side collateral bookkeeping per `(maker, asset)`.
//!
//! The escrow only tracks how much of a maker's balance is reserved against
//! active orders. Actual custody is external; the engine turns every applied
//! operation into a [`TransferIntent`](crate::adapters::TransferIntent).

use std::collections::HashMap;
use std::sync::Mutex;

use alloy::primitives::Address;
use serde::{Deserialize, Serialize};

use crate::domain::{codec, FixedPointAmount};
use crate::error::{ResourceError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscrowOp {
    Commit {
        maker: Address,
        asset: Address,
        amount: FixedPointAmount,
    },
    /// Back to the maker
    Release {
        maker: Address,
        asset: Address,
        amount: FixedPointAmount,
    },
    /// Settled to a counterparty
    Consume {
        maker: Address,
        asset: Address,
        amount: FixedPointAmount,
        recipient: Address,
    },
}

impl EscrowOp {
    fn key(&self) -> (Address, Address) {
        match *self {
            EscrowOp::Commit { maker, asset, .. }
            | EscrowOp::Release { maker, asset, .. }
            | EscrowOp::Consume { maker, asset, .. } => (maker, asset),
        }
    }

    pub fn amount(&self) -> FixedPointAmount {
        match *self {
            EscrowOp::Commit { amount, .. }
            | EscrowOp::Release { amount, .. }
            | EscrowOp::Consume { amount, .. } => amount,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscrowEntry {
    #[serde(with = "codec::address")]
    pub maker: Address,
    #[serde(with = "codec::address")]
    pub asset: Address,
    pub committed: FixedPointAmount,
}

#[derive(Debug, Default)]
pub struct CollateralEscrow {
    committed: Mutex<HashMap<(Address, Address), FixedPointAmount>>,
}

impl CollateralEscrow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commit(&self, maker: Address, asset: Address, amount: FixedPointAmount) -> Result<()> {
        self.apply(&[EscrowOp::Commit {
            maker,
            asset,
            amount,
        }])
    }

    /// Fails with `InsufficientCommitted` if `amount` exceeds the committed balance
    pub fn release(&self, maker: Address, asset: Address, amount: FixedPointAmount) -> Result<()> {
        self.apply(&[EscrowOp::Release {
            maker,
            asset,
            amount,
        }])
    }

    pub fn consume(
        &self,
        maker: Address,
        asset: Address,
        amount: FixedPointAmount,
        recipient: Address,
    ) -> Result<()> {
        self.apply(&[EscrowOp::Consume {
            maker,
            asset,
            amount,
            recipient,
        }])
    }

    /// Apply a batch of operations, all or nothing.
    ///
    /// Operations are evaluated in order against a working copy of the
    /// touched entries; the live map is written only if every one succeeds.
    pub fn apply(&self, ops: &[EscrowOp]) -> Result<()> {
        let mut committed = self
            .committed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let mut working: HashMap<(Address, Address), FixedPointAmount> = HashMap::new();
        for op in ops {
            let key = op.key();
            let current = working
                .get(&key)
                .or_else(|| committed.get(&key))
                .copied()
                .unwrap_or(FixedPointAmount::ZERO);

            let next = match *op {
                EscrowOp::Commit { amount, .. } => current.checked_add(amount)?,
                EscrowOp::Release {
                    maker,
                    asset,
                    amount,
                }
                | EscrowOp::Consume {
                    maker,
                    asset,
                    amount,
                    ..
                } => {
                    if amount > current {
                        return Err(ResourceError::InsufficientCommitted {
                            maker,
                            asset,
                            requested: amount,
                            committed: current,
                        }
                        .into());
                    }
                    current.checked_sub(amount)?
                }
            };
            working.insert(key, next);
        }

        for (key, value) in working {
            if value.is_zero() {
                committed.remove(&key);
            } else {
                committed.insert(key, value);
            }
        }

        Ok(())
    }

    pub fn committed(&self, maker: Address, asset: Address) -> FixedPointAmount {
        self.committed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&(maker, asset))
            .copied()
            .unwrap_or(FixedPointAmount::ZERO)
    }

    /// Non-zero entries, sorted by maker then asset
    pub fn entries(&self) -> Vec<EscrowEntry> {
        let committed = self
            .committed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut entries: Vec<EscrowEntry> = committed
            .iter()
            .map(|(&(maker, asset), &amount)| EscrowEntry {
                maker,
                asset,
                committed: amount,
            })
            .collect();
        entries.sort_by(|a, b| (a.maker, a.asset).cmp(&(b.maker, b.asset)));
        entries
    }

    pub fn restore(entries: &[EscrowEntry]) -> Self {
        let committed = entries
            .iter()
            .filter(|e| !e.committed.is_zero())
            .map(|e| ((e.maker, e.asset), e.committed))
            .collect();
        Self {
            committed: Mutex::new(committed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;

    fn amt(s: &str) -> FixedPointAmount {
        s.parse().unwrap()
    }

    fn maker() -> Address {
        Address::repeat_byte(0x01)
    }

    fn asset() -> Address {
        Address::repeat_byte(0xaa)
    }

    fn taker() -> Address {
        Address::repeat_byte(0x02)
    }

    #[test]
    fn test_commit_release_consume() {
        let escrow = CollateralEscrow::new();
        escrow.commit(maker(), asset(), amt("1000")).unwrap();
        escrow.consume(maker(), asset(), amt("400"), taker()).unwrap();
        escrow.release(maker(), asset(), amt("600")).unwrap();
        assert_eq!(escrow.committed(maker(), asset()), FixedPointAmount::ZERO);
        assert!(escrow.entries().is_empty());
    }

    #[test]
    fn test_release_more_than_committed_fails() {
        let escrow = CollateralEscrow::new();
        escrow.commit(maker(), asset(), amt("10")).unwrap();

        let err = escrow.release(maker(), asset(), amt("10.5")).unwrap_err();
        assert!(matches!(
            err,
            EngineError::Resource(ResourceError::InsufficientCommitted { .. })
        ));
        assert_eq!(escrow.committed(maker(), asset()), amt("10"));
    }

    #[test]
    fn test_batch_is_all_or_nothing() {
        let escrow = CollateralEscrow::new();
        escrow.commit(maker(), asset(), amt("100")).unwrap();

        let other = Address::repeat_byte(0xbb);
        let result = escrow.apply(&[
            EscrowOp::Release {
                maker: maker(),
                asset: asset(),
                amount: amt("60"),
            },
            EscrowOp::Commit {
                maker: maker(),
                asset: other,
                amount: amt("5"),
            },
            // Only 40 left after the first op
            EscrowOp::Consume {
                maker: maker(),
                asset: asset(),
                amount: amt("50"),
                recipient: taker(),
            },
        ]);

        assert!(result.is_err());
        assert_eq!(escrow.committed(maker(), asset()), amt("100"));
        assert_eq!(escrow.committed(maker(), other), FixedPointAmount::ZERO);
    }

    #[test]
    fn test_entries_restore() {
        let escrow = CollateralEscrow::new();
        escrow.commit(maker(), asset(), amt("3")).unwrap();
        escrow.commit(taker(), asset(), amt("4")).unwrap();

        let restored = CollateralEscrow::restore(&escrow.entries());
        assert_eq!(restored.entries(), escrow.entries());
        assert_eq!(restored.committed(taker(), asset()), amt("4"));
    }
}
