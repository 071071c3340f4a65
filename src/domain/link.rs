use alloy::primitives::B256;
use serde::{Deserialize, Serialize};

use super::amount::FixedPointAmount;
use super::codec;
use super::hash::OrderHash;
use super::state::LinkStatus;

/// Linkage between a local order and its HTLC counterpart on a second chain.
///
/// Bookkeeping only: the preimage check behind `hashlock` and the refund
/// after `timelock` happen in the counterpart HTLC module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrossChainOrderLink {
    /// Order on this (Ethereum-side) ledger
    pub ethereum_order_hash: OrderHash,
    /// Order or HTLC id on the counterpart chain (e.g. Sui)
    pub counterpart_order_hash: OrderHash,
    pub amount: FixedPointAmount,
    #[serde(with = "codec::b256")]
    pub hashlock: B256,
    pub timelock: u64,
    pub status: LinkStatus,
}

impl CrossChainOrderLink {
    pub fn pending(
        ethereum_order_hash: OrderHash,
        counterpart_order_hash: OrderHash,
        amount: FixedPointAmount,
        hashlock: B256,
        timelock: u64,
    ) -> Self {
        Self {
            ethereum_order_hash,
            counterpart_order_hash,
            amount,
            hashlock,
            timelock,
            status: LinkStatus::Pending,
        }
    }
}
