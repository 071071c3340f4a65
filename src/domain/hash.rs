//! Order identifiers.
//!
//! An order hash is a pure function of `(maker, strategy kind, creation nonce,
//! salt)`. The byte layout fed to the hash function is fixed (four 32-byte
//! words, ABI style) so any host can reproduce identifiers for cross-chain
//! linkage; the hash function itself is pluggable through [`OrderHasher`].

use std::fmt;
use std::str::FromStr;

use alloy::primitives::{keccak256, Address, B256};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use super::codec;
use super::order::StrategyKind;

/// Opaque 32-byte order identifier
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OrderHash(B256);

impl OrderHash {
    pub const fn new(bytes: B256) -> Self {
        Self(bytes)
    }

    pub fn as_b256(&self) -> B256 {
        self.0
    }

    /// First 4 bytes in hex, for log lines
    pub fn short(&self) -> String {
        hex::encode(&self.0.as_slice()[..4])
    }
}

impl From<[u8; 32]> for OrderHash {
    fn from(bytes: [u8; 32]) -> Self {
        Self(B256::from(bytes))
    }
}

impl fmt::Display for OrderHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", codec::encode_hex(self.0.as_slice()))
    }
}

impl fmt::Debug for OrderHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OrderHash({})", self)
    }
}

impl FromStr for OrderHash {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        codec::parse_b256(s).map(Self)
    }
}

impl Serialize for OrderHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for OrderHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

/// Inputs to order-hash derivation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderHashInput {
    pub maker: Address,
    pub kind: StrategyKind,
    pub nonce: u64,
    pub salt: B256,
}

impl OrderHashInput {
    /// 128-byte preimage: maker, kind tag, nonce and salt, each left-padded to 32 bytes
    pub fn encode(&self) -> [u8; 128] {
        let mut buf = [0u8; 128];
        buf[12..32].copy_from_slice(self.maker.as_slice());
        buf[63] = self.kind.tag();
        buf[88..96].copy_from_slice(&self.nonce.to_be_bytes());
        buf[96..128].copy_from_slice(self.salt.as_slice());
        buf
    }
}

/// Hash-function collaborator used to derive order identifiers
pub trait OrderHasher: Send + Sync {
    fn name(&self) -> &'static str;

    fn order_hash(&self, input: &OrderHashInput) -> OrderHash;
}

/// Keccak-256, matching EVM-side identifiers
#[derive(Debug, Default, Clone, Copy)]
pub struct Keccak256OrderHasher;

impl OrderHasher for Keccak256OrderHasher {
    fn name(&self) -> &'static str {
        "keccak256"
    }

    fn order_hash(&self, input: &OrderHashInput) -> OrderHash {
        OrderHash(keccak256(input.encode()))
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct Sha256OrderHasher;

impl OrderHasher for Sha256OrderHasher {
    fn name(&self) -> &'static str {
        "sha256"
    }

    fn order_hash(&self, input: &OrderHashInput) -> OrderHash {
        let mut hasher = Sha256::new();
        hasher.update(input.encode());
        let digest: [u8; 32] = hasher.finalize().into();
        OrderHash::from(digest)
    }
}
