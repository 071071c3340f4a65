//! Hex encodings for addresses and 32-byte words in serialized state.

use alloy::primitives::{Address, B256};

pub fn parse_address(input: &str) -> Result<Address, String> {
    let bytes = decode_hex(input)?;
    if bytes.len() != 20 {
        return Err(format!("expected 20-byte address, got {} bytes", bytes.len()));
    }
    Ok(Address::from_slice(&bytes))
}

pub fn parse_b256(input: &str) -> Result<B256, String> {
    let bytes = decode_hex(input)?;
    if bytes.len() > 32 {
        return Err(format!("expected at most 32 bytes, got {}", bytes.len()));
    }
    // Short values are left-padded, so "0x01" is a valid salt
    let mut word = [0u8; 32];
    word[32 - bytes.len()..].copy_from_slice(&bytes);
    Ok(B256::from(word))
}

pub fn encode_hex(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

fn decode_hex(input: &str) -> Result<Vec<u8>, String> {
    let raw = input.trim();
    let raw = raw.strip_prefix("0x").unwrap_or(raw);
    let raw = if raw.len() % 2 == 1 {
        format!("0{raw}")
    } else {
        raw.to_string()
    };
    hex::decode(&raw).map_err(|e| format!("invalid hex '{input}': {e}"))
}

/// `#[serde(with = "codec::address")]`
pub mod address {
    use alloy::primitives::Address;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Address, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::encode_hex(value.as_slice()))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Address, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_address(&raw).map_err(de::Error::custom)
    }
}

/// `#[serde(with = "codec::b256")]`
pub mod b256 {
    use alloy::primitives::B256;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &B256, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::encode_hex(value.as_slice()))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<B256, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_b256(&raw).map_err(de::Error::custom)
    }
}
