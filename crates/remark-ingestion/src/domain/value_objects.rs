//! # Value Objects
//!
//! Immutable identifiers and argument shapes used across the pipeline.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// 32-byte block hash, rendered as `0x`-prefixed lowercase hex.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct BlockHash(pub [u8; 32]);

impl BlockHash {
    /// Wrap raw hash bytes.
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Raw hash bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Hex rendering with `0x` prefix.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl fmt::Display for BlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for BlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlockHash({})", self)
    }
}

impl FromStr for BlockHash {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.strip_prefix("0x").unwrap_or(s);
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(digits, &mut bytes)?;
        Ok(Self(bytes))
    }
}

impl Serialize for BlockHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for BlockHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Location of one physical on-chain occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockchainRef {
    /// Hash of the containing block.
    pub block_hash: BlockHash,
    /// Index of the extrinsic within the block.
    pub extrinsic_index: u32,
    /// Number of the containing block.
    pub block_number: u64,
}

impl fmt::Display for BlockchainRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}@{}", self.block_hash, self.extrinsic_index, self.block_number)
    }
}

/// Dedup identity of a processed event.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ProcessedEventKey {
    /// Stable block/extrinsic identifiers.
    Chain(BlockchainRef),
    /// Emergency id, used when no extrinsic index is known.
    Emergency(String),
}

impl ProcessedEventKey {
    /// Key for a block/extrinsic position.
    pub fn chain(block_hash: BlockHash, extrinsic_index: u32, block_number: u64) -> Self {
        Self::Chain(BlockchainRef {
            block_hash,
            extrinsic_index,
            block_number,
        })
    }
}

impl fmt::Display for ProcessedEventKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Chain(r) => fmt::Display::fmt(r, f),
            Self::Emergency(id) => write!(f, "emergency:{}", id),
        }
    }
}

/// A remark argument as handed over by a transport backend.
///
/// Client libraries expose remark data in several shapes. Backends resolve
/// the shape once, at the boundary, into this closed set; the normalizer
/// then matches on it instead of probing values for capabilities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum RemarkArg {
    /// Already text, possibly `0x`-prefixed hex.
    Text(String),
    /// Raw byte buffer.
    Bytes(Vec<u8>),
    /// Lazily materializable wrapper.
    Wrapped(ByteCapability),
    /// The backend's generic string rendering of an unknown value.
    Rendered(String),
}

/// Byte materialization capability exposed by a wrapped value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum ByteCapability {
    /// Wrapper can produce hex text.
    Hex(String),
    /// Wrapper can produce raw bytes.
    Raw(Vec<u8>),
}
