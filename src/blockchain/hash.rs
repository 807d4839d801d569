use std::fmt;

use serde::Serialize;
use sha2::{Digest, Sha256};
use thiserror::Error;

use super::block::{Block, BlockData};
use super::sector::Sector;

/// Errors that can occur while encoding a block for hashing
#[derive(Debug, Error)]
pub enum HashError {
    #[error("Failed to canonicalize block: {0}")]
    Canonicalization(#[from] serde_json::Error),
}

/// The hashed view of a block
///
/// Field order is fixed by declaration order, and `BlockData` is a `BTreeMap`,
/// so payload keys always serialize lexicographically. The `hash` field is
/// never part of the canonical content.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalBlock<'a> {
    pub index: u64,
    pub timestamp: &'a str,
    pub sector: Sector,
    pub data: &'a BlockData,
    pub previous_hash: &'a str,
}

impl<'a> From<&'a Block> for CanonicalBlock<'a> {
    fn from(block: &'a Block) -> Self {
        CanonicalBlock {
            index: block.index,
            timestamp: &block.timestamp,
            sector: block.sector,
            data: &block.data,
            previous_hash: &block.previous_hash,
        }
    }
}

/// Encodes the content of a block as a compact JSON string
///
/// Equal logical content always yields a byte-identical string.
pub fn canonicalize(block: &CanonicalBlock<'_>) -> Result<String, HashError> {
    Ok(serde_json::to_string(block)?)
}

/// A digest function applied to canonical block content
///
/// The ledger is constructed with exactly one strategy and uses it for every
/// block it creates or validates.
pub trait HashStrategy: fmt::Debug + Send + Sync {
    /// Name of the algorithm, for logs and diagnostics
    fn name(&self) -> &'static str;

    /// Returns the lowercase hex digest of `canonical`
    fn digest(&self, canonical: &str) -> String;
}

/// SHA-256 over the UTF-8 bytes of the canonical string
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256Hasher;

impl HashStrategy for Sha256Hasher {
    fn name(&self) -> &'static str {
        "sha256"
    }

    fn digest(&self, canonical: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(canonical.as_bytes());
        hex::encode(hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_data() -> BlockData {
        let mut data = BlockData::new();
        data.insert("location".to_string(), "CA".to_string());
        data.insert("farmName".to_string(), "Sunny Valley".to_string());
        data
    }

    #[test]
    fn test_sha256_known_vector() {
        let digest = Sha256Hasher.digest("hello world");
        assert_eq!(
            digest,
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
        assert_eq!(digest.len(), 64);
    }

    #[test]
    fn test_canonical_field_and_key_order() {
        let data = sample_data();
        let canonical = CanonicalBlock {
            index: 3,
            timestamp: "2024-01-01T00:00:00.000Z",
            sector: Sector::Agriculture,
            data: &data,
            previous_hash: "abc",
        };

        let encoded = canonicalize(&canonical).unwrap();
        assert_eq!(
            encoded,
            r#"{"index":3,"timestamp":"2024-01-01T00:00:00.000Z","sector":"agriculture","data":{"farmName":"Sunny Valley","location":"CA"},"previousHash":"abc"}"#
        );
    }

    #[test]
    fn test_insertion_order_does_not_change_encoding() {
        let forward = sample_data();
        let mut reverse = BlockData::new();
        reverse.insert("farmName".to_string(), "Sunny Valley".to_string());
        reverse.insert("location".to_string(), "CA".to_string());

        let a = CanonicalBlock {
            index: 1,
            timestamp: "t",
            sector: Sector::Health,
            data: &forward,
            previous_hash: "0",
        };
        let b = CanonicalBlock { data: &reverse, ..a };

        let a = canonicalize(&a).unwrap();
        let b = canonicalize(&b).unwrap();
        assert_eq!(a, b);
        assert_eq!(Sha256Hasher.digest(&a), Sha256Hasher.digest(&b));
    }
}
