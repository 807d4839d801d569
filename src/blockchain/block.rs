use std::collections::BTreeMap;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::chain::BlockchainError;
use super::hash::{canonicalize, CanonicalBlock, HashError, HashStrategy};
use super::sector::Sector;

/// Record payload: field name to value, kept in lexicographic key order
pub type BlockData = BTreeMap<String, String>;

/// `previous_hash` of the genesis block
pub const GENESIS_PREVIOUS_HASH: &str = "0";

/// Fixed creation instant of the genesis block
pub const GENESIS_TIMESTAMP: &str = "2024-01-01T00:00:00.000Z";

/// Description stored in the genesis payload
pub const GENESIS_DESCRIPTION: &str = "ChainSphere genesis block";

/// Represents a block in the ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    /// Index of the block in the chain
    pub index: u64,

    /// Creation instant in RFC 3339 form with millisecond precision
    #[schema(example = "2024-01-01T12:00:00.000Z")]
    pub timestamp: String,

    /// Domain the record belongs to
    pub sector: Sector,

    /// Sector specific record fields
    #[schema(value_type = Object)]
    pub data: BlockData,

    /// Hash of the previous block
    pub previous_hash: String,

    /// Hash of the current block's canonical content
    pub hash: String,
}

impl Block {
    /// Creates a block and seals it with its hash
    pub fn new(
        index: u64,
        timestamp: String,
        sector: Sector,
        data: BlockData,
        previous_hash: String,
        hasher: &dyn HashStrategy,
    ) -> Result<Self, HashError> {
        let block = Block {
            index,
            timestamp,
            sector,
            data,
            previous_hash,
            hash: String::new(),
        };

        let hash = block.calculate_hash(hasher)?;

        Ok(Block { hash, ..block })
    }

    /// Creates the genesis block
    ///
    /// Every field is fixed, so two genesis blocks built with the same hash
    /// strategy are identical.
    pub fn genesis(hasher: &dyn HashStrategy) -> Result<Self, HashError> {
        let mut data = BlockData::new();
        data.insert("description".to_string(), GENESIS_DESCRIPTION.to_string());

        Block::new(
            0,
            GENESIS_TIMESTAMP.to_string(),
            Sector::Genesis,
            data,
            GENESIS_PREVIOUS_HASH.to_string(),
            hasher,
        )
    }

    /// Builds the candidate successor of `previous`
    ///
    /// Does not touch the ledger; the result still has to be appended.
    pub fn next(
        previous: &Block,
        sector: Sector,
        data: BlockData,
        hasher: &dyn HashStrategy,
    ) -> Result<Self, BlockchainError> {
        if sector.is_genesis() {
            return Err(BlockchainError::InvalidSector(sector.to_string()));
        }

        // No index follows u64::MAX
        let index = previous
            .index
            .checked_add(1)
            .ok_or_else(|| BlockchainError::ChainLink {
                expected_index: previous.index,
                expected_previous_hash: previous.hash.clone(),
                got_index: previous.index,
                got_previous_hash: previous.hash.clone(),
            })?;

        let block = Block::new(
            index,
            current_timestamp(),
            sector,
            data,
            previous.hash.clone(),
            hasher,
        )?;

        Ok(block)
    }

    /// Calculates the hash of the block's canonical content
    pub fn calculate_hash(&self, hasher: &dyn HashStrategy) -> Result<String, HashError> {
        let canonical = canonicalize(&CanonicalBlock::from(self))?;
        Ok(hasher.digest(&canonical))
    }

    /// Whether the stored hash matches the content
    pub fn has_valid_hash(&self, hasher: &dyn HashStrategy) -> bool {
        matches!(self.calculate_hash(hasher), Ok(hash) if hash == self.hash)
    }

    pub fn is_genesis(&self) -> bool {
        self.index == 0 && self.previous_hash == GENESIS_PREVIOUS_HASH
    }
}

fn current_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
