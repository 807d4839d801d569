//! Chain integrity checks
//!
//! Detection only: nothing here repairs or mutates a chain.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::block::Block;
use super::hash::HashStrategy;

/// The kind of integrity violation found at a block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum BreakKind {
    /// The chain holds no blocks at all
    EmptyChain,
    /// First block is not index 0 with the sentinel previous hash
    InvalidGenesis,
    /// Index does not follow the previous block's index
    IndexGap,
    /// `previous_hash` does not equal the previous block's hash
    LinkMismatch,
    /// Stored hash does not match the block's content
    HashMismatch,
}

/// First integrity violation found
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ChainBreak {
    /// Position in the chain of the offending block
    pub position: usize,

    /// What was wrong with it
    pub kind: BreakKind,
}

/// Outcome of walking a chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ValidationReport {
    /// Whether every block passed
    pub valid: bool,

    /// Number of blocks in the inspected snapshot
    pub checked_blocks: usize,

    /// The first violation, if any
    pub first_break: Option<ChainBreak>,
}

/// Returns whether `chain` satisfies every ledger invariant
pub fn validate(chain: &[Block], hasher: &dyn HashStrategy) -> bool {
    first_break(chain, hasher).is_none()
}

/// Walks `chain` and reports the first violation found
pub fn inspect(chain: &[Block], hasher: &dyn HashStrategy) -> ValidationReport {
    let first_break = first_break(chain, hasher);

    ValidationReport {
        valid: first_break.is_none(),
        checked_blocks: chain.len(),
        first_break,
    }
}

fn first_break(chain: &[Block], hasher: &dyn HashStrategy) -> Option<ChainBreak> {
    let at = |position, kind| Some(ChainBreak { position, kind });

    let genesis = match chain.first() {
        Some(genesis) => genesis,
        None => return at(0, BreakKind::EmptyChain),
    };

    if !genesis.is_genesis() {
        return at(0, BreakKind::InvalidGenesis);
    }

    if !genesis.has_valid_hash(hasher) {
        return at(0, BreakKind::HashMismatch);
    }

    for (position, pair) in chain.windows(2).enumerate() {
        let (previous, current) = (&pair[0], &pair[1]);
        let position = position + 1;

        if !current.has_valid_hash(hasher) {
            return at(position, BreakKind::HashMismatch);
        }

        if current.previous_hash != previous.hash {
            return at(position, BreakKind::LinkMismatch);
        }

        if previous.index.checked_add(1) != Some(current.index) {
            return at(position, BreakKind::IndexGap);
        }
    }

    None
}
