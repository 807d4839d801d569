//! Read-only lookups over a chain snapshot
//!
//! Both lookups scan linearly. Chains are expected to stay small; a hash
//! index belongs in front of these if that stops being true.

use std::collections::BTreeMap;

use super::block::{Block, BlockData};
use super::sector::Sector;

/// Finds the block whose hash equals `hash`
pub fn find_by_hash<'a>(chain: &'a [Block], hash: &str) -> Option<&'a Block> {
    chain.iter().find(|block| block.hash == hash)
}

/// Finds the first block of `sector` whose payload has exactly the same
/// fields and values as `data`
pub fn find_by_exact_payload<'a>(
    chain: &'a [Block],
    sector: Sector,
    data: &BlockData,
) -> Option<&'a Block> {
    chain
        .iter()
        .find(|block| block.sector == sector && &block.data == data)
}

/// Number of blocks per sector, genesis included
pub fn sector_counts(chain: &[Block]) -> BTreeMap<Sector, usize> {
    chain.iter().fold(BTreeMap::new(), |mut counts, block| {
        *counts.entry(block.sector).or_insert(0) += 1;
        counts
    })
}
