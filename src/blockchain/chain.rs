use std::collections::BTreeMap;
use std::sync::Arc;

use log::{debug, error, info, warn};
use parking_lot::RwLock;
use thiserror::Error;
use tokio::sync::broadcast;

use super::block::{Block, BlockData};
use super::hash::{HashError, HashStrategy, Sha256Hasher};
use super::query;
use super::sector::Sector;
use super::storage::{BlockchainStorage, StorageError};
use super::validation::{self, ValidationReport};

/// Capacity of the change notification channel
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Errors that can occur during blockchain operations
#[derive(Debug, Error)]
pub enum BlockchainError {
    #[error("Invalid sector: {0}")]
    InvalidSector(String),

    #[error(
        "Chain link error: expected index {expected_index} with previous hash {expected_previous_hash}, \
         got index {got_index} with previous hash {got_previous_hash}"
    )]
    ChainLink {
        expected_index: u64,
        expected_previous_hash: String,
        got_index: u64,
        got_previous_hash: String,
    },

    #[error("Persistence error: {0}")]
    Persistence(#[from] StorageError),

    #[error("Hash error: {0}")]
    Hash(#[from] HashError),
}

/// Change notifications published by the ledger
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainEvent {
    /// A block was appended
    BlockAdded(Block),

    /// The chain was reset; carries the new genesis block
    Cleared(Block),
}

/// Ordered block sequence that always holds at least the genesis block
#[derive(Debug)]
struct BlockSequence(Vec<Block>);

impl BlockSequence {
    fn seeded(genesis: Block) -> Self {
        BlockSequence(vec![genesis])
    }

    fn restored(blocks: Vec<Block>) -> Option<Self> {
        if blocks.is_empty() {
            None
        } else {
            Some(BlockSequence(blocks))
        }
    }

    fn tip(&self) -> &Block {
        // Never empty by construction
        &self.0[self.0.len() - 1]
    }

    fn blocks(&self) -> &[Block] {
        &self.0
    }

    /// Appends `candidate` if it extends the tip, leaving the sequence
    /// untouched otherwise
    fn push_linked(&mut self, candidate: Block) -> Result<(), BlockchainError> {
        let tip = self.tip();
        let expected_index = tip.index.checked_add(1);

        if expected_index != Some(candidate.index) || candidate.previous_hash != tip.hash {
            return Err(BlockchainError::ChainLink {
                expected_index: expected_index.unwrap_or(tip.index),
                expected_previous_hash: tip.hash.clone(),
                got_index: candidate.index,
                got_previous_hash: candidate.previous_hash,
            });
        }

        self.0.push(candidate);
        Ok(())
    }
}

/// Represents the ledger
///
/// Cloning yields another handle to the same ledger. Mutations (`append`,
/// `add_block`, `clear_chain`) run under an exclusive lock, reads share it,
/// so a reader never sees a half-applied change.
#[derive(Debug, Clone)]
pub struct Blockchain {
    /// The chain of blocks
    chain: Arc<RwLock<BlockSequence>>,

    /// Digest used for every block this ledger seals or checks
    hasher: Arc<dyn HashStrategy>,

    /// Durable copy of the chain
    storage: BlockchainStorage,

    /// Change notifications
    events: broadcast::Sender<ChainEvent>,
}

impl Blockchain {
    /// Opens the ledger over `storage` using SHA-256
    ///
    /// Restores the stored chain if there is one. If nothing is stored, or the
    /// stored record cannot be read, a fresh genesis block is created and
    /// persisted right away. The restored chain is not validated here.
    pub fn open(storage: BlockchainStorage) -> Result<Self, BlockchainError> {
        Self::open_with_hasher(storage, Arc::new(Sha256Hasher))
    }

    /// Opens the ledger with an explicit hash strategy
    pub fn open_with_hasher(
        storage: BlockchainStorage,
        hasher: Arc<dyn HashStrategy>,
    ) -> Result<Self, BlockchainError> {
        info!("Opening ledger with {} block hashing", hasher.name());

        let restored = match storage.load_chain() {
            Ok(Some(blocks)) => {
                let restored = BlockSequence::restored(blocks);
                if restored.is_none() {
                    warn!(
                        "Stored chain under key {} holds no blocks, reseeding with genesis block",
                        storage.key()
                    );
                }
                restored
            }
            Ok(None) => {
                info!(
                    "No existing chain found under key {}, creating genesis block",
                    storage.key()
                );
                None
            }
            Err(err) => {
                warn!(
                    "Stored chain under key {} is unreadable ({}), reseeding with genesis block",
                    storage.key(),
                    err
                );
                None
            }
        };

        let chain = match restored {
            Some(chain) => {
                info!("Restored {} blocks from storage", chain.blocks().len());
                chain
            }
            None => {
                let chain = BlockSequence::seeded(Block::genesis(hasher.as_ref())?);
                storage.save_chain(chain.blocks())?;
                chain
            }
        };

        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Ok(Blockchain {
            chain: Arc::new(RwLock::new(chain)),
            hasher,
            storage,
            events,
        })
    }

    /// Creates a ledger backed by a fresh in-memory store
    pub fn in_memory() -> Result<Self, BlockchainError> {
        Self::open(BlockchainStorage::in_memory())
    }

    /// The hash strategy this ledger was built with
    pub fn hasher(&self) -> &dyn HashStrategy {
        self.hasher.as_ref()
    }

    /// Subscribes to change notifications
    pub fn subscribe(&self) -> broadcast::Receiver<ChainEvent> {
        self.events.subscribe()
    }

    /// Appends a candidate block built elsewhere
    ///
    /// # Arguments
    ///
    /// * `candidate` - A block whose index and previous hash extend the current tip
    ///
    /// # Returns
    ///
    /// The appended block. Fails with `ChainLink` (ledger unchanged) if the
    /// candidate does not extend the tip, or with `Persistence` if the block
    /// was appended in memory but could not be made durable.
    pub fn append(&self, candidate: Block) -> Result<Block, BlockchainError> {
        let mut chain = self.chain.write();
        chain.push_linked(candidate)?;
        self.after_append(chain)
    }

    /// Creates a block for `sector` with `data` and appends it
    ///
    /// Building and appending happen under one lock, so concurrent callers
    /// never race for the same index.
    pub fn add_block(&self, sector: Sector, data: BlockData) -> Result<Block, BlockchainError> {
        let mut chain = self.chain.write();
        let candidate = Block::next(chain.tip(), sector, data, self.hasher.as_ref())?;
        chain.push_linked(candidate)?;
        self.after_append(chain)
    }

    fn after_append(
        &self,
        chain: parking_lot::RwLockWriteGuard<'_, BlockSequence>,
    ) -> Result<Block, BlockchainError> {
        let block = chain.tip().clone();
        let persisted = self.storage.save_chain(chain.blocks());
        // Publish under the lock so subscribers see mutations in ledger order
        let _ = self.events.send(ChainEvent::BlockAdded(block.clone()));
        drop(chain);

        info!(
            "Appended block {} ({}) with hash {}",
            block.index,
            block.sector,
            &block.hash[..block.hash.len().min(12)]
        );

        if let Err(err) = persisted {
            error!(
                "Failed to persist block {}, it is held in memory only: {}",
                block.index, err
            );
            return Err(err.into());
        }

        Ok(block)
    }

    /// Gets the last block in the chain
    pub fn get_latest_block(&self) -> Block {
        self.chain.read().tip().clone()
    }

    /// Gets a snapshot of the entire chain
    pub fn get_chain(&self) -> Vec<Block> {
        self.chain.read().blocks().to_vec()
    }

    /// Number of blocks, genesis included
    pub fn chain_length(&self) -> usize {
        self.chain.read().blocks().len()
    }

    /// Validates the blockchain
    ///
    /// # Returns
    ///
    /// true if the blockchain is valid, false otherwise
    pub fn is_valid(&self) -> bool {
        self.validation_report().valid
    }

    /// Validates the chain and reports the first violation found
    pub fn validation_report(&self) -> ValidationReport {
        let chain = self.chain.read();
        let report = validation::inspect(chain.blocks(), self.hasher.as_ref());

        if let Some(chain_break) = &report.first_break {
            warn!(
                "Chain integrity check failed at position {}: {:?}",
                chain_break.position, chain_break.kind
            );
        }

        report
    }

    /// Finds the block with the given hash
    pub fn find_block_by_hash(&self, hash: &str) -> Option<Block> {
        let chain = self.chain.read();
        query::find_by_hash(chain.blocks(), hash).cloned()
    }

    /// Finds the block recording exactly `data` under `sector`
    pub fn verify_data(&self, sector: Sector, data: &BlockData) -> Option<Block> {
        let chain = self.chain.read();
        query::find_by_exact_payload(chain.blocks(), sector, data).cloned()
    }

    /// Number of blocks per sector
    pub fn sector_counts(&self) -> BTreeMap<Sector, usize> {
        query::sector_counts(self.chain.read().blocks())
    }

    /// Discards every block and reseeds the chain with a fresh genesis block
    ///
    /// # Returns
    ///
    /// The new genesis block. A `Persistence` error means the reset took
    /// effect in memory but the stored chain still holds the old history.
    pub fn clear_chain(&self) -> Result<Block, BlockchainError> {
        let genesis = Block::genesis(self.hasher.as_ref())?;

        let mut chain = self.chain.write();
        let discarded = chain.blocks().len();
        *chain = BlockSequence::seeded(genesis.clone());
        let persisted = self.storage.save_chain(chain.blocks());
        let _ = self.events.send(ChainEvent::Cleared(genesis.clone()));
        drop(chain);

        warn!("Chain cleared, {} blocks discarded", discarded);

        if let Err(err) = persisted {
            error!("Failed to persist cleared chain: {}", err);
            return Err(err.into());
        }

        Ok(genesis)
    }

    /// Writes the current chain to storage one last time
    pub fn shutdown(&self) -> Result<(), BlockchainError> {
        let chain = self.chain.read();
        self.storage.save_chain(chain.blocks())?;
        debug!("Final persist of {} blocks complete", chain.blocks().len());
        Ok(())
    }
}
