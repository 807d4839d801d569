// Blockchain module
//
// This module contains the ledger core:
// - Block structure and construction
// - Canonical hashing
// - Ledger store and persistence
// - Chain validation
// - Lookups

pub mod block;
pub mod chain;
pub mod hash;
pub mod query;
pub mod sector;
pub mod storage;
pub mod validation;

// Re-export main components for easier access
pub use block::{Block, BlockData};
pub use chain::{Blockchain, BlockchainError, ChainEvent};
pub use hash::{HashStrategy, Sha256Hasher};
pub use sector::Sector;
pub use storage::{BlockchainStorage, FileStore, KeyValueStore, MemoryStore, SledStore, StorageError};
pub use validation::ValidationReport;
