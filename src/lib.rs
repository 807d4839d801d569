//! ChainSphere: a tamper-evident ledger for sector records
//!
//! Agriculture, health and logistics records are sealed into hash-linked
//! blocks. Any later change to a stored record is detectable by validating
//! the chain.

pub mod api;
pub mod blockchain;
pub mod config;
