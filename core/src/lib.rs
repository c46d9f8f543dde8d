//! Tamra Vault Core Library
//!
//! Capped reward accounting: per-account ledgers, the global supply
//! governor, level/badge derivation and the transactional stores they live in.

pub mod account;
pub mod constants;
pub mod db;
pub mod derivation;
pub mod error;
pub mod ledger;
pub mod memory;
pub mod retry;
pub mod store;
pub mod supply;

// Re-export main types
pub use account::{AccountId, AccountLedger, Badge, NewAccount, ReferredUser};
pub use db::LedgerDB;
pub use derivation::{derive_level_and_badges, level_for_balance, DerivedUpdate};
pub use error::{LedgerError, Result};
pub use ledger::{Correction, Ledger, MiningClaim, ReferralOutcome, SignupOutcome};
pub use memory::MemoryStore;
pub use retry::RetryPolicy;
pub use store::{LedgerStore, LedgerTxn, StoreEvent};
pub use supply::{SupplyGovernor, SupplyStats};
