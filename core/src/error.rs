//! Ledger error types

use crate::account::AccountId;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Invalid amount: {requested} (awards must be positive)")]
    InvalidAmount { requested: u64 },

    #[error("Supply cap of {cap} tokens reached")]
    SupplyCapReached { cap: u64 },

    #[error("Task already completed: {task_id}")]
    AlreadyCompleted { task_id: String },

    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),

    #[error("Account already exists: {0}")]
    AccountExists(AccountId),

    #[error("Transaction conflict, retry")]
    TransactionConflict,

    #[error("Invalid payout address: {0}")]
    InvalidAddress(String),

    #[error("Invalid display name: {0}")]
    InvalidDisplayName(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl LedgerError {
    /// Only conflicts are safe to retry blindly
    pub fn is_retryable(&self) -> bool {
        matches!(self, LedgerError::TransactionConflict)
    }

    /// Message suitable for showing to the account owner
    pub fn user_message(&self) -> String {
        match self {
            LedgerError::InvalidAmount { .. } => "That reward amount is not valid.".to_string(),
            LedgerError::SupplyCapReached { .. } => {
                "All TAMRA tokens have been claimed. No more rewards can be paid out right now."
                    .to_string()
            }
            LedgerError::AlreadyCompleted { .. } => {
                "You have already completed this task.".to_string()
            }
            LedgerError::AccountNotFound(_) => "Account not found.".to_string(),
            LedgerError::AccountExists(_) => {
                "This account is already registered. Please log in.".to_string()
            }
            LedgerError::TransactionConflict => {
                "The vault is busy. Please try again.".to_string()
            }
            LedgerError::InvalidAddress(_) => "That payout address is not valid.".to_string(),
            LedgerError::InvalidDisplayName(_) => "That display name is not valid.".to_string(),
            LedgerError::Storage(_) | LedgerError::Serialization(_) => {
                "Something went wrong. Please try again.".to_string()
            }
        }
    }
}

impl From<sled::Error> for LedgerError {
    fn from(e: sled::Error) -> Self {
        LedgerError::Storage(e.to_string())
    }
}

impl From<bincode::Error> for LedgerError {
    fn from(e: bincode::Error) -> Self {
        LedgerError::Serialization(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, LedgerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_conflicts_retry() {
        assert!(LedgerError::TransactionConflict.is_retryable());
        assert!(!LedgerError::SupplyCapReached { cap: 1 }.is_retryable());
        assert!(!LedgerError::Storage("io".into()).is_retryable());
    }

    #[test]
    fn test_cap_and_completed_messages_differ() {
        let cap = LedgerError::SupplyCapReached { cap: 100 }.user_message();
        let done = LedgerError::AlreadyCompleted {
            task_id: "join-discord".into(),
        }
        .user_message();
        assert_ne!(cap, done);
    }
}
