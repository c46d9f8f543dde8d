//! Vault error types

use crate::config::ConfigError;
use crate::cooldown::CooldownKind;
use tamra_core::LedgerError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VaultError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("{kind} cooldown active: {remaining_secs}s remaining")]
    CooldownActive {
        kind: CooldownKind,
        remaining_secs: i64,
    },

    #[error("Unknown task: {0}")]
    UnknownTask(String),

    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Runtime error: {0}")]
    Runtime(String),
}

impl VaultError {
    /// The ledger error underneath, if any
    pub fn ledger(&self) -> Option<&LedgerError> {
        match self {
            VaultError::Ledger(e) => Some(e),
            _ => None,
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            VaultError::Ledger(e) => e.user_message(),
            VaultError::CooldownActive { remaining_secs, .. } => {
                let hours = remaining_secs / 3600;
                let minutes = (remaining_secs % 3600) / 60;
                format!("Not ready yet. Try again in {}h {}m.", hours, minutes)
            }
            VaultError::UnknownTask(_) => "That task does not exist.".to_string(),
            VaultError::NotAuthenticated => "You must be logged in to do that.".to_string(),
            VaultError::Config(_) | VaultError::Runtime(_) => {
                "Something went wrong. Please try again.".to_string()
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, VaultError>;
