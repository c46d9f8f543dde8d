//! Tamra Vault service layer
//!
//! Async façade over the core ledger: claim cooldowns and streaks, the lucky
//! spin, the social task catalog, sessions and the derivation reactor.

pub mod config;
pub mod cooldown;
pub mod error;
pub mod identity;
pub mod reactor;
pub mod service;
pub mod spin;
pub mod tasks;

pub use config::{ConfigError, VaultConfig};
pub use cooldown::{CooldownEntry, CooldownKind, CooldownTracker};
pub use error::{Result, VaultError};
pub use identity::{IdentityProvider, StaticIdentity};
pub use reactor::{DerivationReactor, ReactorHandle};
pub use service::{Session, SignupRequest, Vault};
pub use spin::{SpinOutcome, SpinPrize, SpinTable};
pub use tasks::{SocialTask, TaskCatalog};
