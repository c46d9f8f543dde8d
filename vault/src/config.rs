//! Vault configuration file (TOML)
//!
//! Every section is optional; missing values fall back to the defaults
//! below.
//!
//! ```toml
//! [supply]
//! cap = 100000000
//!
//! [rewards]
//! mining = 50
//! referral = 100
//!
//! [[rewards.spin]]
//! amount = 200
//! weight = 10
//!
//! [cooldown]
//! mining_hours = 24
//! spin_hours = 24
//! streak_grace_hours = 48
//!
//! [retry]
//! max_attempts = 5
//!
//! [[tasks]]
//! id = "join-telegram"
//! name = "Join Telegram"
//! reward = 50
//! link = "https://t.me/tamra"
//! ```

use crate::spin::{default_spin_prizes, SpinPrize};
use crate::tasks::{default_tasks, SocialTask};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tamra_core::constants::{MINING_REWARD, REFERRAL_BONUS, SUPPLY_CAP};
use tamra_core::RetryPolicy;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupplyConfig {
    pub cap: u64,
}

impl Default for SupplyConfig {
    fn default() -> Self {
        Self { cap: SUPPLY_CAP }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewardsConfig {
    pub mining: u64,
    pub referral: u64,
    pub spin: Vec<SpinPrize>,
}

impl Default for RewardsConfig {
    fn default() -> Self {
        Self {
            mining: MINING_REWARD,
            referral: REFERRAL_BONUS,
            spin: default_spin_prizes(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CooldownConfig {
    pub mining_hours: u32,
    pub spin_hours: u32,
    /// A claim within this window of the previous one continues the streak
    pub streak_grace_hours: u32,
}

impl Default for CooldownConfig {
    fn default() -> Self {
        Self {
            mining_hours: 24,
            spin_hours: 24,
            streak_grace_hours: 48,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
        }
    }
}

impl StorageConfig {
    pub fn ledger_path(&self) -> PathBuf {
        self.data_dir.join("ledger.db")
    }

    pub fn cooldowns_path(&self) -> PathBuf {
        self.data_dir.join("cooldowns.json")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    pub supply: SupplyConfig,
    pub rewards: RewardsConfig,
    pub cooldown: CooldownConfig,
    pub retry: RetryPolicy,
    pub storage: StorageConfig,
    pub tasks: Vec<SocialTask>,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            supply: SupplyConfig::default(),
            rewards: RewardsConfig::default(),
            cooldown: CooldownConfig::default(),
            retry: RetryPolicy::default(),
            storage: StorageConfig::default(),
            tasks: default_tasks(),
        }
    }
}

impl VaultConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: VaultConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.supply.cap == 0 {
            return Err(ConfigError::Invalid("supply.cap must be positive".into()));
        }
        if self.rewards.mining == 0 {
            return Err(ConfigError::Invalid("rewards.mining must be positive".into()));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid("retry.max_attempts must be at least 1".into()));
        }
        if self.cooldown.streak_grace_hours < self.cooldown.mining_hours {
            return Err(ConfigError::Invalid(
                "cooldown.streak_grace_hours must not be shorter than mining_hours".into(),
            ));
        }

        let mut seen = HashSet::new();
        for task in &self.tasks {
            if task.id.trim().is_empty() {
                return Err(ConfigError::Invalid("task id must not be empty".into()));
            }
            if task.reward == 0 {
                return Err(ConfigError::Invalid(format!(
                    "task {} must have a positive reward",
                    task.id
                )));
            }
            if !seen.insert(task.id.as_str()) {
                return Err(ConfigError::Invalid(format!("duplicate task id: {}", task.id)));
            }
        }

        // Spin table checks live with the table itself
        crate::spin::SpinTable::new(self.rewards.spin.clone())?;
        Ok(())
    }
}
