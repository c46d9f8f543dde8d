//! Per-user reward ledger records

use crate::constants::MAX_DISPLAY_NAME_LEN;
use crate::error::{LedgerError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(String);

impl AccountId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Fresh random identifier
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AccountId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for AccountId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Badge {
    Pioneer,
    SerialMiner,
    Socialite,
    Masterpiece,
}

impl Badge {
    pub fn all() -> [Badge; 4] {
        [
            Badge::Pioneer,
            Badge::SerialMiner,
            Badge::Socialite,
            Badge::Masterpiece,
        ]
    }

    pub fn id(&self) -> &'static str {
        match self {
            Badge::Pioneer => "pioneer",
            Badge::SerialMiner => "serial_miner",
            Badge::Socialite => "socialite",
            Badge::Masterpiece => "masterpiece",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Badge::Pioneer => "Pioneer",
            Badge::SerialMiner => "Serial Miner",
            Badge::Socialite => "Socialite",
            Badge::Masterpiece => "Masterpiece",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Badge::Pioneer => "Awarded for being one of the first to join the Tamra ecosystem.",
            Badge::SerialMiner => "Awarded for mining 7 days in a row.",
            Badge::Socialite => "Awarded for successfully referring over 20 new users.",
            Badge::Masterpiece => "Awarded for reaching the maximum level 10.",
        }
    }
}

impl fmt::Display for Badge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Badge {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Badge::all()
            .into_iter()
            .find(|b| b.id() == s)
            .ok_or_else(|| format!("unknown badge: {}", s))
    }
}

/// Someone who signed up with this account's referral code
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferredUser {
    pub account_id: AccountId,
    pub display_name: String,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountLedger {
    pub id: AccountId,
    pub display_name: String,
    pub email: Option<String>,
    pub balance: u64,
    pub referral_count: u64,
    pub mining_streak: u32,
    pub level: u8,
    pub badges: BTreeSet<Badge>,
    pub completed_task_ids: BTreeSet<String>,
    pub payout_address: Option<String>,
    pub referred_users: Vec<ReferredUser>,
    pub created_at: DateTime<Utc>,
}

impl AccountLedger {
    /// Fresh account as created at signup
    pub fn new(id: AccountId, display_name: String, email: Option<String>) -> Self {
        let mut badges = BTreeSet::new();
        badges.insert(Badge::Pioneer);

        Self {
            id,
            display_name,
            email,
            balance: 0,
            referral_count: 0,
            mining_streak: 0,
            level: 1,
            badges,
            completed_task_ids: BTreeSet::new(),
            payout_address: None,
            referred_users: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn has_badge(&self, badge: Badge) -> bool {
        self.badges.contains(&badge)
    }

    pub fn has_completed(&self, task_id: &str) -> bool {
        self.completed_task_ids.contains(task_id)
    }

    pub fn has_referred(&self, id: &AccountId) -> bool {
        self.referred_users.iter().any(|r| &r.account_id == id)
    }
}

/// Data supplied by the signup flow
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub id: AccountId,
    pub display_name: String,
    pub email: Option<String>,
}

impl NewAccount {
    pub fn new(id: AccountId, display_name: impl Into<String>) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            email: None,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}

/// Local part of an email, falling back to a generic name
pub fn display_name_from_email(email: &str) -> String {
    match email.split('@').next().map(str::trim) {
        Some(local) if !local.is_empty() => local.to_string(),
        _ => "New User".to_string(),
    }
}

pub fn validate_display_name(name: &str) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(LedgerError::InvalidDisplayName("empty".to_string()));
    }
    if trimmed.chars().count() > MAX_DISPLAY_NAME_LEN {
        return Err(LedgerError::InvalidDisplayName(format!(
            "longer than {} characters",
            MAX_DISPLAY_NAME_LEN
        )));
    }
    Ok(trimmed.to_string())
}

const BASE58_ALPHABET: &str = "123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

/// Format check for a Solana-style base58 payout address
pub fn validate_payout_address(address: &str) -> Result<String> {
    let address = address.trim();

    if !(32..=44).contains(&address.len()) {
        return Err(LedgerError::InvalidAddress(format!(
            "expected 32-44 characters, got {}",
            address.len()
        )));
    }

    if let Some(bad) = address.chars().find(|c| !BASE58_ALPHABET.contains(*c)) {
        return Err(LedgerError::InvalidAddress(format!(
            "character '{}' is not base58",
            bad
        )));
    }

    Ok(address.to_string())
}
