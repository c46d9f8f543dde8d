//! Level and badge derivation
//!
//! Derived fields are a pure function of the stored account. The result only
//! ever raises the level and adds badges, so applying it twice is a no-op.

use crate::account::{AccountLedger, Badge};
use crate::constants::{MAX_LEVEL, SERIAL_MINER_STREAK, SOCIALITE_REFERRALS, TOKENS_PER_LEVEL};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub fn level_for_balance(balance: u64) -> u8 {
    let steps = balance / TOKENS_PER_LEVEL;
    if steps >= (MAX_LEVEL - 1) as u64 {
        MAX_LEVEL
    } else {
        steps as u8 + 1
    }
}

/// Changes needed to bring an account's derived fields up to date
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivedUpdate {
    pub level: Option<u8>,
    pub new_badges: BTreeSet<Badge>,
}

impl DerivedUpdate {
    pub fn is_empty(&self) -> bool {
        self.level.is_none() && self.new_badges.is_empty()
    }

    pub fn apply(&self, account: &mut AccountLedger) {
        if let Some(level) = self.level {
            account.level = account.level.max(level);
        }
        account.badges.extend(self.new_badges.iter().copied());
    }
}

pub fn derive_level_and_badges(account: &AccountLedger) -> DerivedUpdate {
    let derived = level_for_balance(account.balance);
    let level = if derived > account.level {
        Some(derived)
    } else {
        None
    };
    let effective_level = level.unwrap_or(account.level);

    let mut earned = Vec::with_capacity(4);
    earned.push(Badge::Pioneer);
    if account.mining_streak >= SERIAL_MINER_STREAK {
        earned.push(Badge::SerialMiner);
    }
    if account.referral_count > SOCIALITE_REFERRALS {
        earned.push(Badge::Socialite);
    }
    if effective_level >= MAX_LEVEL {
        earned.push(Badge::Masterpiece);
    }

    let new_badges = earned
        .into_iter()
        .filter(|b| !account.has_badge(*b))
        .collect();

    DerivedUpdate { level, new_badges }
}
