//! Client-local claim cooldowns and mining streaks
//!
//! A claim reserves its cooldown slot before the award runs; if the award
//! fails the caller releases the reservation, restoring the previous claim
//! time. Reservation is atomic per (account, kind), so a double-clicked claim
//! pays once.

use crate::config::CooldownConfig;
use crate::error::{Result, VaultError};
use chrono::{DateTime, Duration, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use tamra_core::AccountId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CooldownKind {
    Mining,
    Spin,
}

impl fmt::Display for CooldownKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CooldownKind::Mining => f.write_str("mining"),
            CooldownKind::Spin => f.write_str("spin"),
        }
    }
}

/// Persisted form of one tracked claim
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CooldownEntry {
    pub account_id: AccountId,
    pub kind: CooldownKind,
    pub last_claim: DateTime<Utc>,
}

pub struct CooldownTracker {
    last_claims: DashMap<(AccountId, CooldownKind), DateTime<Utc>>,
    mining_window: Duration,
    spin_window: Duration,
    streak_grace: Duration,
}

impl CooldownTracker {
    pub fn new(config: &CooldownConfig) -> Self {
        Self {
            last_claims: DashMap::new(),
            mining_window: Duration::hours(config.mining_hours as i64),
            spin_window: Duration::hours(config.spin_hours as i64),
            streak_grace: Duration::hours(config.streak_grace_hours as i64),
        }
    }

    fn window(&self, kind: CooldownKind) -> Duration {
        match kind {
            CooldownKind::Mining => self.mining_window,
            CooldownKind::Spin => self.spin_window,
        }
    }

    pub fn last_claim(&self, id: &AccountId, kind: CooldownKind) -> Option<DateTime<Utc>> {
        self.last_claims.get(&(id.clone(), kind)).map(|v| *v)
    }

    /// When the next claim opens, or `None` if it is open already
    pub fn ready_at(
        &self,
        id: &AccountId,
        kind: CooldownKind,
        now: DateTime<Utc>,
    ) -> Option<DateTime<Utc>> {
        self.last_claim(id, kind)
            .map(|last| last + self.window(kind))
            .filter(|ready| *ready > now)
    }

    /// Reserve a claim at `now`, returning the previous claim time
    pub fn try_claim(
        &self,
        id: &AccountId,
        kind: CooldownKind,
        now: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>> {
        let window = self.window(kind);
        match self.last_claims.entry((id.clone(), kind)) {
            Entry::Occupied(mut entry) => {
                let ready_at = *entry.get() + window;
                if now < ready_at {
                    return Err(VaultError::CooldownActive {
                        kind,
                        remaining_secs: (ready_at - now).num_seconds().max(1),
                    });
                }
                Ok(Some(entry.insert(now)))
            }
            Entry::Vacant(entry) => {
                entry.insert(now);
                Ok(None)
            }
        }
    }

    /// Undo a reservation made by `try_claim`
    pub fn release(&self, id: &AccountId, kind: CooldownKind, previous: Option<DateTime<Utc>>) {
        let key = (id.clone(), kind);
        match previous {
            Some(previous) => {
                self.last_claims.insert(key, previous);
            }
            None => {
                self.last_claims.remove(&key);
            }
        }
    }

    /// Streak after a claim at `now` that followed `previous`
    pub fn next_streak(
        &self,
        previous: Option<DateTime<Utc>>,
        current_streak: u32,
        now: DateTime<Utc>,
    ) -> u32 {
        match previous {
            Some(previous) if now - previous < self.streak_grace => {
                current_streak.saturating_add(1)
            }
            _ => 1,
        }
    }

    pub fn snapshot(&self) -> Vec<CooldownEntry> {
        let mut entries: Vec<CooldownEntry> = self
            .last_claims
            .iter()
            .map(|item| CooldownEntry {
                account_id: item.key().0.clone(),
                kind: item.key().1,
                last_claim: *item.value(),
            })
            .collect();
        entries.sort_by(|a, b| (&a.account_id, a.kind).cmp(&(&b.account_id, b.kind)));
        entries
    }

    pub fn load(&self, entries: impl IntoIterator<Item = CooldownEntry>) {
        for entry in entries {
            self.last_claims
                .insert((entry.account_id, entry.kind), entry.last_claim);
        }
    }
}
