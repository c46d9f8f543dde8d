//! Global supply tracking and cap enforcement

use serde::{Deserialize, Serialize};

/// Deployment-wide issuance counter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplyGovernor {
    pub total_awarded: u64,
    pub total_members: u64,
}

impl SupplyGovernor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tokens still available under `cap`
    pub fn remaining(&self, cap: u64) -> u64 {
        cap.saturating_sub(self.total_awarded)
    }

    /// How much of `requested` can be paid without crossing `cap`
    pub fn awardable(&self, cap: u64, requested: u64) -> u64 {
        requested.min(self.remaining(cap))
    }

    pub fn stats(&self, cap: u64) -> SupplyStats {
        SupplyStats {
            supply_cap: cap,
            total_awarded: self.total_awarded,
            total_members: self.total_members,
            remaining: self.remaining(cap),
        }
    }
}

/// Community stats read model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplyStats {
    pub supply_cap: u64,
    pub total_awarded: u64,
    pub total_members: u64,
    pub remaining: u64,
}

impl SupplyStats {
    /// Share of the cap already claimed, in percent
    pub fn claimed_percent(&self) -> f64 {
        if self.supply_cap == 0 {
            return 100.0;
        }
        self.total_awarded as f64 / self.supply_cap as f64 * 100.0
    }
}
