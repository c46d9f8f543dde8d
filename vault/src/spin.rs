//! Lucky spin prize table

use crate::config::ConfigError;
use rand::Rng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpinPrize {
    pub amount: u64,
    pub weight: u32,
}

pub fn default_spin_prizes() -> Vec<SpinPrize> {
    vec![
        SpinPrize { amount: 10, weight: 40 },
        SpinPrize { amount: 20, weight: 30 },
        SpinPrize { amount: 50, weight: 20 },
        SpinPrize { amount: 200, weight: 10 },
    ]
}

/// Result of one spin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpinOutcome {
    pub prize: u64,
    /// Less than `prize` when the supply cap clamps the award
    pub awarded: u64,
}

#[derive(Debug, Clone)]
pub struct SpinTable {
    prizes: Vec<SpinPrize>,
    total_weight: u64,
}

impl SpinTable {
    pub fn new(prizes: Vec<SpinPrize>) -> Result<Self, ConfigError> {
        if prizes.iter().any(|p| p.amount == 0) {
            return Err(ConfigError::Invalid("spin prizes must be positive".into()));
        }
        let total_weight: u64 = prizes.iter().map(|p| p.weight as u64).sum();
        if total_weight == 0 {
            return Err(ConfigError::Invalid(
                "spin table needs at least one prize with positive weight".into(),
            ));
        }
        Ok(Self {
            prizes,
            total_weight,
        })
    }

    pub fn prizes(&self) -> &[SpinPrize] {
        &self.prizes
    }

    pub fn draw<R: Rng>(&self, rng: &mut R) -> u64 {
        let mut roll = rng.random_range(0..self.total_weight);
        for prize in &self.prizes {
            let weight = prize.weight as u64;
            if roll < weight {
                return prize.amount;
            }
            roll -= weight;
        }
        // Unreachable while roll < total_weight
        self.prizes[self.prizes.len() - 1].amount
    }
}

impl Default for SpinTable {
    fn default() -> Self {
        let prizes = default_spin_prizes();
        let total_weight = prizes.iter().map(|p| p.weight as u64).sum();
        Self {
            prizes,
            total_weight,
        }
    }
}
