//! Reward economics defaults

/// Total tokens that may ever be awarded across all accounts
pub const SUPPLY_CAP: u64 = 100_000_000;

/// Daily mining claim
pub const MINING_REWARD: u64 = 50;

/// Paid to the referrer when a referred account signs up
pub const REFERRAL_BONUS: u64 = 100;

/// Default reward for a social task
pub const SOCIAL_TASK_REWARD: u64 = 50;

/// Balance needed per level step
pub const TOKENS_PER_LEVEL: u64 = 1_000;

/// Highest reachable level
pub const MAX_LEVEL: u8 = 10;

/// Consecutive mining days for the Serial Miner badge
pub const SERIAL_MINER_STREAK: u32 = 7;

/// Referrals that must be exceeded for the Socialite badge
pub const SOCIALITE_REFERRALS: u64 = 20;

/// Longest display name accepted
pub const MAX_DISPLAY_NAME_LEN: usize = 64;
