//! Capped award operations
//!
//! Every balance change runs inside one store transaction together with the
//! supply governor update, so `total_awarded` always equals the sum of all
//! balances and never exceeds the cap.

use crate::account::{
    validate_display_name, validate_payout_address, AccountId, AccountLedger, NewAccount,
    ReferredUser,
};
use crate::derivation::{derive_level_and_badges, DerivedUpdate};
use crate::error::{LedgerError, Result};
use crate::store::{LedgerStore, LedgerTxn};
use crate::supply::{SupplyGovernor, SupplyStats};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// What happened to the referral part of a signup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReferralOutcome {
    NotRequested,
    /// Unknown code; skipped without failing the signup
    ReferrerNotFound,
    AlreadyAttributed,
    /// Relationship recorded. `bonus_awarded` is 0 once the cap is exhausted.
    Attributed {
        referrer: AccountId,
        bonus_awarded: u64,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignupOutcome {
    pub account: AccountLedger,
    pub referral: ReferralOutcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MiningClaim {
    pub awarded: u64,
    pub streak: u32,
}

/// Balance change made by an administrative correction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Correction {
    pub previous_balance: u64,
    pub new_balance: u64,
}

pub struct Ledger<S> {
    store: Arc<S>,
    supply_cap: u64,
}

impl<S: LedgerStore> Ledger<S> {
    pub fn new(store: S, supply_cap: u64) -> Self {
        Self::with_shared_store(Arc::new(store), supply_cap)
    }

    pub fn with_shared_store(store: Arc<S>, supply_cap: u64) -> Self {
        Self { store, supply_cap }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn supply_cap(&self) -> u64 {
        self.supply_cap
    }

    /// Award up to `amount` tokens, returning what was actually paid
    pub fn award(&self, id: &AccountId, amount: u64) -> Result<u64> {
        ensure_positive(amount)?;
        let cap = self.supply_cap;
        let awarded = self.store.transact(|txn| award_in(txn, cap, id, amount))?;

        if awarded < amount {
            log::warn!(
                "⚠️  Award to {} clamped by supply cap: requested {}, paid {}",
                id,
                amount,
                awarded
            );
        } else {
            log::info!("Awarded {} tokens to {}", awarded, id);
        }
        Ok(awarded)
    }

    /// Award a task reward at most once per (account, task)
    pub fn complete_task(&self, id: &AccountId, task_id: &str, reward: u64) -> Result<u64> {
        ensure_positive(reward)?;
        let cap = self.supply_cap;

        let awarded = self.store.transact(|txn| {
            let account = require_account(txn, id)?;
            if account.has_completed(task_id) {
                return Err(LedgerError::AlreadyCompleted {
                    task_id: task_id.to_string(),
                });
            }

            let awarded = award_in(txn, cap, id, reward)?;

            // Re-read so the task id lands on top of the credited balance
            let mut account = require_account(txn, id)?;
            account.completed_task_ids.insert(task_id.to_string());
            txn.put_account(&account)?;
            Ok(awarded)
        })?;

        log::info!("Task {} completed by {}: {} tokens", task_id, id, awarded);
        Ok(awarded)
    }

    /// Daily mining payout together with the new streak
    pub fn claim_mining(&self, id: &AccountId, reward: u64, streak: u32) -> Result<MiningClaim> {
        ensure_positive(reward)?;
        let cap = self.supply_cap;

        let awarded = self.store.transact(|txn| {
            let awarded = award_in(txn, cap, id, reward)?;
            let mut account = require_account(txn, id)?;
            account.mining_streak = streak;
            txn.put_account(&account)?;
            Ok(awarded)
        })?;

        log::info!("⛏️  {} mined {} tokens (streak {})", id, awarded, streak);
        Ok(MiningClaim { awarded, streak })
    }

    /// Create an account and attribute its referral in one transaction
    pub fn register_account(
        &self,
        new: &NewAccount,
        referrer: Option<&AccountId>,
        referral_bonus: u64,
    ) -> Result<SignupOutcome> {
        let display_name = validate_display_name(&new.display_name)?;
        let cap = self.supply_cap;
        let joined_at = Utc::now();

        let outcome = self.store.transact(|txn| {
            if txn.account(&new.id)?.is_some() {
                return Err(LedgerError::AccountExists(new.id.clone()));
            }

            let mut account =
                AccountLedger::new(new.id.clone(), display_name.clone(), new.email.clone());
            account.created_at = joined_at;
            txn.put_account(&account)?;

            let mut supply = txn.supply()?;
            supply.total_members += 1;
            txn.put_supply(&supply)?;

            let referral = match referrer {
                Some(referrer) => attribute_in(
                    txn,
                    cap,
                    referrer,
                    &new.id,
                    &display_name,
                    joined_at,
                    referral_bonus,
                )?,
                None => ReferralOutcome::NotRequested,
            };

            Ok(SignupOutcome { account, referral })
        })?;

        log::info!("🎉 New member {} ({})", outcome.account.id, outcome.account.display_name);
        log_referral(&new.id, &outcome.referral);
        Ok(outcome)
    }

    /// Attribute an existing account to a referrer
    pub fn attribute_referral(
        &self,
        referrer: &AccountId,
        referred: &AccountId,
        display_name: &str,
        referral_bonus: u64,
    ) -> Result<ReferralOutcome> {
        let cap = self.supply_cap;
        let joined_at = Utc::now();

        let outcome = self.store.transact(|txn| {
            attribute_in(
                txn,
                cap,
                referrer,
                referred,
                display_name,
                joined_at,
                referral_bonus,
            )
        })?;

        log_referral(referred, &outcome);
        Ok(outcome)
    }

    /// Store a streak value reported by the cooldown tracker
    pub fn update_streak(&self, id: &AccountId, streak: u32) -> Result<()> {
        self.store.transact(|txn| {
            let mut account = require_account(txn, id)?;
            if account.mining_streak == streak {
                return Ok(());
            }
            account.mining_streak = streak;
            txn.put_account(&account)
        })
    }

    pub fn set_payout_address(&self, id: &AccountId, address: &str) -> Result<String> {
        let address = validate_payout_address(address)?;

        let previous = self.store.transact(|txn| {
            let mut account = require_account(txn, id)?;
            let previous = account.payout_address.replace(address.clone());
            txn.put_account(&account)?;
            Ok(previous)
        })?;

        if let Some(previous) = previous.filter(|p| p != &address) {
            log::info!("Payout address for {} replaced (was {})", id, previous);
        }
        Ok(address)
    }

    pub fn update_display_name(&self, id: &AccountId, name: &str) -> Result<String> {
        let name = validate_display_name(name)?;
        self.store.transact(|txn| {
            let mut account = require_account(txn, id)?;
            account.display_name = name.clone();
            txn.put_account(&account)
        })?;
        Ok(name)
    }

    /// Set a balance directly, moving the governor total by the same delta.
    /// Increases must fit under the cap in full.
    pub fn correct_balance(&self, id: &AccountId, new_balance: u64) -> Result<Correction> {
        let cap = self.supply_cap;

        let correction = self.store.transact(|txn| {
            let mut account = require_account(txn, id)?;
            let mut supply = txn.supply()?;
            let previous_balance = account.balance;

            if new_balance > previous_balance {
                let delta = new_balance - previous_balance;
                if supply.awardable(cap, delta) < delta {
                    return Err(LedgerError::SupplyCapReached { cap });
                }
                supply.total_awarded += delta;
            } else {
                let delta = previous_balance - new_balance;
                supply.total_awarded = supply.total_awarded.saturating_sub(delta);
            }

            account.balance = new_balance;
            txn.put_account(&account)?;
            txn.put_supply(&supply)?;
            Ok(Correction {
                previous_balance,
                new_balance,
            })
        })?;

        log::warn!(
            "Balance of {} corrected: {} -> {}",
            id,
            correction.previous_balance,
            correction.new_balance
        );
        Ok(correction)
    }

    /// Bring level and badges up to date. Writes only when something changed.
    pub fn refresh_derived(&self, id: &AccountId) -> Result<Option<DerivedUpdate>> {
        let update = self.store.transact(|txn| {
            let mut account = require_account(txn, id)?;
            let update = derive_level_and_badges(&account);
            if update.is_empty() {
                return Ok(None);
            }
            update.apply(&mut account);
            txn.put_account(&account)?;
            Ok(Some(update))
        })?;

        if let Some(update) = &update {
            log::debug!("Derived update for {}: {:?}", id, update);
        }
        Ok(update)
    }

    pub fn account(&self, id: &AccountId) -> Result<AccountLedger> {
        self.store
            .load_account(id)?
            .ok_or_else(|| LedgerError::AccountNotFound(id.clone()))
    }

    pub fn supply(&self) -> Result<SupplyGovernor> {
        self.store.load_supply()
    }

    pub fn stats(&self) -> Result<SupplyStats> {
        Ok(self.store.load_supply()?.stats(self.supply_cap))
    }
}

fn ensure_positive(amount: u64) -> Result<()> {
    if amount == 0 {
        return Err(LedgerError::InvalidAmount { requested: amount });
    }
    Ok(())
}

fn require_account(txn: &mut dyn LedgerTxn, id: &AccountId) -> Result<AccountLedger> {
    txn.account(id)?
        .ok_or_else(|| LedgerError::AccountNotFound(id.clone()))
}

/// Credit whatever fits under the cap, possibly nothing
fn credit_in(txn: &mut dyn LedgerTxn, cap: u64, id: &AccountId, requested: u64) -> Result<u64> {
    let mut account = require_account(txn, id)?;
    let mut supply = txn.supply()?;

    let awardable = supply.awardable(cap, requested);
    if awardable == 0 {
        return Ok(0);
    }

    // balance <= total_awarded <= cap, so neither add can overflow
    account.balance += awardable;
    supply.total_awarded += awardable;

    txn.put_account(&account)?;
    txn.put_supply(&supply)?;
    Ok(awardable)
}

fn award_in(txn: &mut dyn LedgerTxn, cap: u64, id: &AccountId, requested: u64) -> Result<u64> {
    match credit_in(txn, cap, id, requested)? {
        0 => Err(LedgerError::SupplyCapReached { cap }),
        awarded => Ok(awarded),
    }
}

fn attribute_in(
    txn: &mut dyn LedgerTxn,
    cap: u64,
    referrer: &AccountId,
    referred: &AccountId,
    display_name: &str,
    joined_at: DateTime<Utc>,
    bonus: u64,
) -> Result<ReferralOutcome> {
    if referrer == referred {
        return Ok(ReferralOutcome::ReferrerNotFound);
    }

    let mut account = match txn.account(referrer)? {
        Some(account) => account,
        None => return Ok(ReferralOutcome::ReferrerNotFound),
    };
    if account.has_referred(referred) {
        return Ok(ReferralOutcome::AlreadyAttributed);
    }

    account.referral_count += 1;
    account.referred_users.push(ReferredUser {
        account_id: referred.clone(),
        display_name: display_name.to_string(),
        joined_at,
    });
    txn.put_account(&account)?;

    let bonus_awarded = if bonus > 0 {
        credit_in(txn, cap, referrer, bonus)?
    } else {
        0
    };

    Ok(ReferralOutcome::Attributed {
        referrer: referrer.clone(),
        bonus_awarded,
    })
}

fn log_referral(referred: &AccountId, outcome: &ReferralOutcome) {
    match outcome {
        ReferralOutcome::Attributed {
            referrer,
            bonus_awarded: 0,
        } => log::warn!(
            "Referral {} -> {} recorded without bonus: supply cap reached",
            referrer,
            referred
        ),
        ReferralOutcome::Attributed {
            referrer,
            bonus_awarded,
        } => log::info!(
            "Referral {} -> {} paid {} tokens",
            referrer,
            referred,
            bonus_awarded
        ),
        ReferralOutcome::ReferrerNotFound => {
            log::info!("Referral code for {} did not resolve, skipped", referred)
        }
        ReferralOutcome::AlreadyAttributed => {
            log::debug!("Referral for {} already attributed", referred)
        }
        ReferralOutcome::NotRequested => {}
    }
}
