//! Async vault service
//!
//! Wraps the blocking ledger for async callers: each ledger call runs on the
//! blocking pool and is retried on `TransactionConflict` with backoff. The
//! service also owns the client-local cooldowns, the task catalog and the
//! spin table.

use crate::config::VaultConfig;
use crate::cooldown::{CooldownKind, CooldownTracker};
use crate::error::{Result, VaultError};
use crate::identity::IdentityProvider;
use crate::reactor::{DerivationReactor, ReactorHandle};
use crate::spin::{SpinOutcome, SpinTable};
use crate::tasks::TaskCatalog;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tamra_core::account::display_name_from_email;
use tamra_core::{
    AccountId, AccountLedger, Correction, DerivedUpdate, Ledger, LedgerError, LedgerStore,
    MiningClaim, NewAccount, ReferralOutcome, SignupOutcome, SupplyStats,
};

/// Everything the signup form collects that the vault cares about
#[derive(Debug, Clone, Default)]
pub struct SignupRequest {
    pub account_id: Option<AccountId>,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub referral_code: Option<String>,
}

impl SignupRequest {
    fn display_name(&self) -> String {
        match (&self.display_name, &self.email) {
            (Some(name), _) if !name.trim().is_empty() => name.clone(),
            (_, Some(email)) => display_name_from_email(email),
            _ => "New User".to_string(),
        }
    }

    fn referrer(&self) -> Option<AccountId> {
        self.referral_code
            .as_deref()
            .map(str::trim)
            .filter(|code| !code.is_empty())
            .map(AccountId::from)
    }
}

pub struct Vault<S> {
    ledger: Arc<Ledger<S>>,
    config: VaultConfig,
    cooldowns: CooldownTracker,
    tasks: TaskCatalog,
    spin_table: SpinTable,
}

impl<S: LedgerStore> Vault<S> {
    pub fn new(store: S, config: VaultConfig) -> Result<Self> {
        config.validate()?;

        let ledger = Arc::new(Ledger::new(store, config.supply.cap));
        let spin_table = SpinTable::new(config.rewards.spin.clone())?;
        let tasks = TaskCatalog::new(config.tasks.clone());
        let cooldowns = CooldownTracker::new(&config.cooldown);

        log::info!(
            "Vault ready: cap {}, {} tasks, {} spin prizes",
            config.supply.cap,
            tasks.len(),
            spin_table.prizes().len()
        );

        Ok(Self {
            ledger,
            config,
            cooldowns,
            tasks,
            spin_table,
        })
    }

    pub fn ledger(&self) -> &Arc<Ledger<S>> {
        &self.ledger
    }

    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    pub fn cooldowns(&self) -> &CooldownTracker {
        &self.cooldowns
    }

    pub fn tasks(&self) -> &TaskCatalog {
        &self.tasks
    }

    pub fn spin_table(&self) -> &SpinTable {
        &self.spin_table
    }

    /// Keep level and badges in step with every committed change
    pub fn start_reactor(&self) -> ReactorHandle {
        DerivationReactor::spawn(self.ledger.clone(), self.config.retry.clone())
    }

    /// Open a session for whoever the identity provider says is signed in
    pub fn session(&self, identity: &dyn IdentityProvider) -> Result<Session<'_, S>> {
        let account_id = identity
            .current_account_id()
            .ok_or(VaultError::NotAuthenticated)?;
        Ok(Session {
            vault: self,
            account_id,
        })
    }

    /// Run a ledger call on the blocking pool, retrying conflicts
    async fn execute<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: Fn(&Ledger<S>) -> tamra_core::Result<T> + Send + Sync + 'static,
    {
        let op = Arc::new(op);
        let policy = &self.config.retry;
        let mut attempt = 0;

        loop {
            attempt += 1;
            let ledger = self.ledger.clone();
            let call = op.clone();
            let result = tokio::task::spawn_blocking(move || call(&ledger))
                .await
                .map_err(|e| VaultError::Runtime(format!("ledger task failed: {}", e)))?;

            match result {
                Err(e) if policy.should_retry(attempt, &e) => {
                    log::debug!("Ledger conflict, retrying (attempt {})", attempt);
                    tokio::time::sleep(policy.backoff(attempt)).await;
                }
                Err(LedgerError::TransactionConflict) => {
                    log::warn!("⚠️  Ledger still conflicting after {} attempts", attempt);
                    return Err(LedgerError::TransactionConflict.into());
                }
                other => return other.map_err(VaultError::from),
            }
        }
    }

    pub async fn signup(&self, request: SignupRequest) -> Result<SignupOutcome> {
        let mut new = NewAccount::new(
            request.account_id.clone().unwrap_or_else(AccountId::generate),
            request.display_name(),
        );
        if let Some(email) = &request.email {
            new = new.with_email(email.clone());
        }
        let referrer = request.referrer();
        let bonus = self.config.rewards.referral;

        self.execute(move |ledger| ledger.register_account(&new, referrer.as_ref(), bonus))
            .await
    }

    /// Award through the capped path; returns the amount actually paid
    pub async fn award(&self, id: &AccountId, amount: u64) -> Result<u64> {
        let id = id.clone();
        self.execute(move |ledger| ledger.award(&id, amount)).await
    }

    pub async fn claim_mining(&self, id: &AccountId) -> Result<MiningClaim> {
        self.claim_mining_at(id, Utc::now()).await
    }

    pub async fn claim_mining_at(&self, id: &AccountId, now: DateTime<Utc>) -> Result<MiningClaim> {
        let previous = self.cooldowns.try_claim(id, CooldownKind::Mining, now)?;

        let result = async {
            let account = self.account(id).await?;
            let streak = self
                .cooldowns
                .next_streak(previous, account.mining_streak, now);
            let reward = self.config.rewards.mining;
            let id = id.clone();
            self.execute(move |ledger| ledger.claim_mining(&id, reward, streak))
                .await
        }
        .await;

        if result.is_err() {
            self.cooldowns.release(id, CooldownKind::Mining, previous);
        }
        result
    }

    pub async fn spin(&self, id: &AccountId) -> Result<SpinOutcome> {
        self.spin_at(id, Utc::now()).await
    }

    pub async fn spin_at(&self, id: &AccountId, now: DateTime<Utc>) -> Result<SpinOutcome> {
        let previous = self.cooldowns.try_claim(id, CooldownKind::Spin, now)?;

        // ThreadRng is not Send; finish with it before awaiting
        let prize = {
            let mut rng = rand::rng();
            self.spin_table.draw(&mut rng)
        };

        match self.award(id, prize).await {
            Ok(awarded) => {
                log::info!("🎰 {} spun {} and received {}", id, prize, awarded);
                Ok(SpinOutcome { prize, awarded })
            }
            Err(e) => {
                self.cooldowns.release(id, CooldownKind::Spin, previous);
                Err(e)
            }
        }
    }

    /// Complete a catalog task; the reward comes from the catalog entry
    pub async fn complete_task(&self, id: &AccountId, task_id: &str) -> Result<u64> {
        let task = self
            .tasks
            .get(task_id)
            .ok_or_else(|| VaultError::UnknownTask(task_id.to_string()))?;
        let reward = task.reward;
        let id = id.clone();
        let task_id = task.id.clone();

        self.execute(move |ledger| ledger.complete_task(&id, &task_id, reward))
            .await
    }

    pub async fn attribute_referral(
        &self,
        referrer: &AccountId,
        referred: &AccountId,
        display_name: &str,
    ) -> Result<ReferralOutcome> {
        let referrer = referrer.clone();
        let referred = referred.clone();
        let display_name = display_name.to_string();
        let bonus = self.config.rewards.referral;

        self.execute(move |ledger| {
            ledger.attribute_referral(&referrer, &referred, &display_name, bonus)
        })
        .await
    }

    pub async fn update_streak(&self, id: &AccountId, streak: u32) -> Result<()> {
        let id = id.clone();
        self.execute(move |ledger| ledger.update_streak(&id, streak))
            .await
    }

    pub async fn submit_payout_address(&self, id: &AccountId, address: &str) -> Result<String> {
        let id = id.clone();
        let address = address.to_string();
        self.execute(move |ledger| ledger.set_payout_address(&id, &address))
            .await
    }

    pub async fn update_display_name(&self, id: &AccountId, name: &str) -> Result<String> {
        let id = id.clone();
        let name = name.to_string();
        self.execute(move |ledger| ledger.update_display_name(&id, &name))
            .await
    }

    pub async fn correct_balance(&self, id: &AccountId, new_balance: u64) -> Result<Correction> {
        let id = id.clone();
        self.execute(move |ledger| ledger.correct_balance(&id, new_balance))
            .await
    }

    /// Derive level and badges now instead of waiting for the reactor
    pub async fn refresh_derived(&self, id: &AccountId) -> Result<Option<DerivedUpdate>> {
        let id = id.clone();
        self.execute(move |ledger| ledger.refresh_derived(&id))
            .await
    }

    pub async fn account(&self, id: &AccountId) -> Result<AccountLedger> {
        let id = id.clone();
        self.execute(move |ledger| ledger.account(&id)).await
    }

    pub async fn stats(&self) -> Result<SupplyStats> {
        self.execute(|ledger| ledger.stats()).await
    }
}

/// The signed-in user's view of the vault
pub struct Session<'a, S> {
    vault: &'a Vault<S>,
    account_id: AccountId,
}

impl<S: LedgerStore> Session<'_, S> {
    pub fn account_id(&self) -> &AccountId {
        &self.account_id
    }

    pub async fn profile(&self) -> Result<AccountLedger> {
        self.vault.account(&self.account_id).await
    }

    pub async fn claim_mining(&self) -> Result<MiningClaim> {
        self.vault.claim_mining(&self.account_id).await
    }

    pub async fn spin(&self) -> Result<SpinOutcome> {
        self.vault.spin(&self.account_id).await
    }

    pub async fn complete_task(&self, task_id: &str) -> Result<u64> {
        self.vault.complete_task(&self.account_id, task_id).await
    }

    pub async fn submit_payout_address(&self, address: &str) -> Result<String> {
        self.vault
            .submit_payout_address(&self.account_id, address)
            .await
    }

    pub async fn update_display_name(&self, name: &str) -> Result<String> {
        self.vault
            .update_display_name(&self.account_id, name)
            .await
    }
}
