//! Reactive level and badge derivation
//!
//! Listens to the store's change feed and re-derives every account that
//! changed. A derivation that finds nothing to do does not write, so the
//! write it makes itself produces exactly one more (empty) pass.

use std::sync::Arc;
use tamra_core::{AccountId, Ledger, LedgerError, LedgerStore, RetryPolicy, StoreEvent};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

/// Aborts the reactor task when dropped
pub struct ReactorHandle {
    handle: JoinHandle<()>,
}

impl ReactorHandle {
    pub fn abort(&self) {
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for ReactorHandle {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

pub struct DerivationReactor;

impl DerivationReactor {
    /// Start listening. Must be called inside a tokio runtime.
    pub fn spawn<S: LedgerStore>(ledger: Arc<Ledger<S>>, retry: RetryPolicy) -> ReactorHandle {
        // Subscribe before spawning so nothing committed after this call is missed
        let mut events = ledger.store().subscribe();

        let handle = tokio::spawn(async move {
            log::info!("🏅 Derivation reactor started");
            loop {
                match events.recv().await {
                    Ok(StoreEvent::Account(id)) => {
                        refresh(&ledger, &retry, id).await;
                    }
                    Ok(StoreEvent::Supply) => {}
                    Err(RecvError::Lagged(missed)) => {
                        log::warn!(
                            "⚠️  Derivation reactor missed {} events, re-deriving all accounts",
                            missed
                        );
                        refresh_all(&ledger, &retry).await;
                    }
                    Err(RecvError::Closed) => {
                        log::info!("Derivation reactor stopped: change feed closed");
                        break;
                    }
                }
            }
        });

        ReactorHandle { handle }
    }
}

async fn refresh<S: LedgerStore>(ledger: &Arc<Ledger<S>>, retry: &RetryPolicy, id: AccountId) {
    let ledger = ledger.clone();
    let retry = retry.clone();
    let outcome =
        tokio::task::spawn_blocking(move || retry.run(|| ledger.refresh_derived(&id))).await;

    match outcome {
        Ok(Ok(_)) | Ok(Err(LedgerError::AccountNotFound(_))) => {}
        // Best effort: stale badges are fine until the next change
        Ok(Err(e)) => log::warn!("Derivation failed: {}", e),
        Err(e) => log::warn!("Derivation task failed: {}", e),
    }
}

async fn refresh_all<S: LedgerStore>(ledger: &Arc<Ledger<S>>, retry: &RetryPolicy) {
    let ids = {
        let ledger = ledger.clone();
        tokio::task::spawn_blocking(move || ledger.store().account_ids()).await
    };

    match ids {
        Ok(Ok(ids)) => {
            for id in ids {
                refresh(ledger, retry, id).await;
            }
        }
        Ok(Err(e)) => log::warn!("Could not list accounts for re-derivation: {}", e),
        Err(e) => log::warn!("Derivation task failed: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tamra_core::{Badge, MemoryStore, NewAccount};

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_reactor_raises_level_after_award() {
        let ledger = Arc::new(Ledger::new(MemoryStore::new(), 1_000_000));
        let _reactor = DerivationReactor::spawn(ledger.clone(), RetryPolicy::default());

        let alice = AccountId::from("alice");
        ledger
            .register_account(&NewAccount::new(alice.clone(), "alice"), None, 0)
            .unwrap();
        RetryPolicy::default()
            .run(|| ledger.award(&alice, 9_100))
            .unwrap();

        let mut account = ledger.account(&alice).unwrap();
        for _ in 0..200 {
            if account.level == 10 && account.has_badge(Badge::Masterpiece) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
            account = ledger.account(&alice).unwrap();
        }

        assert_eq!(account.level, 10);
        assert!(account.has_badge(Badge::Masterpiece));
        assert_eq!(account.balance, 9_100);
    }
}
