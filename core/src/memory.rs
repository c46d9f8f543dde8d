//! In-process store with optimistic concurrency
//!
//! Each record carries a version. A transaction records the version of every
//! key it reads and buffers its writes; commit takes the write lock, checks
//! that no read key moved, then applies the writes. A moved key fails the
//! commit with `TransactionConflict` and nothing is applied.

use crate::account::{AccountId, AccountLedger};
use crate::error::{LedgerError, Result};
use crate::store::{events_for, ChangeNotifier, LedgerStore, LedgerTxn, StoreEvent};
use crate::supply::SupplyGovernor;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::broadcast;

#[derive(Debug, Clone)]
struct Versioned<T> {
    version: u64,
    value: T,
}

#[derive(Debug, Default)]
struct MemoryState {
    accounts: HashMap<AccountId, Versioned<AccountLedger>>,
    supply: Option<Versioned<SupplyGovernor>>,
}

impl MemoryState {
    fn account_version(&self, id: &AccountId) -> u64 {
        self.accounts.get(id).map(|v| v.version).unwrap_or(0)
    }

    fn supply_version(&self) -> u64 {
        self.supply.as_ref().map(|v| v.version).unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Key {
    Account(AccountId),
    Supply,
}

pub struct MemoryStore {
    state: RwLock<MemoryState>,
    notifier: ChangeNotifier,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(MemoryState::default()),
            notifier: ChangeNotifier::new(),
        }
    }

    fn commit(&self, txn: MemoryTxn<'_>) -> Result<Vec<StoreEvent>> {
        let mut state = self.state.write();

        for (key, seen) in &txn.reads {
            let current = match key {
                Key::Account(id) => state.account_version(id),
                Key::Supply => state.supply_version(),
            };
            if current != *seen {
                log::debug!("optimistic commit rejected: {:?} moved {} -> {}", key, seen, current);
                return Err(LedgerError::TransactionConflict);
            }
        }

        let events = events_for(txn.account_writes.keys(), txn.supply_write.is_some());

        for (id, account) in txn.account_writes {
            let version = state.account_version(&id) + 1;
            state.accounts.insert(
                id,
                Versioned {
                    version,
                    value: account,
                },
            );
        }
        if let Some(supply) = txn.supply_write {
            let version = state.supply_version() + 1;
            state.supply = Some(Versioned {
                version,
                value: supply,
            });
        }

        Ok(events)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

struct MemoryTxn<'a> {
    state: &'a RwLock<MemoryState>,
    reads: HashMap<Key, u64>,
    account_writes: BTreeMap<AccountId, AccountLedger>,
    supply_write: Option<SupplyGovernor>,
}

impl<'a> MemoryTxn<'a> {
    fn new(state: &'a RwLock<MemoryState>) -> Self {
        Self {
            state,
            reads: HashMap::new(),
            account_writes: BTreeMap::new(),
            supply_write: None,
        }
    }
}

impl LedgerTxn for MemoryTxn<'_> {
    fn account(&mut self, id: &AccountId) -> Result<Option<AccountLedger>> {
        if let Some(pending) = self.account_writes.get(id) {
            return Ok(Some(pending.clone()));
        }

        let state = self.state.read();
        let (version, value) = match state.accounts.get(id) {
            Some(v) => (v.version, Some(v.value.clone())),
            None => (0, None),
        };
        // Keep the first observed version so validation covers the whole txn
        self.reads.entry(Key::Account(id.clone())).or_insert(version);
        Ok(value)
    }

    fn put_account(&mut self, account: &AccountLedger) -> Result<()> {
        self.account_writes
            .insert(account.id.clone(), account.clone());
        Ok(())
    }

    fn supply(&mut self) -> Result<SupplyGovernor> {
        if let Some(pending) = self.supply_write {
            return Ok(pending);
        }

        let state = self.state.read();
        let (version, value) = match &state.supply {
            Some(v) => (v.version, v.value),
            None => (0, SupplyGovernor::default()),
        };
        self.reads.entry(Key::Supply).or_insert(version);
        Ok(value)
    }

    fn put_supply(&mut self, supply: &SupplyGovernor) -> Result<()> {
        self.supply_write = Some(*supply);
        Ok(())
    }
}

impl LedgerStore for MemoryStore {
    fn transact<T, F>(&self, f: F) -> Result<T>
    where
        F: Fn(&mut dyn LedgerTxn) -> Result<T>,
    {
        let mut txn = MemoryTxn::new(&self.state);
        let value = f(&mut txn)?;
        let events = self.commit(txn)?;
        self.notifier.publish(events);
        Ok(value)
    }

    fn load_account(&self, id: &AccountId) -> Result<Option<AccountLedger>> {
        Ok(self.state.read().accounts.get(id).map(|v| v.value.clone()))
    }

    fn load_supply(&self) -> Result<SupplyGovernor> {
        Ok(self
            .state
            .read()
            .supply
            .as_ref()
            .map(|v| v.value)
            .unwrap_or_default())
    }

    fn account_ids(&self) -> Result<Vec<AccountId>> {
        let mut ids: Vec<AccountId> = self.state.read().accounts.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.notifier.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seed(store: &MemoryStore, id: &str) {
        store
            .transact(|txn| txn.put_account(&AccountLedger::new(id.into(), id.into(), None)))
            .unwrap();
    }

    #[test]
    fn test_read_your_writes() {
        let store = MemoryStore::new();
        let seen = store
            .transact(|txn| {
                txn.put_supply(&SupplyGovernor {
                    total_awarded: 5,
                    total_members: 1,
                })?;
                txn.supply()
            })
            .unwrap();
        assert_eq!(seen.total_awarded, 5);
        assert_eq!(store.load_supply().unwrap().total_awarded, 5);
    }

    #[test]
    fn test_failed_closure_applies_nothing() {
        let store = MemoryStore::new();
        let result: Result<()> = store.transact(|txn| {
            txn.put_supply(&SupplyGovernor {
                total_awarded: 99,
                total_members: 0,
            })?;
            Err(LedgerError::SupplyCapReached { cap: 0 })
        });
        assert!(result.is_err());
        assert_eq!(store.load_supply().unwrap(), SupplyGovernor::default());
    }

    #[test]
    fn test_stale_read_conflicts() {
        let store = MemoryStore::new();
        seed(&store, "alice");

        let result = store.transact(|txn| {
            let mut supply = txn.supply()?;

            // Another writer commits between our read and our commit
            store.transact(|inner| {
                inner.put_supply(&SupplyGovernor {
                    total_awarded: 10,
                    total_members: 0,
                })
            })?;

            supply.total_awarded += 1;
            txn.put_supply(&supply)
        });

        assert_eq!(result, Err(LedgerError::TransactionConflict));
        assert_eq!(store.load_supply().unwrap().total_awarded, 10);
    }

    #[test]
    fn test_commit_publishes_events() {
        let store = MemoryStore::new();
        let mut rx = store.subscribe();
        seed(&store, "bob");

        assert_eq!(rx.try_recv().unwrap(), StoreEvent::Account("bob".into()));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_account_ids_sorted() {
        let store = MemoryStore::new();
        seed(&store, "carol");
        seed(&store, "alice");
        assert_eq!(
            store.account_ids().unwrap(),
            vec![AccountId::from("alice"), AccountId::from("carol")]
        );
    }
}
