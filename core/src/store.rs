//! Transactional store contract
//!
//! Everything the ledger does goes through [`LedgerStore::transact`]. A
//! backend must give the closure a serializable view: reads observe earlier
//! writes of the same transaction, and the whole closure commits atomically
//! or not at all. Backends may run the closure more than once.

use crate::account::{AccountId, AccountLedger};
use crate::error::Result;
use crate::supply::SupplyGovernor;
use tokio::sync::broadcast;

/// Capacity of the change feed before slow subscribers start lagging
pub const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Committed change notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    Account(AccountId),
    Supply,
}

/// View handed to a transaction closure
pub trait LedgerTxn {
    fn account(&mut self, id: &AccountId) -> Result<Option<AccountLedger>>;

    fn put_account(&mut self, account: &AccountLedger) -> Result<()>;

    fn supply(&mut self) -> Result<SupplyGovernor>;

    fn put_supply(&mut self, supply: &SupplyGovernor) -> Result<()>;
}

pub trait LedgerStore: Send + Sync + 'static {
    /// Run `f` as one atomic, serializable transaction
    fn transact<T, F>(&self, f: F) -> Result<T>
    where
        F: Fn(&mut dyn LedgerTxn) -> Result<T>;

    fn load_account(&self, id: &AccountId) -> Result<Option<AccountLedger>>;

    fn load_supply(&self) -> Result<SupplyGovernor>;

    fn account_ids(&self) -> Result<Vec<AccountId>>;

    /// Feed of committed changes
    fn subscribe(&self) -> broadcast::Receiver<StoreEvent>;
}

/// Fan-out of commit notifications shared by the backends
#[derive(Debug, Clone)]
pub struct ChangeNotifier {
    sender: broadcast::Sender<StoreEvent>,
}

impl ChangeNotifier {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.sender.subscribe()
    }

    pub fn publish(&self, events: Vec<StoreEvent>) {
        for event in events {
            // No subscribers is fine
            let _ = self.sender.send(event);
        }
    }
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new()
    }
}

/// Events produced by one transaction's writes, accounts first
pub(crate) fn events_for<'a>(
    accounts: impl IntoIterator<Item = &'a AccountId>,
    supply_written: bool,
) -> Vec<StoreEvent> {
    let mut events: Vec<StoreEvent> = accounts
        .into_iter()
        .cloned()
        .map(StoreEvent::Account)
        .collect();
    if supply_written {
        events.push(StoreEvent::Supply);
    }
    events
}
