//! Sled-based persistence for the reward ledger
//!
//! Accounts live in the `accounts` tree keyed by account id, the supply
//! governor is a single record in the `supply` tree. Both trees take part in
//! every transaction so the pair is always updated together.

use crate::account::{AccountId, AccountLedger};
use crate::error::{LedgerError, Result};
use crate::store::{events_for, ChangeNotifier, LedgerStore, LedgerTxn, StoreEvent};
use crate::supply::SupplyGovernor;
use sled::transaction::{
    ConflictableTransactionError, TransactionError, TransactionalTree, UnabortableTransactionError,
};
use sled::Transactional;
use std::collections::BTreeSet;
use std::path::Path;
use tokio::sync::broadcast;

const ACCOUNTS_TREE: &str = "accounts";
const SUPPLY_TREE: &str = "supply";
const GOVERNOR_KEY: &[u8] = b"governor";

#[derive(Clone)]
pub struct LedgerDB {
    db: sled::Db,
    accounts: sled::Tree,
    supply: sled::Tree,
    path: String,
    notifier: ChangeNotifier,
}

impl LedgerDB {
    /// Open or create the database
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_str = path.as_ref().to_string_lossy().to_string();
        let db = sled::open(&path)
            .map_err(|e| LedgerError::Storage(format!("Failed to open database: {}", e)))?;
        let accounts = db.open_tree(ACCOUNTS_TREE)?;
        let supply = db.open_tree(SUPPLY_TREE)?;

        log::info!("📂 Ledger database opened at {}", path_str);

        Ok(LedgerDB {
            db,
            accounts,
            supply,
            path: path_str,
            notifier: ChangeNotifier::new(),
        })
    }

    /// Get the database path
    pub fn path(&self) -> &str {
        &self.path
    }

    fn flush(&self) -> Result<()> {
        self.db
            .flush()
            .map_err(|e| LedgerError::Storage(format!("Failed to flush ledger: {}", e)))?;
        Ok(())
    }
}

struct SledTxn<'a> {
    accounts: &'a TransactionalTree,
    supply: &'a TransactionalTree,
    /// Sled-level failure that must reach sled so it can retry or report it
    failure: Option<UnabortableTransactionError>,
    written: BTreeSet<AccountId>,
    supply_written: bool,
}

impl<'a> SledTxn<'a> {
    fn new(accounts: &'a TransactionalTree, supply: &'a TransactionalTree) -> Self {
        Self {
            accounts,
            supply,
            failure: None,
            written: BTreeSet::new(),
            supply_written: false,
        }
    }

    fn fail(&mut self, e: UnabortableTransactionError) -> LedgerError {
        let err = match &e {
            UnabortableTransactionError::Conflict => LedgerError::TransactionConflict,
            UnabortableTransactionError::Storage(inner) => LedgerError::Storage(inner.to_string()),
        };
        self.failure = Some(e);
        err
    }
}

impl LedgerTxn for SledTxn<'_> {
    fn account(&mut self, id: &AccountId) -> Result<Option<AccountLedger>> {
        match self.accounts.get(id.as_bytes()) {
            Ok(Some(data)) => Ok(Some(bincode::deserialize(&data)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(self.fail(e)),
        }
    }

    fn put_account(&mut self, account: &AccountLedger) -> Result<()> {
        let value = bincode::serialize(account)?;
        if let Err(e) = self.accounts.insert(account.id.as_bytes(), value) {
            return Err(self.fail(e));
        }
        self.written.insert(account.id.clone());
        Ok(())
    }

    fn supply(&mut self) -> Result<SupplyGovernor> {
        match self.supply.get(GOVERNOR_KEY) {
            Ok(Some(data)) => Ok(bincode::deserialize(&data)?),
            Ok(None) => Ok(SupplyGovernor::default()),
            Err(e) => Err(self.fail(e)),
        }
    }

    fn put_supply(&mut self, supply: &SupplyGovernor) -> Result<()> {
        let value = bincode::serialize(supply)?;
        if let Err(e) = self.supply.insert(GOVERNOR_KEY, value) {
            return Err(self.fail(e));
        }
        self.supply_written = true;
        Ok(())
    }
}

impl LedgerStore for LedgerDB {
    fn transact<T, F>(&self, f: F) -> Result<T>
    where
        F: Fn(&mut dyn LedgerTxn) -> Result<T>,
    {
        let outcome = (&self.accounts, &self.supply).transaction(|(accounts, supply)| {
            let mut txn = SledTxn::new(accounts, supply);
            match f(&mut txn) {
                Ok(value) => {
                    let events = events_for(&txn.written, txn.supply_written);
                    Ok((value, events))
                }
                Err(e) => match txn.failure.take() {
                    Some(sled_err) => Err(sled_err.into()),
                    None => Err(ConflictableTransactionError::Abort(e)),
                },
            }
        });

        match outcome {
            Ok((value, events)) => {
                self.flush()?;
                self.notifier.publish(events);
                Ok(value)
            }
            Err(TransactionError::Abort(e)) => Err(e),
            Err(TransactionError::Storage(e)) => Err(LedgerError::Storage(format!(
                "Ledger transaction failed: {}",
                e
            ))),
        }
    }

    fn load_account(&self, id: &AccountId) -> Result<Option<AccountLedger>> {
        match self.accounts.get(id.as_bytes())? {
            Some(data) => Ok(Some(bincode::deserialize(&data)?)),
            None => Ok(None),
        }
    }

    fn load_supply(&self) -> Result<SupplyGovernor> {
        match self.supply.get(GOVERNOR_KEY)? {
            Some(data) => Ok(bincode::deserialize(&data)?),
            None => Ok(SupplyGovernor::default()),
        }
    }

    fn account_ids(&self) -> Result<Vec<AccountId>> {
        let mut ids = Vec::new();
        for key in self.accounts.iter().keys() {
            let key = key?;
            let id = String::from_utf8(key.to_vec())
                .map_err(|e| LedgerError::Serialization(format!("Bad account key: {}", e)))?;
            ids.push(AccountId::from(id));
        }
        Ok(ids)
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.notifier.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_transaction_persists_across_reopen() {
        let dir = tempdir().unwrap();
        {
            let db = LedgerDB::open(dir.path()).unwrap();
            db.transact(|txn| {
                txn.put_account(&AccountLedger::new("alice".into(), "alice".into(), None))?;
                txn.put_supply(&SupplyGovernor {
                    total_awarded: 0,
                    total_members: 1,
                })
            })
            .unwrap();
        }

        let db = LedgerDB::open(dir.path()).unwrap();
        assert!(db.load_account(&"alice".into()).unwrap().is_some());
        assert_eq!(db.load_supply().unwrap().total_members, 1);
        assert_eq!(db.account_ids().unwrap(), vec![AccountId::from("alice")]);
    }

    #[test]
    fn test_aborted_transaction_leaves_no_trace() {
        let dir = tempdir().unwrap();
        let db = LedgerDB::open(dir.path()).unwrap();

        let result: Result<()> = db.transact(|txn| {
            txn.put_supply(&SupplyGovernor {
                total_awarded: 7,
                total_members: 7,
            })?;
            Err(LedgerError::AlreadyCompleted {
                task_id: "t".into(),
            })
        });

        assert!(matches!(result, Err(LedgerError::AlreadyCompleted { .. })));
        assert_eq!(db.load_supply().unwrap(), SupplyGovernor::default());
    }

    #[test]
    fn test_commit_publishes_events() {
        let dir = tempdir().unwrap();
        let db = LedgerDB::open(dir.path()).unwrap();
        let mut rx = db.subscribe();

        db.transact(|txn| {
            txn.put_account(&AccountLedger::new("bob".into(), "bob".into(), None))?;
            txn.put_supply(&SupplyGovernor::default())
        })
        .unwrap();

        assert_eq!(rx.try_recv().unwrap(), StoreEvent::Account("bob".into()));
        assert_eq!(rx.try_recv().unwrap(), StoreEvent::Supply);
    }
}
