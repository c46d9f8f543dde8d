use std::sync::Arc;
use std::thread;
use tamra_core::*;
use tempfile::tempdir;

const THREADS: usize = 8;
const AWARDS_PER_THREAD: u64 = 40;

fn retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 1_000,
        base_backoff_ms: 0,
        max_backoff_ms: 1,
    }
}

fn seed_accounts<S: LedgerStore>(ledger: &Ledger<S>, n: usize) -> Vec<AccountId> {
    (0..n)
        .map(|i| {
            let id = AccountId::from(format!("miner-{}", i));
            ledger
                .register_account(&NewAccount::new(id.clone(), id.as_str()), None, 0)
                .unwrap();
            id
        })
        .collect()
}

/// Hammer the ledger from several threads and return what each thread was paid
fn hammer<S: LedgerStore>(ledger: Arc<Ledger<S>>, ids: &[AccountId]) -> Vec<u64> {
    let handles: Vec<_> = ids
        .iter()
        .cloned()
        .enumerate()
        .map(|(i, id)| {
            let ledger = ledger.clone();
            thread::spawn(move || {
                let policy = retry();
                let mut paid = 0;
                for n in 0..AWARDS_PER_THREAD {
                    let amount = 1 + (n * 7 + i as u64 * 13) % 90;
                    match policy.run(|| ledger.award(&id, amount)) {
                        Ok(awarded) => {
                            assert!(awarded <= amount);
                            paid += awarded;
                        }
                        Err(LedgerError::SupplyCapReached { .. }) => {}
                        Err(e) => panic!("unexpected error: {}", e),
                    }
                }
                paid
            })
        })
        .collect();

    handles.into_iter().map(|h| h.join().unwrap()).collect()
}

fn assert_cap_invariant<S: LedgerStore>(ledger: &Ledger<S>, ids: &[AccountId], paid: &[u64]) {
    let supply = ledger.supply().unwrap();
    let balances: u64 = ids.iter().map(|id| ledger.account(id).unwrap().balance).sum();

    assert!(supply.total_awarded <= ledger.supply_cap());
    assert_eq!(supply.total_awarded, balances);
    assert_eq!(balances, paid.iter().sum::<u64>());
    for (id, paid) in ids.iter().zip(paid) {
        assert_eq!(ledger.account(id).unwrap().balance, *paid);
    }
}

#[test]
fn test_cap_invariant_memory_store() {
    // Demand is far above the cap so the boundary is contended
    let ledger = Arc::new(Ledger::new(MemoryStore::new(), 5_000));
    let ids = seed_accounts(&ledger, THREADS);

    let paid = hammer(ledger.clone(), &ids);

    assert_cap_invariant(&ledger, &ids, &paid);
    assert_eq!(ledger.supply().unwrap().total_awarded, 5_000);
}

#[test]
fn test_cap_invariant_sled_store() {
    let dir = tempdir().unwrap();
    let ledger = Arc::new(Ledger::new(LedgerDB::open(dir.path()).unwrap(), 5_000));
    let ids = seed_accounts(&ledger, THREADS);

    let paid = hammer(ledger.clone(), &ids);

    assert_cap_invariant(&ledger, &ids, &paid);
    assert_eq!(ledger.supply().unwrap().total_awarded, 5_000);
}

#[test]
fn test_no_lost_updates_under_cap() {
    let ledger = Arc::new(Ledger::new(MemoryStore::new(), 1_000_000));
    let ids = seed_accounts(&ledger, THREADS);

    let paid = hammer(ledger.clone(), &ids);

    // Nothing was throttled: every request was paid in full
    let expected: Vec<u64> = (0..THREADS as u64)
        .map(|i| {
            (0..AWARDS_PER_THREAD)
                .map(|n| 1 + (n * 7 + i * 13) % 90)
                .sum()
        })
        .collect();
    assert_eq!(paid, expected);
    assert_cap_invariant(&ledger, &ids, &paid);
}

#[test]
fn test_concurrent_task_completion_pays_once() {
    let ledger = Arc::new(Ledger::new(MemoryStore::new(), 1_000_000));
    let ids = seed_accounts(&ledger, 1);
    let id = ids[0].clone();

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let ledger = ledger.clone();
            let id = id.clone();
            thread::spawn(move || retry().run(|| ledger.complete_task(&id, "join-telegram", 50)))
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let successes = results.iter().filter(|r| r.is_ok()).count();
    let duplicates = results
        .iter()
        .filter(|r| matches!(r, Err(LedgerError::AlreadyCompleted { .. })))
        .count();

    assert_eq!(successes, 1);
    assert_eq!(duplicates, THREADS - 1);
    assert_eq!(ledger.account(&id).unwrap().balance, 50);
}

#[test]
fn test_concurrent_referrals_sled() {
    let dir = tempdir().unwrap();
    let ledger = Arc::new(Ledger::new(LedgerDB::open(dir.path()).unwrap(), 250));
    let referrer = seed_accounts(&ledger, 1).remove(0);

    let handles: Vec<_> = (0..5)
        .map(|i| {
            let ledger = ledger.clone();
            let referrer = referrer.clone();
            thread::spawn(move || {
                let new = NewAccount::new(AccountId::from(format!("friend-{}", i)), "friend");
                retry()
                    .run(|| ledger.register_account(&new, Some(&referrer), 100))
                    .unwrap()
            })
        })
        .collect();

    let bonuses: u64 = handles
        .into_iter()
        .map(|h| match h.join().unwrap().referral {
            ReferralOutcome::Attributed { bonus_awarded, .. } => bonus_awarded,
            other => panic!("unexpected outcome: {:?}", other),
        })
        .sum();

    // Every relationship is recorded, bonuses stop at the cap
    let account = ledger.account(&referrer).unwrap();
    assert_eq!(account.referral_count, 5);
    assert_eq!(account.referred_users.len(), 5);
    assert_eq!(bonuses, 250);
    assert_eq!(account.balance, 250);
    assert_eq!(ledger.stats().unwrap().total_members, 6);
}
