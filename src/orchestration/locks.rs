use crate::domain::AccountId;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// One async mutex per account. Commands on different accounts never contend.
///
/// An entry lives only while some task holds or waits on it, so the table
/// stays as small as the set of accounts with work in flight.
#[derive(Debug, Clone, Default)]
pub struct AccountLocks {
    locks: Arc<DashMap<AccountId, Arc<Mutex<()>>>>,
}

/// Exclusive access to one account. Dropping it releases the account.
#[derive(Debug)]
pub struct AccountGuard {
    guard: Option<OwnedMutexGuard<()>>,
    account_id: AccountId,
    locks: Arc<DashMap<AccountId, Arc<Mutex<()>>>>,
}

impl Drop for AccountGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Waiters clone the Arc under the shard lock, so a count of one means
        // nobody else can be using this mutex.
        self.locks
            .remove_if(&self.account_id, |_, lock| Arc::strong_count(lock) == 1);
    }
}

impl AccountLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `account_id`. Released when the guard drops.
    pub async fn acquire(&self, account_id: &AccountId) -> AccountGuard {
        // Clone the Arc out so the shard lock is not held across the await.
        let lock = self
            .locks
            .entry(account_id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        AccountGuard {
            guard: Some(lock.lock_owned().await),
            account_id: account_id.clone(),
            locks: Arc::clone(&self.locks),
        }
    }

    /// Accounts currently locked or awaited.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
