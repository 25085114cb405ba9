//! Database module for SQLite operations.
//!
//! This module provides:
//! - Database initialization and migrations
//! - SQLite pragma configuration
//! - The `LedgerStore` trait and its SQLite `Repository`

use crate::domain::{Account, AccountId, AccountUpdate, Decimal, Trade};
use async_trait::async_trait;
use thiserror::Error;

pub mod migrations;
pub mod repo;

pub use migrations::init_db;
pub use repo::Repository;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Persistence the trading desk depends on.
///
/// Each call is atomic on its own. `commit` is the only way to change an
/// account and its trades together.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Load an account, creating it with `initial_cash` on first use.
    async fn get_or_create_account(
        &self,
        account_id: &AccountId,
        initial_cash: Decimal,
    ) -> Result<Account, StoreError>;

    /// Load an existing account without creating one.
    async fn get_account(&self, account_id: &AccountId) -> Result<Account, StoreError>;

    /// Every account, in creation order.
    async fn list_accounts(&self) -> Result<Vec<Account>, StoreError>;

    /// Open trades of one account, oldest first.
    async fn list_open_trades(&self, account_id: &AccountId) -> Result<Vec<Trade>, StoreError>;

    /// Open trades of every account, oldest first.
    async fn list_all_open_trades(&self) -> Result<Vec<Trade>, StoreError>;

    /// Full trade history of one account (open and done), oldest first.
    async fn list_trades(&self, account_id: &AccountId) -> Result<Vec<Trade>, StoreError>;

    /// Insert new trades and overwrite existing ones by id.
    async fn batch_save_trades(&self, trades: &[Trade]) -> Result<(), StoreError>;

    /// Apply a field-level update to an existing account.
    async fn update_account(
        &self,
        account_id: &AccountId,
        update: &AccountUpdate,
    ) -> Result<(), StoreError>;

    /// Apply `update` and save `trades` in one transaction.
    async fn commit(
        &self,
        account_id: &AccountId,
        update: &AccountUpdate,
        trades: &[Trade],
    ) -> Result<(), StoreError>;

    /// Cheap round trip proving the store is reachable.
    async fn ping(&self) -> Result<(), StoreError>;
}
