//! Repository layer for database operations.
//!
//! Methods are organized across submodules by table:
//! - `accounts.rs` - Account rows and field-level updates
//! - `trades.rs` - Trade rows (open legs and closure records)

mod accounts;
mod trades;

use accounts::apply_update;
use trades::upsert_trade;
use crate::domain::{Account, AccountId, AccountUpdate, Decimal, Trade};
use async_trait::async_trait;
use sqlx::sqlite::SqlitePool;
use std::str::FromStr;
use tracing::warn;

use super::{LedgerStore, StoreError};

/// SQLite-backed ledger store.
#[derive(Debug, Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Repository { pool }
    }
}

/// Parse a stored decimal column. Corrupt values are a decode error, never zero.
fn parse_decimal(column: &str, raw: &str) -> Result<Decimal, sqlx::Error> {
    Decimal::from_str(raw).map_err(|e| {
        warn!(column, value = %raw, error = %e, "Failed to parse stored decimal");
        sqlx::Error::Decode(Box::new(e))
    })
}

fn parse_optional_decimal(
    column: &str,
    raw: Option<String>,
) -> Result<Option<Decimal>, sqlx::Error> {
    raw.map(|s| parse_decimal(column, &s)).transpose()
}

#[async_trait]
impl LedgerStore for Repository {
    async fn get_or_create_account(
        &self,
        account_id: &AccountId,
        initial_cash: Decimal,
    ) -> Result<Account, StoreError> {
        Ok(self.upsert_and_fetch_account(account_id, initial_cash).await?)
    }

    async fn get_account(&self, account_id: &AccountId) -> Result<Account, StoreError> {
        self.fetch_account(account_id)
            .await?
            .ok_or_else(|| StoreError::AccountNotFound(account_id.clone()))
    }

    async fn list_accounts(&self) -> Result<Vec<Account>, StoreError> {
        Ok(self.fetch_accounts().await?)
    }

    async fn list_open_trades(&self, account_id: &AccountId) -> Result<Vec<Trade>, StoreError> {
        Ok(self.fetch_trades(Some(account_id), true).await?)
    }

    async fn list_all_open_trades(&self) -> Result<Vec<Trade>, StoreError> {
        Ok(self.fetch_trades(None, true).await?)
    }

    async fn list_trades(&self, account_id: &AccountId) -> Result<Vec<Trade>, StoreError> {
        Ok(self.fetch_trades(Some(account_id), false).await?)
    }

    async fn batch_save_trades(&self, trades: &[Trade]) -> Result<(), StoreError> {
        if trades.is_empty() {
            return Ok(());
        }
        let mut tx = self.pool.begin().await?;
        for trade in trades {
            upsert_trade(&mut *tx, trade).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn update_account(
        &self,
        account_id: &AccountId,
        update: &AccountUpdate,
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        apply_update(&mut *tx, account_id, update).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn commit(
        &self,
        account_id: &AccountId,
        update: &AccountUpdate,
        trades: &[Trade],
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        apply_update(&mut *tx, account_id, update).await?;
        for trade in trades {
            upsert_trade(&mut *tx, trade).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
