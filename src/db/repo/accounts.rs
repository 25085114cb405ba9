//! Account rows.

use crate::db::StoreError;
use crate::domain::{Account, AccountId, AccountUpdate, Decimal, TimeMs};
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::Row;

use super::{parse_decimal, Repository};

const ACCOUNT_COLUMNS: &str = "account_id, cash, debt, month_debt, debt_date_ms";

impl Repository {
    /// Insert the account if it is new, then read it back.
    pub(super) async fn upsert_and_fetch_account(
        &self,
        account_id: &AccountId,
        initial_cash: Decimal,
    ) -> Result<Account, sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO accounts (account_id, cash)
            VALUES (?, ?)
            ON CONFLICT(account_id) DO NOTHING
            "#,
        )
        .bind(account_id.as_str())
        .bind(initial_cash.to_canonical_string())
        .execute(&self.pool)
        .await?;

        let sql = format!("SELECT {} FROM accounts WHERE account_id = ?", ACCOUNT_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(account_id.as_str())
            .fetch_one(&self.pool)
            .await?;
        account_from_row(&row)
    }

    pub(super) async fn fetch_account(
        &self,
        account_id: &AccountId,
    ) -> Result<Option<Account>, sqlx::Error> {
        let sql = format!("SELECT {} FROM accounts WHERE account_id = ?", ACCOUNT_COLUMNS);
        sqlx::query(&sql)
            .bind(account_id.as_str())
            .fetch_optional(&self.pool)
            .await?
            .map(|row| account_from_row(&row))
            .transpose()
    }

    pub(super) async fn fetch_accounts(&self) -> Result<Vec<Account>, sqlx::Error> {
        let sql = format!("SELECT {} FROM accounts ORDER BY rowid ASC", ACCOUNT_COLUMNS);
        sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(account_from_row)
            .collect()
    }
}

/// Apply a field-level update. Unset fields keep their stored value.
pub(super) async fn apply_update(
    conn: &mut SqliteConnection,
    account_id: &AccountId,
    update: &AccountUpdate,
) -> Result<(), StoreError> {
    let result = sqlx::query(
        r#"
        UPDATE accounts SET
            cash = COALESCE(?, cash),
            debt = COALESCE(?, debt),
            month_debt = COALESCE(?, month_debt),
            debt_date_ms = COALESCE(?, debt_date_ms)
        WHERE account_id = ?
        "#,
    )
    .bind(update.cash.map(|d| d.to_canonical_string()))
    .bind(update.debt.map(|d| d.to_canonical_string()))
    .bind(update.month_debt.map(|d| d.to_canonical_string()))
    .bind(update.debt_date.map(|t| t.as_i64()))
    .bind(account_id.as_str())
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(StoreError::AccountNotFound(account_id.clone()));
    }
    Ok(())
}

fn account_from_row(row: &SqliteRow) -> Result<Account, sqlx::Error> {
    Ok(Account {
        account_id: AccountId::new(row.try_get::<String, _>("account_id")?),
        cash: parse_decimal("cash", &row.try_get::<String, _>("cash")?)?,
        debt: parse_decimal("debt", &row.try_get::<String, _>("debt")?)?,
        month_debt: parse_decimal("month_debt", &row.try_get::<String, _>("month_debt")?)?,
        debt_date: row
            .try_get::<Option<i64>, _>("debt_date_ms")?
            .map(TimeMs::new),
    })
}
