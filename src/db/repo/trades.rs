//! Trade rows: open legs and settled closure records.

use crate::domain::{AccountId, Instrument, TimeMs, Trade, TradeState};
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::Row;
use std::str::FromStr;

use super::{parse_decimal, parse_optional_decimal, Repository};

impl Repository {
    /// Trades ordered FIFO: entry time, then insertion order.
    pub(super) async fn fetch_trades(
        &self,
        account_id: Option<&AccountId>,
        open_only: bool,
    ) -> Result<Vec<Trade>, sqlx::Error> {
        let mut sql = String::from(
            r#"
            SELECT trade_id, account_id, instrument, state, size, entry_price,
                   entry_time_ms, exit_price, exit_time_ms, exit_cash
            FROM trades
            WHERE 1 = 1
            "#,
        );
        if account_id.is_some() {
            sql.push_str(" AND account_id = ?");
        }
        if open_only {
            sql.push_str(" AND state = 'open'");
        }
        sql.push_str(" ORDER BY entry_time_ms ASC, rowid ASC");

        let mut query = sqlx::query(&sql);
        if let Some(account_id) = account_id {
            query = query.bind(account_id.as_str());
        }

        query
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(trade_from_row)
            .collect()
    }
}

/// Insert a trade or overwrite the stored one with the same id.
///
/// Updating in place keeps the row's insertion order for FIFO ties.
pub(super) async fn upsert_trade(
    conn: &mut SqliteConnection,
    trade: &Trade,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO trades
        (trade_id, account_id, instrument, state, size, entry_price,
         entry_time_ms, exit_price, exit_time_ms, exit_cash)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(trade_id) DO UPDATE SET
            state = excluded.state,
            size = excluded.size,
            exit_price = excluded.exit_price,
            exit_time_ms = excluded.exit_time_ms,
            exit_cash = excluded.exit_cash
        "#,
    )
    .bind(&trade.trade_id)
    .bind(trade.account_id.as_str())
    .bind(trade.instrument.as_str())
    .bind(trade.state.as_str())
    .bind(trade.size)
    .bind(trade.entry_price.to_canonical_string())
    .bind(trade.entry_time.as_i64())
    .bind(trade.exit_price.map(|d| d.to_canonical_string()))
    .bind(trade.exit_time.map(|t| t.as_i64()))
    .bind(trade.exit_cash.map(|d| d.to_canonical_string()))
    .execute(&mut *conn)
    .await?;
    Ok(())
}

fn trade_from_row(row: &SqliteRow) -> Result<Trade, sqlx::Error> {
    let state_str: String = row.try_get("state")?;
    let state = TradeState::from_str(&state_str).map_err(|e| sqlx::Error::ColumnDecode {
        index: "state".to_string(),
        source: e.into(),
    })?;

    Ok(Trade {
        trade_id: row.try_get("trade_id")?,
        account_id: AccountId::new(row.try_get::<String, _>("account_id")?),
        instrument: Instrument::new(row.try_get::<String, _>("instrument")?),
        state,
        size: row.try_get("size")?,
        entry_price: parse_decimal("entry_price", &row.try_get::<String, _>("entry_price")?)?,
        entry_time: TimeMs::new(row.try_get("entry_time_ms")?),
        exit_price: parse_optional_decimal("exit_price", row.try_get("exit_price")?)?,
        exit_time: row
            .try_get::<Option<i64>, _>("exit_time_ms")?
            .map(TimeMs::new),
        exit_cash: parse_optional_decimal("exit_cash", row.try_get("exit_cash")?)?,
    })
}
