//! Database migrations and initialization.
//!
//! Schema steps are numbered. The highest applied step is kept in SQLite's
//! `user_version`, so reopening a ledger only runs the steps it is missing.

use sqlx::sqlite::{SqliteConnection, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::path::Path;
use tracing::{debug, info};

/// Ordered schema steps: (version, sql).
const MIGRATIONS: &[(i64, &str)] = &[(1, include_str!("schema.sql"))];

/// Open the ledger database at `db_path`, creating the file and its parent
/// directories on first use, then bring the schema up to date.
pub async fn init_db(db_path: &str) -> Result<SqlitePool, sqlx::Error> {
    if let Some(parent) = Path::new(db_path).parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .after_connect(|conn, _meta| Box::pin(async move { apply_pragmas(conn).await }))
        .connect(&format!("sqlite:{}?mode=rwc", db_path))
        .await?;

    let version = run_migrations(&pool).await?;
    info!(db_path, schema_version = version, "Ledger database ready");
    Ok(pool)
}

async fn schema_version(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
    let row = sqlx::query("PRAGMA user_version").fetch_one(pool).await?;
    row.try_get(0)
}

/// Apply every step newer than the stored version, one transaction per step.
/// Returns the resulting schema version.
async fn run_migrations(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
    let start = schema_version(pool).await?;
    let mut current = start;

    for &(version, sql) in MIGRATIONS.iter().filter(|(v, _)| *v > start) {
        debug!(from = current, to = version, "Applying ledger migration");
        let mut tx = pool.begin().await?;
        for statement in sql.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            sqlx::query(statement).execute(&mut *tx).await?;
        }
        let bump = format!("PRAGMA user_version = {}", version);
        sqlx::query(&bump).execute(&mut *tx).await?;
        tx.commit().await?;
        current = version;
    }

    Ok(current)
}

async fn apply_pragmas(conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    // Trades reference their account row.
    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(&mut *conn)
        .await?;

    let journal_mode: String = sqlx::query("PRAGMA journal_mode = WAL")
        .fetch_one(&mut *conn)
        .await?
        .try_get(0)?;
    debug!(journal_mode, "SQLite journal mode");

    sqlx::query("PRAGMA busy_timeout = 5000")
        .execute(&mut *conn)
        .await?;
    sqlx::query("PRAGMA synchronous = NORMAL")
        .execute(&mut *conn)
        .await?;

    Ok(())
}
