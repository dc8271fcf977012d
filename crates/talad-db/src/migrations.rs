//! Embedded schema migrations.
//!
//! ```text
//! migrations/sqlite/
//! ├── 001_promotions.sql   promotions table, window/priority indexes
//! ├── 002_catalog.sql      products, branch_stock
//! └── 003_audit_log.sql    promotion_audit_log
//! ```
//!
//! Files are applied in version order and never edited once released;
//! schema changes go into a new numbered file.

use sqlx::migrate::Migrator;
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::DbResult;

static MIGRATOR: Migrator = sqlx::migrate!("../../migrations/sqlite");

/// Applies whatever the database has not seen yet.
pub async fn run_migrations(pool: &SqlitePool) -> DbResult<()> {
    let (total, applied) = migration_status(pool).await?;
    if applied >= total {
        debug!(total, "Promotion schema up to date");
        return Ok(());
    }

    MIGRATOR.run(pool).await?;
    info!(from = applied, to = total, "Promotion schema migrated");
    Ok(())
}

/// `(embedded, applied)` migration counts. A fresh database reports zero applied.
pub async fn migration_status(pool: &SqlitePool) -> DbResult<(usize, usize)> {
    let ledger_tables: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = '_sqlx_migrations'",
    )
    .fetch_one(pool)
    .await?;

    let applied: i64 = if ledger_tables > 0 {
        sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = 1")
            .fetch_one(pool)
            .await?
    } else {
        0
    };

    Ok((MIGRATOR.migrations.len(), applied as usize))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    #[tokio::test]
    async fn test_fresh_database_reports_nothing_applied() {
        let db = Database::new(DbConfig::in_memory().run_migrations(false)).await.unwrap();
        assert_eq!(migration_status(db.pool()).await.unwrap(), (3, 0));

        run_migrations(db.pool()).await.unwrap();
        run_migrations(db.pool()).await.unwrap();
        assert_eq!(migration_status(db.pool()).await.unwrap(), (3, 3));
    }
}
