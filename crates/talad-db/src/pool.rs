//! # Database Handle
//!
//! Opens the SQLite pool the promotion store, catalog and audit log share.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  DbConfig::new(path) / DbConfig::in_memory()                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Database::new(config) ── connect_options() ── pool_options()           │
//! │       │                  WAL, foreign keys,    size, acquire timeout    │
//! │       │                  busy timeout                                   │
//! │       ▼                                                                 │
//! │  migrations (embedded) ──► promotions() catalog() audit_log()           │
//! │                                                                         │
//! │  price_line_item ──► reads, parallel under WAL                          │
//! │  use_promotion   ──► one conditional UPDATE, serialized by SQLite       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::error::{DbError, DbResult};
use crate::migrations;
use crate::repository::audit::AuditLogRepository;
use crate::repository::catalog::CatalogRepository;
use crate::repository::promotion::PromotionRepository;

/// Where the database lives and how the pool is sized.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// SQLite file; `None` for a private in-memory database.
    pub path: Option<PathBuf>,

    /// Default: 5. Always 1 in memory.
    pub max_connections: u32,

    /// How long a caller waits for a free connection.
    pub acquire_timeout: Duration,

    /// How long a writer waits on the database lock, e.g. while another
    /// register is redeeming the same promotion.
    pub busy_timeout: Duration,

    pub run_migrations: bool,
}

impl DbConfig {
    /// File-backed database, created when missing.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            path: Some(path.into()),
            max_connections: 5,
            acquire_timeout: Duration::from_secs(30),
            busy_timeout: Duration::from_secs(5),
            run_migrations: true,
        }
    }

    /// Isolated in-memory database for tests. Every call is a fresh one.
    pub fn in_memory() -> Self {
        DbConfig {
            path: None,
            max_connections: 1,
            acquire_timeout: Duration::from_secs(5),
            busy_timeout: Duration::from_secs(5),
            run_migrations: true,
        }
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        // A second connection to :memory: would see an empty database
        if self.path.is_some() {
            self.max_connections = max.max(1);
        }
        self
    }

    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    pub fn run_migrations(mut self, run: bool) -> Self {
        self.run_migrations = run;
        self
    }

    fn connect_options(&self) -> SqliteConnectOptions {
        let base = match &self.path {
            Some(path) => SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal),
            None => SqliteConnectOptions::new().in_memory(true),
        };
        base.synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true)
            .busy_timeout(self.busy_timeout)
    }

    fn pool_options(&self) -> SqlitePoolOptions {
        let options = SqlitePoolOptions::new()
            .max_connections(self.max_connections)
            .acquire_timeout(self.acquire_timeout);
        match self.path {
            Some(_) => options.min_connections(1).idle_timeout(Some(Duration::from_secs(600))),
            // The in-memory database dies with its only connection
            None => options.min_connections(1).idle_timeout(None).max_lifetime(None),
        }
    }

    fn describe(&self) -> String {
        self.path
            .as_deref()
            .map(Path::display)
            .map_or_else(|| ":memory:".to_string(), |p| p.to_string())
    }
}

/// Shared pool plus repository constructors. Cheap to clone.
///
/// ```rust,ignore
/// let db = Database::new(DbConfig::new("./talad.db")).await?;
/// let active = db.promotions().find_active(&criteria, Utc::now()).await?;
/// ```
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Opens the pool and, unless disabled, applies pending migrations.
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        let pool = config
            .pool_options()
            .connect_with(config.connect_options())
            .await
            .map_err(|e| DbError::ConnectionFailed(format!("{}: {}", config.describe(), e)))?;
        info!(
            database = %config.describe(),
            max_connections = config.max_connections,
            "Promotion database opened"
        );

        let db = Database { pool };
        if config.run_migrations {
            migrations::run_migrations(&db.pool).await?;
        }
        Ok(db)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// The promotion store.
    pub fn promotions(&self) -> PromotionRepository {
        PromotionRepository::new(self.pool.clone())
    }

    /// Products and branch stock.
    pub fn catalog(&self) -> CatalogRepository {
        CatalogRepository::new(self.pool.clone())
    }

    pub fn audit_log(&self) -> AuditLogRepository {
        AuditLogRepository::new(self.pool.clone())
    }

    /// Closes the pool. Repository calls fail afterwards.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// True when the database answers a trivial query.
    pub async fn health_check(&self) -> bool {
        sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .is_ok()
    }
}
