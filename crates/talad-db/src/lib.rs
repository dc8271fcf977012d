//! # talad-db: Promotion Store for Talad POS
//!
//! SQLite persistence for promotions, the product catalog, branch stock
//! and the promotion audit log, built on sqlx.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  talad-engine (PricingEngine, PromotionAdmin)                          │
//! │       │  via the PromotionStore / ProductCatalog / StockLookup traits  │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     talad-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌────────────────────┐  ┌─────────────┐ │   │
//! │  │   │   Database    │    │   Repositories     │  │ Migrations  │ │   │
//! │  │   │   (pool.rs)   │◄───│ PromotionRepository│  │ (embedded)  │ │   │
//! │  │   │  SqlitePool   │    │ CatalogRepository  │  │ 001..003    │ │   │
//! │  │   │  WAL mode     │    │ AuditLogRepository │  │             │ │   │
//! │  │   └───────────────┘    └────────────────────┘  └─────────────┘ │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  talad.db (SQLite file, or :memory: in tests)                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use talad_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("talad.db")).await?;
//! let outcome = db.promotions().increment_usage("promo-1", Utc::now()).await?;
//! ```

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

pub use repository::audit::{AuditLogRepository, AuditRecord};
pub use repository::catalog::CatalogRepository;
pub use repository::promotion::{PromotionRepository, UsageIncrement};
