//! # talad-engine: Promotion Pricing and Administration
//!
//! The service layer of Talad Promotions. It prices line items with the
//! best active promotion, answers storefront eligibility queries, applies
//! promotions to carts, records usage, and runs the back-office admin
//! operations.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Talad Promotions Architecture                       │
//! │                                                                         │
//! │   HTTP / desktop shell (not in this workspace)                          │
//! │        │ Envelope<T>, localize()                                        │
//! │  ┌─────▼───────────────────────────────────────────────────────────┐   │
//! │  │               ★ talad-engine (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │   PricingEngine        PromotionAdmin       EngineConfig        │   │
//! │  │        │                    │                                   │   │
//! │  │        ├──── store traits ──┤──► EventPublisher (broadcast)     │   │
//! │  │        │                    └──► AuditSink (spawned writes)     │   │
//! │  └────────┼────────────────────────────────────────────────────────┘   │
//! │           │                                                             │
//! │  ┌────────▼──────────┐        ┌──────────────────────┐                 │
//! │  │     talad-db      │        │      talad-core      │                 │
//! │  │ SQLite repos      │        │ rules, discount math │                 │
//! │  └───────────────────┘        └──────────────────────┘                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`pricing`] - Line pricing, storefront eligibility, cart, usage
//! - [`admin`] - CRUD, clone, bulk toggle, rule checks, export, alerts
//! - [`store`] - Collaborator traits; [`adapters`] implements them on talad-db
//! - [`events`] - Promotion events and publishers
//! - [`audit`] - Audit sinks
//! - [`envelope`] - Response envelope and localized messages
//! - [`config`] - TOML + environment configuration
//! - [`telemetry`] - Tracing setup
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! let config = EngineConfig::load(None)?;
//! init_tracing(&config.logging.filter);
//!
//! let db = Database::new(config.db_config()).await?;
//! let events = Arc::new(BroadcastPublisher::new(config.engine.event_channel_capacity));
//! let audit = Arc::new(DbAuditSink::new(db.audit_log()));
//!
//! let engine = PricingEngine::sqlite(&db, events.clone(), audit.clone());
//! let line = engine.price_line_item("prod-1", "BKK01", 2).await?;
//! ```

pub mod adapters;
pub mod admin;
pub mod audit;
pub mod config;
pub mod envelope;
pub mod error;
pub mod events;
pub mod pricing;
pub mod store;
pub mod telemetry;

#[cfg(test)]
mod testing;

pub use admin::{BulkToggleReport, PromotionAdmin, ToggleOutcome};
pub use audit::{AuditEntry, AuditSink, DbAuditSink, TracingAuditSink};
pub use config::{ConfigError, EngineConfig};
pub use envelope::{localize, Envelope, ErrorCode, Locale};
pub use error::{EngineError, EngineResult, Entity, InvalidReason};
pub use events::{BroadcastPublisher, EventPublisher, NoopPublisher, PromotionEvent};
pub use pricing::{CartLine, LineExplanation, PricedLine, PricingEngine, UsageReceipt};
pub use store::{ProductCatalog, PromotionStore, StockLookup};
pub use telemetry::init_tracing;
