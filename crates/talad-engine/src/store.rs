//! # Collaborator Traits
//!
//! The engine reaches storage and the catalogs only through these traits.
//! The SQLite implementations live in [`crate::adapters`].
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  PricingEngine / PromotionAdmin                                         │
//! │       │ Arc<dyn PromotionStore>  Arc<dyn ProductCatalog>                │
//! │       │ Arc<dyn StockLookup>                                            │
//! │       ▼                                                                 │
//! │  PromotionRepository   CatalogRepository (talad-db)                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use talad_core::query::{ActiveCriteria, ItemPromotions, Page, PromotionFilter, PromotionStatistics};
use talad_core::{BranchStockItem, Product, Promotion};
use talad_db::UsageIncrement;

use crate::error::EngineResult;

/// Persistence for promotion definitions.
#[async_trait]
pub trait PromotionStore: Send + Sync {
    async fn insert(&self, promotion: &Promotion) -> EngineResult<()>;

    async fn get(&self, id: &str) -> EngineResult<Option<Promotion>>;

    /// Writes the editable fields. Never writes `usage_count`.
    async fn update(&self, promotion: &Promotion) -> EngineResult<()>;

    /// Returns false when nothing was deleted.
    async fn delete(&self, id: &str) -> EngineResult<bool>;

    /// Returns false when the promotion does not exist.
    async fn set_active(&self, id: &str, is_active: bool, now: DateTime<Utc>) -> EngineResult<bool>;

    async fn list(
        &self,
        filter: &PromotionFilter,
        now: DateTime<Utc>,
    ) -> EngineResult<Page<Promotion>>;

    /// Enabled, in-window promotions open to the branch, ordered by
    /// priority, creation time and id. Product and category scopes are
    /// not applied.
    async fn find_active(
        &self,
        criteria: &ActiveCriteria,
        now: DateTime<Utc>,
    ) -> EngineResult<Vec<Promotion>>;

    /// Per stock item, the active promotions matching it by name, then by product id.
    async fn find_applicable(
        &self,
        items: &[BranchStockItem],
        branch_code: &str,
        now: DateTime<Utc>,
    ) -> EngineResult<Vec<ItemPromotions>>;

    /// Atomic check-and-increment of `usage_count`.
    async fn increment_usage(&self, id: &str, now: DateTime<Utc>) -> EngineResult<UsageIncrement>;

    async fn check_schedule_conflicts(
        &self,
        products: &[String],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        exclude_id: Option<&str>,
    ) -> EngineResult<Vec<Promotion>>;

    async fn statistics(
        &self,
        branch_code: Option<&str>,
        now: DateTime<Utc>,
    ) -> EngineResult<PromotionStatistics>;
}

/// Product catalog lookup: reference price and category.
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    async fn product(&self, id: &str) -> EngineResult<Option<Product>>;
}

/// Branch-scoped stock record lookup.
#[async_trait]
pub trait StockLookup: Send + Sync {
    async fn stock_item(&self, id: &str) -> EngineResult<Option<BranchStockItem>>;
}
