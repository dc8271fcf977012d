//! SQLite-backed implementations of the collaborator traits.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use talad_core::query::{ActiveCriteria, ItemPromotions, Page, PromotionFilter, PromotionStatistics};
use talad_core::{BranchStockItem, Product, Promotion};
use talad_db::{CatalogRepository, PromotionRepository, UsageIncrement};

use crate::error::EngineResult;
use crate::store::{ProductCatalog, PromotionStore, StockLookup};

#[async_trait]
impl PromotionStore for PromotionRepository {
    async fn insert(&self, promotion: &Promotion) -> EngineResult<()> {
        Ok(PromotionRepository::insert(self, promotion).await?)
    }

    async fn get(&self, id: &str) -> EngineResult<Option<Promotion>> {
        Ok(self.get_by_id(id).await?)
    }

    async fn update(&self, promotion: &Promotion) -> EngineResult<()> {
        Ok(PromotionRepository::update(self, promotion).await?)
    }

    async fn delete(&self, id: &str) -> EngineResult<bool> {
        Ok(PromotionRepository::delete(self, id).await?)
    }

    async fn set_active(
        &self,
        id: &str,
        is_active: bool,
        now: DateTime<Utc>,
    ) -> EngineResult<bool> {
        Ok(PromotionRepository::set_active(self, id, is_active, now).await?)
    }

    async fn list(
        &self,
        filter: &PromotionFilter,
        now: DateTime<Utc>,
    ) -> EngineResult<Page<Promotion>> {
        Ok(PromotionRepository::list(self, filter, now).await?)
    }

    async fn find_active(
        &self,
        criteria: &ActiveCriteria,
        now: DateTime<Utc>,
    ) -> EngineResult<Vec<Promotion>> {
        Ok(PromotionRepository::find_active(self, criteria, now).await?)
    }

    async fn find_applicable(
        &self,
        items: &[BranchStockItem],
        branch_code: &str,
        now: DateTime<Utc>,
    ) -> EngineResult<Vec<ItemPromotions>> {
        Ok(PromotionRepository::find_applicable(self, items, branch_code, now).await?)
    }

    async fn increment_usage(&self, id: &str, now: DateTime<Utc>) -> EngineResult<UsageIncrement> {
        Ok(PromotionRepository::increment_usage(self, id, now).await?)
    }

    async fn check_schedule_conflicts(
        &self,
        products: &[String],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        exclude_id: Option<&str>,
    ) -> EngineResult<Vec<Promotion>> {
        let conflicts =
            PromotionRepository::check_schedule_conflicts(self, products, start, end, exclude_id)
                .await?;
        Ok(conflicts)
    }

    async fn statistics(
        &self,
        branch_code: Option<&str>,
        now: DateTime<Utc>,
    ) -> EngineResult<PromotionStatistics> {
        Ok(PromotionRepository::statistics(self, branch_code, now).await?)
    }
}

#[async_trait]
impl ProductCatalog for CatalogRepository {
    async fn product(&self, id: &str) -> EngineResult<Option<Product>> {
        Ok(self.get_product(id).await?)
    }
}

#[async_trait]
impl StockLookup for CatalogRepository {
    async fn stock_item(&self, id: &str) -> EngineResult<Option<BranchStockItem>> {
        Ok(self.get_stock_item(id).await?)
    }
}
