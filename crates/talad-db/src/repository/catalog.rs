//! # Catalog Repository
//!
//! Products and branch stock records: the lookups the pricing engine
//! needs to price a line and to match stock items to promotions.
//!
//! ## Two Catalogs
//! ```text
//! products (id, sku, name, category, price)
//!     ▲
//!     │ product_id (trusted only when product_model = 'catalog')
//!     │
//! branch_stock (id, branch_code, name, product_id?, product_model, price, quantity)
//! ```
//! Stock records are keyed independently of products, which is why
//! promotion matching goes by name first.

use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use std::collections::HashMap;
use tracing::debug;

use talad_core::{BranchStockItem, Product};

use super::ts;
use crate::error::DbResult;

/// Repository for products and branch stock.
#[derive(Debug, Clone)]
pub struct CatalogRepository {
    pool: SqlitePool,
}

impl CatalogRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CatalogRepository { pool }
    }

    // =========================================================================
    // Products
    // =========================================================================

    /// Inserts a catalog product. A duplicate SKU is a `UniqueViolation`.
    pub async fn insert_product(&self, product: &Product) -> DbResult<()> {
        debug!(id = %product.id, sku = %product.sku, "Inserting product");

        sqlx::query(
            r#"
            INSERT INTO products
                (id, sku, name, category, price_satang, is_active, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&product.id)
        .bind(&product.sku)
        .bind(&product.name)
        .bind(product.category)
        .bind(product.price_satang)
        .bind(product.is_active)
        .bind(ts(product.created_at))
        .bind(ts(product.updated_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Gets a product by id.
    pub async fn get_product(&self, id: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, sku, name, category, price_satang, is_active, created_at, updated_at
            FROM products
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    /// Maps product ids to display names. Unknown ids are absent from the map.
    pub async fn product_names(&self, ids: &[String]) -> DbResult<HashMap<String, String>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let mut qb = QueryBuilder::<Sqlite>::new("SELECT id, name FROM products WHERE id IN (");
        let mut separated = qb.separated(", ");
        for id in ids {
            separated.push_bind(id.clone());
        }
        separated.push_unseparated(")");

        let rows: Vec<(String, String)> = qb.build_query_as().fetch_all(&self.pool).await?;
        Ok(rows.into_iter().collect())
    }

    pub async fn count_products(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    // =========================================================================
    // Branch Stock
    // =========================================================================

    /// Inserts a branch stock record.
    pub async fn insert_stock_item(&self, item: &BranchStockItem) -> DbResult<()> {
        debug!(id = %item.id, branch = %item.branch_code, "Inserting stock item");

        sqlx::query(
            r#"
            INSERT INTO branch_stock
                (id, branch_code, name, product_id, product_model,
                 price_satang, quantity, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&item.id)
        .bind(&item.branch_code)
        .bind(&item.name)
        .bind(&item.product_id)
        .bind(item.product_model)
        .bind(item.price_satang)
        .bind(item.quantity)
        .bind(ts(item.updated_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Gets a stock record by id.
    pub async fn get_stock_item(&self, id: &str) -> DbResult<Option<BranchStockItem>> {
        let item = sqlx::query_as::<_, BranchStockItem>(
            r#"
            SELECT id, branch_code, name, product_id, product_model,
                   price_satang, quantity, updated_at
            FROM branch_stock
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(item)
    }

    /// Stock records of one branch, by name.
    pub async fn stock_for_branch(
        &self,
        branch_code: &str,
        limit: u32,
    ) -> DbResult<Vec<BranchStockItem>> {
        let items = sqlx::query_as::<_, BranchStockItem>(
            r#"
            SELECT id, branch_code, name, product_id, product_model,
                   price_satang, quantity, updated_at
            FROM branch_stock
            WHERE branch_code = ?1
            ORDER BY name
            LIMIT ?2
            "#,
        )
        .bind(branch_code)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
