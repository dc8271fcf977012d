//! # Catalog Types
//!
//! The two catalog shapes the promotion engine reads but never owns.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  ┌─────────────────────┐          ┌─────────────────────────────────┐   │
//! │  │      Product        │          │        BranchStockItem          │   │
//! │  │  ─────────────────  │          │  ─────────────────────────────  │   │
//! │  │  id (UUID)          │◄─ maybe ─│  product_id (often missing)     │   │
//! │  │  sku                │          │  branch_code                    │   │
//! │  │  name               │  name ≈  │  name (display name)            │   │
//! │  │  category           │◄────────►│  product_model                  │   │
//! │  │  price_satang       │          │  price_satang                   │   │
//! │  └─────────────────────┘          └─────────────────────────────────┘   │
//! │                                                                         │
//! │  The two catalogs are keyed independently. Stock records are matched   │
//! │  to promotion products by trimmed, case-insensitive name first and by  │
//! │  product id only when the record comes from the main catalog.          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::money::Money;

// =============================================================================
// Product Category
// =============================================================================

/// Catalog category a promotion may be scoped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum ProductCategory {
    /// Handsets.
    Mobile,
    /// Cases, chargers, cables.
    Accessory,
    /// Sealed retail boxes.
    Boxset,
}

impl ProductCategory {
    pub const ALL: [ProductCategory; 3] = [
        ProductCategory::Mobile,
        ProductCategory::Accessory,
        ProductCategory::Boxset,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProductCategory::Mobile => "mobile",
            ProductCategory::Accessory => "accessory",
            ProductCategory::Boxset => "boxset",
        }
    }
}

impl fmt::Display for ProductCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProductCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mobile" => Ok(ProductCategory::Mobile),
            "accessory" => Ok(ProductCategory::Accessory),
            "boxset" => Ok(ProductCategory::Boxset),
            other => Err(format!("unknown category '{}'", other)),
        }
    }
}

// =============================================================================
// Product
// =============================================================================

/// A catalog product with its reference price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Stock Keeping Unit - business identifier.
    pub sku: String,

    /// Display name, also the key stock records are matched on.
    pub name: String,

    pub category: ProductCategory,

    /// Reference price in satang.
    pub price_satang: i64,

    pub is_active: bool,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_satang(self.price_satang)
    }
}

// =============================================================================
// Branch Stock
// =============================================================================

/// Which catalog a branch stock record was created from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum ProductModel {
    /// Linked to the main product catalog; `product_id` is trustworthy.
    Catalog,
    /// Free-standing record (imported, hand-entered); only the name is.
    Other,
}

/// A branch-scoped stock record as the storefront sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct BranchStockItem {
    pub id: String,

    pub branch_code: String,

    /// Display name used for name matching.
    pub name: String,

    /// Product reference, meaningful only for `ProductModel::Catalog`.
    pub product_id: Option<String>,

    pub product_model: ProductModel,

    pub price_satang: i64,

    pub quantity: i64,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl BranchStockItem {
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_satang(self.price_satang)
    }

    /// Product id usable for the id-fallback match, if any.
    pub fn catalog_product_id(&self) -> Option<&str> {
        match self.product_model {
            ProductModel::Catalog => self.product_id.as_deref(),
            ProductModel::Other => None,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_parse_roundtrip() {
        for category in ProductCategory::ALL {
            assert_eq!(category.as_str().parse::<ProductCategory>(), Ok(category));
        }
        assert_eq!(" Mobile ".parse::<ProductCategory>(), Ok(ProductCategory::Mobile));
        assert!("tablet".parse::<ProductCategory>().is_err());
    }

    #[test]
    fn test_catalog_product_id_only_for_catalog_model() {
        let mut item = BranchStockItem {
            id: "stk-1".to_string(),
            branch_code: "BKK01".to_string(),
            name: "Galaxy A15".to_string(),
            product_id: Some("prod-1".to_string()),
            product_model: ProductModel::Catalog,
            price_satang: 599_000,
            quantity: 3,
            updated_at: Utc::now(),
        };
        assert_eq!(item.catalog_product_id(), Some("prod-1"));

        item.product_model = ProductModel::Other;
        assert_eq!(item.catalog_product_id(), None);
    }
}
