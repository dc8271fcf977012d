//! # Scope Matching
//!
//! Decides whether a promotion targets a given product or branch stock item.
//!
//! ## Stock Item Matching
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  applicable_products == Universal ─────────────────► AllProducts        │
//! │       │ restricted                                                      │
//! │       ▼                                                                 │
//! │  any scoped product whose name, trimmed and lowercased,                 │
//! │  equals the stock item's name ─────────────────────► ByName             │
//! │       │ none                                                            │
//! │       ▼                                                                 │
//! │  stock item comes from the main catalog and its                         │
//! │  product_id is in the scope ───────────────────────► ByProductId        │
//! │       │ otherwise                                                       │
//! │       ▼                                                                 │
//! │  no match                                                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//! Stock records and catalog products are keyed independently, so the name
//! comparison runs first and the id comparison is only a fallback.

use serde::Serialize;
use std::collections::HashMap;

use crate::promotion::{Promotion, Scope};
use crate::types::{BranchStockItem, ProductCategory};

/// How a stock item was matched to a promotion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StockMatch {
    AllProducts,
    ByName,
    ByProductId,
}

/// Normalizes a display name for comparison.
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// True when the promotion's product and category scopes both admit the product.
///
/// An unknown category only passes a universal category scope.
pub fn applies_to_product(
    promotion: &Promotion,
    product_id: &str,
    category: Option<ProductCategory>,
) -> bool {
    if !promotion.applicable_products.contains(product_id) {
        return false;
    }
    match (&promotion.applicable_categories, category) {
        (Scope::Universal, _) => true,
        (scope, Some(category)) => scope.contains(category.as_str()),
        (_, None) => false,
    }
}

/// Matches a stock item against a promotion's product scope.
///
/// `product_names` maps catalog product ids to display names for the
/// products the promotion names; ids missing from it cannot match by name.
pub fn match_stock_item(
    promotion: &Promotion,
    item: &BranchStockItem,
    product_names: &HashMap<String, String>,
) -> Option<StockMatch> {
    let Scope::RestrictedTo(product_ids) = &promotion.applicable_products else {
        return Some(StockMatch::AllProducts);
    };

    let item_name = normalize_name(&item.name);
    let by_name = product_ids
        .iter()
        .filter_map(|id| product_names.get(id))
        .any(|name| normalize_name(name) == item_name);
    if by_name && !item_name.is_empty() {
        return Some(StockMatch::ByName);
    }

    item.catalog_product_id()
        .filter(|id| product_ids.contains(*id))
        .map(|_| StockMatch::ByProductId)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::promotion::tests::sample_promotion;
    use crate::types::ProductModel;
    use chrono::Utc;

    fn stock(name: &str, product_id: Option<&str>, model: ProductModel) -> BranchStockItem {
        BranchStockItem {
            id: "stk-9".to_string(),
            branch_code: "BKK01".to_string(),
            name: name.to_string(),
            product_id: product_id.map(str::to_string),
            product_model: model,
            price_satang: 1_290_000,
            quantity: 1,
            updated_at: Utc::now(),
        }
    }

    fn names() -> HashMap<String, String> {
        HashMap::from([
            ("prod-a".to_string(), "iPhone 15 128GB".to_string()),
            ("prod-b".to_string(), "AirPods Pro".to_string()),
        ])
    }

    #[test]
    fn test_universal_scope_matches_everything() {
        let promo = sample_promotion();
        let item = stock("anything", None, ProductModel::Other);
        assert_eq!(
            match_stock_item(&promo, &item, &HashMap::new()),
            Some(StockMatch::AllProducts)
        );
    }

    #[test]
    fn test_name_match_is_trimmed_and_case_insensitive() {
        let mut promo = sample_promotion();
        promo.applicable_products = Scope::restricted(["prod-a"]);

        let item = stock("  IPHONE 15 128gb ", None, ProductModel::Other);
        assert_eq!(
            match_stock_item(&promo, &item, &names()),
            Some(StockMatch::ByName)
        );
    }

    #[test]
    fn test_id_fallback_needs_catalog_model() {
        let mut promo = sample_promotion();
        promo.applicable_products = Scope::restricted(["prod-b"]);

        let catalog = stock("Renamed earbuds", Some("prod-b"), ProductModel::Catalog);
        assert_eq!(
            match_stock_item(&promo, &catalog, &names()),
            Some(StockMatch::ByProductId)
        );

        let other = stock("Renamed earbuds", Some("prod-b"), ProductModel::Other);
        assert_eq!(match_stock_item(&promo, &other, &names()), None);
    }

    #[test]
    fn test_name_match_wins_over_id() {
        let mut promo = sample_promotion();
        promo.applicable_products = Scope::restricted(["prod-a"]);
        let item = stock("iphone 15 128gb", Some("prod-a"), ProductModel::Catalog);
        assert_eq!(
            match_stock_item(&promo, &item, &names()),
            Some(StockMatch::ByName)
        );
    }

    #[test]
    fn test_applies_to_product_scopes() {
        let mut promo = sample_promotion();
        assert!(applies_to_product(&promo, "p1", None));

        promo.applicable_categories = Scope::restricted(["mobile"]);
        assert!(applies_to_product(&promo, "p1", Some(ProductCategory::Mobile)));
        assert!(!applies_to_product(&promo, "p1", Some(ProductCategory::Accessory)));
        assert!(!applies_to_product(&promo, "p1", None));

        promo.applicable_categories = Scope::Universal;
        promo.applicable_products = Scope::restricted(["p2"]);
        assert!(!applies_to_product(&promo, "p1", None));
        assert!(applies_to_product(&promo, "p2", None));
    }
}
