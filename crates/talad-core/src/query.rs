//! # Query Shapes
//!
//! Filters, pages and aggregates passed between the engine and the store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::matching::StockMatch;
use crate::promotion::{Promotion, PromotionType};
use crate::types::ProductCategory;

/// Default page size for promotion listings.
pub const DEFAULT_PAGE_SIZE: u32 = 50;

// =============================================================================
// Listing
// =============================================================================

/// Status filter for listings. Date-driven only; the usage limit is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusFilter {
    /// Enabled and inside the window.
    Active,
    /// Past the end date.
    Expired,
    /// Before the start date.
    Upcoming,
    /// Disabled by an admin.
    Inactive,
}

/// Listing filter. Every set field narrows the result (conditions are ANDed).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PromotionFilter {
    pub status: Option<StatusFilter>,
    #[serde(rename = "type")]
    pub promotion_type: Option<PromotionType>,
    /// Promotions open to this branch (universal or naming it).
    pub branch_code: Option<String>,
    /// Window overlaps `[from, to]`.
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    /// Case-insensitive substring of the name.
    pub search: Option<String>,
    /// 1-based.
    pub page: u32,
    pub limit: u32,
}

impl Default for PromotionFilter {
    fn default() -> Self {
        PromotionFilter {
            status: None,
            promotion_type: None,
            branch_code: None,
            from: None,
            to: None,
            search: None,
            page: 1,
            limit: DEFAULT_PAGE_SIZE,
        }
    }
}

impl PromotionFilter {
    /// Clamps page to ≥ 1 and limit to `1..=max_limit`.
    pub fn normalized(mut self, max_limit: u32) -> Self {
        self.page = self.page.max(1);
        self.limit = self.limit.clamp(1, max_limit.max(1));
        self
    }

    pub fn offset(&self) -> u64 {
        (self.page.max(1) as u64 - 1) * self.limit as u64
    }

    /// Same filter, every row on one page (for exports).
    pub fn unpaged(mut self) -> Self {
        self.page = 1;
        self.limit = u32::MAX;
        self
    }
}

/// One page of results.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
}

impl<T> Page<T> {
    pub fn total_pages(&self) -> u64 {
        if self.limit == 0 {
            return 0;
        }
        self.total.div_ceil(self.limit as u64)
    }
}

// =============================================================================
// Candidate Lookup
// =============================================================================

/// Criteria for the coarse active-promotion query.
///
/// The store filters by branch only; product and category are carried so
/// the caller can refine the candidates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActiveCriteria {
    pub branch_code: Option<String>,
    pub product_id: Option<String>,
    pub category: Option<ProductCategory>,
}

/// A promotion found applicable to a stock item, and how.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchedPromotion {
    pub promotion: Promotion,
    pub matched_by: StockMatch,
}

/// Applicable promotions for one stock item.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemPromotions {
    pub stock_id: String,
    pub promotions: Vec<MatchedPromotion>,
}

// =============================================================================
// Statistics
// =============================================================================

/// A promotion ranked by usage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageRank {
    pub id: String,
    pub name: String,
    pub promotion_type: PromotionType,
    pub usage_count: u32,
    pub usage_limit: Option<u32>,
}

/// Aggregate counts for the promotion dashboard.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PromotionStatistics {
    pub total: u64,
    pub active: u64,
    pub expired: u64,
    pub upcoming: u64,
    pub inactive: u64,
    pub total_usage: u64,
    pub top_used: Vec<UsageRank>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_normalization() {
        let filter = PromotionFilter {
            page: 0,
            limit: 10_000,
            ..Default::default()
        }
        .normalized(200);
        assert_eq!(filter.page, 1);
        assert_eq!(filter.limit, 200);
        assert_eq!(filter.offset(), 0);

        let third = PromotionFilter {
            page: 3,
            limit: 20,
            ..Default::default()
        };
        assert_eq!(third.offset(), 40);
    }

    #[test]
    fn test_total_pages() {
        let page: Page<()> = Page {
            items: vec![],
            total: 101,
            page: 1,
            limit: 50,
        };
        assert_eq!(page.total_pages(), 3);
    }

    #[test]
    fn test_filter_from_query_json() {
        let filter: PromotionFilter =
            serde_json::from_str(r#"{"status":"active","type":"bundle","branchCode":"BKK01"}"#)
                .unwrap();
        assert_eq!(filter.status, Some(StatusFilter::Active));
        assert_eq!(filter.promotion_type, Some(PromotionType::Bundle));
        assert_eq!(filter.limit, DEFAULT_PAGE_SIZE);
    }
}
