//! # Pricing Engine
//!
//! Picks the best promotion for a line, lists what a storefront cart item
//! is eligible for, applies one promotion to a whole cart, and records
//! promotion usage.
//!
//! ## Line Pricing Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  price_line_item(product_id, branch, qty)                              │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ProductCatalog::product ─── None ──► NotFound(Product)                │
//! │       │ price, category                                                 │
//! │       ▼                                                                 │
//! │  PromotionStore::find_active(branch)   coarse: enabled, in window,     │
//! │       │                                 open to the branch             │
//! │       ▼                                                                 │
//! │  for each candidate (priority, created_at, id):                        │
//! │     product/category scope ─ no ──► skipped: out_of_scope              │
//! │     exhausted?             ─ yes ─► skipped: unavailable               │
//! │     bundle?                ─ yes ─► skipped: bundle_needs_cart         │
//! │     min purchase met?      ─ no ──► skipped: below_minimum_purchase    │
//! │     calculate_discount(...)                                             │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  best = first candidate with the strictly greatest discount > 0        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage Recording
//! `use_promotion` is one atomic conditional increment in the store. The
//! `promotion_used` event and the audit entry are fired afterwards and
//! never awaited.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use talad_core::discount::{
    calculate_bundle_discount, calculate_discount, BundleDiscount, BundleLine,
};
use talad_core::matching::{applies_to_product, StockMatch};
use talad_core::query::ActiveCriteria;
use talad_core::validation::{validate_branch_code, validate_quantity, validate_unit_price};
use talad_core::{
    Availability, BranchStockItem, DiscountRule, DiscountType, Money, ProductCategory, Promotion,
    PromotionType, Scope,
};
use talad_db::{Database, UsageIncrement};

use crate::audit::{AuditEntry, AuditSink};
use crate::error::{EngineError, EngineResult, Entity, InvalidReason};
use crate::events::{EventPublisher, PromotionEvent};
use crate::store::{ProductCatalog, PromotionStore, StockLookup};

// =============================================================================
// Result Types
// =============================================================================

/// What a client needs to show a promotion.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PromotionSummary {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub promotion_type: PromotionType,
    pub discount_type: Option<DiscountType>,
    /// Discount parameters: percent, amount, special price, buy/get or bundle.
    pub rule: DiscountRule,
    pub priority: i32,
    pub end_date: DateTime<Utc>,
}

impl From<&Promotion> for PromotionSummary {
    fn from(p: &Promotion) -> Self {
        PromotionSummary {
            id: p.id.clone(),
            name: p.name.clone(),
            promotion_type: p.promotion_type(),
            discount_type: p.discount_type(),
            rule: p.rule.clone(),
            priority: p.priority,
            end_date: p.end_date,
        }
    }
}

/// A priced line item.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PricedLine {
    pub product_id: String,
    pub branch_code: String,
    pub quantity: u32,
    pub unit_price: Money,
    pub original_price: Money,
    pub discount: Money,
    pub final_price: Money,
    /// `None` when no candidate gives a discount.
    pub applied_promotion: Option<PromotionSummary>,
}

/// Why a candidate did not produce a discount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    /// Product or category scope excludes the product.
    OutOfScope,
    BranchNotEligible,
    Unavailable { availability: Availability },
    /// Bundles are priced against a whole cart.
    BundleNeedsCart,
    BelowMinimumPurchase,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum CandidateOutcome {
    Discount { amount: Money },
    Skipped(SkipReason),
}

/// One candidate as the engine saw it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateEvaluation {
    pub promotion: PromotionSummary,
    pub outcome: CandidateOutcome,
}

/// A priced line plus the trace of every candidate considered.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineExplanation {
    pub line: PricedLine,
    pub candidates: Vec<CandidateEvaluation>,
}

/// A promotion a stock item is eligible for.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailablePromotion {
    #[serde(flatten)]
    pub promotion: PromotionSummary,
    pub matched_by: StockMatch,
}

/// Eligible promotions for one storefront stock item.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StockItemPromotions {
    pub stock_id: String,
    pub name: String,
    pub promotions: Vec<AvailablePromotion>,
}

/// A cart line handed to [`PricingEngine::apply_to_cart`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub product_id: String,
    pub quantity: u32,
    /// Price charged in this cart.
    pub unit_price: Money,
    /// Looked up in the catalog when absent and the promotion is category-scoped.
    #[serde(default)]
    pub category: Option<ProductCategory>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItemDiscount {
    pub product_id: String,
    pub quantity: u32,
    pub original_total: Money,
    pub discount: Money,
    pub final_total: Money,
    /// The promotion's scope covers this line.
    pub matched: bool,
}

/// Result of applying one promotion to a cart.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartApplication {
    pub promotion: PromotionSummary,
    pub items: Vec<CartItemDiscount>,
    /// Set for bundle promotions; the discount belongs to the bundle as a whole.
    pub bundle: Option<BundleDiscount>,
    pub total_original: Money,
    pub total_discount: Money,
    pub total_final: Money,
    /// `total_discount / total_original * 100`, 0 for an empty cart.
    pub discount_percentage: f64,
}

/// Outcome of recording one promotion use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageReceipt {
    pub promotion_id: String,
    pub usage_count: u32,
    /// `None` when unlimited.
    pub remaining: Option<u32>,
}

// =============================================================================
// Engine
// =============================================================================

/// The pricing engine. Cheap to clone; collaborators are shared.
#[derive(Clone)]
pub struct PricingEngine {
    store: Arc<dyn PromotionStore>,
    catalog: Arc<dyn ProductCatalog>,
    stock: Arc<dyn StockLookup>,
    events: Arc<dyn EventPublisher>,
    audit: Arc<dyn AuditSink>,
    clock: fn() -> DateTime<Utc>,
}

impl PricingEngine {
    pub fn new(
        store: Arc<dyn PromotionStore>,
        catalog: Arc<dyn ProductCatalog>,
        stock: Arc<dyn StockLookup>,
        events: Arc<dyn EventPublisher>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        PricingEngine {
            store,
            catalog,
            stock,
            events,
            audit,
            clock: Utc::now,
        }
    }

    /// Engine over the SQLite repositories of `db`.
    pub fn sqlite(
        db: &Database,
        events: Arc<dyn EventPublisher>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        let catalog = Arc::new(db.catalog());
        PricingEngine::new(Arc::new(db.promotions()), catalog.clone(), catalog, events, audit)
    }

    /// Replaces the time source.
    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    // =========================================================================
    // Line Pricing
    // =========================================================================

    /// Prices a line with the best promotion.
    pub async fn price_line_item(
        &self,
        product_id: &str,
        branch_code: &str,
        quantity: u32,
    ) -> EngineResult<PricedLine> {
        Ok(self.explain_line_item(product_id, branch_code, quantity).await?.line)
    }

    /// Prices a line and reports how each candidate was evaluated.
    #[instrument(skip(self))]
    pub async fn explain_line_item(
        &self,
        product_id: &str,
        branch_code: &str,
        quantity: u32,
    ) -> EngineResult<LineExplanation> {
        validate_quantity(quantity)?;
        validate_branch_code(branch_code)?;
        let now = (self.clock)();

        let product = self
            .catalog
            .product(product_id)
            .await?
            .ok_or_else(|| EngineError::not_found(Entity::Product, product_id))?;

        let criteria = ActiveCriteria {
            branch_code: Some(branch_code.to_string()),
            product_id: Some(product.id.clone()),
            category: Some(product.category),
        };
        let mut candidates = self.store.find_active(&criteria, now).await?;
        candidates.sort_by(|a, b| {
            (a.priority, a.created_at, &a.id).cmp(&(b.priority, b.created_at, &b.id))
        });

        let unit_price = product.price();
        let original_price = unit_price * quantity;

        let mut best: Option<(usize, Money)> = None;
        let mut evaluations = Vec::with_capacity(candidates.len());
        for (index, candidate) in candidates.iter().enumerate() {
            let outcome = evaluate_candidate(
                candidate,
                &product.id,
                product.category,
                branch_code,
                unit_price,
                quantity,
                now,
            );
            if let CandidateOutcome::Discount { amount } = outcome {
                // Strictly greater: the earlier candidate keeps a tie
                if amount.is_positive() && best.map_or(true, |(_, top)| amount > top) {
                    best = Some((index, amount));
                }
            }
            evaluations.push(CandidateEvaluation {
                promotion: PromotionSummary::from(candidate),
                outcome,
            });
        }

        let (discount, applied_promotion) = match best {
            Some((index, amount)) => (amount, Some(PromotionSummary::from(&candidates[index]))),
            None => (Money::zero(), None),
        };

        debug!(
            product_id = %product.id,
            candidates = evaluations.len(),
            discount = %discount,
            applied = ?applied_promotion.as_ref().map(|p| &p.id),
            "Line priced"
        );

        Ok(LineExplanation {
            line: PricedLine {
                product_id: product.id,
                branch_code: branch_code.to_string(),
                quantity,
                unit_price,
                original_price,
                discount,
                final_price: original_price - discount,
                applied_promotion,
            },
            candidates: evaluations,
        })
    }

    // =========================================================================
    // Storefront
    // =========================================================================

    /// Eligible promotions for each storefront stock item.
    ///
    /// Ids that do not resolve, belong to another branch or fail to load
    /// are skipped; the rest of the batch is still answered.
    #[instrument(skip(self, stock_ids), fields(items = stock_ids.len()))]
    pub async fn check_available_promotions(
        &self,
        stock_ids: &[String],
        branch_code: &str,
    ) -> EngineResult<Vec<StockItemPromotions>> {
        validate_branch_code(branch_code)?;
        let now = (self.clock)();

        let mut items: Vec<BranchStockItem> = Vec::with_capacity(stock_ids.len());
        for id in stock_ids {
            match self.stock.stock_item(id).await {
                Ok(Some(item)) if item.branch_code == branch_code => items.push(item),
                Ok(Some(item)) => {
                    debug!(
                        stock_id = %id,
                        item_branch = %item.branch_code,
                        "Stock item belongs to another branch"
                    )
                }
                Ok(None) => debug!(stock_id = %id, "Stock item not found"),
                Err(e) => warn!(stock_id = %id, error = %e, "Stock lookup failed, item skipped"),
            }
        }
        if items.is_empty() {
            return Ok(Vec::new());
        }

        let names: HashMap<String, String> = items
            .iter()
            .map(|item| (item.id.clone(), item.name.clone()))
            .collect();

        let matched = self.store.find_applicable(&items, branch_code, now).await?;
        Ok(matched
            .into_iter()
            .map(|entry| StockItemPromotions {
                name: names.get(&entry.stock_id).cloned().unwrap_or_default(),
                promotions: entry
                    .promotions
                    .into_iter()
                    // The store query does not see usage limits
                    .filter(|m| m.promotion.availability(now) == Availability::Active)
                    .map(|m| AvailablePromotion {
                        promotion: PromotionSummary::from(&m.promotion),
                        matched_by: m.matched_by,
                    })
                    .collect(),
                stock_id: entry.stock_id,
            })
            .collect())
    }

    // =========================================================================
    // Cart
    // =========================================================================

    /// Applies one promotion to every matching cart line.
    #[instrument(skip(self, items), fields(lines = items.len()))]
    pub async fn apply_to_cart(
        &self,
        promotion_id: &str,
        items: &[CartLine],
        branch_code: &str,
    ) -> EngineResult<CartApplication> {
        validate_branch_code(branch_code)?;
        for line in items {
            validate_quantity(line.quantity)?;
            validate_unit_price(line.unit_price)?;
        }
        let now = (self.clock)();

        let promotion = self
            .store
            .get(promotion_id)
            .await?
            .ok_or_else(|| EngineError::not_found(Entity::Promotion, promotion_id))?;
        ensure_usable(&promotion, branch_code, now)?;

        let total_original: Money = items.iter().map(|l| l.unit_price * l.quantity).sum();

        let (items_out, bundle, total_discount) = match &promotion.rule {
            DiscountRule::Bundle { products, .. } => {
                let lines: Vec<BundleLine<'_>> = items
                    .iter()
                    .map(|l| BundleLine {
                        product_id: l.product_id.as_str(),
                        unit_price: l.unit_price,
                        quantity: l.quantity,
                    })
                    .collect();
                let bundle = calculate_bundle_discount(&promotion, &lines);
                let items_out = items
                    .iter()
                    .map(|l| {
                        let original = l.unit_price * l.quantity;
                        CartItemDiscount {
                            product_id: l.product_id.clone(),
                            quantity: l.quantity,
                            original_total: original,
                            discount: Money::zero(),
                            final_total: original,
                            matched: products.iter().any(|p| p.trim() == l.product_id),
                        }
                    })
                    .collect();
                let discount = bundle.discount;
                (items_out, Some(bundle), discount)
            }
            _ => {
                let mut items_out = Vec::with_capacity(items.len());
                let mut total = Money::zero();
                for line in items {
                    let category = self.line_category(&promotion, line).await;
                    let matched = applies_to_product(&promotion, &line.product_id, category);
                    let original = line.unit_price * line.quantity;
                    let discount = if matched {
                        calculate_discount(&promotion, line.unit_price, line.quantity)
                    } else {
                        Money::zero()
                    };
                    total += discount;
                    items_out.push(CartItemDiscount {
                        product_id: line.product_id.clone(),
                        quantity: line.quantity,
                        original_total: original,
                        discount,
                        final_total: original - discount,
                        matched,
                    });
                }
                (items_out, None, total)
            }
        };

        info!(
            promotion_id = %promotion.id,
            total_original = %total_original,
            total_discount = %total_discount,
            "Promotion applied to cart"
        );

        Ok(CartApplication {
            promotion: PromotionSummary::from(&promotion),
            items: items_out,
            bundle,
            total_original,
            total_discount,
            total_final: total_original - total_discount,
            discount_percentage: total_discount.percent_of(total_original),
        })
    }

    /// Category of a cart line, looked up only when the promotion needs it.
    async fn line_category(
        &self,
        promotion: &Promotion,
        line: &CartLine,
    ) -> Option<ProductCategory> {
        if line.category.is_some() || promotion.applicable_categories.is_universal() {
            return line.category;
        }
        match self.catalog.product(&line.product_id).await {
            Ok(product) => product.map(|p| p.category),
            Err(e) => {
                warn!(product_id = %line.product_id, error = %e, "Category lookup failed");
                None
            }
        }
    }

    // =========================================================================
    // Usage
    // =========================================================================

    /// Records one use of a promotion.
    ///
    /// ## Errors
    /// - `NotFound` when the id does not resolve
    /// - `UsageLimitExceeded` when the limit is already reached
    /// - `PromotionInvalid` when disabled, scheduled or expired
    #[instrument(skip(self))]
    pub async fn use_promotion(
        &self,
        promotion_id: &str,
        actor: Option<&str>,
    ) -> EngineResult<UsageReceipt> {
        let now = (self.clock)();

        let promotion = match self.store.increment_usage(promotion_id, now).await? {
            UsageIncrement::Applied(promotion) => promotion,
            UsageIncrement::NotFound => {
                return Err(EngineError::not_found(Entity::Promotion, promotion_id))
            }
            UsageIncrement::Exhausted { limit } => {
                return Err(EngineError::UsageLimitExceeded {
                    id: promotion_id.to_string(),
                    limit,
                })
            }
            UsageIncrement::Unavailable(availability) => {
                let err = EngineError::for_availability(promotion_id, availability, None)
                    .unwrap_or_else(|| EngineError::invalid(promotion_id, InvalidReason::Changed));
                return Err(err);
            }
        };

        let receipt = UsageReceipt {
            promotion_id: promotion.id.clone(),
            usage_count: promotion.usage_count,
            remaining: promotion.remaining_uses(),
        };

        self.events.publish(PromotionEvent::Used {
            id: receipt.promotion_id.clone(),
            usage_count: receipt.usage_count,
            remaining: receipt.remaining,
        });
        self.audit.record(AuditEntry::new(
            &promotion.id,
            "promotion_used",
            actor,
            json!({ "usageCount": receipt.usage_count, "remaining": receipt.remaining }),
            now,
        ));

        Ok(receipt)
    }
}

/// Evaluates one candidate for a single line.
fn evaluate_candidate(
    promotion: &Promotion,
    product_id: &str,
    category: ProductCategory,
    branch_code: &str,
    unit_price: Money,
    quantity: u32,
    now: DateTime<Utc>,
) -> CandidateOutcome {
    if !applies_to_product(promotion, product_id, Some(category)) {
        return CandidateOutcome::Skipped(SkipReason::OutOfScope);
    }
    if !promotion.applies_to_branch(branch_code) {
        return CandidateOutcome::Skipped(SkipReason::BranchNotEligible);
    }
    let availability = promotion.availability(now);
    if availability != Availability::Active {
        return CandidateOutcome::Skipped(SkipReason::Unavailable { availability });
    }
    if matches!(promotion.rule, DiscountRule::Bundle { .. }) {
        return CandidateOutcome::Skipped(SkipReason::BundleNeedsCart);
    }
    if !promotion.conditions.meets_minimum(unit_price * quantity) {
        return CandidateOutcome::Skipped(SkipReason::BelowMinimumPurchase);
    }
    CandidateOutcome::Discount {
        amount: calculate_discount(promotion, unit_price, quantity),
    }
}

/// Fails unless the promotion is usable now at `branch_code`.
fn ensure_usable(promotion: &Promotion, branch_code: &str, now: DateTime<Utc>) -> EngineResult<()> {
    let availability = promotion.availability(now);
    let limit = promotion.usage_limit;
    if let Some(err) = EngineError::for_availability(&promotion.id, availability, limit) {
        return Err(err);
    }
    if let Scope::RestrictedTo(_) = &promotion.applicable_branches {
        if !promotion.applies_to_branch(branch_code) {
            return Err(EngineError::invalid(&promotion.id, InvalidReason::BranchNotEligible));
        }
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fixture, percent_off, product, stock_item, Fixture, fixed_now};
    use talad_core::ProductModel;

    async fn seeded() -> Fixture {
        let fx = fixture().await;
        fx.add_product(product("prod-phone", "Galaxy A55", ProductCategory::Mobile, 1_000_000))
            .await;
        fx.add_product(product("prod-case", "Galaxy A55 Case", ProductCategory::Accessory, 50_000))
            .await;
        fx
    }

    #[tokio::test]
    async fn test_selects_largest_discount() {
        let fx = seeded().await;
        // 50 baht off vs 70 baht off on the same line
        let mut fifty = percent_off("fifty", 1, 100);
        fifty.rule = DiscountRule::DiscountAmount { amount: Money::from_baht(50, 0) };
        let mut seventy = percent_off("seventy", 200, 100);
        seventy.rule = DiscountRule::DiscountAmount { amount: Money::from_baht(70, 0) };
        fx.add_promotion(&fifty).await;
        fx.add_promotion(&seventy).await;

        let line = fx.engine.price_line_item("prod-phone", "BKK01", 1).await.unwrap();
        assert_eq!(line.discount, Money::from_baht(70, 0));
        assert_eq!(line.final_price, line.original_price - Money::from_baht(70, 0));
        assert_eq!(line.applied_promotion.unwrap().id, "seventy");
    }

    #[tokio::test]
    async fn test_tie_goes_to_lower_priority_value() {
        let fx = seeded().await;
        fx.add_promotion(&percent_off("later", 50, 1000)).await;
        fx.add_promotion(&percent_off("first", 10, 1000)).await;

        let line = fx.engine.price_line_item("prod-phone", "BKK01", 1).await.unwrap();
        assert_eq!(line.applied_promotion.unwrap().id, "first");
    }

    #[tokio::test]
    async fn test_explain_reports_skips() {
        let fx = seeded().await;
        let mut accessories = percent_off("acc", 1, 2000);
        accessories.applicable_categories = Scope::restricted(["accessory"]);
        let mut big_spend = percent_off("big", 2, 500);
        big_spend.conditions.min_purchase = Some(Money::from_baht(50_000, 0));
        let mut capped = percent_off("capped", 3, 500);
        capped.usage_limit = Some(1);
        capped.usage_count = 1;
        let mut bundle = percent_off("bundle", 4, 100);
        bundle.rule = DiscountRule::Bundle {
            products: vec!["prod-phone".to_string(), "prod-case".to_string()],
            price: Money::from_baht(10_000, 0),
        };
        for p in [&accessories, &big_spend, &capped, &bundle] {
            fx.add_promotion(p).await;
        }

        let explained = fx.engine.explain_line_item("prod-phone", "BKK01", 2).await.unwrap();
        let outcomes: Vec<(&str, &CandidateOutcome)> = explained
            .candidates
            .iter()
            .map(|c| (c.promotion.id.as_str(), &c.outcome))
            .collect();
        assert_eq!(
            outcomes,
            vec![
                ("acc", &CandidateOutcome::Skipped(SkipReason::OutOfScope)),
                ("big", &CandidateOutcome::Skipped(SkipReason::BelowMinimumPurchase)),
                (
                    "capped",
                    &CandidateOutcome::Skipped(SkipReason::Unavailable {
                        availability: Availability::Exhausted
                    })
                ),
                ("bundle", &CandidateOutcome::Skipped(SkipReason::BundleNeedsCart)),
            ]
        );
        assert!(explained.line.applied_promotion.is_none());
        assert_eq!(explained.line.final_price, explained.line.original_price);
    }

    #[tokio::test]
    async fn test_unknown_product_is_not_found() {
        let fx = seeded().await;
        let err = fx.engine.price_line_item("ghost", "BKK01", 1).await.unwrap_err();
        assert!(matches!(err, EngineError::NotFound { entity: Entity::Product, .. }));

        let err = fx.engine.price_line_item("prod-phone", "BKK01", 0).await.unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }

    #[tokio::test]
    async fn test_available_promotions_match_by_name() {
        let fx = seeded().await;
        let mut phone_deal = percent_off("phone-deal", 1, 1000);
        phone_deal.applicable_products = Scope::restricted(["prod-phone"]);
        fx.add_promotion(&phone_deal).await;

        // Hand-entered record: no product link, name differs only in case and spacing
        fx.add_stock(stock_item("stk-1", "BKK01", "  GALAXY a55 ", None, ProductModel::Other))
            .await;
        fx.add_stock(stock_item("stk-2", "BKK01", "Charger", None, ProductModel::Other)).await;
        fx.add_stock(stock_item("stk-3", "CNX02", "Galaxy A55", None, ProductModel::Other)).await;

        let ids = vec![
            "stk-1".to_string(),
            "stk-2".to_string(),
            "stk-3".to_string(),
            "missing".to_string(),
        ];
        let result = fx.engine.check_available_promotions(&ids, "BKK01").await.unwrap();

        assert_eq!(result.len(), 2);
        assert_eq!(result[0].stock_id, "stk-1");
        assert_eq!(result[0].promotions.len(), 1);
        assert_eq!(result[0].promotions[0].matched_by, StockMatch::ByName);
        assert!(result[1].promotions.is_empty());
    }

    #[tokio::test]
    async fn test_apply_to_cart_sums_matching_lines() {
        let fx = seeded().await;
        let mut phones = percent_off("phones", 1, 1000);
        phones.applicable_categories = Scope::restricted(["mobile"]);
        fx.add_promotion(&phones).await;

        let cart = vec![
            CartLine {
                product_id: "prod-phone".to_string(),
                quantity: 2,
                unit_price: Money::from_baht(10_000, 0),
                category: None,
            },
            CartLine {
                product_id: "prod-case".to_string(),
                quantity: 1,
                unit_price: Money::from_baht(500, 0),
                category: None,
            },
        ];
        let applied = fx.engine.apply_to_cart("phones", &cart, "BKK01").await.unwrap();

        assert_eq!(applied.total_original, Money::from_baht(20_500, 0));
        assert_eq!(applied.total_discount, Money::from_baht(2_000, 0));
        assert!(applied.items[0].matched);
        assert!(!applied.items[1].matched);
        assert!((applied.discount_percentage - 9.76).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_apply_to_empty_cart_has_zero_percentage() {
        let fx = seeded().await;
        fx.add_promotion(&percent_off("all", 1, 1000)).await;

        let applied = fx.engine.apply_to_cart("all", &[], "BKK01").await.unwrap();
        assert_eq!(applied.total_original, Money::zero());
        assert_eq!(applied.discount_percentage, 0.0);
    }

    #[tokio::test]
    async fn test_apply_to_cart_rejects_out_of_range_prices() {
        let fx = seeded().await;
        fx.add_promotion(&percent_off("all", 1, 1000)).await;

        for unit_price in [Money::from_satang(-100), Money::from_satang(i64::MAX / 2)] {
            let line = CartLine {
                product_id: "prod-phone".to_string(),
                quantity: 3,
                unit_price,
                category: None,
            };
            let cart = vec![line.clone(), line];
            let err = fx.engine.apply_to_cart("all", &cart, "BKK01").await.unwrap_err();
            match err {
                EngineError::Validation(errors) => assert!(errors.has_field("unitPrice")),
                other => panic!("unexpected error: {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn test_apply_bundle_to_cart() {
        let fx = seeded().await;
        let mut bundle = percent_off("set", 1, 100);
        bundle.rule = DiscountRule::Bundle {
            products: vec!["prod-phone".to_string(), "prod-case".to_string()],
            price: Money::from_baht(10_000, 0),
        };
        fx.add_promotion(&bundle).await;

        let cart = vec![
            CartLine {
                product_id: "prod-phone".to_string(),
                quantity: 2,
                unit_price: Money::from_baht(10_000, 0),
                category: None,
            },
            CartLine {
                product_id: "prod-case".to_string(),
                quantity: 1,
                unit_price: Money::from_baht(500, 0),
                category: None,
            },
        ];
        let applied = fx.engine.apply_to_cart("set", &cart, "BKK01").await.unwrap();
        let bundle = applied.bundle.unwrap();
        assert_eq!(bundle.sets, 1);
        assert_eq!(applied.total_discount, Money::from_baht(500, 0));
    }

    #[tokio::test]
    async fn test_apply_rejects_unusable_promotions() {
        let fx = seeded().await;
        let mut elsewhere = percent_off("cnx-only", 1, 1000);
        elsewhere.applicable_branches = Scope::restricted(["CNX02"]);
        let mut off = percent_off("off", 1, 1000);
        off.is_active = false;
        fx.add_promotion(&elsewhere).await;
        fx.add_promotion(&off).await;

        let err = fx.engine.apply_to_cart("cnx-only", &[], "BKK01").await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::PromotionInvalid { reason: InvalidReason::BranchNotEligible, .. }
        ));
        let err = fx.engine.apply_to_cart("off", &[], "BKK01").await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::PromotionInvalid { reason: InvalidReason::Disabled, .. }
        ));
        let err = fx.engine.apply_to_cart("nope", &[], "BKK01").await.unwrap_err();
        assert!(matches!(err, EngineError::NotFound { entity: Entity::Promotion, .. }));
    }

    #[tokio::test]
    async fn test_use_promotion_counts_and_notifies() {
        let fx = seeded().await;
        let mut limited = percent_off("limited", 1, 1000);
        limited.usage_limit = Some(2);
        fx.add_promotion(&limited).await;
        let mut events = fx.events.subscribe();

        let receipt = fx.engine.use_promotion("limited", Some("cashier-1")).await.unwrap();
        assert_eq!(receipt.usage_count, 1);
        assert_eq!(receipt.remaining, Some(1));
        assert_eq!(events.recv().await.unwrap().name(), "promotion_used");
        assert_eq!(fx.audit.actions(), vec!["promotion_used"]);

        fx.engine.use_promotion("limited", None).await.unwrap();
        let err = fx.engine.use_promotion("limited", None).await.unwrap_err();
        assert!(matches!(err, EngineError::UsageLimitExceeded { limit: 2, .. }));
    }

    #[tokio::test]
    async fn test_use_expired_promotion_is_invalid() {
        let fx = seeded().await;
        let mut old = percent_off("old", 1, 1000);
        old.start_date = fixed_now() - chrono::Duration::days(30);
        old.end_date = fixed_now() - chrono::Duration::days(1);
        fx.add_promotion(&old).await;

        let err = fx.engine.use_promotion("old", None).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::PromotionInvalid { reason: InvalidReason::Expired, .. }
        ));
    }
}
