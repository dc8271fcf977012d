//! # Validation Module
//!
//! Field-level validation of promotion drafts and non-blocking rule warnings.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Layer 1: input.rs        numbers/dates coerced from form strings       │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE     type-specific rules, date order, scopes       │
//! │           │               → every failure collected, write rejected     │
//! │           ▼                                                             │
//! │  Layer 3: SQLite          NOT NULL / CHECK (usage_count ≤ usage_limit)  │
//! │                                                                         │
//! │  Warnings (start in past, universal scopes, schedule conflicts) never   │
//! │  block a write.                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeSet;

use crate::error::{ValidationError, ValidationErrors};
use crate::promotion::{Conditions, DiscountRule, Promotion, PromotionDraft, PromotionType, Scope};
use crate::types::ProductCategory;
use crate::money::Money;
use crate::{
    MAX_DESCRIPTION_LEN, MAX_LINE_QUANTITY, MAX_NAME_LEN, MAX_NOTES_LEN, MAX_UNIT_PRICE_SATANG,
};

/// Result type for single-field validation.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Highest accepted priority value.
pub const MAX_PRIORITY: i32 = 9_999;

// =============================================================================
// Draft Validation
// =============================================================================

/// Validates a complete draft, collecting every failure.
///
/// ```rust
/// use chrono::{Duration, Utc};
/// use talad_core::validation::validate_draft;
/// use talad_core::{Conditions, DiscountRule, PromotionDraft, Scope};
///
/// let now = Utc::now();
/// let draft = PromotionDraft {
///     name: "Songkran 15%".to_string(),
///     description: None,
///     rule: DiscountRule::DiscountPercentage { percent_bps: 1500 },
///     applicable_products: Scope::Universal,
///     applicable_categories: Scope::Universal,
///     applicable_branches: Scope::Universal,
///     start_date: now,
///     end_date: now + Duration::days(7),
///     is_active: true,
///     usage_limit: None,
///     priority: 100,
///     conditions: Conditions::default(),
///     tags: vec![],
///     notes: None,
/// };
/// assert!(validate_draft(&draft).is_ok());
/// ```
pub fn validate_draft(draft: &PromotionDraft) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();

    validate_details(&mut errors, &DraftDetails::from(draft));
    if draft.start_date >= draft.end_date {
        errors.push(ValidationError::InvalidDateRange);
    }
    validate_rule(&mut errors, &draft.rule);

    errors.into_result(())
}

/// The parts of a draft that can be checked without its rule or window.
#[derive(Debug, Clone, Copy)]
pub(crate) struct DraftDetails<'a> {
    pub name: &'a str,
    pub description: Option<&'a str>,
    pub notes: Option<&'a str>,
    pub usage_limit: Option<u32>,
    pub priority: i32,
    pub conditions: &'a Conditions,
    pub applicable_products: &'a Scope,
    pub applicable_categories: &'a Scope,
    pub applicable_branches: &'a Scope,
}

impl<'a> From<&'a PromotionDraft> for DraftDetails<'a> {
    fn from(draft: &'a PromotionDraft) -> Self {
        DraftDetails {
            name: &draft.name,
            description: draft.description.as_deref(),
            notes: draft.notes.as_deref(),
            usage_limit: draft.usage_limit,
            priority: draft.priority,
            conditions: &draft.conditions,
            applicable_products: &draft.applicable_products,
            applicable_categories: &draft.applicable_categories,
            applicable_branches: &draft.applicable_branches,
        }
    }
}

pub(crate) fn validate_details(errors: &mut ValidationErrors, details: &DraftDetails<'_>) {
    if let Err(e) = validate_promotion_name(details.name) {
        errors.push(e);
    }
    check_length(errors, "description", details.description, MAX_DESCRIPTION_LEN);
    check_length(errors, "notes", details.notes, MAX_NOTES_LEN);

    if details.usage_limit == Some(0) {
        errors.push(ValidationError::OutOfRange {
            field: "usageLimit".to_string(),
            min: 1,
            max: u32::MAX as i64,
        });
    }

    if !(1..=MAX_PRIORITY).contains(&details.priority) {
        errors.push(ValidationError::OutOfRange {
            field: "priority".to_string(),
            min: 1,
            max: MAX_PRIORITY as i64,
        });
    }

    if details.conditions.min_purchase.is_some_and(|m| m.is_negative()) {
        errors.push(ValidationError::positive("conditions.minPurchaseAmount"));
    }
    if details.conditions.max_discount.is_some_and(|m| !m.is_positive()) {
        errors.push(ValidationError::positive("conditions.maxDiscountAmount"));
    }

    check_scope(errors, "applicableProducts", details.applicable_products);
    check_scope(errors, "applicableBranches", details.applicable_branches);
    check_scope(errors, "applicableCategories", details.applicable_categories);
    let unknown_category = details
        .applicable_categories
        .ids()
        .any(|c| c.parse::<ProductCategory>().is_err());
    if unknown_category {
        errors.push(ValidationError::NotAllowed {
            field: "applicableCategories".to_string(),
            allowed: ProductCategory::ALL
                .iter()
                .map(|c| c.as_str().to_string())
                .collect(),
        });
    }
}

fn validate_rule(errors: &mut ValidationErrors, rule: &DiscountRule) {
    match rule {
        DiscountRule::DiscountPercentage { percent_bps } => {
            if !(100..=10_000).contains(percent_bps) {
                errors.push(ValidationError::OutOfRange {
                    field: "discountValue".to_string(),
                    min: 1,
                    max: 100,
                });
            }
        }
        DiscountRule::DiscountAmount { amount } => {
            if !amount.is_positive() {
                errors.push(ValidationError::positive("discountValue"));
            }
        }
        DiscountRule::SpecialPrice { price } => {
            if !price.is_positive() {
                errors.push(ValidationError::positive("specialPrice"));
            }
        }
        DiscountRule::BuyXGetY {
            buy_quantity,
            get_quantity,
        } => {
            for (field, value) in [("buyQuantity", buy_quantity), ("getQuantity", get_quantity)] {
                if *value == 0 || *value > MAX_LINE_QUANTITY {
                    errors.push(ValidationError::OutOfRange {
                        field: field.to_string(),
                        min: 1,
                        max: MAX_LINE_QUANTITY as i64,
                    });
                }
            }
        }
        DiscountRule::Bundle { products, price } => {
            let distinct: BTreeSet<&str> = products
                .iter()
                .map(|p| p.trim())
                .filter(|p| !p.is_empty())
                .collect();
            if distinct.len() < 2 {
                errors.push(ValidationError::TooFew {
                    field: "bundleProducts".to_string(),
                    min: 2,
                });
            }
            if !price.is_positive() {
                errors.push(ValidationError::positive("bundlePrice"));
            }
        }
    }
}

fn check_length(errors: &mut ValidationErrors, field: &str, value: Option<&str>, max: usize) {
    if value.is_some_and(|v| v.chars().count() > max) {
        errors.push(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }
}

fn check_scope(errors: &mut ValidationErrors, field: &str, scope: &Scope) {
    if let Scope::RestrictedTo(ids) = scope {
        if ids.is_empty() {
            errors.push(ValidationError::required(field));
        }
    }
}

// =============================================================================
// Single-Field Validators
// =============================================================================

/// Validates a promotion name: required, at most 100 characters.
pub fn validate_promotion_name(name: &str) -> ValidationResult<()> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ValidationError::required("name"));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(ValidationError::TooLong {
            field: "name".to_string(),
            max: MAX_NAME_LEN,
        });
    }
    Ok(())
}

/// Validates a line quantity handed to the engine.
///
/// ```rust
/// use talad_core::validation::validate_quantity;
///
/// assert!(validate_quantity(3).is_ok());
/// assert!(validate_quantity(0).is_err());
/// ```
pub fn validate_quantity(quantity: u32) -> ValidationResult<()> {
    if quantity == 0 || quantity > MAX_LINE_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_LINE_QUANTITY as i64,
        });
    }
    Ok(())
}

/// Validates a client-supplied unit price: zero up to ฿10M.
pub fn validate_unit_price(price: Money) -> ValidationResult<()> {
    if price.satang() < 0 || price.satang() > MAX_UNIT_PRICE_SATANG {
        return Err(ValidationError::OutOfRange {
            field: "unitPrice".to_string(),
            min: 0,
            max: MAX_UNIT_PRICE_SATANG,
        });
    }
    Ok(())
}

/// Validates a branch code: required, alphanumeric with hyphens.
pub fn validate_branch_code(code: &str) -> ValidationResult<()> {
    let code = code.trim();
    if code.is_empty() {
        return Err(ValidationError::required("branchCode"));
    }
    if !code.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
        return Err(ValidationError::InvalidFormat {
            field: "branchCode".to_string(),
            reason: "must contain only letters, numbers, hyphens, and underscores".to_string(),
        });
    }
    Ok(())
}

// =============================================================================
// Rule Warnings
// =============================================================================

/// A non-blocking observation about a draft.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RuleWarning {
    StartsInPast,
    AppliesToAllProducts,
    AppliesToAllBranches,
    ScheduleConflict { count: usize },
}

/// Another active promotion overlapping a draft's window and products.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictSummary {
    pub id: String,
    pub name: String,
    pub promotion_type: PromotionType,
    pub priority: i32,
}

impl From<&Promotion> for ConflictSummary {
    fn from(p: &Promotion) -> Self {
        ConflictSummary {
            id: p.id.clone(),
            name: p.name.clone(),
            promotion_type: p.promotion_type(),
            priority: p.priority,
        }
    }
}

/// Outcome of a dry-run rule check.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RuleCheck {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<RuleWarning>,
    pub conflicts: Vec<ConflictSummary>,
}

impl RuleCheck {
    /// True when there are no errors; warnings and conflicts do not count.
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Warnings for a draft that already passed validation.
pub fn rule_warnings(draft: &PromotionDraft, now: DateTime<Utc>) -> Vec<RuleWarning> {
    let mut warnings = Vec::new();
    if draft.start_date < now {
        warnings.push(RuleWarning::StartsInPast);
    }
    if draft.applicable_products.is_universal() && draft.applicable_categories.is_universal() {
        warnings.push(RuleWarning::AppliesToAllProducts);
    }
    if draft.applicable_branches.is_universal() {
        warnings.push(RuleWarning::AppliesToAllBranches);
    }
    warnings
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::promotion::tests::sample_promotion;
    use chrono::Duration;

    fn draft() -> PromotionDraft {
        sample_promotion().to_draft()
    }

    #[test]
    fn test_unit_price_bounds() {
        assert!(validate_unit_price(Money::zero()).is_ok());
        assert!(validate_unit_price(Money::from_satang(MAX_UNIT_PRICE_SATANG)).is_ok());
        assert!(validate_unit_price(Money::from_satang(-1)).is_err());
        assert!(validate_unit_price(Money::from_satang(i64::MAX / 2)).is_err());
    }

    #[test]
    fn test_sample_draft_is_valid() {
        assert!(validate_draft(&draft()).is_ok());
    }

    #[test]
    fn test_percentage_out_of_range() {
        for bps in [0, 50, 10_001] {
            let mut d = draft();
            d.rule = DiscountRule::DiscountPercentage { percent_bps: bps };
            let errors = validate_draft(&d).unwrap_err();
            assert!(errors.has_field("discountValue"), "bps {}", bps);
        }
    }

    #[test]
    fn test_bundle_needs_two_distinct_products() {
        let mut d = draft();
        d.rule = DiscountRule::Bundle {
            products: vec!["a".to_string(), " a ".to_string()],
            price: Money::zero(),
        };
        let errors = validate_draft(&d).unwrap_err();
        assert!(errors.has_field("bundleProducts"));
        assert!(errors.has_field("bundlePrice"));
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn test_inverted_dates_rejected() {
        let mut d = draft();
        d.end_date = d.start_date;
        let errors = validate_draft(&d).unwrap_err();
        assert!(errors.iter().any(|e| *e == ValidationError::InvalidDateRange));
    }

    #[test]
    fn test_collects_every_failure() {
        let mut d = draft();
        d.name = "  ".to_string();
        d.priority = 0;
        d.usage_limit = Some(0);
        d.applicable_categories = Scope::restricted(["tablet"]);
        d.rule = DiscountRule::BuyXGetY {
            buy_quantity: 0,
            get_quantity: 1,
        };

        let errors = validate_draft(&d).unwrap_err();
        for field in ["name", "priority", "usageLimit", "applicableCategories", "buyQuantity"] {
            assert!(errors.has_field(field), "missing {}", field);
        }
    }

    #[test]
    fn test_restricted_to_nothing_rejected() {
        let mut d = draft();
        d.applicable_branches = Scope::restricted(Vec::<String>::new());
        assert!(validate_draft(&d).unwrap_err().has_field("applicableBranches"));
    }

    #[test]
    fn test_name_counts_characters_not_bytes() {
        // 100 Thai characters are 300 bytes
        let name: String = std::iter::repeat('ก').take(100).collect();
        assert!(validate_promotion_name(&name).is_ok());
        let long: String = std::iter::repeat('ก').take(101).collect();
        assert!(validate_promotion_name(&long).is_err());
    }

    #[test]
    fn test_warnings() {
        let d = draft();
        let warnings = rule_warnings(&d, d.start_date + Duration::days(1));
        assert_eq!(
            warnings,
            vec![
                RuleWarning::StartsInPast,
                RuleWarning::AppliesToAllProducts,
                RuleWarning::AppliesToAllBranches
            ]
        );
    }

    #[test]
    fn test_branch_code() {
        assert!(validate_branch_code("BKK-01").is_ok());
        assert!(validate_branch_code("").is_err());
        assert!(validate_branch_code("สาขา 1").is_err());
    }
}
