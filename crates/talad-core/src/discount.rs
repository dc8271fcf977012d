//! # Discount Calculator
//!
//! Pure functions computing the discount one promotion gives a line item or
//! a bundle set. They never fail: a promotion that does not apply yields a
//! zero discount and the caller decides what that means.
//!
//! ## Line Item Computation
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  original = unit_price × quantity                                       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  original < min_purchase ? ──yes──► 0                                   │
//! │       │ no                                                              │
//! │       ▼                                                                 │
//! │  DiscountPercentage  original × bps / 10000 (half up)                   │
//! │  DiscountAmount      amount                                             │
//! │  SpecialPrice        original − price × quantity                        │
//! │  BuyXGetY            free_units × unit_price                            │
//! │  Bundle              0 (only priced against a whole bundle set)         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  min(max_discount) then clamp to [0, original]                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::Serialize;
use std::collections::BTreeSet;

use crate::money::Money;
use crate::promotion::{Conditions, DiscountRule, Promotion};

/// Discount `promotion` gives `quantity` units at `unit_price`.
///
/// ```rust
/// use talad_core::discount::calculate_rule_discount;
/// use talad_core::{Conditions, DiscountRule, Money};
///
/// let rule = DiscountRule::BuyXGetY { buy_quantity: 2, get_quantity: 1 };
/// let discount = calculate_rule_discount(
///     &rule,
///     &Conditions::default(),
///     Money::from_satang(10_000),
///     9,
/// );
/// assert_eq!(discount.satang(), 30_000);
/// ```
pub fn calculate_discount(promotion: &Promotion, unit_price: Money, quantity: u32) -> Money {
    calculate_rule_discount(&promotion.rule, &promotion.conditions, unit_price, quantity)
}

/// Rule-level form of [`calculate_discount`], for callers without a stored promotion.
pub fn calculate_rule_discount(
    rule: &DiscountRule,
    conditions: &Conditions,
    unit_price: Money,
    quantity: u32,
) -> Money {
    let original_total = unit_price * quantity;
    if !original_total.is_positive() {
        return Money::zero();
    }
    if !conditions.meets_minimum(original_total) {
        return Money::zero();
    }

    let raw = match rule {
        DiscountRule::DiscountPercentage { percent_bps } => original_total.percentage(*percent_bps),
        DiscountRule::DiscountAmount { amount } => *amount,
        DiscountRule::SpecialPrice { price } => original_total - *price * quantity,
        DiscountRule::BuyXGetY {
            buy_quantity,
            get_quantity,
        } => unit_price * buy_x_get_y_free_units(*buy_quantity, *get_quantity, quantity),
        DiscountRule::Bundle { .. } => Money::zero(),
    };

    bound_discount(raw, conditions, original_total)
}

/// Free units for `quantity` under buy `buy` get `get`.
///
/// Only complete groups of `buy + get` count; a zero on either side gives nothing.
pub fn buy_x_get_y_free_units(buy: u32, get: u32, quantity: u32) -> u32 {
    if buy == 0 || get == 0 {
        return 0;
    }
    let group = buy.saturating_add(get);
    (quantity / group).saturating_mul(get)
}

/// Applies the max-discount cap and clamps into `[0, ceiling]`.
fn bound_discount(raw: Money, conditions: &Conditions, ceiling: Money) -> Money {
    let capped = match conditions.max_discount {
        Some(max) => raw.min(max),
        None => raw,
    };
    capped.max(Money::zero()).min(ceiling)
}

// =============================================================================
// Bundle
// =============================================================================

/// One cart line considered for a bundle.
#[derive(Debug, Clone, Copy)]
pub struct BundleLine<'a> {
    pub product_id: &'a str,
    pub unit_price: Money,
    pub quantity: u32,
}

/// Result of pricing a bundle against a cart.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleDiscount {
    /// Complete sets found in the cart.
    pub sets: u32,

    /// One unit of every component at its cart price.
    pub component_total: Money,

    /// Discount attributed to the bundle as a whole.
    pub discount: Money,
}

/// Prices a bundle promotion against the cart lines.
///
/// `sets` is the smallest quantity held of any bundle product. Each set
/// saves `component_total - bundle price` (never negative). A product
/// spread over several lines counts its combined quantity at the price of
/// its first line.
pub fn calculate_bundle_discount(
    promotion: &Promotion,
    lines: &[BundleLine<'_>],
) -> BundleDiscount {
    let DiscountRule::Bundle { products, price } = &promotion.rule else {
        return BundleDiscount::default();
    };

    let components: BTreeSet<&str> = products.iter().map(|p| p.trim()).collect();
    if components.is_empty() {
        return BundleDiscount::default();
    }

    let mut sets = u32::MAX;
    let mut component_total = Money::zero();
    for component in &components {
        let mut matching = lines.iter().filter(|l| l.product_id == *component);
        let Some(first) = matching.next() else {
            return BundleDiscount::default();
        };
        let held = matching.fold(first.quantity, |acc, l| acc.saturating_add(l.quantity));
        sets = sets.min(held);
        component_total += first.unit_price;
    }

    if sets == 0 {
        return BundleDiscount {
            sets: 0,
            component_total,
            discount: Money::zero(),
        };
    }

    let ceiling = component_total * sets;
    let discount = if promotion.conditions.meets_minimum(ceiling) && ceiling.is_positive() {
        let per_set = (component_total - *price).max(Money::zero());
        bound_discount(per_set * sets, &promotion.conditions, ceiling)
    } else {
        Money::zero()
    };

    BundleDiscount {
        sets,
        component_total,
        discount,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
