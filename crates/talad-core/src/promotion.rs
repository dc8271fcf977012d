//! # Promotion Model
//!
//! The promotion definition, its discount rule and scopes, and the derived
//! availability state.
//!
//! ## Shape
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Promotion                                                              │
//! │  ├── rule: DiscountRule          one variant per promotion type         │
//! │  │     DiscountPercentage { percent_bps }                               │
//! │  │     DiscountAmount     { amount }                                    │
//! │  │     SpecialPrice       { price }                                     │
//! │  │     BuyXGetY           { buy_quantity, get_quantity }                │
//! │  │     Bundle             { products, price }                           │
//! │  ├── applicable_products / categories / branches: Scope                 │
//! │  │     Universal | RestrictedTo({ids})      wire: [] means Universal    │
//! │  ├── start_date .. end_date, is_active, usage_count / usage_limit       │
//! │  └── conditions { min_purchase, max_discount }                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Availability State Machine
//! ```text
//!                  now ≥ start               now > end
//!   ┌───────────┐ ──────────────► ┌────────┐ ───────────► ┌─────────┐
//!   │ Scheduled │                 │ Active │              │ Expired │
//!   └───────────┘                 └───┬────┘              └─────────┘
//!                         usage_count │ ≥ limit
//!                                     ▼
//!                               ┌───────────┐     is_active == false at
//!                               │ Exhausted │     any time ──► Disabled
//!                               └───────────┘
//! ```
//! Nothing about this state is stored. [`availability`] computes it from the
//! stored fields and the caller's `now` on every read.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::money::Money;
use crate::MAX_NAME_LEN;

// =============================================================================
// Promotion Type
// =============================================================================

/// The promotion type label, derived from the rule variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PromotionType {
    DiscountPercentage,
    DiscountAmount,
    SpecialPrice,
    BuyXGetY,
    Bundle,
}

impl PromotionType {
    pub const ALL: [PromotionType; 5] = [
        PromotionType::DiscountPercentage,
        PromotionType::DiscountAmount,
        PromotionType::SpecialPrice,
        PromotionType::BuyXGetY,
        PromotionType::Bundle,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PromotionType::DiscountPercentage => "discount_percentage",
            PromotionType::DiscountAmount => "discount_amount",
            PromotionType::SpecialPrice => "special_price",
            PromotionType::BuyXGetY => "buy_x_get_y",
            PromotionType::Bundle => "bundle",
        }
    }

    /// Label shown in the back office and in exports.
    pub fn label_th(&self) -> &'static str {
        match self {
            PromotionType::DiscountPercentage => "ส่วนลดเปอร์เซ็นต์",
            PromotionType::DiscountAmount => "ส่วนลดเงิน",
            PromotionType::SpecialPrice => "ราคาพิเศษ",
            PromotionType::BuyXGetY => "ซื้อ X แถม Y",
            PromotionType::Bundle => "จัดชุดสินค้า",
        }
    }
}

impl fmt::Display for PromotionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PromotionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        PromotionType::ALL
            .into_iter()
            .find(|t| t.as_str() == wanted)
            .ok_or_else(|| format!("unknown promotion type '{}'", wanted))
    }
}

/// Whether a promotion discounts by percentage or by a money amount.
///
/// Only the two discount types carry one; the others report `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum DiscountType {
    Percentage,
    Amount,
}

// =============================================================================
// Discount Rule
// =============================================================================

/// The discount parameters, one variant per promotion type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DiscountRule {
    /// Percent off the line total, in basis points (1500 = 15%).
    DiscountPercentage {
        #[serde(rename = "percentBps")]
        percent_bps: u32,
    },
    /// Flat amount off the line total.
    DiscountAmount { amount: Money },
    /// Unit price replaced by `price`.
    SpecialPrice { price: Money },
    /// Every group of `buy + get` units makes `get` units free.
    BuyXGetY {
        #[serde(rename = "buyQuantity")]
        buy_quantity: u32,
        #[serde(rename = "getQuantity")]
        get_quantity: u32,
    },
    /// A set of distinct products sold together for `price`.
    Bundle { products: Vec<String>, price: Money },
}

impl DiscountRule {
    pub fn promotion_type(&self) -> PromotionType {
        match self {
            DiscountRule::DiscountPercentage { .. } => PromotionType::DiscountPercentage,
            DiscountRule::DiscountAmount { .. } => PromotionType::DiscountAmount,
            DiscountRule::SpecialPrice { .. } => PromotionType::SpecialPrice,
            DiscountRule::BuyXGetY { .. } => PromotionType::BuyXGetY,
            DiscountRule::Bundle { .. } => PromotionType::Bundle,
        }
    }

    pub fn discount_type(&self) -> Option<DiscountType> {
        match self {
            DiscountRule::DiscountPercentage { .. } => Some(DiscountType::Percentage),
            DiscountRule::DiscountAmount { .. } => Some(DiscountType::Amount),
            _ => None,
        }
    }
}

// =============================================================================
// Scope
// =============================================================================

/// Which products, categories or branches a promotion targets.
///
/// On the wire a scope is a list and the empty list means `Universal`.
/// `RestrictedTo` with an empty set can only be built in code and matches
/// nothing; validation rejects it before it is stored.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub enum Scope {
    #[default]
    Universal,
    RestrictedTo(BTreeSet<String>),
}

impl Scope {
    /// Builds a restricted scope, trimming ids and dropping blanks.
    pub fn restricted<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Scope::RestrictedTo(
            ids.into_iter()
                .map(|s| s.as_ref().trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        )
    }

    pub fn is_universal(&self) -> bool {
        matches!(self, Scope::Universal)
    }

    /// True when `id` is inside the scope. Universal contains everything.
    pub fn contains(&self, id: &str) -> bool {
        match self {
            Scope::Universal => true,
            Scope::RestrictedTo(ids) => ids.contains(id),
        }
    }

    /// The explicit ids of a restricted scope; empty for Universal.
    pub fn ids(&self) -> impl Iterator<Item = &String> {
        let ids = match self {
            Scope::Universal => None,
            Scope::RestrictedTo(ids) => Some(ids),
        };
        ids.into_iter().flatten()
    }

    /// True when both sides name at least one common id explicitly.
    ///
    /// Universal scopes never overlap here; conflict checks only consider
    /// promotions that name products.
    pub fn overlaps_explicitly(&self, ids: &[String]) -> bool {
        match self {
            Scope::Universal => false,
            Scope::RestrictedTo(set) => ids.iter().any(|id| set.contains(id.trim())),
        }
    }
}

impl From<Vec<String>> for Scope {
    fn from(ids: Vec<String>) -> Self {
        let scope = Scope::restricted(ids);
        match &scope {
            Scope::RestrictedTo(set) if set.is_empty() => Scope::Universal,
            _ => scope,
        }
    }
}

impl From<Scope> for Vec<String> {
    fn from(scope: Scope) -> Self {
        match scope {
            Scope::Universal => Vec::new(),
            Scope::RestrictedTo(ids) => ids.into_iter().collect(),
        }
    }
}

// =============================================================================
// Conditions
// =============================================================================

/// Purchase conditions layered over any rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Conditions {
    /// Inapplicable when the original total is below this.
    #[serde(rename = "minPurchaseAmount", default)]
    pub min_purchase: Option<Money>,

    /// Upper bound on any computed discount.
    #[serde(rename = "maxDiscountAmount", default)]
    pub max_discount: Option<Money>,
}

impl Conditions {
    pub fn meets_minimum(&self, original_total: Money) -> bool {
        self.min_purchase.map_or(true, |min| original_total >= min)
    }
}

// =============================================================================
// Availability
// =============================================================================

/// Effective availability of a promotion at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    Scheduled,
    Active,
    Expired,
    Disabled,
    Exhausted,
}

impl Availability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Availability::Scheduled => "scheduled",
            Availability::Active => "active",
            Availability::Expired => "expired",
            Availability::Disabled => "disabled",
            Availability::Exhausted => "exhausted",
        }
    }

    pub fn label_th(&self) -> &'static str {
        match self {
            Availability::Scheduled => "กำลังจะมา",
            Availability::Active => "กำลังใช้งาน",
            Availability::Expired => "หมดอายุแล้ว",
            Availability::Disabled => "ปิดใช้งาน",
            Availability::Exhausted => "ใช้ครบจำนวนแล้ว",
        }
    }
}

impl fmt::Display for Availability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Computes the availability of `promotion` at `now`.
///
/// Precedence: Disabled, then the date window, then the usage limit.
pub fn availability(promotion: &Promotion, now: DateTime<Utc>) -> Availability {
    if !promotion.is_active {
        Availability::Disabled
    } else if now < promotion.start_date {
        Availability::Scheduled
    } else if now > promotion.end_date {
        Availability::Expired
    } else if promotion
        .usage_limit
        .is_some_and(|limit| promotion.usage_count >= limit)
    {
        Availability::Exhausted
    } else {
        Availability::Active
    }
}

// =============================================================================
// Promotion
// =============================================================================

/// A stored promotion definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Promotion {
    pub id: String,

    pub name: String,

    pub description: Option<String>,

    pub rule: DiscountRule,

    #[ts(as = "Vec<String>")]
    pub applicable_products: Scope,

    #[ts(as = "Vec<String>")]
    pub applicable_categories: Scope,

    #[ts(as = "Vec<String>")]
    pub applicable_branches: Scope,

    #[ts(as = "String")]
    pub start_date: DateTime<Utc>,

    #[ts(as = "String")]
    pub end_date: DateTime<Utc>,

    /// Admin toggle, independent of the date window.
    pub is_active: bool,

    pub usage_count: u32,

    /// `None` means unlimited.
    pub usage_limit: Option<u32>,

    /// Lower value is more important.
    pub priority: i32,

    pub conditions: Conditions,

    pub tags: Vec<String>,

    pub notes: Option<String>,

    pub created_by: Option<String>,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Promotion {
    /// Materializes a validated draft as a new promotion.
    pub fn from_draft(
        draft: PromotionDraft,
        id: impl Into<String>,
        created_by: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Promotion {
            id: id.into(),
            name: draft.name,
            description: draft.description,
            rule: draft.rule,
            applicable_products: draft.applicable_products,
            applicable_categories: draft.applicable_categories,
            applicable_branches: draft.applicable_branches,
            start_date: draft.start_date,
            end_date: draft.end_date,
            is_active: draft.is_active,
            usage_count: 0,
            usage_limit: draft.usage_limit,
            priority: draft.priority,
            conditions: draft.conditions,
            tags: draft.tags,
            notes: draft.notes,
            created_by,
            created_at: now,
            updated_at: now,
        }
    }

    /// The admin-editable part of this promotion.
    pub fn to_draft(&self) -> PromotionDraft {
        PromotionDraft {
            name: self.name.clone(),
            description: self.description.clone(),
            rule: self.rule.clone(),
            applicable_products: self.applicable_products.clone(),
            applicable_categories: self.applicable_categories.clone(),
            applicable_branches: self.applicable_branches.clone(),
            start_date: self.start_date,
            end_date: self.end_date,
            is_active: self.is_active,
            usage_limit: self.usage_limit,
            priority: self.priority,
            conditions: self.conditions,
            tags: self.tags.clone(),
            notes: self.notes.clone(),
        }
    }

    /// Replaces the editable fields, keeping identity, usage and audit data.
    pub fn apply_draft(&mut self, draft: PromotionDraft, now: DateTime<Utc>) {
        self.name = draft.name;
        self.description = draft.description;
        self.rule = draft.rule;
        self.applicable_products = draft.applicable_products;
        self.applicable_categories = draft.applicable_categories;
        self.applicable_branches = draft.applicable_branches;
        self.start_date = draft.start_date;
        self.end_date = draft.end_date;
        self.is_active = draft.is_active;
        self.usage_limit = draft.usage_limit;
        self.priority = draft.priority;
        self.conditions = draft.conditions;
        self.tags = draft.tags;
        self.notes = draft.notes;
        self.updated_at = now;
    }

    #[inline]
    pub fn promotion_type(&self) -> PromotionType {
        self.rule.promotion_type()
    }

    #[inline]
    pub fn discount_type(&self) -> Option<DiscountType> {
        self.rule.discount_type()
    }

    #[inline]
    pub fn availability(&self, now: DateTime<Utc>) -> Availability {
        availability(self, now)
    }

    /// Active, inside the window and under the usage limit.
    #[inline]
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        self.availability(now) == Availability::Active
    }

    pub fn applies_to_branch(&self, branch_code: &str) -> bool {
        self.applicable_branches.contains(branch_code)
    }

    /// Uses left before exhaustion; `None` when unlimited.
    pub fn remaining_uses(&self) -> Option<u32> {
        self.usage_limit
            .map(|limit| limit.saturating_sub(self.usage_count))
    }

    pub fn duration(&self) -> Duration {
        self.end_date - self.start_date
    }
}

// =============================================================================
// Draft
// =============================================================================

/// The admin-editable fields of a promotion, before it has an identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromotionDraft {
    pub name: String,
    pub description: Option<String>,
    pub rule: DiscountRule,
    pub applicable_products: Scope,
    pub applicable_categories: Scope,
    pub applicable_branches: Scope,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub is_active: bool,
    pub usage_limit: Option<u32>,
    pub priority: i32,
    pub conditions: Conditions,
    pub tags: Vec<String>,
    pub notes: Option<String>,
}

// =============================================================================
// Clone
// =============================================================================

/// Suffix appended to the name of a cloned promotion ("copy").
pub const CLONE_SUFFIX: &str = " (สำเนา)";

/// Builds a disabled copy of `original` scheduled to start tomorrow.
///
/// The copy keeps the original's window length: it starts at `now + 1 day`
/// and ends that same duration later. Usage restarts at zero.
pub fn clone_promotion(
    original: &Promotion,
    new_id: impl Into<String>,
    created_by: Option<String>,
    now: DateTime<Utc>,
) -> Promotion {
    let start_date = now + Duration::days(1);
    let end_date = start_date + original.duration();

    let suffix_len = CLONE_SUFFIX.chars().count();
    let base: String = original
        .name
        .chars()
        .take(MAX_NAME_LEN.saturating_sub(suffix_len))
        .collect();

    Promotion {
        id: new_id.into(),
        name: format!("{}{}", base, CLONE_SUFFIX),
        start_date,
        end_date,
        is_active: false,
        usage_count: 0,
        created_by,
        created_at: now,
        updated_at: now,
        ..original.clone()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
