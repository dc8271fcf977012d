//! # Form Input
//!
//! Promotion payloads as the back-office form submits them: camelCase keys,
//! numbers that may arrive as strings, dates as ISO strings. [`PromotionInput`]
//! turns that into a validated [`PromotionDraft`] or a list of field errors.
//!
//! ```text
//! {"type": "discount_percentage", "discountValue": "15", ...}
//!      │
//!      ▼  coerce: "15" → 1500 bps, "abc" → InvalidNumber (never 0)
//! PromotionDraft
//!      │
//!      ▼  validate_draft
//! Ok(draft) | Err(ValidationErrors)
//! ```
//!
//! The same type serves partial updates: absent keys keep the stored value.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer};

use crate::error::{ValidationError, ValidationErrors};
use crate::money::{parse_hundredths, Money};
use crate::promotion::{Conditions, DiscountRule, PromotionDraft, PromotionType, Scope};
use crate::validation::{validate_details, validate_draft, DraftDetails};
use crate::DEFAULT_PRIORITY;

// =============================================================================
// Numeric Input
// =============================================================================

/// A number as a form may send it: JSON number or string.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum NumericInput {
    Number(serde_json::Number),
    Text(String),
}

impl NumericInput {
    fn raw(&self) -> String {
        match self {
            NumericInput::Number(n) => n.to_string(),
            NumericInput::Text(s) => s.trim().to_string(),
        }
    }

    /// An empty string counts as "not provided".
    fn is_blank(&self) -> bool {
        matches!(self, NumericInput::Text(s) if s.trim().is_empty())
    }

    /// Value in hundredths (satang for baht, bps for percent).
    fn hundredths(&self, field: &str) -> Result<i64, ValidationError> {
        let raw = self.raw();
        parse_hundredths(&raw).ok_or(ValidationError::InvalidNumber {
            field: field.to_string(),
            value: raw,
        })
    }

    fn money(&self, field: &str) -> Result<Money, ValidationError> {
        self.hundredths(field).map(Money::from_satang)
    }

    /// A whole, non-negative number ("3" and "3.00" pass, "3.5" does not).
    fn whole(&self, field: &str) -> Result<i64, ValidationError> {
        let hundredths = self.hundredths(field)?;
        if hundredths % 100 != 0 {
            return Err(ValidationError::InvalidNumber {
                field: field.to_string(),
                value: self.raw(),
            });
        }
        Ok(hundredths / 100)
    }

    fn whole_u32(&self, field: &str) -> Result<u32, ValidationError> {
        let value = self.whole(field)?;
        u32::try_from(value).map_err(|_| ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: u32::MAX as i64,
        })
    }
}

/// Distinguishes an absent key (`None`) from an explicit `null` (`Some(None)`).
fn explicit_null<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

// =============================================================================
// Promotion Input
// =============================================================================

/// Purchase conditions as submitted.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionsInput {
    pub min_purchase_amount: Option<NumericInput>,
    pub max_discount_amount: Option<NumericInput>,
}

/// A create or update payload from the back-office form.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromotionInput {
    pub name: Option<String>,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub promotion_type: Option<String>,
    /// Percent (1-100) or baht, depending on `type`.
    pub discount_value: Option<NumericInput>,
    pub special_price: Option<NumericInput>,
    pub buy_quantity: Option<NumericInput>,
    pub get_quantity: Option<NumericInput>,
    pub bundle_products: Option<Vec<String>>,
    pub bundle_price: Option<NumericInput>,
    pub applicable_products: Option<Vec<String>>,
    pub applicable_categories: Option<Vec<String>>,
    pub applicable_branches: Option<Vec<String>>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub is_active: Option<bool>,
    /// Absent keeps the stored limit; `null` or `""` means unlimited.
    #[serde(default, deserialize_with = "explicit_null")]
    pub usage_limit: Option<Option<NumericInput>>,
    pub priority: Option<NumericInput>,
    pub conditions: Option<ConditionsInput>,
    pub tags: Option<Vec<String>>,
    pub notes: Option<String>,
}

/// Rule parameters flattened so a partial update can overlay them.
#[derive(Debug, Default)]
struct RuleFields {
    discount_value: Option<i64>,
    special_price: Option<Money>,
    buy_quantity: Option<u32>,
    get_quantity: Option<u32>,
    bundle_products: Option<Vec<String>>,
    bundle_price: Option<Money>,
}

impl RuleFields {
    fn from_rule(rule: &DiscountRule) -> Self {
        match rule {
            DiscountRule::DiscountPercentage { percent_bps } => RuleFields {
                discount_value: Some(*percent_bps as i64),
                ..Default::default()
            },
            DiscountRule::DiscountAmount { amount } => RuleFields {
                discount_value: Some(amount.satang()),
                ..Default::default()
            },
            DiscountRule::SpecialPrice { price } => RuleFields {
                special_price: Some(*price),
                ..Default::default()
            },
            DiscountRule::BuyXGetY {
                buy_quantity,
                get_quantity,
            } => RuleFields {
                buy_quantity: Some(*buy_quantity),
                get_quantity: Some(*get_quantity),
                ..Default::default()
            },
            DiscountRule::Bundle { products, price } => RuleFields {
                bundle_products: Some(products.clone()),
                bundle_price: Some(*price),
                ..Default::default()
            },
        }
    }

    fn into_rule(
        self,
        promotion_type: PromotionType,
        errors: &mut ValidationErrors,
    ) -> Option<DiscountRule> {
        fn need<T>(value: Option<T>, field: &str, errors: &mut ValidationErrors) -> Option<T> {
            if value.is_none() {
                errors.push(ValidationError::required(field));
            }
            value
        }

        match promotion_type {
            PromotionType::DiscountPercentage => {
                let bps = need(self.discount_value, "discountValue", errors)?;
                let percent_bps = u32::try_from(bps).unwrap_or(u32::MAX);
                Some(DiscountRule::DiscountPercentage { percent_bps })
            }
            PromotionType::DiscountAmount => {
                let satang = need(self.discount_value, "discountValue", errors)?;
                Some(DiscountRule::DiscountAmount {
                    amount: Money::from_satang(satang),
                })
            }
            PromotionType::SpecialPrice => {
                let price = need(self.special_price, "specialPrice", errors)?;
                Some(DiscountRule::SpecialPrice { price })
            }
            PromotionType::BuyXGetY => {
                let buy = need(self.buy_quantity, "buyQuantity", errors);
                let get = need(self.get_quantity, "getQuantity", errors);
                Some(DiscountRule::BuyXGetY {
                    buy_quantity: buy?,
                    get_quantity: get?,
                })
            }
            PromotionType::Bundle => {
                let products = need(self.bundle_products, "bundleProducts", errors);
                let price = need(self.bundle_price, "bundlePrice", errors);
                Some(DiscountRule::Bundle {
                    products: products?,
                    price: price?,
                })
            }
        }
    }
}

impl PromotionInput {
    /// Builds and validates a new draft. Required fields must all be present.
    pub fn into_draft(self) -> Result<PromotionDraft, ValidationErrors> {
        self.merge(None)
    }

    /// Overlays this input on `base` and validates the result.
    pub fn apply_to(self, base: &PromotionDraft) -> Result<PromotionDraft, ValidationErrors> {
        self.merge(Some(base))
    }

    fn merge(self, base: Option<&PromotionDraft>) -> Result<PromotionDraft, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let name = self
            .name
            .map(|n| n.trim().to_string())
            .or_else(|| base.map(|b| b.name.clone()))
            .unwrap_or_default();

        let promotion_type = match self.promotion_type.as_deref() {
            Some(raw) => match raw.parse::<PromotionType>() {
                Ok(t) => Some(t),
                Err(_) => {
                    errors.push(ValidationError::NotAllowed {
                        field: "type".to_string(),
                        allowed: PromotionType::ALL
                            .iter()
                            .map(|t| t.as_str().to_string())
                            .collect(),
                    });
                    None
                }
            },
            None => match base {
                Some(b) => Some(b.rule.promotion_type()),
                None => {
                    errors.push(ValidationError::required("type"));
                    None
                }
            },
        };

        // Rule parameters of the stored rule only carry over when the type is unchanged
        let mut fields = match (base, promotion_type) {
            (Some(b), Some(t)) if b.rule.promotion_type() == t => RuleFields::from_rule(&b.rule),
            _ => RuleFields::default(),
        };
        overlay(&mut errors, &mut fields.discount_value, self.discount_value, |v| {
            v.hundredths("discountValue")
        });
        overlay(&mut errors, &mut fields.special_price, self.special_price, |v| {
            v.money("specialPrice")
        });
        overlay(&mut errors, &mut fields.buy_quantity, self.buy_quantity, |v| {
            v.whole_u32("buyQuantity")
        });
        overlay(&mut errors, &mut fields.get_quantity, self.get_quantity, |v| {
            v.whole_u32("getQuantity")
        });
        overlay(&mut errors, &mut fields.bundle_price, self.bundle_price, |v| {
            v.money("bundlePrice")
        });
        if self.bundle_products.is_some() {
            fields.bundle_products = self.bundle_products;
        }
        let rule = promotion_type.and_then(|t| fields.into_rule(t, &mut errors));

        let start_date = pick_date(
            &mut errors,
            "startDate",
            self.start_date,
            base.map(|b| b.start_date),
        );
        let end_date = pick_date(&mut errors, "endDate", self.end_date, base.map(|b| b.end_date));

        let usage_limit = match self.usage_limit {
            Some(Some(value)) if !value.is_blank() => match value.whole_u32("usageLimit") {
                Ok(limit) => Some(limit),
                Err(e) => {
                    errors.push(e);
                    None
                }
            },
            Some(_) => None,
            None => base.and_then(|b| b.usage_limit),
        };

        let mut priority = base.map_or(DEFAULT_PRIORITY, |b| b.priority);
        if let Some(value) = self.priority.filter(|v| !v.is_blank()) {
            match value.whole("priority") {
                Ok(p) => priority = i32::try_from(p).unwrap_or(i32::MAX),
                Err(e) => errors.push(e),
            }
        }

        let conditions = match self.conditions {
            Some(input) => {
                let mut conditions = Conditions::default();
                overlay(&mut errors, &mut conditions.min_purchase, input.min_purchase_amount, |v| {
                    v.money("conditions.minPurchaseAmount")
                });
                overlay(&mut errors, &mut conditions.max_discount, input.max_discount_amount, |v| {
                    v.money("conditions.maxDiscountAmount")
                });
                conditions
            }
            None => base.map(|b| b.conditions).unwrap_or_default(),
        };

        let scope = |input: Option<Vec<String>>, stored: Option<&Scope>| -> Scope {
            match input {
                Some(ids) => Scope::from(ids),
                None => stored.cloned().unwrap_or_default(),
            }
        };
        let applicable_products =
            scope(self.applicable_products, base.map(|b| &b.applicable_products));
        let applicable_categories =
            scope(self.applicable_categories, base.map(|b| &b.applicable_categories));
        let applicable_branches =
            scope(self.applicable_branches, base.map(|b| &b.applicable_branches));

        let text = |input: Option<String>, stored: Option<&Option<String>>| -> Option<String> {
            match input {
                Some(s) if s.trim().is_empty() => None,
                Some(s) => Some(s.trim().to_string()),
                None => stored.cloned().flatten(),
            }
        };
        let description = text(self.description, base.map(|b| &b.description));
        let notes = text(self.notes, base.map(|b| &b.notes));

        let tags = match self.tags {
            Some(tags) => tags
                .into_iter()
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect(),
            None => base.map(|b| b.tags.clone()).unwrap_or_default(),
        };

        let is_active = self.is_active.or(base.map(|b| b.is_active)).unwrap_or(true);

        let complete = match (rule, start_date, end_date) {
            (Some(rule), Some(start), Some(end)) if errors.is_empty() => Some((rule, start, end)),
            (_, start, end) => {
                // Still report everything that does not need the rule or window
                let details = DraftDetails {
                    name: &name,
                    description: description.as_deref(),
                    notes: notes.as_deref(),
                    usage_limit,
                    priority,
                    conditions: &conditions,
                    applicable_products: &applicable_products,
                    applicable_categories: &applicable_categories,
                    applicable_branches: &applicable_branches,
                };
                validate_details(&mut errors, &details);
                if matches!((start, end), (Some(s), Some(e)) if s >= e) {
                    errors.push(ValidationError::InvalidDateRange);
                }
                None
            }
        };
        let Some((rule, start_date, end_date)) = complete else {
            return Err(errors);
        };

        let draft = PromotionDraft {
            name,
            description,
            rule,
            applicable_products,
            applicable_categories,
            applicable_branches,
            start_date,
            end_date,
            is_active,
            usage_limit,
            priority,
            conditions,
            tags,
            notes,
        };
        validate_draft(&draft)?;
        Ok(draft)
    }
}

/// Replaces `slot` with the coerced input when one was provided.
fn overlay<T>(
    errors: &mut ValidationErrors,
    slot: &mut Option<T>,
    input: Option<NumericInput>,
    coerce: impl FnOnce(&NumericInput) -> Result<T, ValidationError>,
) {
    let Some(value) = input else { return };
    if value.is_blank() {
        *slot = None;
        return;
    }
    match coerce(&value) {
        Ok(v) => *slot = Some(v),
        Err(e) => errors.push(e),
    }
}

fn pick_date(
    errors: &mut ValidationErrors,
    field: &str,
    input: Option<String>,
    stored: Option<DateTime<Utc>>,
) -> Option<DateTime<Utc>> {
    match input {
        Some(raw) => match parse_date(&raw) {
            Some(date) => Some(date),
            None => {
                errors.push(ValidationError::InvalidFormat {
                    field: field.to_string(),
                    reason: format!("'{}' is not an ISO-8601 date", raw.trim()),
                });
                None
            }
        },
        None => {
            if stored.is_none() {
                errors.push(ValidationError::required(field));
            }
            stored
        }
    }
}

/// Parses RFC 3339 timestamps or plain `YYYY-MM-DD` dates (midnight UTC).
pub fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::promotion::tests::sample_promotion;
    use serde_json::json;

    fn parse(value: serde_json::Value) -> PromotionInput {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_string_numbers_are_coerced() {
        let draft = parse(json!({
            "name": "  ลด 15% ทั้งร้าน ",
            "type": "discount_percentage",
            "discountValue": "15",
            "startDate": "2026-04-01",
            "endDate": "2026-04-15T23:59:59+07:00",
            "usageLimit": "200",
            "priority": "10",
            "conditions": { "minPurchaseAmount": "1,000.50" }
        }))
        .into_draft()
        .unwrap();

        assert_eq!(draft.name, "ลด 15% ทั้งร้าน");
        assert_eq!(draft.rule, DiscountRule::DiscountPercentage { percent_bps: 1500 });
        assert_eq!(draft.usage_limit, Some(200));
        assert_eq!(draft.priority, 10);
        assert_eq!(draft.conditions.min_purchase, Some(Money::from_satang(100_050)));
        assert!(draft.is_active);
    }

    #[test]
    fn test_invalid_number_is_rejected_not_zeroed() {
        let errors = parse(json!({
            "name": "x",
            "type": "discount_amount",
            "discountValue": "abc",
            "startDate": "2026-04-01",
            "endDate": "2026-04-02"
        }))
        .into_draft()
        .unwrap_err();

        assert!(errors.iter().any(|e| matches!(
            e,
            ValidationError::InvalidNumber { field, value }
                if field == "discountValue" && value == "abc"
        )));
    }

    #[test]
    fn test_missing_type_fields_reported() {
        let errors = parse(json!({
            "name": "bogo",
            "type": "buy_x_get_y",
            "buyQuantity": 2,
            "startDate": "2026-04-01"
        }))
        .into_draft()
        .unwrap_err();

        assert!(errors.has_field("getQuantity"));
        assert!(errors.has_field("endDate"));
    }

    #[test]
    fn test_incomplete_rule_still_reports_other_fields() {
        let errors = parse(json!({
            "name": "",
            "type": "special_price",
            "applicableCategories": ["tablet"],
            "startDate": "2026-04-10",
            "endDate": "2026-04-01"
        }))
        .into_draft()
        .unwrap_err();

        assert!(errors.has_field("specialPrice"));
        assert!(errors.has_field("name"));
        assert!(errors.has_field("applicableCategories"));
        assert!(errors.iter().any(|e| matches!(e, ValidationError::InvalidDateRange)));
    }

    #[test]
    fn test_unknown_type() {
        let errors = parse(json!({ "name": "x", "type": "mystery" }))
            .into_draft()
            .unwrap_err();
        assert!(errors.has_field("type"));
    }

    #[test]
    fn test_partial_update_keeps_stored_values() {
        let base = sample_promotion().to_draft();
        let updated = parse(json!({ "discountValue": 25, "usageLimit": null }))
            .apply_to(&base)
            .unwrap();

        assert_eq!(updated.rule, DiscountRule::DiscountPercentage { percent_bps: 2500 });
        assert_eq!(updated.name, base.name);
        assert_eq!(updated.start_date, base.start_date);
        assert_eq!(updated.usage_limit, None);
    }

    #[test]
    fn test_update_cannot_invert_dates() {
        let base = sample_promotion().to_draft();
        let errors = parse(json!({ "endDate": "2025-12-01" }))
            .apply_to(&base)
            .unwrap_err();
        assert!(errors.iter().any(|e| *e == ValidationError::InvalidDateRange));
    }

    #[test]
    fn test_type_change_requires_new_parameters() {
        let base = sample_promotion().to_draft();
        let errors = parse(json!({ "type": "special_price" }))
            .apply_to(&base)
            .unwrap_err();
        assert!(errors.has_field("specialPrice"));
    }

    #[test]
    fn test_fractional_quantity_rejected() {
        let errors = parse(json!({
            "name": "x",
            "type": "buy_x_get_y",
            "buyQuantity": "1.5",
            "getQuantity": 1,
            "startDate": "2026-04-01",
            "endDate": "2026-04-02"
        }))
        .into_draft()
        .unwrap_err();
        assert!(errors.has_field("buyQuantity"));
    }
}
