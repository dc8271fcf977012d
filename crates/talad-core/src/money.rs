//! # Money Module
//!
//! Provides the `Money` type for handling Thai baht amounts safely.
//!
//! ## Integer Satang
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1 baht = 100 satang. Every amount in the engine is an i64 of satang.   │
//! │                                                                         │
//! │  Form input "199.50"  ──parse──►  Money(19_950)                         │
//! │  15% off Money(19_950) ─────────►  (19_950 × 1500 + 5000) / 10000      │
//! │                                   = 2_993 satang (round half up)        │
//! │                                                                         │
//! │  Floats only appear at the very edge, for a display percentage.        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use talad_core::money::Money;
//!
//! let price = Money::from_satang(1_099); // ฿10.99
//! let line = price * 2u32;               // ฿21.98
//! assert_eq!(line.satang(), 2_198);
//!
//! assert_eq!(Money::parse("199.50"), Some(Money::from_baht(199, 50)));
//! assert_eq!(Money::parse("abc"), None);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};
use ts_rs::TS;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in satang (the smallest baht unit).
///
/// ## Where Money is Used
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  Product.price_satang ──► unit price ──► original line total            │
/// │                                              │                          │
/// │  DiscountRule::{DiscountAmount, SpecialPrice, Bundle} ──► discount      │
/// │                                              │                          │
/// │  Conditions::{min_purchase, max_discount} ───┘                          │
/// │                                              ▼                          │
/// │                                   final price = original − discount     │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from satang.
    #[inline]
    pub const fn from_satang(satang: i64) -> Self {
        Money(satang)
    }

    /// Creates a Money value from baht and satang parts.
    ///
    /// ```rust
    /// use talad_core::money::Money;
    ///
    /// assert_eq!(Money::from_baht(10, 99).satang(), 1_099);
    /// assert_eq!(Money::from_baht(-5, 50).satang(), -550);
    /// ```
    #[inline]
    pub const fn from_baht(baht: i64, satang: i64) -> Self {
        if baht < 0 {
            Money(baht * 100 - satang)
        } else {
            Money(baht * 100 + satang)
        }
    }

    /// Returns the value in satang.
    #[inline]
    pub const fn satang(&self) -> i64 {
        self.0
    }

    /// Returns the whole-baht portion.
    #[inline]
    pub const fn baht(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the satang portion (always 0-99).
    #[inline]
    pub const fn satang_part(&self) -> i64 {
        (self.0 % 100).abs()
    }

    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Multiplies money by a quantity, saturating instead of overflowing.
    #[inline]
    pub const fn multiply_quantity(&self, qty: u32) -> Self {
        Money(self.0.saturating_mul(qty as i64))
    }

    /// Returns `bps` basis points of this amount, rounded half up.
    ///
    /// ## Implementation
    /// `(amount * bps + 5000) / 10000` in i128 so large totals cannot overflow.
    ///
    /// ```rust
    /// use talad_core::money::Money;
    ///
    /// let total = Money::from_satang(19_950);
    /// assert_eq!(total.percentage(1_500).satang(), 2_993); // 15%
    /// ```
    pub fn percentage(&self, bps: u32) -> Money {
        let part = (self.0 as i128 * bps as i128 + 5000) / 10000;
        Money(part as i64)
    }

    /// Percentage (0-100, two decimals) that this amount is of `total`.
    ///
    /// Returns 0.0 when `total` is zero or negative.
    pub fn percent_of(&self, total: Money) -> f64 {
        if total.0 <= 0 {
            return 0.0;
        }
        let raw = self.0 as f64 / total.0 as f64 * 100.0;
        (raw * 100.0).round() / 100.0
    }

    /// Parses a non-negative baht decimal ("199", "199.5", "1,299.50").
    ///
    /// At most two fraction digits are accepted. Signs, exponents and
    /// anything else yield `None` so bad form input is never read as zero.
    pub fn parse(input: &str) -> Option<Money> {
        parse_hundredths(input).map(Money)
    }

    /// Formats as a plain decimal without currency symbol ("1099.50").
    pub fn to_decimal_string(&self) -> String {
        let sign = if self.0 < 0 { "-" } else { "" };
        format!("{}{}.{:02}", sign, self.baht().abs(), self.satang_part())
    }
}

/// Parses a non-negative decimal into hundredths.
///
/// Shared by baht amounts (hundredths = satang) and percentages
/// (hundredths of a percent = basis points).
pub fn parse_hundredths(input: &str) -> Option<i64> {
    let cleaned: String = input.trim().chars().filter(|c| *c != ',').collect();
    if cleaned.is_empty() {
        return None;
    }

    let (whole, fraction) = match cleaned.split_once('.') {
        Some((w, f)) => (w, f),
        None => (cleaned.as_str(), ""),
    };

    if whole.is_empty() && fraction.is_empty() {
        return None;
    }
    if !whole.chars().all(|c| c.is_ascii_digit()) || !fraction.chars().all(|c| c.is_ascii_digit())
    {
        return None;
    }
    if fraction.len() > 2 {
        return None;
    }

    let whole_value: i64 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
    let fraction_value: i64 = match fraction.len() {
        0 => 0,
        1 => fraction.parse::<i64>().ok()? * 10,
        _ => fraction.parse().ok()?,
    };

    whole_value.checked_mul(100)?.checked_add(fraction_value)
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Shows money as "฿10.99" (debugging and logs; the UI formats its own).
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}฿{}.{:02}", sign, self.baht().abs(), self.satang_part())
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0.saturating_add(other.0))
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 = self.0.saturating_add(other.0);
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0.saturating_sub(other.0))
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 = self.0.saturating_sub(other.0);
    }
}

impl Mul<u32> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: u32) -> Self {
        self.multiply_quantity(qty)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_satang() {
        let money = Money::from_satang(1099);
        assert_eq!(money.satang(), 1099);
        assert_eq!(money.baht(), 10);
        assert_eq!(money.satang_part(), 99);
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", Money::from_satang(1099)), "฿10.99");
        assert_eq!(format!("{}", Money::from_satang(-550)), "-฿5.50");
        assert_eq!(Money::from_satang(129_950).to_decimal_string(), "1299.50");
    }

    #[test]
    fn test_percentage_rounds_half_up() {
        // ฿100.00 at 10% = ฿10.00
        assert_eq!(Money::from_satang(10_000).percentage(1_000).satang(), 1_000);
        // 5 satang at 50% = 2.5 → 3
        assert_eq!(Money::from_satang(5).percentage(5_000).satang(), 3);
        // 100% is the whole amount
        assert_eq!(Money::from_satang(12_345).percentage(10_000).satang(), 12_345);
    }

    #[test]
    fn test_percent_of_guards_zero_total() {
        assert_eq!(Money::from_satang(500).percent_of(Money::zero()), 0.0);
        assert_eq!(
            Money::from_satang(1_000).percent_of(Money::from_satang(3_000)),
            33.33
        );
    }

    #[test]
    fn test_parse_accepts_decimal_baht() {
        assert_eq!(Money::parse("199"), Some(Money::from_satang(19_900)));
        assert_eq!(Money::parse(" 199.5 "), Some(Money::from_satang(19_950)));
        assert_eq!(Money::parse("1,299.50"), Some(Money::from_satang(129_950)));
        assert_eq!(Money::parse(".75"), Some(Money::from_satang(75)));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        for bad in ["", "abc", "-5", "1.999", "1e3", "NaN", ".", "12.3.4"] {
            assert_eq!(Money::parse(bad), None, "input {:?}", bad);
        }
    }

    #[test]
    fn test_arithmetic_and_sum() {
        let a = Money::from_satang(1000);
        let b = Money::from_satang(500);
        assert_eq!((a + b).satang(), 1500);
        assert_eq!((a - b).satang(), 500);
        assert_eq!((a * 3u32).satang(), 3000);

        let total: Money = vec![a, b, b].into_iter().sum();
        assert_eq!(total.satang(), 2000);
    }

    #[test]
    fn test_arithmetic_saturates() {
        let huge = Money::from_satang(i64::MAX / 2) * 3u32;
        assert_eq!(huge.satang(), i64::MAX);

        let total: Money = vec![huge, huge].into_iter().sum();
        assert_eq!(total.satang(), i64::MAX);
        assert_eq!((Money::from_satang(i64::MIN) - Money::from_satang(1)).satang(), i64::MIN);
    }

}
