//! # Repository Module
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  talad-engine adapters                                                  │
//! │       │  db.promotions().find_active(&criteria, now)                    │
//! │       ▼                                                                 │
//! │  PromotionRepository   CatalogRepository   AuditLogRepository           │
//! │       │                     │                    │                      │
//! │       ▼                     ▼                    ▼                      │
//! │  promotions            products,            promotion_audit_log         │
//! │                        branch_stock                                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Timestamps
//! Every time column holds fixed-width RFC 3339 UTC text
//! (`2026-01-05T12:00:00.000000Z`), so window checks can compare
//! columns against a bound `now` as plain strings.

use chrono::{DateTime, SecondsFormat, Utc};

pub mod audit;
pub mod catalog;
pub mod promotion;

/// Formats a timestamp the way every repository stores it.
pub(crate) fn ts(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_timestamps_sort_as_text() {
        let a = Utc.with_ymd_and_hms(2026, 1, 5, 12, 0, 0).unwrap();
        let b = a + chrono::Duration::milliseconds(500);
        assert_eq!(ts(a), "2026-01-05T12:00:00.000000Z");
        assert!(ts(a) < ts(b));
    }
}
