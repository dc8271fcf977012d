//! # Promotion Alerts
//!
//! Back-office notices derived from the current promotion set: promotions
//! about to expire, promotions close to their usage cap, and promotions
//! that have run for a while with almost no redemptions.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::promotion::{Availability, Promotion};

/// Thresholds for [`collect_alerts`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlertThresholds {
    pub expiring_within_days: i64,
    /// Usage at or above this percent of the limit raises `HighUsage`.
    pub high_usage_percent: u32,
    pub low_performance_after_days: i64,
    pub low_performance_max_uses: u32,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        AlertThresholds {
            expiring_within_days: 7,
            high_usage_percent: 80,
            low_performance_after_days: 7,
            low_performance_max_uses: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PromotionAlert {
    ExpiringSoon {
        id: String,
        name: String,
        days_left: i64,
    },
    HighUsage {
        id: String,
        name: String,
        usage_count: u32,
        usage_limit: u32,
    },
    LowPerformance {
        id: String,
        name: String,
        usage_count: u32,
        running_days: i64,
    },
}

/// Alerts for every promotion that is currently active.
pub fn collect_alerts(
    promotions: &[Promotion],
    now: DateTime<Utc>,
    thresholds: &AlertThresholds,
) -> Vec<PromotionAlert> {
    let mut alerts = Vec::new();

    for p in promotions.iter().filter(|p| p.availability(now) == Availability::Active) {
        let left = p.end_date - now;
        if left <= Duration::days(thresholds.expiring_within_days) {
            alerts.push(PromotionAlert::ExpiringSoon {
                id: p.id.clone(),
                name: p.name.clone(),
                days_left: left.num_days(),
            });
        }

        if let Some(limit) = p.usage_limit.filter(|l| *l > 0) {
            if p.usage_count as u64 * 100 >= limit as u64 * thresholds.high_usage_percent as u64 {
                alerts.push(PromotionAlert::HighUsage {
                    id: p.id.clone(),
                    name: p.name.clone(),
                    usage_count: p.usage_count,
                    usage_limit: limit,
                });
            }
        }

        let running = now - p.start_date;
        if running >= Duration::days(thresholds.low_performance_after_days)
            && p.usage_count <= thresholds.low_performance_max_uses
        {
            alerts.push(PromotionAlert::LowPerformance {
                id: p.id.clone(),
                name: p.name.clone(),
                usage_count: p.usage_count,
                running_days: running.num_days(),
            });
        }
    }

    alerts
}
