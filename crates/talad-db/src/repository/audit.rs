//! # Promotion Audit Log Repository
//!
//! Append-only record of admin changes and redemptions.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  PromotionAdmin / PricingEngine                                         │
//! │       │  audit.record(entry)      ← returns immediately                 │
//! │       ▼                                                                 │
//! │  DbAuditSink (talad-engine) ── tokio::spawn ──►  append(...)            │
//! │                                                    │                    │
//! │                                                    ▼                    │
//! │                                        INSERT INTO promotion_audit_log  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `promotion_id` is not a foreign key, so history outlives deleted promotions.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use super::ts;
use crate::error::{DbError, DbResult};

/// One stored audit entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditRecord {
    pub id: String,
    pub promotion_id: String,
    /// Wire name of the action, e.g. `promotion_updated`.
    pub action: String,
    pub actor: Option<String>,
    pub detail: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct AuditRow {
    id: String,
    promotion_id: String,
    action: String,
    actor: Option<String>,
    detail: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<AuditRow> for AuditRecord {
    type Error = DbError;

    fn try_from(row: AuditRow) -> DbResult<Self> {
        let detail = serde_json::from_str(&row.detail)
            .map_err(|e| DbError::malformed("AuditRecord", &row.id, e))?;
        Ok(AuditRecord {
            id: row.id,
            promotion_id: row.promotion_id,
            action: row.action,
            actor: row.actor,
            detail,
            created_at: row.created_at,
        })
    }
}

/// Repository for the promotion audit log.
#[derive(Debug, Clone)]
pub struct AuditLogRepository {
    pool: SqlitePool,
}

impl AuditLogRepository {
    pub fn new(pool: SqlitePool) -> Self {
        AuditLogRepository { pool }
    }

    /// Appends an entry and returns it as stored.
    pub async fn append(
        &self,
        promotion_id: &str,
        action: &str,
        actor: Option<&str>,
        detail: &serde_json::Value,
        at: DateTime<Utc>,
    ) -> DbResult<AuditRecord> {
        let record = AuditRecord {
            id: Uuid::new_v4().to_string(),
            promotion_id: promotion_id.to_string(),
            action: action.to_string(),
            actor: actor.map(str::to_string),
            detail: detail.clone(),
            created_at: at,
        };

        debug!(promotion_id = %promotion_id, action = %action, "Appending audit entry");

        sqlx::query(
            r#"
            INSERT INTO promotion_audit_log (id, promotion_id, action, actor, detail, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&record.id)
        .bind(&record.promotion_id)
        .bind(&record.action)
        .bind(&record.actor)
        .bind(serde_json::to_string(&record.detail)?)
        .bind(ts(record.created_at))
        .execute(&self.pool)
        .await?;

        Ok(record)
    }

    /// History of one promotion, oldest first.
    pub async fn for_promotion(&self, promotion_id: &str) -> DbResult<Vec<AuditRecord>> {
        let rows = sqlx::query_as::<_, AuditRow>(
            r#"
            SELECT id, promotion_id, action, actor, detail, created_at
            FROM promotion_audit_log
            WHERE promotion_id = ?1
            ORDER BY created_at ASC, rowid ASC
            "#,
        )
        .bind(promotion_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(AuditRecord::try_from).collect()
    }

}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use chrono::TimeZone;
    use serde_json::json;

    #[tokio::test]
    async fn test_append_and_read_history() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.audit_log();
        let t0 = Utc.with_ymd_and_hms(2026, 2, 1, 8, 0, 0).unwrap();

        repo.append("p1", "promotion_created", Some("admin"), &json!({"name": "ลดต้นปี"}), t0)
            .await
            .unwrap();
        let later = t0 + chrono::Duration::hours(1);
        repo.append("p1", "promotion_used", None, &json!({"usageCount": 1}), later)
            .await
            .unwrap();
        repo.append("p2", "promotion_created", Some("admin"), &json!({}), t0)
            .await
            .unwrap();

        let history = repo.for_promotion("p1").await.unwrap();
        let actions: Vec<&str> = history.iter().map(|r| r.action.as_str()).collect();
        assert_eq!(actions, vec!["promotion_created", "promotion_used"]);
        assert_eq!(history[1].detail["usageCount"], 1);
        assert_eq!(history[0].actor.as_deref(), Some("admin"));
    }
}
