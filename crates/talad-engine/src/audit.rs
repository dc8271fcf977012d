//! # Audit Sink
//!
//! Records who changed or used a promotion. Recording never blocks the
//! caller and a failed write never fails the operation that caused it.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use talad_db::{AuditLogRepository, AuditRecord, DbResult};

/// One audit entry, before it is stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditEntry {
    pub promotion_id: String,
    /// Event wire name, e.g. `promotion_updated`.
    pub action: &'static str,
    pub actor: Option<String>,
    pub detail: serde_json::Value,
    pub at: DateTime<Utc>,
}

impl AuditEntry {
    pub fn new(
        promotion_id: impl Into<String>,
        action: &'static str,
        actor: Option<&str>,
        detail: serde_json::Value,
        at: DateTime<Utc>,
    ) -> Self {
        AuditEntry {
            promotion_id: promotion_id.into(),
            action,
            actor: actor.map(str::to_string),
            detail,
            at,
        }
    }
}

/// Fire-and-forget audit recording.
pub trait AuditSink: Send + Sync {
    fn record(&self, entry: AuditEntry);
}

/// Appends entries to the `promotion_audit_log` table on a spawned task.
#[derive(Debug, Clone)]
pub struct DbAuditSink {
    repo: AuditLogRepository,
}

impl DbAuditSink {
    pub fn new(repo: AuditLogRepository) -> Self {
        DbAuditSink { repo }
    }

    /// Writes one entry and waits for it.
    pub async fn write(&self, entry: &AuditEntry) -> DbResult<AuditRecord> {
        self.repo
            .append(
                &entry.promotion_id,
                entry.action,
                entry.actor.as_deref(),
                &entry.detail,
                entry.at,
            )
            .await
    }
}

impl AuditSink for DbAuditSink {
    fn record(&self, entry: AuditEntry) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!(
                promotion_id = %entry.promotion_id,
                action = entry.action,
                "No async runtime, audit entry dropped"
            );
            return;
        };

        let sink = self.clone();
        handle.spawn(async move {
            if let Err(e) = sink.write(&entry).await {
                warn!(
                    promotion_id = %entry.promotion_id,
                    action = entry.action,
                    error = %e,
                    "Failed to write audit entry"
                );
            }
        });
    }
}

/// Logs entries instead of storing them.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, entry: AuditEntry) {
        info!(
            promotion_id = %entry.promotion_id,
            action = entry.action,
            actor = ?entry.actor,
            detail = %entry.detail,
            "Promotion audit"
        );
    }
}
