//! # Promotion Admin Service
//!
//! Back-office operations on promotion definitions: CRUD, clone, bulk
//! toggle, dry-run rule checks, export, statistics and alerts.
//!
//! ## Write Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  PromotionInput (form JSON, numbers may be strings)                     │
//! │       │ into_draft() / apply_to(stored)                                 │
//! │       ▼                                                                 │
//! │  PromotionDraft ── ValidationErrors ──► EngineError::Validation         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  PromotionStore::insert / update                                        │
//! │       │                                                                 │
//! │       ├──► EventPublisher   promotion_created / promotion_updated ...   │
//! │       └──► AuditSink        same action name, actor, changed fields     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Events and audit entries are emitted only after the store write
//! succeeded.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use talad_core::alerts::{collect_alerts, AlertThresholds, PromotionAlert};
use talad_core::export::{export_promotions, ExportDocument, ExportFormat};
use talad_core::input::PromotionInput;
use talad_core::promotion::clone_promotion;
use talad_core::query::{Page, PromotionFilter, PromotionStatistics, StatusFilter};
use talad_core::validation::{rule_warnings, ConflictSummary, RuleCheck, RuleWarning};
use talad_core::{Promotion, PromotionDraft, Scope, ValidationError};
use talad_db::Database;

use crate::audit::{AuditEntry, AuditSink};
use crate::error::{EngineError, EngineResult, Entity};
use crate::events::{EventPublisher, PromotionEvent};
use crate::store::PromotionStore;

/// Upper bound on a listing page unless configured otherwise.
pub const DEFAULT_MAX_PAGE_SIZE: u32 = 200;

// =============================================================================
// Bulk Toggle Report
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ToggleOutcome {
    Updated,
    /// Already in the requested state.
    Unchanged,
    NotFound,
    Failed { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToggleResult {
    pub id: String,
    #[serde(flatten)]
    pub outcome: ToggleOutcome,
}

/// Per-id results of a bulk toggle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkToggleReport {
    pub is_active: bool,
    pub results: Vec<ToggleResult>,
    /// Ids that resolved to a promotion.
    pub matched: usize,
    /// Promotions whose state actually changed.
    pub modified: usize,
}

// =============================================================================
// Service
// =============================================================================

/// Admin operations over a [`PromotionStore`].
#[derive(Clone)]
pub struct PromotionAdmin {
    store: Arc<dyn PromotionStore>,
    events: Arc<dyn EventPublisher>,
    audit: Arc<dyn AuditSink>,
    thresholds: AlertThresholds,
    max_page_size: u32,
    clock: fn() -> DateTime<Utc>,
}

impl PromotionAdmin {
    pub fn new(
        store: Arc<dyn PromotionStore>,
        events: Arc<dyn EventPublisher>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        PromotionAdmin {
            store,
            events,
            audit,
            thresholds: AlertThresholds::default(),
            max_page_size: DEFAULT_MAX_PAGE_SIZE,
            clock: Utc::now,
        }
    }

    pub fn sqlite(
        db: &Database,
        events: Arc<dyn EventPublisher>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        PromotionAdmin::new(Arc::new(db.promotions()), events, audit)
    }

    pub fn with_thresholds(mut self, thresholds: AlertThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn with_max_page_size(mut self, max: u32) -> Self {
        self.max_page_size = max.max(1);
        self
    }

    /// Replaces the time source.
    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    // =========================================================================
    // CRUD
    // =========================================================================

    #[instrument(skip(self, input))]
    pub async fn create(
        &self,
        input: PromotionInput,
        actor: Option<&str>,
    ) -> EngineResult<Promotion> {
        let now = (self.clock)();
        let draft = input.into_draft()?;
        let promotion = Promotion::from_draft(
            draft,
            uuid::Uuid::new_v4().to_string(),
            actor.map(str::to_string),
            now,
        );

        self.store.insert(&promotion).await?;
        info!(
            id = %promotion.id,
            name = %promotion.name,
            kind = %promotion.promotion_type(),
            "Promotion created"
        );

        self.audit.record(AuditEntry::new(
            &promotion.id,
            "promotion_created",
            actor,
            json!({ "name": promotion.name, "type": promotion.promotion_type() }),
            now,
        ));
        self.events.publish(PromotionEvent::Created {
            promotion: promotion.clone(),
        });
        Ok(promotion)
    }

    /// Merges `input` over the stored definition and saves it.
    ///
    /// The usage counter is never written here, so redemptions racing the
    /// edit are kept.
    #[instrument(skip(self, input))]
    pub async fn update(
        &self,
        id: &str,
        input: PromotionInput,
        actor: Option<&str>,
    ) -> EngineResult<Promotion> {
        let now = (self.clock)();
        let mut promotion = self.require(id).await?;

        let draft = input.apply_to(&promotion.to_draft())?;
        if let Some(limit) = draft.usage_limit {
            if limit < promotion.usage_count {
                return Err(ValidationError::OutOfRange {
                    field: "usageLimit".to_string(),
                    min: promotion.usage_count as i64,
                    max: u32::MAX as i64,
                }
                .into());
            }
        }
        let changed = changed_fields(&promotion.to_draft(), &draft);
        promotion.apply_draft(draft, now);

        self.store.update(&promotion).await?;
        // Re-read so the returned usage count is the stored one
        let promotion = self.require(id).await?;
        info!(id = %promotion.id, changed = ?changed, "Promotion updated");

        self.audit.record(AuditEntry::new(
            &promotion.id,
            "promotion_updated",
            actor,
            json!({ "changed": changed }),
            now,
        ));
        self.events.publish(PromotionEvent::Updated {
            promotion: promotion.clone(),
        });
        Ok(promotion)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: &str, actor: Option<&str>) -> EngineResult<()> {
        let now = (self.clock)();
        let promotion = self.require(id).await?;
        if !self.store.delete(id).await? {
            return Err(EngineError::not_found(Entity::Promotion, id));
        }
        info!(id, name = %promotion.name, "Promotion deleted");

        self.audit.record(AuditEntry::new(
            id,
            "promotion_deleted",
            actor,
            json!({ "name": promotion.name, "usageCount": promotion.usage_count }),
            now,
        ));
        self.events.publish(PromotionEvent::Deleted { id: id.to_string() });
        Ok(())
    }

    pub async fn get(&self, id: &str) -> EngineResult<Promotion> {
        self.require(id).await
    }

    /// Filtered, paginated listing. Page size is capped.
    pub async fn list(&self, filter: PromotionFilter) -> EngineResult<Page<Promotion>> {
        let filter = filter.normalized(self.max_page_size);
        self.store.list(&filter, (self.clock)()).await
    }

    // =========================================================================
    // Clone / Bulk
    // =========================================================================

    /// Disabled copy of a promotion, scheduled to start tomorrow.
    #[instrument(skip(self))]
    pub async fn clone_promotion(&self, id: &str, actor: Option<&str>) -> EngineResult<Promotion> {
        let now = (self.clock)();
        let source = self.require(id).await?;
        let copy = clone_promotion(
            &source,
            uuid::Uuid::new_v4().to_string(),
            actor.map(str::to_string),
            now,
        );

        self.store.insert(&copy).await?;
        info!(source = %source.id, id = %copy.id, "Promotion cloned");

        self.audit.record(AuditEntry::new(
            &copy.id,
            "promotion_cloned",
            actor,
            json!({ "sourceId": source.id }),
            now,
        ));
        self.events.publish(PromotionEvent::Cloned {
            source_id: source.id,
            promotion: copy.clone(),
        });
        Ok(copy)
    }

    /// Enables or disables many promotions. One bad id never aborts the batch.
    #[instrument(skip(self, ids), fields(count = ids.len()))]
    pub async fn bulk_toggle(
        &self,
        ids: &[String],
        is_active: bool,
        actor: Option<&str>,
    ) -> EngineResult<BulkToggleReport> {
        if ids.iter().all(|id| id.trim().is_empty()) {
            return Err(ValidationError::required("promotionIds").into());
        }
        let now = (self.clock)();

        let mut results = Vec::with_capacity(ids.len());
        for id in ids.iter().map(|id| id.trim()).filter(|id| !id.is_empty()) {
            let outcome = self.toggle_one(id, is_active, now).await;
            if let ToggleOutcome::Failed { message } = &outcome {
                warn!(id, error = %message, "Bulk toggle item failed");
            }
            if outcome == ToggleOutcome::Updated {
                self.audit.record(AuditEntry::new(
                    id,
                    "promotions_bulk_updated",
                    actor,
                    json!({ "isActive": is_active }),
                    now,
                ));
            }
            results.push(ToggleResult {
                id: id.to_string(),
                outcome,
            });
        }

        let matched = results
            .iter()
            .filter(|r| matches!(r.outcome, ToggleOutcome::Updated | ToggleOutcome::Unchanged))
            .count();
        let modified = results
            .iter()
            .filter(|r| r.outcome == ToggleOutcome::Updated)
            .count();
        info!(is_active, matched, modified, "Bulk toggle finished");

        self.events.publish(PromotionEvent::BulkToggled {
            is_active,
            matched,
            modified,
        });
        Ok(BulkToggleReport {
            is_active,
            results,
            matched,
            modified,
        })
    }

    async fn toggle_one(&self, id: &str, is_active: bool, now: DateTime<Utc>) -> ToggleOutcome {
        match self.store.get(id).await {
            Ok(None) => ToggleOutcome::NotFound,
            Ok(Some(p)) if p.is_active == is_active => ToggleOutcome::Unchanged,
            Ok(Some(_)) => match self.store.set_active(id, is_active, now).await {
                Ok(true) => ToggleOutcome::Updated,
                // Deleted between the read and the write
                Ok(false) => ToggleOutcome::NotFound,
                Err(e) => ToggleOutcome::Failed { message: e.to_string() },
            },
            Err(e) => ToggleOutcome::Failed { message: e.to_string() },
        }
    }

    // =========================================================================
    // Checks / Reporting
    // =========================================================================

    /// Dry-run validation with warnings and schedule conflicts.
    ///
    /// With `exclude_id` the input is merged over that stored promotion, as
    /// an update would be, and the promotion is left out of the conflicts.
    pub async fn validate_rules(
        &self,
        input: PromotionInput,
        exclude_id: Option<&str>,
    ) -> EngineResult<RuleCheck> {
        let now = (self.clock)();
        let base = match exclude_id {
            Some(id) => Some(self.require(id).await?.to_draft()),
            None => None,
        };
        let draft = match base {
            Some(base) => input.apply_to(&base),
            None => input.into_draft(),
        };
        let draft = match draft {
            Ok(draft) => draft,
            Err(errors) => {
                return Ok(RuleCheck {
                    errors: errors.into_vec(),
                    ..Default::default()
                })
            }
        };

        let mut warnings = rule_warnings(&draft, now);
        let conflicts = self.conflicts_for(&draft, exclude_id).await?;
        if !conflicts.is_empty() {
            warnings.push(RuleWarning::ScheduleConflict {
                count: conflicts.len(),
            });
        }
        Ok(RuleCheck {
            errors: Vec::new(),
            warnings,
            conflicts,
        })
    }

    async fn conflicts_for(
        &self,
        draft: &PromotionDraft,
        exclude_id: Option<&str>,
    ) -> EngineResult<Vec<ConflictSummary>> {
        let Scope::RestrictedTo(ids) = &draft.applicable_products else {
            return Ok(Vec::new());
        };
        let products: Vec<String> = ids.iter().cloned().collect();
        let found = self
            .store
            .check_schedule_conflicts(&products, draft.start_date, draft.end_date, exclude_id)
            .await?;
        Ok(found.iter().map(ConflictSummary::from).collect())
    }

    /// Every promotion matching the filter, as a CSV or JSON document.
    #[instrument(skip(self, filter))]
    pub async fn export(
        &self,
        filter: PromotionFilter,
        format: ExportFormat,
    ) -> EngineResult<ExportDocument> {
        let now = (self.clock)();
        let page = self.store.list(&filter.unpaged(), now).await?;
        let document = export_promotions(&page.items, format, now)
            .map_err(|e| EngineError::Internal(e.to_string()))?;
        info!(rows = page.items.len(), file = %document.file_name, "Promotions exported");
        Ok(document)
    }

    pub async fn statistics(&self, branch_code: Option<&str>) -> EngineResult<PromotionStatistics> {
        self.store.statistics(branch_code, (self.clock)()).await
    }

    /// Expiry, high-usage and low-performance alerts for active promotions.
    pub async fn alerts(&self) -> EngineResult<Vec<PromotionAlert>> {
        let now = (self.clock)();
        let filter = PromotionFilter {
            status: Some(StatusFilter::Active),
            ..Default::default()
        };
        let active = self.store.list(&filter.unpaged(), now).await?;
        Ok(collect_alerts(&active.items, now, &self.thresholds))
    }

    async fn require(&self, id: &str) -> EngineResult<Promotion> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| EngineError::not_found(Entity::Promotion, id))
    }
}

/// Names of the editable fields that differ between two drafts.
fn changed_fields(before: &PromotionDraft, after: &PromotionDraft) -> Vec<&'static str> {
    let mut changed = Vec::new();
    let mut check = |name: &'static str, differs: bool| {
        if differs {
            changed.push(name);
        }
    };
    check("name", before.name != after.name);
    check("description", before.description != after.description);
    check("rule", before.rule != after.rule);
    check("applicableProducts", before.applicable_products != after.applicable_products);
    check("applicableCategories", before.applicable_categories != after.applicable_categories);
    check("applicableBranches", before.applicable_branches != after.applicable_branches);
    check("startDate", before.start_date != after.start_date);
    check("endDate", before.end_date != after.end_date);
    check("isActive", before.is_active != after.is_active);
    check("usageLimit", before.usage_limit != after.usage_limit);
    check("priority", before.priority != after.priority);
    check("conditions", before.conditions != after.conditions);
    check("tags", before.tags != after.tags);
    check("notes", before.notes != after.notes);
    changed
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fixed_now, fixture, percent_off};
    use chrono::Duration;
    use serde_json::Value;
    use talad_core::promotion::CLONE_SUFFIX;
    use talad_core::DiscountRule;

    fn input(value: Value) -> PromotionInput {
        serde_json::from_value(value).unwrap()
    }

    fn flash_sale() -> PromotionInput {
        input(json!({
            "name": "Flash sale",
            "type": "discount_percentage",
            "discountValue": "15",
            "applicableProducts": ["prod-phone"],
            "applicableBranches": ["BKK01"],
            "startDate": "2026-03-01",
            "endDate": "2026-03-31",
            "usageLimit": "100",
            "priority": 10
        }))
    }

    #[tokio::test]
    async fn test_create_coerces_form_input() {
        let fx = fixture().await;
        let mut events = fx.events.subscribe();

        let created = fx.admin.create(flash_sale(), Some("manager")).await.unwrap();
        assert_eq!(created.rule, DiscountRule::DiscountPercentage { percent_bps: 1500 });
        assert_eq!(created.usage_limit, Some(100));
        assert_eq!(created.created_by.as_deref(), Some("manager"));

        let stored = fx.admin.get(&created.id).await.unwrap();
        assert_eq!(stored, created);
        assert_eq!(events.recv().await.unwrap().name(), "promotion_created");
        assert_eq!(fx.audit.actions(), vec!["promotion_created"]);
    }

    #[tokio::test]
    async fn test_create_reports_every_invalid_field() {
        let fx = fixture().await;
        let err = fx
            .admin
            .create(
                input(json!({
                    "name": "",
                    "type": "discount_amount",
                    "discountValue": "abc",
                    "priority": 0
                })),
                None,
            )
            .await
            .unwrap_err();
        let EngineError::Validation(errors) = err else {
            panic!("expected validation error");
        };
        assert!(errors.has_field("name"));
        assert!(errors.has_field("priority"));
        assert!(errors.has_field("discountValue"));
        assert!(errors.has_field("startDate"));
        assert!(errors.has_field("endDate"));
        assert_eq!(fx.admin.list(PromotionFilter::default()).await.unwrap().total, 0);
    }

    #[tokio::test]
    async fn test_update_merges_and_keeps_usage() {
        let fx = fixture().await;
        let created = fx.admin.create(flash_sale(), None).await.unwrap();
        fx.engine.use_promotion(&created.id, None).await.unwrap();

        let updated = fx
            .admin
            .update(
                &created.id,
                input(json!({ "name": "Flash sale II", "discountValue": 20 })),
                Some("manager"),
            )
            .await
            .unwrap();
        assert_eq!(updated.name, "Flash sale II");
        assert_eq!(updated.rule, DiscountRule::DiscountPercentage { percent_bps: 2000 });
        assert_eq!(updated.usage_count, 1);
        assert_eq!(updated.applicable_branches, created.applicable_branches);
    }

    #[tokio::test]
    async fn test_update_rejects_limit_below_usage() {
        let fx = fixture().await;
        let created = fx.admin.create(flash_sale(), None).await.unwrap();
        fx.engine.use_promotion(&created.id, None).await.unwrap();
        fx.engine.use_promotion(&created.id, None).await.unwrap();

        let err = fx
            .admin
            .update(&created.id, input(json!({ "usageLimit": 1 })), None)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(ref e) if e.has_field("usageLimit")));

        let err = fx
            .admin
            .update(&created.id, input(json!({ "endDate": "2026-02-01" })), None)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }

    #[tokio::test]
    async fn test_delete_missing_is_not_found() {
        let fx = fixture().await;
        let created = fx.admin.create(flash_sale(), None).await.unwrap();

        fx.admin.delete(&created.id, None).await.unwrap();
        let err = fx.admin.delete(&created.id, None).await.unwrap_err();
        assert!(matches!(err, EngineError::NotFound { entity: Entity::Promotion, .. }));
    }

    #[tokio::test]
    async fn test_clone_is_disabled_copy_starting_tomorrow() {
        let fx = fixture().await;
        let mut source = percent_off("src", 5, 1000);
        source.usage_count = 7;
        source.end_date = source.start_date + Duration::days(10);
        fx.add_promotion(&source).await;

        let copy = fx.admin.clone_promotion("src", Some("manager")).await.unwrap();
        assert_ne!(copy.id, "src");
        assert_eq!(copy.name, format!("{}{}", source.name, CLONE_SUFFIX));
        assert!(!copy.is_active);
        assert_eq!(copy.usage_count, 0);
        assert_eq!(copy.start_date, fixed_now() + Duration::days(1));
        assert_eq!(copy.duration(), Duration::days(10));
        assert_eq!(copy.rule, source.rule);

        let err = fx.admin.clone_promotion("nope", None).await.unwrap_err();
        assert!(matches!(err, EngineError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_bulk_toggle_partial_success() {
        let fx = fixture().await;
        fx.add_promotion(&percent_off("a", 1, 1000)).await;
        let mut off = percent_off("b", 1, 1000);
        off.is_active = false;
        fx.add_promotion(&off).await;
        let mut events = fx.events.subscribe();

        let ids = vec!["a".to_string(), "b".to_string(), "ghost".to_string()];
        let report = fx.admin.bulk_toggle(&ids, false, Some("manager")).await.unwrap();

        let outcomes: Vec<&ToggleOutcome> = report.results.iter().map(|r| &r.outcome).collect();
        assert_eq!(
            outcomes,
            vec![&ToggleOutcome::Updated, &ToggleOutcome::Unchanged, &ToggleOutcome::NotFound]
        );
        assert_eq!(report.matched, 2);
        assert_eq!(report.modified, 1);
        assert!(!fx.admin.get("a").await.unwrap().is_active);
        assert_eq!(events.recv().await.unwrap().name(), "promotions_bulk_updated");

        let err = fx.admin.bulk_toggle(&[], true, None).await.unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }

    #[tokio::test]
    async fn test_validate_rules_reports_conflicts() {
        let fx = fixture().await;
        let mut existing = percent_off("existing", 1, 1000);
        existing.applicable_products = Scope::restricted(["prod-phone"]);
        fx.add_promotion(&existing).await;

        let check = fx.admin.validate_rules(flash_sale(), None).await.unwrap();
        assert!(check.is_valid());
        assert_eq!(check.conflicts.len(), 1);
        assert_eq!(check.conflicts[0].id, "existing");
        assert!(check.warnings.contains(&RuleWarning::ScheduleConflict { count: 1 }));

        // The promotion itself is not its own conflict
        let check = fx
            .admin
            .validate_rules(input(json!({})), Some("existing"))
            .await
            .unwrap();
        assert!(check.conflicts.is_empty());

        let check = fx
            .admin
            .validate_rules(input(json!({ "name": "x" })), None)
            .await
            .unwrap();
        assert!(!check.is_valid());
    }

    #[tokio::test]
    async fn test_export_and_alerts() {
        let fx = fixture().await;
        let mut expiring = percent_off("soon", 1, 1000);
        expiring.end_date = fixed_now() + Duration::days(2);
        fx.add_promotion(&expiring).await;
        let mut hot = percent_off("hot", 2, 1000);
        hot.usage_limit = Some(10);
        hot.usage_count = 9;
        fx.add_promotion(&hot).await;

        let doc = fx
            .admin
            .export(PromotionFilter::default(), ExportFormat::Csv)
            .await
            .unwrap();
        assert!(doc.content.contains("ชื่อโปรโมชั่น"));
        assert_eq!(doc.content.lines().count(), 3);

        let alerts = fx.admin.alerts().await.unwrap();
        assert!(alerts
            .iter()
            .any(|a| matches!(a, PromotionAlert::ExpiringSoon { id, .. } if id == "soon")));
        assert!(alerts
            .iter()
            .any(|a| matches!(a, PromotionAlert::HighUsage { id, .. } if id == "hot")));

        let stats = fx.admin.statistics(None).await.unwrap();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.total_usage, 9);
    }
}
