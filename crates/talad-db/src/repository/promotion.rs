//! # Promotion Repository
//!
//! The promotion store: CRUD, the candidate queries the pricing engine
//! runs, and the atomic usage increment.
//!
//! ## Usage Increment
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Checkout A ─┐                                                          │
//! │              ├──► UPDATE promotions                                     │
//! │  Checkout B ─┘       SET usage_count = usage_count + 1                  │
//! │                      WHERE id = ? AND is_active = 1                     │
//! │                        AND start_date <= now AND end_date >= now        │
//! │                        AND (usage_limit IS NULL                         │
//! │                             OR usage_count < usage_limit)               │
//! │                      RETURNING *                                        │
//! │                                                                         │
//! │  SQLite runs one writer at a time, so the check and the increment are   │
//! │  a single step. A row back means success. No row means the promotion   │
//! │  is missing, exhausted or unavailable; a follow-up read says which.    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Branch Scope in SQL
//! Scopes are JSON arrays. A promotion is open to branch `B` when its
//! `applicable_branches` array is empty or `json_each` yields `B`.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use std::collections::BTreeSet;
use tracing::{debug, info};

use talad_core::matching::match_stock_item;
use talad_core::query::{
    ActiveCriteria, ItemPromotions, MatchedPromotion, Page, PromotionFilter, PromotionStatistics,
    StatusFilter, UsageRank,
};
use talad_core::{Availability, BranchStockItem, Conditions, Money, Promotion, Scope};

use super::catalog::CatalogRepository;
use super::ts;
use crate::error::{DbError, DbResult};

/// SQL predicate: promotion open to the branch bound at this placeholder.
const BRANCH_OPEN: &str = "(json_array_length(applicable_branches) = 0 \
     OR EXISTS (SELECT 1 FROM json_each(promotions.applicable_branches) AS b WHERE b.value = ";

/// Outcome of [`PromotionRepository::increment_usage`].
#[derive(Debug, Clone, PartialEq)]
pub enum UsageIncrement {
    /// Counted; the promotion as stored after the increment.
    Applied(Promotion),
    NotFound,
    /// Limit already reached.
    Exhausted { limit: u32 },
    /// Disabled, scheduled or expired.
    Unavailable(Availability),
}

// =============================================================================
// Row Mapping
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct PromotionRow {
    id: String,
    name: String,
    description: Option<String>,
    promo_type: String,
    rule: String,
    applicable_products: String,
    applicable_categories: String,
    applicable_branches: String,
    start_date: DateTime<Utc>,
    end_date: DateTime<Utc>,
    is_active: bool,
    usage_count: i64,
    usage_limit: Option<i64>,
    priority: i64,
    min_purchase_satang: Option<i64>,
    max_discount_satang: Option<i64>,
    tags: String,
    notes: Option<String>,
    created_by: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

fn decode_json<T: DeserializeOwned>(id: &str, column: &str, raw: &str) -> DbResult<T> {
    serde_json::from_str(raw)
        .map_err(|e| DbError::malformed("Promotion", id, format!("{}: {}", column, e)))
}

impl TryFrom<PromotionRow> for Promotion {
    type Error = DbError;

    fn try_from(row: PromotionRow) -> DbResult<Self> {
        let id = row.id;
        let rule: talad_core::DiscountRule = decode_json(&id, "rule", &row.rule)?;
        if rule.promotion_type().as_str() != row.promo_type {
            return Err(DbError::malformed(
                "Promotion",
                &id,
                format!("promo_type {} does not match rule", row.promo_type),
            ));
        }
        let applicable_products: Scope =
            decode_json(&id, "applicable_products", &row.applicable_products)?;
        let applicable_categories: Scope =
            decode_json(&id, "applicable_categories", &row.applicable_categories)?;
        let applicable_branches: Scope =
            decode_json(&id, "applicable_branches", &row.applicable_branches)?;
        let tags: Vec<String> = decode_json(&id, "tags", &row.tags)?;

        let usage_count = u32::try_from(row.usage_count)
            .map_err(|e| DbError::malformed("Promotion", &id, e))?;
        let usage_limit = row
            .usage_limit
            .map(u32::try_from)
            .transpose()
            .map_err(|e| DbError::malformed("Promotion", &id, e))?;
        let priority =
            i32::try_from(row.priority).map_err(|e| DbError::malformed("Promotion", &id, e))?;

        Ok(Promotion {
            id,
            name: row.name,
            description: row.description,
            rule,
            applicable_products,
            applicable_categories,
            applicable_branches,
            start_date: row.start_date,
            end_date: row.end_date,
            is_active: row.is_active,
            usage_count,
            usage_limit,
            priority,
            conditions: Conditions {
                min_purchase: row.min_purchase_satang.map(Money::from_satang),
                max_discount: row.max_discount_satang.map(Money::from_satang),
            },
            tags,
            notes: row.notes,
            created_by: row.created_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn decode_all(rows: Vec<PromotionRow>) -> DbResult<Vec<Promotion>> {
    rows.into_iter().map(Promotion::try_from).collect()
}

/// JSON columns of a promotion, encoded once per write.
struct Encoded {
    rule: String,
    products: String,
    categories: String,
    branches: String,
    tags: String,
}

impl Encoded {
    fn of(p: &Promotion) -> DbResult<Self> {
        Ok(Encoded {
            rule: serde_json::to_string(&p.rule)?,
            products: serde_json::to_string(&p.applicable_products)?,
            categories: serde_json::to_string(&p.applicable_categories)?,
            branches: serde_json::to_string(&p.applicable_branches)?,
            tags: serde_json::to_string(&p.tags)?,
        })
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for promotion definitions.
#[derive(Debug, Clone)]
pub struct PromotionRepository {
    pool: SqlitePool,
}

impl PromotionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        PromotionRepository { pool }
    }

    /// Inserts a new promotion.
    pub async fn insert(&self, p: &Promotion) -> DbResult<()> {
        debug!(id = %p.id, name = %p.name, "Inserting promotion");
        let enc = Encoded::of(p)?;

        sqlx::query(
            r#"
            INSERT INTO promotions (
                id, name, description, promo_type, rule,
                applicable_products, applicable_categories, applicable_branches,
                start_date, end_date, is_active, usage_count, usage_limit, priority,
                min_purchase_satang, max_discount_satang, tags, notes,
                created_by, created_at, updated_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5,
                ?6, ?7, ?8,
                ?9, ?10, ?11, ?12, ?13, ?14,
                ?15, ?16, ?17, ?18,
                ?19, ?20, ?21
            )
            "#,
        )
        .bind(&p.id)
        .bind(&p.name)
        .bind(&p.description)
        .bind(p.promotion_type().as_str())
        .bind(&enc.rule)
        .bind(&enc.products)
        .bind(&enc.categories)
        .bind(&enc.branches)
        .bind(ts(p.start_date))
        .bind(ts(p.end_date))
        .bind(p.is_active)
        .bind(p.usage_count as i64)
        .bind(p.usage_limit.map(i64::from))
        .bind(p.priority as i64)
        .bind(p.conditions.min_purchase.map(|m| m.satang()))
        .bind(p.conditions.max_discount.map(|m| m.satang()))
        .bind(&enc.tags)
        .bind(&p.notes)
        .bind(&p.created_by)
        .bind(ts(p.created_at))
        .bind(ts(p.updated_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Promotion>> {
        let row = sqlx::query_as::<_, PromotionRow>("SELECT * FROM promotions WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Promotion::try_from).transpose()
    }

    /// Writes the editable fields of `p`.
    ///
    /// `usage_count` is never written here: redemptions that land between
    /// the admin's read and this write must not be lost.
    pub async fn update(&self, p: &Promotion) -> DbResult<()> {
        debug!(id = %p.id, "Updating promotion");
        let enc = Encoded::of(p)?;

        let result = sqlx::query(
            r#"
            UPDATE promotions SET
                name = ?2,
                description = ?3,
                promo_type = ?4,
                rule = ?5,
                applicable_products = ?6,
                applicable_categories = ?7,
                applicable_branches = ?8,
                start_date = ?9,
                end_date = ?10,
                is_active = ?11,
                usage_limit = ?12,
                priority = ?13,
                min_purchase_satang = ?14,
                max_discount_satang = ?15,
                tags = ?16,
                notes = ?17,
                updated_at = ?18
            WHERE id = ?1
            "#,
        )
        .bind(&p.id)
        .bind(&p.name)
        .bind(&p.description)
        .bind(p.promotion_type().as_str())
        .bind(&enc.rule)
        .bind(&enc.products)
        .bind(&enc.categories)
        .bind(&enc.branches)
        .bind(ts(p.start_date))
        .bind(ts(p.end_date))
        .bind(p.is_active)
        .bind(p.usage_limit.map(i64::from))
        .bind(p.priority as i64)
        .bind(p.conditions.min_purchase.map(|m| m.satang()))
        .bind(p.conditions.max_discount.map(|m| m.satang()))
        .bind(&enc.tags)
        .bind(&p.notes)
        .bind(ts(p.updated_at))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Promotion", &p.id));
        }
        Ok(())
    }

    /// Hard-deletes a promotion. Returns false when it did not exist.
    pub async fn delete(&self, id: &str) -> DbResult<bool> {
        info!(id = %id, "Deleting promotion");
        let result = sqlx::query("DELETE FROM promotions WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Flips `is_active`. Returns false when the promotion does not exist.
    pub async fn set_active(
        &self,
        id: &str,
        is_active: bool,
        now: DateTime<Utc>,
    ) -> DbResult<bool> {
        let result =
            sqlx::query("UPDATE promotions SET is_active = ?2, updated_at = ?3 WHERE id = ?1")
                .bind(id)
                .bind(is_active)
                .bind(ts(now))
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Pages through promotions matching `filter`.
    ///
    /// Sorted by priority, newest first within a priority.
    pub async fn list(
        &self,
        filter: &PromotionFilter,
        now: DateTime<Utc>,
    ) -> DbResult<Page<Promotion>> {
        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM promotions");
        push_filter(&mut count, filter, now);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::<Sqlite>::new("SELECT * FROM promotions");
        push_filter(&mut select, filter, now);
        select
            .push(" ORDER BY priority ASC, created_at DESC, id ASC LIMIT ")
            .push_bind(i64::from(filter.limit))
            .push(" OFFSET ")
            .push_bind(filter.offset() as i64);
        let rows: Vec<PromotionRow> = select.build_query_as().fetch_all(&self.pool).await?;

        Ok(Page {
            items: decode_all(rows)?,
            total: total.max(0) as u64,
            page: filter.page,
            limit: filter.limit,
        })
    }

    /// Enabled promotions inside their window and open to the branch.
    ///
    /// Product and category scopes are left to the caller. Ordered by
    /// priority, then creation time, then id.
    pub async fn find_active(
        &self,
        criteria: &ActiveCriteria,
        now: DateTime<Utc>,
    ) -> DbResult<Vec<Promotion>> {
        let sql = format!(
            "SELECT * FROM promotions \
             WHERE is_active = 1 AND start_date <= ?1 AND end_date >= ?1 \
               AND (?2 IS NULL OR {}?2))) \
             ORDER BY priority ASC, created_at ASC, id ASC",
            BRANCH_OPEN
        );
        let rows = sqlx::query_as::<_, PromotionRow>(&sql)
            .bind(ts(now))
            .bind(criteria.branch_code.as_deref())
            .fetch_all(&self.pool)
            .await?;

        debug!(
            branch = ?criteria.branch_code,
            candidates = rows.len(),
            "Active promotions fetched"
        );
        decode_all(rows)
    }

    /// Applicable promotions per stock item, matched by name then product id.
    ///
    /// Items with no applicable promotion are returned with an empty list.
    pub async fn find_applicable(
        &self,
        items: &[BranchStockItem],
        branch_code: &str,
        now: DateTime<Utc>,
    ) -> DbResult<Vec<ItemPromotions>> {
        let criteria = ActiveCriteria {
            branch_code: Some(branch_code.to_string()),
            ..Default::default()
        };
        let candidates = self.find_active(&criteria, now).await?;

        let referenced: BTreeSet<String> = candidates
            .iter()
            .flat_map(|p| p.applicable_products.ids().cloned())
            .collect();
        let names = CatalogRepository::new(self.pool.clone())
            .product_names(&referenced.into_iter().collect::<Vec<_>>())
            .await?;

        Ok(items
            .iter()
            .map(|item| ItemPromotions {
                stock_id: item.id.clone(),
                promotions: candidates
                    .iter()
                    .filter_map(|p| {
                        match_stock_item(p, item, &names).map(|matched_by| MatchedPromotion {
                            promotion: p.clone(),
                            matched_by,
                        })
                    })
                    .collect(),
            })
            .collect())
    }

    /// Counts one use of the promotion if it is usable right now.
    pub async fn increment_usage(&self, id: &str, now: DateTime<Utc>) -> DbResult<UsageIncrement> {
        let row = sqlx::query_as::<_, PromotionRow>(
            r#"
            UPDATE promotions
            SET usage_count = usage_count + 1, updated_at = ?2
            WHERE id = ?1
              AND is_active = 1
              AND start_date <= ?2
              AND end_date >= ?2
              AND (usage_limit IS NULL OR usage_count < usage_limit)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(ts(now))
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = row {
            let promotion = Promotion::try_from(row)?;
            info!(id = %id, usage_count = promotion.usage_count, "Promotion usage recorded");
            return Ok(UsageIncrement::Applied(promotion));
        }

        let Some(current) = self.get_by_id(id).await? else {
            return Ok(UsageIncrement::NotFound);
        };
        let outcome = match current.availability(now) {
            Availability::Exhausted => UsageIncrement::Exhausted {
                limit: current.usage_limit.unwrap_or(current.usage_count),
            },
            // Changed between the update and this read; report it as unusable
            other => UsageIncrement::Unavailable(other),
        };
        debug!(id = %id, outcome = ?outcome, "Promotion usage rejected");
        Ok(outcome)
    }

    /// Other enabled promotions overlapping `[start, end]` that name any of `products`.
    pub async fn check_schedule_conflicts(
        &self,
        products: &[String],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        exclude_id: Option<&str>,
    ) -> DbResult<Vec<Promotion>> {
        if products.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query_as::<_, PromotionRow>(
            r#"
            SELECT * FROM promotions
            WHERE is_active = 1
              AND start_date <= ?1
              AND end_date >= ?2
              AND (?3 IS NULL OR id <> ?3)
              AND json_array_length(applicable_products) > 0
            ORDER BY priority ASC, created_at ASC
            "#,
        )
        .bind(ts(end))
        .bind(ts(start))
        .bind(exclude_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(decode_all(rows)?
            .into_iter()
            .filter(|p| p.applicable_products.overlaps_explicitly(products))
            .collect())
    }

    /// Dashboard counts, optionally limited to promotions open to a branch.
    pub async fn statistics(
        &self,
        branch_code: Option<&str>,
        now: DateTime<Utc>,
    ) -> DbResult<PromotionStatistics> {
        #[derive(sqlx::FromRow)]
        struct Counts {
            total: i64,
            active: i64,
            expired: i64,
            upcoming: i64,
            inactive: i64,
            total_usage: i64,
        }

        let sql = format!(
            "SELECT COUNT(*) AS total, \
               COALESCE(SUM(CASE WHEN is_active = 1 AND start_date <= ?1 AND end_date >= ?1 \
                 THEN 1 ELSE 0 END), 0) AS active, \
               COALESCE(SUM(CASE WHEN end_date < ?1 THEN 1 ELSE 0 END), 0) AS expired, \
               COALESCE(SUM(CASE WHEN start_date > ?1 THEN 1 ELSE 0 END), 0) AS upcoming, \
               COALESCE(SUM(CASE WHEN is_active = 0 THEN 1 ELSE 0 END), 0) AS inactive, \
               COALESCE(SUM(usage_count), 0) AS total_usage \
             FROM promotions WHERE (?2 IS NULL OR {}?2)))",
            BRANCH_OPEN
        );
        let counts = sqlx::query_as::<_, Counts>(&sql)
            .bind(ts(now))
            .bind(branch_code)
            .fetch_one(&self.pool)
            .await?;

        let top_sql = format!(
            "SELECT * FROM promotions WHERE (?1 IS NULL OR {}?1))) \
             ORDER BY usage_count DESC, priority ASC LIMIT 5",
            BRANCH_OPEN
        );
        let top_rows = sqlx::query_as::<_, PromotionRow>(&top_sql)
            .bind(branch_code)
            .fetch_all(&self.pool)
            .await?;

        let top_used = decode_all(top_rows)?
            .into_iter()
            .map(|p| UsageRank {
                promotion_type: p.promotion_type(),
                id: p.id,
                name: p.name,
                usage_count: p.usage_count,
                usage_limit: p.usage_limit,
            })
            .collect();

        Ok(PromotionStatistics {
            total: counts.total.max(0) as u64,
            active: counts.active.max(0) as u64,
            expired: counts.expired.max(0) as u64,
            upcoming: counts.upcoming.max(0) as u64,
            inactive: counts.inactive.max(0) as u64,
            total_usage: counts.total_usage.max(0) as u64,
            top_used,
        })
    }
}

/// Appends the WHERE clause for a listing filter. Conditions are ANDed.
fn push_filter(qb: &mut QueryBuilder<'_, Sqlite>, filter: &PromotionFilter, now: DateTime<Utc>) {
    let now = ts(now);
    qb.push(" WHERE 1 = 1");

    match filter.status {
        Some(StatusFilter::Active) => {
            qb.push(" AND is_active = 1 AND start_date <= ")
                .push_bind(now.clone())
                .push(" AND end_date >= ")
                .push_bind(now);
        }
        Some(StatusFilter::Expired) => {
            qb.push(" AND end_date < ").push_bind(now);
        }
        Some(StatusFilter::Upcoming) => {
            qb.push(" AND start_date > ").push_bind(now);
        }
        Some(StatusFilter::Inactive) => {
            qb.push(" AND is_active = 0");
        }
        None => {}
    }

    if let Some(t) = filter.promotion_type {
        qb.push(" AND promo_type = ").push_bind(t.as_str());
    }
    if let Some(branch) = &filter.branch_code {
        qb.push(" AND ")
            .push(BRANCH_OPEN)
            .push_bind(branch.clone())
            .push("))");
    }
    if let Some(from) = filter.from {
        qb.push(" AND end_date >= ").push_bind(ts(from));
    }
    if let Some(to) = filter.to {
        qb.push(" AND start_date <= ").push_bind(ts(to));
    }
    if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let escaped = search
            .replace('\\', "\\\\")
            .replace('%', "\\%")
            .replace('_', "\\_");
        qb.push(" AND name LIKE ")
            .push_bind(format!("%{}%", escaped))
            .push(" ESCAPE '\\'");
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use chrono::{Duration, TimeZone};
    use talad_core::{DiscountRule, ProductModel};

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, day, 0, 0, 0).unwrap()
    }

    fn promotion(id: &str, priority: i32) -> Promotion {
        Promotion {
            id: id.to_string(),
            name: format!("Promo {}", id),
            description: None,
            rule: DiscountRule::DiscountPercentage { percent_bps: 1000 },
            applicable_products: Scope::Universal,
            applicable_categories: Scope::Universal,
            applicable_branches: Scope::Universal,
            start_date: at(1),
            end_date: at(20),
            is_active: true,
            usage_count: 0,
            usage_limit: None,
            priority,
            conditions: Conditions::default(),
            tags: vec!["summer".to_string()],
            notes: None,
            created_by: Some("admin".to_string()),
            created_at: at(1),
            updated_at: at(1),
        }
    }

    async fn repo() -> PromotionRepository {
        Database::new(DbConfig::in_memory()).await.unwrap().promotions()
    }

    #[tokio::test]
    async fn test_insert_and_get_roundtrip() {
        let repo = repo().await;
        let mut p = promotion("p1", 10);
        p.applicable_branches = Scope::restricted(["BKK01"]);
        p.conditions.min_purchase = Some(Money::from_satang(100_000));
        p.usage_limit = Some(50);
        repo.insert(&p).await.unwrap();

        let loaded = repo.get_by_id("p1").await.unwrap().unwrap();
        assert_eq!(loaded, p);
        assert!(repo.get_by_id("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_find_active_filters_window_flag_and_branch() {
        let repo = repo().await;
        let mut bkk = promotion("bkk", 5);
        bkk.applicable_branches = Scope::restricted(["BKK01"]);
        let mut cnx = promotion("cnx", 5);
        cnx.applicable_branches = Scope::restricted(["CNX02"]);
        let mut off = promotion("off", 5);
        off.is_active = false;
        let mut later = promotion("later", 5);
        later.start_date = at(15);
        let everywhere = promotion("everywhere", 1);

        for p in [&bkk, &cnx, &off, &later, &everywhere] {
            repo.insert(p).await.unwrap();
        }

        let criteria = ActiveCriteria {
            branch_code: Some("BKK01".to_string()),
            ..Default::default()
        };
        let ids: Vec<String> = repo
            .find_active(&criteria, at(10))
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, vec!["everywhere".to_string(), "bkk".to_string()]);
    }

    #[tokio::test]
    async fn test_increment_usage_respects_limit() {
        let repo = repo().await;
        let mut p = promotion("capped", 1);
        p.usage_limit = Some(2);
        repo.insert(&p).await.unwrap();

        for expected in 1..=2 {
            match repo.increment_usage("capped", at(10)).await.unwrap() {
                UsageIncrement::Applied(p) => assert_eq!(p.usage_count, expected),
                other => panic!("unexpected {:?}", other),
            }
        }
        assert_eq!(
            repo.increment_usage("capped", at(10)).await.unwrap(),
            UsageIncrement::Exhausted { limit: 2 }
        );
        assert_eq!(
            repo.increment_usage("capped", at(25)).await.unwrap(),
            UsageIncrement::Unavailable(Availability::Expired)
        );
        assert_eq!(
            repo.increment_usage("nope", at(10)).await.unwrap(),
            UsageIncrement::NotFound
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_increments_never_oversell() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(DbConfig::new(dir.path().join("race.db")).max_connections(8))
            .await
            .unwrap();
        let repo = db.promotions();

        const LIMIT: u32 = 10;
        let mut p = promotion("flash", 1);
        p.usage_limit = Some(LIMIT);
        repo.insert(&p).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..LIMIT + 5 {
            let repo = repo.clone();
            handles.push(tokio::spawn(async move {
                repo.increment_usage("flash", at(10)).await.unwrap()
            }));
        }

        let mut applied = 0;
        let mut exhausted = 0;
        for handle in handles {
            match handle.await.unwrap() {
                UsageIncrement::Applied(_) => applied += 1,
                UsageIncrement::Exhausted { limit } => {
                    assert_eq!(limit, LIMIT);
                    exhausted += 1;
                }
                other => panic!("unexpected {:?}", other),
            }
        }

        assert_eq!(applied, LIMIT);
        assert_eq!(exhausted, 5);
        let stored = repo.get_by_id("flash").await.unwrap().unwrap();
        assert_eq!(stored.usage_count, LIMIT);
    }

    #[tokio::test]
    async fn test_update_does_not_touch_usage_count() {
        let repo = repo().await;
        let p = promotion("p1", 10);
        repo.insert(&p).await.unwrap();
        repo.increment_usage("p1", at(10)).await.unwrap();

        let mut stale = p.clone();
        stale.name = "Renamed".to_string();
        repo.update(&stale).await.unwrap();

        let loaded = repo.get_by_id("p1").await.unwrap().unwrap();
        assert_eq!(loaded.name, "Renamed");
        assert_eq!(loaded.usage_count, 1);

        let ghost = promotion("ghost", 1);
        assert!(matches!(repo.update(&ghost).await, Err(DbError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_list_filters_and_pages() {
        let repo = repo().await;
        for i in 0..5 {
            let mut p = promotion(&format!("p{}", i), 100);
            p.created_at = at(1) + Duration::hours(i);
            repo.insert(&p).await.unwrap();
        }
        let mut expired = promotion("old", 100);
        expired.end_date = at(3);
        repo.insert(&expired).await.unwrap();

        let filter = PromotionFilter {
            status: Some(StatusFilter::Active),
            limit: 2,
            page: 2,
            ..Default::default()
        };
        let page = repo.list(&filter, at(10)).await.unwrap();
        assert_eq!(page.total, 5);
        let ids: Vec<&str> = page.items.iter().map(|p| p.id.as_str()).collect();
        // Newest first within the same priority
        assert_eq!(ids, vec!["p2", "p1"]);

        let search = PromotionFilter {
            search: Some("promo OLD".to_string()),
            ..Default::default()
        };
        assert_eq!(repo.list(&search, at(10)).await.unwrap().total, 1);
    }

    #[tokio::test]
    async fn test_schedule_conflicts() {
        let repo = repo().await;
        let mut phones = promotion("phones", 1);
        phones.applicable_products = Scope::restricted(["prod-a", "prod-b"]);
        let universal = promotion("all", 1);
        let mut elsewhere = promotion("later", 1);
        elsewhere.applicable_products = Scope::restricted(["prod-a"]);
        elsewhere.start_date = at(25);
        elsewhere.end_date = at(28);
        for p in [&phones, &universal, &elsewhere] {
            repo.insert(p).await.unwrap();
        }

        let products = vec!["prod-b".to_string()];
        let conflicts = repo
            .check_schedule_conflicts(&products, at(5), at(12), None)
            .await
            .unwrap();
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].id, "phones");

        let excluded = repo
            .check_schedule_conflicts(&products, at(5), at(12), Some("phones"))
            .await
            .unwrap();
        assert!(excluded.is_empty());
    }

    #[tokio::test]
    async fn test_find_applicable_name_then_id() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let catalog = db.catalog();
        let repo = db.promotions();

        let product = talad_core::Product {
            id: "prod-a".to_string(),
            sku: "IP15-128".to_string(),
            name: "iPhone 15 128GB".to_string(),
            category: talad_core::ProductCategory::Mobile,
            price_satang: 3_290_000,
            is_active: true,
            created_at: at(1),
            updated_at: at(1),
        };
        catalog.insert_product(&product).await.unwrap();

        let mut p = promotion("iphone", 1);
        p.applicable_products = Scope::restricted(["prod-a"]);
        repo.insert(&p).await.unwrap();

        let stock = |id: &str, name: &str, product_id: Option<&str>, model| BranchStockItem {
            id: id.to_string(),
            branch_code: "BKK01".to_string(),
            name: name.to_string(),
            product_id: product_id.map(str::to_string),
            product_model: model,
            price_satang: 3_290_000,
            quantity: 2,
            updated_at: at(1),
        };
        let items = vec![
            stock("s1", " IPHONE 15 128gb", None, ProductModel::Other),
            stock("s2", "Apple phone", Some("prod-a"), ProductModel::Catalog),
            stock("s3", "Apple phone", Some("prod-a"), ProductModel::Other),
        ];

        let result = repo.find_applicable(&items, "BKK01", at(10)).await.unwrap();
        let counts: Vec<usize> = result.iter().map(|r| r.promotions.len()).collect();
        assert_eq!(counts, vec![1, 1, 0]);
        assert_eq!(
            result[0].promotions[0].matched_by,
            talad_core::matching::StockMatch::ByName
        );
    }

    #[tokio::test]
    async fn test_statistics() {
        let repo = repo().await;
        let mut used = promotion("used", 1);
        used.usage_count = 7;
        let mut off = promotion("off", 1);
        off.is_active = false;
        let mut old = promotion("old", 1);
        old.end_date = at(2);
        for p in [&used, &off, &old] {
            repo.insert(p).await.unwrap();
        }

        let stats = repo.statistics(None, at(10)).await.unwrap();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.active, 1);
        assert_eq!(stats.expired, 1);
        assert_eq!(stats.inactive, 1);
        assert_eq!(stats.total_usage, 7);
        assert_eq!(stats.top_used[0].id, "used");
    }
}
