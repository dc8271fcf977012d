//! Shared fixtures for the engine tests.

use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::{Arc, Mutex};

use talad_core::{
    BranchStockItem, Conditions, DiscountRule, Product, ProductCategory, ProductModel, Promotion,
    Scope,
};
use talad_db::{Database, DbConfig};

use crate::admin::PromotionAdmin;
use crate::audit::{AuditEntry, AuditSink};
use crate::events::BroadcastPublisher;
use crate::pricing::PricingEngine;

/// 10:00 in Bangkok.
pub(crate) fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 3, 0, 0).unwrap()
}

#[derive(Default)]
pub(crate) struct RecordingAuditSink {
    entries: Mutex<Vec<AuditEntry>>,
}

impl RecordingAuditSink {
    pub(crate) fn actions(&self) -> Vec<&'static str> {
        self.entries.lock().unwrap().iter().map(|e| e.action).collect()
    }
}

impl AuditSink for RecordingAuditSink {
    fn record(&self, entry: AuditEntry) {
        self.entries.lock().unwrap().push(entry);
    }
}

pub(crate) struct Fixture {
    pub db: Database,
    pub engine: PricingEngine,
    pub admin: PromotionAdmin,
    pub events: BroadcastPublisher,
    pub audit: Arc<RecordingAuditSink>,
}

pub(crate) async fn fixture() -> Fixture {
    let db = Database::new(DbConfig::in_memory()).await.unwrap();
    let events = BroadcastPublisher::new(16);
    let audit = Arc::new(RecordingAuditSink::default());

    let engine =
        PricingEngine::sqlite(&db, Arc::new(events.clone()), audit.clone()).with_clock(fixed_now);
    let admin =
        PromotionAdmin::sqlite(&db, Arc::new(events.clone()), audit.clone()).with_clock(fixed_now);

    Fixture {
        db,
        engine,
        admin,
        events,
        audit,
    }
}

impl Fixture {
    pub(crate) async fn add_product(&self, product: Product) {
        self.db.catalog().insert_product(&product).await.unwrap();
    }

    pub(crate) async fn add_stock(&self, item: BranchStockItem) {
        self.db.catalog().insert_stock_item(&item).await.unwrap();
    }

    pub(crate) async fn add_promotion(&self, promotion: &Promotion) {
        self.db.promotions().insert(promotion).await.unwrap();
    }
}

pub(crate) fn product(
    id: &str,
    name: &str,
    category: ProductCategory,
    price_satang: i64,
) -> Product {
    Product {
        id: id.to_string(),
        sku: format!("SKU-{}", id),
        name: name.to_string(),
        category,
        price_satang,
        is_active: true,
        created_at: fixed_now(),
        updated_at: fixed_now(),
    }
}

pub(crate) fn stock_item(
    id: &str,
    branch_code: &str,
    name: &str,
    product_id: Option<&str>,
    product_model: ProductModel,
) -> BranchStockItem {
    BranchStockItem {
        id: id.to_string(),
        branch_code: branch_code.to_string(),
        name: name.to_string(),
        product_id: product_id.map(str::to_string),
        product_model,
        price_satang: 0,
        quantity: 5,
        updated_at: fixed_now(),
    }
}

/// Enabled percentage promotion open everywhere, running from yesterday for 30 days.
pub(crate) fn percent_off(id: &str, priority: i32, percent_bps: u32) -> Promotion {
    Promotion {
        id: id.to_string(),
        name: format!("Promo {}", id),
        description: None,
        rule: DiscountRule::DiscountPercentage { percent_bps },
        applicable_products: Scope::Universal,
        applicable_categories: Scope::Universal,
        applicable_branches: Scope::Universal,
        start_date: fixed_now() - Duration::days(1),
        end_date: fixed_now() + Duration::days(30),
        is_active: true,
        usage_count: 0,
        usage_limit: None,
        priority,
        conditions: Conditions::default(),
        tags: Vec::new(),
        notes: None,
        created_by: None,
        created_at: fixed_now(),
        updated_at: fixed_now(),
    }
}
