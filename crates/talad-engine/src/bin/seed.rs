//! # Seed Data Generator
//!
//! Populates a database with a small catalog, branch stock and sample
//! promotions, then prices one line to show the engine working.
//!
//! ## Usage
//! ```bash
//! cargo run -p talad-engine --bin talad-seed
//! cargo run -p talad-engine --bin talad-seed -- --db ./data/talad.db
//! cargo run -p talad-engine --bin talad-seed -- --config ./engine.toml
//! ```

use chrono::{Duration, Utc};
use serde_json::json;
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

use talad_core::input::PromotionInput;
use talad_core::{BranchStockItem, Product, ProductCategory, ProductModel};
use talad_db::Database;
use talad_engine::{
    init_tracing, BroadcastPublisher, DbAuditSink, EngineConfig, PricingEngine, PromotionAdmin,
};

/// (sku, name, category, price in baht)
const PRODUCTS: &[(&str, &str, ProductCategory, i64)] = &[
    ("MOB-A55", "Galaxy A55", ProductCategory::Mobile, 14_990),
    ("MOB-RN13", "Redmi Note 13", ProductCategory::Mobile, 6_990),
    ("MOB-IP15", "iPhone 15", ProductCategory::Mobile, 29_900),
    ("ACC-CASE", "Galaxy A55 Case", ProductCategory::Accessory, 390),
    ("ACC-CHG", "25W Charger", ProductCategory::Accessory, 590),
    ("ACC-FILM", "Tempered Glass Film", ProductCategory::Accessory, 199),
    ("BOX-A55", "Galaxy A55 Gift Box", ProductCategory::Boxset, 15_990),
];

const BRANCHES: &[&str] = &["BKK01", "CNX02"];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut db_path: Option<PathBuf> = None;
    let mut config_path: Option<PathBuf> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Talad Promotions Seed Data Generator");
                println!();
                println!("Usage: talad-seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>       Database file path (default: from config)");
                println!("  -c, --config <PATH>   Config file (default: platform config dir)");
                println!("  -h, --help            Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    let mut config = EngineConfig::load(config_path)?;
    if let Some(path) = db_path {
        config.database.path = path;
    }
    init_tracing(&config.logging.filter);

    println!("Talad Promotions Seed Data Generator");
    println!("====================================");
    println!("Database: {}", config.database.path.display());
    println!();

    if let Some(parent) = config.database.path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let db = Database::new(config.db_config()).await?;
    println!("✓ Connected to database");

    let catalog = db.catalog();
    if catalog.count_products().await? > 0 {
        println!("⚠ Database already has products, skipping seed.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    // Catalog and stock
    let now = Utc::now();
    let mut ids = Vec::with_capacity(PRODUCTS.len());
    for (sku, name, category, baht) in PRODUCTS {
        let product = Product {
            id: Uuid::new_v4().to_string(),
            sku: sku.to_string(),
            name: name.to_string(),
            category: *category,
            price_satang: baht * 100,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        catalog.insert_product(&product).await?;

        for (n, branch) in BRANCHES.iter().enumerate() {
            // Every other record is hand-entered: only its name links it
            let linked = n == 0;
            let item = BranchStockItem {
                id: Uuid::new_v4().to_string(),
                branch_code: branch.to_string(),
                name: product.name.clone(),
                product_id: linked.then(|| product.id.clone()),
                product_model: if linked { ProductModel::Catalog } else { ProductModel::Other },
                price_satang: product.price_satang,
                quantity: 10,
                updated_at: now,
            };
            catalog.insert_stock_item(&item).await?;
        }
        ids.push(product.id);
    }
    println!("✓ Inserted {} products, {} stock records", ids.len(), ids.len() * BRANCHES.len());

    // Promotions
    let events = Arc::new(BroadcastPublisher::new(config.engine.event_channel_capacity));
    let audit = Arc::new(DbAuditSink::new(db.audit_log()));
    let admin = PromotionAdmin::sqlite(&db, events.clone(), audit.clone())
        .with_thresholds(config.alert_thresholds())
        .with_max_page_size(config.engine.max_page_size);

    let start = (now - Duration::days(1)).to_rfc3339();
    let end = (now + Duration::days(30)).to_rfc3339();
    let samples = vec![
        json!({
            "name": "ลดมือถือ 10%",
            "type": "discount_percentage",
            "discountValue": "10",
            "applicableCategories": ["mobile"],
            "startDate": start,
            "endDate": end,
            "priority": 20,
            "conditions": { "maxDiscountAmount": "2000" }
        }),
        json!({
            "name": "Galaxy A55 ลด 1,500 บาท",
            "type": "discount_amount",
            "discountValue": "1500",
            "applicableProducts": [ids[0]],
            "applicableBranches": ["BKK01"],
            "startDate": start,
            "endDate": end,
            "usageLimit": 50,
            "priority": 10
        }),
        json!({
            "name": "ฟิล์มซื้อ 2 แถม 1",
            "type": "buy_x_get_y",
            "buyQuantity": 2,
            "getQuantity": 1,
            "applicableProducts": [ids[5]],
            "startDate": start,
            "endDate": end
        }),
        json!({
            "name": "ชุดมือถือพร้อมเคส",
            "type": "bundle",
            "bundleProducts": [ids[0], ids[3]],
            "bundlePrice": "14990",
            "startDate": start,
            "endDate": end
        }),
    ];
    for sample in samples {
        let input: PromotionInput = serde_json::from_value(sample)?;
        let promotion = admin.create(input, Some("seed")).await?;
        println!("  + {} ({})", promotion.name, promotion.promotion_type());
    }
    println!("✓ Inserted promotions");

    // Price one line
    let engine = PricingEngine::sqlite(&db, events, audit);
    let stock = catalog.stock_for_branch("BKK01", 3).await?;
    println!();
    println!("Sample prices at BKK01:");
    for item in stock {
        let Some(product_id) = item.catalog_product_id() else {
            continue;
        };
        let line = engine.price_line_item(product_id, "BKK01", 1).await?;
        println!(
            "  {:<24} {:>10} -> {:>10}  {}",
            item.name,
            line.original_price,
            line.final_price,
            line.applied_promotion.map(|p| p.name).unwrap_or_else(|| "-".to_string())
        );
    }

    Ok(())
}
