//! # Seed Data Generator
//!
//! Populates an empty database with demo data for development.
//!
//! ## Usage
//! ```bash
//! # Seed the configured database (till.toml / TILL_DB_PATH / ./till.db)
//! cargo run -p till-db --bin seed
//!
//! # Custom product count and database file
//! cargo run -p till-db --bin seed -- --count 500 --db ./data/till.db
//!
//! # Explicit config file
//! cargo run -p till-db --bin seed -- --config ./till.toml
//! ```
//!
//! ## Generated Data
//! - One admin user (the acting user for opening stock)
//! - Categories, and products across them with opening stock
//!   booked through the Stock Ledger as `purchase` movements
//! - One item promotion of every type
//! - One cart promotion (10% off orders of 500.00 or more)

use chrono::{Duration, Utc};
use std::env;
use std::path::PathBuf;
use tracing::info;

use till_core::{
    AdjustStockRequest, CartRule, NewCartPromotion, NewProduct, NewPromotion, NewUser, PromotionRule,
    StockDirection, StockSubType, UserRole,
};
use till_db::{Database, TillConfig};

/// Categories and the products generated in each.
const CATALOG: &[(&str, &str, &[&str])] = &[
    (
        "BEV",
        "Beverages",
        &["Cola", "Lemonade", "Iced Tea", "Orange Juice", "Sparkling Water", "Cold Brew"],
    ),
    (
        "BAK",
        "Bakery",
        &["Sourdough", "Croissant", "Bagel", "Muffin", "Baguette", "Cinnamon Roll"],
    ),
    (
        "DRY",
        "Dairy",
        &["Whole Milk", "Greek Yogurt", "Cheddar", "Butter", "Cream Cheese", "Oat Milk"],
    ),
    (
        "SNK",
        "Snacks",
        &["Potato Chips", "Pretzels", "Trail Mix", "Granola Bar", "Popcorn", "Dark Chocolate"],
    ),
];

const SIZES: &[(&str, i64)] = &[("Small", 0), ("Regular", 75), ("Large", 150), ("Family", 400)];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut count: usize = 48;
    let mut db_path: Option<PathBuf> = None;
    let mut config_path: Option<PathBuf> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--count" | "-c" => {
                if i + 1 < args.len() {
                    count = args[i + 1].parse().unwrap_or(count);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--config" => {
                if i + 1 < args.len() {
                    config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Till POS Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --count <N>      Number of products to generate (default: 48)");
                println!("  -d, --db <PATH>      Database file path (overrides config)");
                println!("      --config <PATH>  Config file (default: platform config dir)");
                println!("  -h, --help           Show this help message");
                return Ok(());
            }
            other => eprintln!("Ignoring unknown argument: {}", other),
        }
        i += 1;
    }

    let mut config = TillConfig::load(config_path)?;
    if let Some(path) = db_path {
        config.database.path = path;
    }
    config.init_tracing();

    println!("Till POS Seed Data Generator");
    println!("============================");
    println!("Database: {}", config.database.path.display());
    println!("Products: {}", count);
    println!();

    let db = Database::new(config.db_config()).await?;
    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let existing = db.products().count().await?;
    if existing > 0 {
        println!("⚠ Database already has {} products", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    let start = std::time::Instant::now();

    // -------------------------------------------------------------------------
    // Admin user
    // -------------------------------------------------------------------------
    let admin = db
        .users()
        .insert(&NewUser {
            username: "admin".to_string(),
            name: "Administrator".to_string(),
            role: UserRole::Admin,
            // Not a valid hash: the account cannot log in until a real one is set
            password_hash: "!".to_string(),
        })
        .await?;
    println!("✓ Created admin user");

    // -------------------------------------------------------------------------
    // Categories and products with opening stock
    // -------------------------------------------------------------------------
    let mut product_ids = Vec::with_capacity(count);
    let mut seed = 0usize;

    'catalog: for (code, category_name, names) in CATALOG {
        let category = db.categories().insert(category_name).await?;

        for name in names.iter() {
            for (size, price_addon) in SIZES {
                if product_ids.len() >= count {
                    break 'catalog;
                }

                let product = generate_product(code, name, size, *price_addon, &category.id, seed);
                seed += 1;

                let created = match db.products().insert(&product).await {
                    Ok(created) => created,
                    Err(e) => {
                        eprintln!("Failed to insert {}: {}", product.sku, e);
                        continue;
                    }
                };

                let opening = (seed * 7 % 60) as i64;
                if opening > 0 {
                    db.ledger()
                        .adjust_stock(
                            &admin.id,
                            &AdjustStockRequest {
                                product_id: created.id.clone(),
                                warehouse_id: None,
                                quantity: opening,
                                direction: StockDirection::In,
                                sub_type: StockSubType::Purchase,
                                notes: Some("Opening stock".to_string()),
                            },
                        )
                        .await?;
                }

                product_ids.push(created.id);
            }
        }
    }
    println!("✓ Generated {} products", product_ids.len());

    // -------------------------------------------------------------------------
    // Promotions
    // -------------------------------------------------------------------------
    let now = Utc::now();
    let start_date = now - Duration::days(1);
    let end_date = now + Duration::days(30);

    if let [a, b, c, d, e, ..] = product_ids.as_slice() {
        let rules = [
            (a, PromotionRule::PercentageDiscount { percent_bps: 1000 }),
            (b, PromotionRule::FixedDiscount { amount_cents: 50 }),
            (
                c,
                PromotionRule::BundlePrice {
                    required_quantity: 3,
                    promo_price_cents: 500,
                },
            ),
            (
                d,
                PromotionRule::BuyXGetY {
                    buy_product_id: d.clone(),
                    get_product_id: e.clone(),
                },
            ),
        ];

        for (product_id, rule) in rules {
            db.promotions()
                .create(&NewPromotion {
                    product_id: product_id.clone(),
                    rule,
                    start_date,
                    end_date,
                })
                .await?;
        }
        println!("✓ Created 4 item promotions");
    } else {
        println!("⚠ Fewer than 5 products, skipping item promotions");
    }

    db.cart_promotions()
        .create(&NewCartPromotion {
            rule: CartRule::PercentageDiscount { percent_bps: 1000 },
            minimum_purchase_cents: 50_000,
            start_date,
            end_date: now + Duration::days(365),
        })
        .await?;
    println!("✓ Created cart promotion");

    let elapsed = start.elapsed();
    info!(products = product_ids.len(), elapsed_ms = elapsed.as_millis() as u64, "Seed complete");

    println!();
    println!("✓ Seed complete in {:?}", elapsed);

    db.close().await;
    Ok(())
}

/// Builds one product's input from its catalog position.
fn generate_product(
    code: &str,
    name: &str,
    size: &str,
    price_addon: i64,
    category_id: &str,
    seed: usize,
) -> NewProduct {
    let initials: String = name
        .split_whitespace()
        .filter_map(|word| word.chars().next())
        .collect::<String>()
        .to_uppercase();

    // 1.49 - 9.48 plus the size addon
    let base_price = 149 + ((seed * 37) % 800) as i64;

    NewProduct {
        sku: format!("{}-{}-{:03}", code, initials, seed),
        name: format!("{} {}", name, size),
        price_cents: base_price + price_addon,
        category_id: Some(category_id.to_string()),
    }
}
