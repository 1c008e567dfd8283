//! # Seed Data Generator
//!
//! Populates a development database with a small storefront.
//!
//! ## Usage
//! ```bash
//! cargo run -p meridian-db --bin seed
//!
//! # Specify database path and demo user
//! cargo run -p meridian-db --bin seed -- --db ./data/meridian.db --user demo-user
//! ```
//!
//! ## Generated Data
//! - A handful of apparel products, some on sale
//! - Three cart lines and one saved address for the demo user
//! - A wallet with PIN `123456` and a 2.000.000 ₫ opening top-up
//! - Promo code `WELCOME10` (10%, capped at 50.000 ₫, min 100.000 ₫)

use chrono::{Duration, Utc};
use std::env;
use uuid::Uuid;

use meridian_core::{
    Address, DiscountType, LedgerDraft, LedgerMetadata, Money, Product, ProductId, PromoCode,
    PromoCodeId, TransactionType, UserId,
};
use meridian_db::{ledger, Database, DbConfig};

/// (sku, name, price, sale price, stock)
const PRODUCTS: &[(&str, &str, i64, Option<i64>, i64)] = &[
    ("TEE-RED-M", "Classic Tee Red M", 200_000, Some(150_000), 40),
    ("TEE-BLK-L", "Classic Tee Black L", 200_000, None, 25),
    ("HOODIE-GRY-M", "Zip Hoodie Grey M", 550_000, Some(490_000), 12),
    ("CAP-NAVY", "Baseball Cap Navy", 120_000, None, 60),
    ("SOCK-3PK", "Crew Socks 3-Pack", 90_000, Some(75_000), 100),
    ("JEAN-SLIM-32", "Slim Jeans 32", 690_000, None, 8),
];

const DEMO_PIN: &str = "123456";
const OPENING_BALANCE: i64 = 2_000_000;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut db_path = String::from("./meridian_dev.db");
    let mut user = String::from("demo-user");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--user" | "-u" => {
                if i + 1 < args.len() {
                    user = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Meridian Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>    Database file path (default: ./meridian_dev.db)");
                println!("  -u, --user <ID>    Demo user id (default: demo-user)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Meridian Seed Data Generator");
    println!("===============================");
    println!("Database: {}", db_path);
    println!("User:     {}", user);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;
    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let existing = db.products().count().await?;
    if existing > 0 {
        println!("⚠ Database already has {} products", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    let user_id = UserId::from(user);
    let now = Utc::now();

    // Products
    let mut product_ids = Vec::with_capacity(PRODUCTS.len());
    for (sku, name, price, sale_price, stock) in PRODUCTS {
        let product = Product {
            id: ProductId::generate(),
            sku: sku.to_string(),
            name: name.to_string(),
            image_url: Some(format!("https://cdn.meridian.local/products/{}.jpg", sku)),
            price: *price,
            sale_price: *sale_price,
            stock: *stock,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        db.products().insert(&product).await?;
        product_ids.push(product.id);
    }
    println!("✓ Inserted {} products", product_ids.len());

    // Cart
    for (product_id, quantity) in product_ids.iter().zip([2, 1, 1]) {
        let line = db.carts().add(&user_id, product_id, quantity).await?;
        println!("  cart line {} × {}", line.id, quantity);
    }
    println!("✓ Filled cart");

    let address = db
        .addresses()
        .insert(Address {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.clone(),
            full_name: "Nguyen Van An".to_string(),
            phone: "0901234567".to_string(),
            street: "12 Nguyen Hue".to_string(),
            ward: "Ben Nghe".to_string(),
            district: "District 1".to_string(),
            city: "Ho Chi Minh City".to_string(),
        })
        .await?;
    println!("✓ Saved address {}", address.id);

    // Wallet with PIN and opening balance
    let wallet = db.wallets().get_or_create(&user_id).await?;
    db.wallets().set_pin(&wallet.id, DEMO_PIN).await?;

    let mut tx = db.begin().await?;
    ledger::credit(
        &mut tx,
        &wallet.id,
        Money::from_vnd(OPENING_BALANCE),
        LedgerDraft {
            transaction_type: TransactionType::Topup,
            description: "Opening balance (seed)".to_string(),
            metadata: LedgerMetadata::default(),
        },
    )
    .await?;
    tx.commit().await?;
    println!(
        "✓ Wallet {} funded with {}",
        wallet.id,
        Money::from_vnd(OPENING_BALANCE)
    );

    db.promos()
        .insert(&PromoCode {
            id: PromoCodeId::generate(),
            code: "WELCOME10".to_string(),
            discount_type: DiscountType::Percentage,
            discount_value: 10,
            max_bonus: Some(50_000),
            min_amount: 100_000,
            usage_limit: Some(1_000),
            usage_count: 0,
            is_active: true,
            starts_at: Some(now - Duration::days(1)),
            expires_at: Some(now + Duration::days(90)),
        })
        .await?;
    println!("✓ Promo code WELCOME10");

    println!();
    println!("✓ Seed complete!");

    Ok(())
}
