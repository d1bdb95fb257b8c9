//! # Seed Data Generator
//!
//! Populates the database with demo catalog data for development.
//!
//! ## Usage
//! ```bash
//! # Generate 500 products (default)
//! cargo run -p storefront-db --bin seed
//!
//! # Generate custom amount
//! cargo run -p storefront-db --bin seed -- --count 2000
//!
//! # Specify database path
//! cargo run -p storefront-db --bin seed -- --db ./data/storefront.db
//! ```
//!
//! ## Generated Data
//! - Products across hardware categories with unique codes `{CAT}-{NNN}`
//! - Per-channel price records: retail at base, dealer at 85%, wholesale
//!   at 75% with volume tiers and the channel's default minimum
//! - A demo customer per channel (retail buyer starts with points)

use chrono::Utc;
use std::env;
use uuid::Uuid;

use storefront_core::money::{Money, TaxRate};
use storefront_core::pricing::{PriceRecord, VolumeTier};
use storefront_core::{Channel, Customer, Product};
use storefront_db::{Database, DbConfig};

/// Product categories for realistic test data
const CATEGORIES: &[(&str, &[&str])] = &[
    (
        "FAS",
        &[
            "Hex Bolt M6", "Hex Bolt M8", "Hex Bolt M10", "Wood Screw 4x40",
            "Wood Screw 5x60", "Machine Screw M4", "Lock Nut M6", "Lock Nut M8",
            "Flat Washer M6", "Spring Washer M8", "Threaded Rod M10", "Rivet 4mm",
            "Anchor Bolt", "Carriage Bolt", "Wing Nut M6",
        ],
    ),
    (
        "TOOL",
        &[
            "Claw Hammer", "Ball Peen Hammer", "Slotted Screwdriver",
            "Phillips Screwdriver", "Adjustable Wrench", "Combination Wrench Set",
            "Needle Nose Pliers", "Side Cutters", "Hex Key Set", "Socket Set",
            "Utility Knife", "Tape Measure 5m", "Spirit Level 60cm", "Hand Saw",
            "Pipe Wrench",
        ],
    ),
    (
        "PKG",
        &[
            "Carton Box S", "Carton Box M", "Carton Box L", "Bubble Wrap Roll",
            "Packing Tape", "Stretch Film", "Kraft Paper Roll", "Mailer Bag",
            "Edge Protector", "Pallet Wrap", "Strapping Band", "Label Roll",
        ],
    ),
    (
        "ELEC",
        &[
            "Cable Tie 200mm", "Cable Tie 300mm", "Insulation Tape",
            "Terminal Block", "Crimp Connector Kit", "Junction Box",
            "Conduit 20mm", "Cable Clip", "Extension Cord 5m", "Multimeter",
        ],
    ),
    (
        "SAFE",
        &[
            "Work Gloves", "Safety Glasses", "Ear Plugs", "Dust Mask",
            "Hard Hat", "Hi-Vis Vest", "Knee Pads", "First Aid Kit",
        ],
    ),
];

/// Tax rates in basis points
const TAX_RATES: &[u32] = &[0, 500, 825, 1000];

/// Wholesale volume tier breakpoints as (min_qty, discount percent).
const WHOLESALE_TIERS: &[(i64, i64)] = &[(50, 5), (100, 10), (500, 15)];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .init();

    // Parse command line arguments
    let args: Vec<String> = env::args().collect();

    let mut count: usize = 500;
    let mut db_path = String::from("./storefront_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--count" | "-c" => {
                if i + 1 < args.len() {
                    count = args[i + 1].parse().unwrap_or(500);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Storefront Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --count <N>    Number of products to generate (default: 500)");
                println!("  -d, --db <PATH>    Database file path (default: ./storefront_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Storefront Seed Data Generator");
    println!("=================================");
    println!("Database: {}", db_path);
    println!("Products: {}", count);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;

    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    // Check existing products
    let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
        .fetch_one(db.pool())
        .await?;
    if existing > 0 {
        println!("⚠ Database already has {} products", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    println!();
    println!("Generating catalog...");

    let mut generated = 0usize;
    let start = std::time::Instant::now();

    'outer: for (category_code, names) in CATEGORIES {
        for (name_idx, name) in names.iter().enumerate() {
            for variant in 0..(count / 60 + 1) {
                if generated >= count {
                    break 'outer;
                }

                let seed = generated;
                let product = generate_product(category_code, name, name_idx, variant, seed);
                db.catalog().insert_product(&product).await?;

                publish_prices(&db, &product.id, seed).await?;

                generated += 1;
                if generated % 100 == 0 {
                    println!("  Generated {} products...", generated);
                }
            }
        }
    }

    let elapsed = start.elapsed();
    println!();
    println!("✓ Generated {} products in {:?}", generated, elapsed);

    // Demo customers, one per channel
    println!();
    println!("Creating demo customers...");
    for channel in Channel::ALL {
        let now = Utc::now();
        let customer = Customer {
            id: Uuid::new_v4().to_string(),
            channel,
            name: format!("Demo {} buyer", channel),
            email: format!("demo-{}@example.test", channel),
            points: if channel.is_loyalty_eligible() { 1_000 } else { 0 },
            created_at: now,
            updated_at: now,
        };
        db.customers().insert(&customer).await?;
        println!("  {} → {}", channel, customer.id);
    }

    println!();
    println!("✓ Seed complete!");

    Ok(())
}

/// Generates a single product with deterministic pseudo-random attributes.
fn generate_product(
    category: &str,
    name: &str,
    name_idx: usize,
    variant: usize,
    seed: usize,
) -> Product {
    let now = Utc::now();

    let code = format!("{}-{:03}-{}", category, name_idx, variant);
    let full_name = if variant == 0 {
        name.to_string()
    } else {
        format!("{} (pack of {})", name, variant * 10)
    };

    // A slice of the catalog is dealer-only; some lines are consignment.
    let dealer_only = seed % 11 == 0;

    Product {
        id: Uuid::new_v4().to_string(),
        code,
        name: full_name,
        description: None,
        is_consignment: seed % 9 == 0,
        sells_dealer: true,
        sells_wholesale: !dealer_only,
        sells_retail: !dealer_only,
        is_active: true,
        created_at: now,
        updated_at: now,
    }
}

/// Publishes per-channel price records for a product.
///
/// Retail carries the base price, dealer 85%, wholesale 75% with volume
/// tiers. Minimum order quantities come from the channel policy defaults.
async fn publish_prices(
    db: &Database,
    product_id: &str,
    seed: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    // Base retail price: 0.99 - 49.99
    let base = 99 + ((seed * 37) % 4_900) as i64;
    let tax = TaxRate::from_bps(TAX_RATES[seed % TAX_RATES.len()]);

    for channel in Channel::ALL {
        let (unit, tiers) = match channel {
            Channel::Retail => (base, Vec::new()),
            Channel::Dealer => (base * 85 / 100, Vec::new()),
            Channel::Wholesale => {
                let unit = base * 75 / 100;
                let tiers = WHOLESALE_TIERS
                    .iter()
                    .map(|&(min_qty, discount)| VolumeTier {
                        min_qty,
                        price: Money::from_cents(unit * (100 - discount) / 100),
                    })
                    .collect();
                (unit, tiers)
            }
        };

        let record = PriceRecord::new(
            Money::from_cents(unit),
            tax,
            channel.policy().default_min_order_qty,
            tiers,
        )?;
        db.catalog().publish_price(product_id, channel, &record).await?;
    }

    Ok(())
}
