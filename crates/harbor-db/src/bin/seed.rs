//! # Seed Data Generator
//!
//! Populates the database with test variants for development.
//!
//! ## Usage
//! ```bash
//! # Generate 500 variants (default)
//! cargo run -p harbor-db --bin seed
//!
//! # Generate custom amount
//! cargo run -p harbor-db --bin seed -- --count 2000
//!
//! # Specify database path
//! cargo run -p harbor-db --bin seed -- --db ./data/harbor.db
//! ```
//!
//! ## Generated Data
//! Creates realistic merchandise across device families:
//! - Phones and tablets (serial-tracked, one unit row per piece)
//! - Accessories (quantity-counted)
//!
//! Each variant has:
//! - Brand / model / color
//! - Cost, wholesale and retail prices in cents
//! - A tax classification (standard 23%, reduced 13.5%, or margin VAT)
//! - A condition grade for second-hand stock
//!
//! Every tenth variant lands in the legacy store so catalog fallback
//! has something to find.

use chrono::Utc;
use std::env;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use harbor_core::{ProductVariant, Representation, SerialStatus, SerialUnit, TaxClass, DEFAULT_TENANT_ID};
use harbor_db::{Database, DbConfig, VariantStore};

/// Brand / model families for realistic test data
const FAMILIES: &[(&str, &[&str], bool)] = &[
    (
        "Apple",
        &[
            "iPhone 13",
            "iPhone 14",
            "iPhone 15",
            "iPhone 15 Pro",
            "iPad Air",
            "iPad Mini",
            "Watch Series 9",
            "AirPods Pro",
        ],
        true,
    ),
    (
        "Samsung",
        &[
            "Galaxy S23",
            "Galaxy S24",
            "Galaxy A54",
            "Galaxy Tab S9",
            "Galaxy Watch 6",
            "Galaxy Buds 2",
        ],
        true,
    ),
    (
        "Google",
        &["Pixel 7", "Pixel 8", "Pixel 8 Pro", "Pixel Tablet"],
        true,
    ),
    (
        "Accessory",
        &[
            "USB-C Cable",
            "Lightning Cable",
            "20W Charger",
            "45W Charger",
            "Screen Protector",
            "Clear Case",
            "Leather Case",
            "Car Mount",
            "Power Bank 10000",
            "Power Bank 20000",
        ],
        false,
    ),
];

const COLORS: &[&str] = &["Black", "White", "Blue", "Silver", "Gold"];

const GRADES: &[Option<&str>] = &[None, Some("new"), Some("a"), Some("b"), Some("c")];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // Parse command line arguments
    let args: Vec<String> = env::args().collect();

    let mut count: usize = 500;
    let mut db_path = String::from("./harbor_dev.db");

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
                println!("Harbor Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --count <N>    Number of variants to generate (default: 500)");
                println!("  -d, --db <PATH>    Database file path (default: ./harbor_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Harbor Seed Data Generator");
    println!("=============================");
    println!("Database: {}", db_path);
    println!("Variants: {}", count);
    println!();

    // Connect to database
    let config = DbConfig::new(&db_path);
    let db = Database::new(config).await?;

    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    // Check existing variants
    let existing =
        db.variants().count(VariantStore::Primary).await? + db.variants().count(VariantStore::Legacy).await?;
    if existing > 0 {
        println!("⚠ Database already has {} variants", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    // Generate variants
    println!();
    println!("Generating variants...");

    let mut generated = 0;
    let mut units = 0;
    let start = std::time::Instant::now();

    'outer: for (family_idx, (brand, models, serial_tracked)) in FAMILIES.iter().enumerate() {
        for (model_idx, model) in models.iter().enumerate() {
            for (color_idx, color) in COLORS.iter().enumerate() {
                if generated >= count {
                    break 'outer;
                }

                let seed = family_idx * 1000 + model_idx * 40 + color_idx;
                let variant = generate_variant(brand, model, color, *serial_tracked, seed);

                // Every tenth row goes to the legacy store
                let store = if seed % 10 == 9 {
                    VariantStore::Legacy
                } else {
                    VariantStore::Primary
                };

                if let Err(e) = db.variants().insert(store, &variant).await {
                    eprintln!("Failed to insert {} {}: {}", brand, model, e);
                    continue;
                }

                // Serial-tracked variants get one unit row per piece
                if *serial_tracked {
                    for n in 0..variant.stock_quantity {
                        let unit = SerialUnit {
                            id: Uuid::new_v4().to_string(),
                            variant_id: variant.id.clone(),
                            serial_or_imei: format!("SN{:05}-{:03}", seed, n),
                            status: SerialStatus::Available,
                            sold_to: None,
                            sold_at: None,
                            created_at: Utc::now(),
                        };
                        db.serial_units().insert(&unit).await?;
                        units += 1;
                    }
                }

                generated += 1;

                if generated % 100 == 0 {
                    println!("  Generated {} variants...", generated);
                }
            }
        }
    }

    let elapsed = start.elapsed();
    println!();
    println!(
        "✓ Generated {} variants ({} serial units) in {:?}",
        generated, units, elapsed
    );

    println!();
    println!("✓ Seed complete!");

    Ok(())
}

/// Generates a single variant with realistic data.
fn generate_variant(
    brand: &str,
    model: &str,
    color: &str,
    serial_tracked: bool,
    seed: usize,
) -> ProductVariant {
    let now = Utc::now();

    // Phones cost far more than cables; derive prices from the seed
    let cost_cents = if serial_tracked {
        20_000 + ((seed * 173) % 60_000) as i64
    } else {
        300 + ((seed * 17) % 2_500) as i64
    };
    let wholesale_cents = cost_cents + cost_cents / 5;
    let retail_cents = cost_cents + cost_cents / 2;

    // Graded second-hand devices sell under the margin scheme
    let grade = GRADES[seed % GRADES.len()];
    let tax_class = match grade {
        Some("a") | Some("b") | Some("c") => TaxClass::MarginVat,
        _ if seed % 7 == 0 => TaxClass::Standard135,
        _ => TaxClass::Standard23,
    };

    let stock = if serial_tracked {
        (seed % 4) as i64 + 1
    } else {
        (seed % 40) as i64
    };

    ProductVariant {
        id: Uuid::new_v4().to_string(),
        tenant_id: DEFAULT_TENANT_ID.to_string(),
        name: format!("{} {} {}", brand, model, color),
        brand: brand.to_string(),
        model: model.to_string(),
        color: Some(color.to_string()),
        representation: if serial_tracked {
            Representation::SerialTracked
        } else {
            Representation::Quantity
        },
        cost_price_cents: cost_cents,
        wholesale_price_cents: wholesale_cents,
        retail_price_cents: retail_cents,
        tax_class,
        stock_quantity: stock,
        location: Some(format!("A{}-{}", seed % 9 + 1, seed % 30 + 1)),
        condition_grade: grade.map(|g| g.to_string()),
        is_active: stock > 0,
        created_at: now,
        updated_at: now,
    }
}
