//! # Seed Data Generator
//!
//! Populates a development database and prints the dashboard.
//!
//! ## Usage
//! ```bash
//! # Seed ./iluminarte_dev.db with 40 sample sales (default)
//! cargo run -p iluminarte-db --bin seed
//!
//! # Custom amount and path
//! cargo run -p iluminarte-db --bin seed -- --sales 200 --db ./data/shop.db
//!
//! # Dump the dashboard as JSON
//! cargo run -p iluminarte-db --bin seed -- --json
//! ```
//!
//! ## Generated Data
//! - A lighting catalog (lamps, shades, bulbs, fittings)
//! - An `admin` superuser and a `caja1` sales account
//! - Sample sales built through the same form adapter the web layer uses
//!
//! Settings not given on the command line come from `ILUMINARTE_*`
//! environment variables.

use chrono::Datelike;
use chrono::Utc;
use std::env;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use iluminarte_core::form::line_requests_from_fields;
use iluminarte_core::{CoreError, Money, NewProduct, NewUser, Permission};
use iluminarte_db::{AppConfig, Database, DbError};

/// (code, name, sale price, cost, stock)
const CATALOG: &[(&str, &str, i64, i64, i64)] = &[
    ("LAM-MESA-01", "Lámpara de mesa Nórdica", 24_990, 12_000, 18),
    ("LAM-MESA-02", "Lámpara de mesa Bauhaus", 32_990, 17_500, 9),
    ("LAM-PIE-01", "Lámpara de pie Arco", 89_990, 48_000, 4),
    ("LAM-PIE-02", "Lámpara de pie Trípode", 64_990, 31_000, 6),
    ("COLG-01", "Colgante Industrial", 29_990, 14_200, 22),
    ("COLG-02", "Colgante Mimbre", 27_490, 12_900, 3),
    ("APL-01", "Aplique de muro Cobre", 19_990, 9_100, 15),
    ("PANT-01", "Pantalla de lino 30cm", 9_990, 4_300, 40),
    ("PANT-02", "Pantalla de lino 45cm", 13_990, 6_200, 2),
    ("AMP-E27-9W", "Ampolleta LED E27 9W", 2_490, 950, 120),
    ("AMP-E27-VIN", "Ampolleta vintage E27", 4_990, 1_900, 60),
    ("AMP-GU10", "Ampolleta LED GU10", 2_990, 1_100, 5),
    ("CABLE-TEX", "Cable textil 3m", 6_490, 2_700, 30),
    ("SOCK-E27", "Portalámpara E27 latón", 3_990, 1_500, 0),
];

const DEFAULT_DB_PATH: &str = "./iluminarte_dev.db";
const DEFAULT_SALES: usize = 40;
const DEFAULT_ADMIN_PASSWORD: &str = "iluminarte-admin";
const DEFAULT_SELLER_PASSWORD: &str = "caja1-ventas";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,iluminarte=debug,sqlx=warn"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut config = AppConfig::from_env()?;
    if env::var_os(iluminarte_db::config::ENV_DB_PATH).is_none() {
        config.database_path = PathBuf::from(DEFAULT_DB_PATH);
    }

    // Parse command line arguments
    let args: Vec<String> = env::args().collect();

    let mut sales: usize = DEFAULT_SALES;
    let mut json = false;
    let mut year = Utc::now().year();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--sales" | "-s" => {
                if i + 1 < args.len() {
                    sales = args[i + 1].parse().unwrap_or(DEFAULT_SALES);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    config.database_path = PathBuf::from(&args[i + 1]);
                    i += 1;
                }
            }
            "--year" | "-y" => {
                if i + 1 < args.len() {
                    year = args[i + 1].parse().unwrap_or(year);
                    i += 1;
                }
            }
            "--json" => json = true,
            "--help" | "-h" => {
                println!("Iluminarte Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -s, --sales <N>    Number of sample sales (default: {})", DEFAULT_SALES);
                println!("  -d, --db <PATH>    Database file path (default: {})", DEFAULT_DB_PATH);
                println!("  -y, --year <YEAR>  Dashboard year (default: current)");
                println!("      --json         Print the dashboard as JSON");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Iluminarte Seed Data Generator");
    println!("=================================");
    println!("Database: {}", config.database_path.display());
    println!("Sales:    {}", sales);
    println!();

    let db = Database::new(config.db_config()).await?;

    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let existing = db.products().count().await?;
    if existing > 0 {
        println!("⚠ Database already has {} products", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
    } else {
        seed(&db, sales).await?;
    }

    println!();
    let dashboard = db
        .reports()
        .dashboard(year, &config.dashboard_options())
        .await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&dashboard)?);
    } else {
        let symbol = config.currency_symbol.as_str();
        println!("📊 Dashboard {}", dashboard.year);
        println!("  Revenue:          {}", dashboard.revenue().format_with(symbol));
        println!("  Invoices:         {}", dashboard.invoice_count);
        println!("  Inventory value:  {}", dashboard.inventory().format_with(symbol));
        for month in &dashboard.monthly_revenue {
            println!(
                "    {}  {}",
                month.label,
                Money::from_amount(month.total).format_with(symbol)
            );
        }
        println!("  Top products:");
        for product in &dashboard.top_products {
            println!(
                "    {:<28} x{:<4} {}",
                product.name,
                product.quantity_sold,
                Money::from_amount(product.revenue).format_with(symbol)
            );
        }
        println!("  Low stock:");
        for product in &dashboard.low_stock {
            println!("    {:<28} {}", product.name, product.stock);
        }
    }

    db.close().await;
    Ok(())
}

async fn seed(db: &Database, sales: usize) -> Result<(), Box<dyn std::error::Error>> {
    println!();
    println!("Creating catalog...");

    let mut product_ids = Vec::with_capacity(CATALOG.len());
    for (code, name, sale_price, cost, stock) in CATALOG {
        let product = db
            .products()
            .create(&NewProduct {
                name: name.to_string(),
                code: code.to_string(),
                sale_price: *sale_price,
                cost: *cost,
                stock: *stock,
                image: None,
            })
            .await?;
        product_ids.push(product.id);
    }
    println!("✓ {} products", product_ids.len());

    let admin = db
        .users()
        .create_superuser(&NewUser {
            first_name: "Administración".to_string(),
            ..NewUser::new("admin", DEFAULT_ADMIN_PASSWORD)
        })
        .await?;
    let seller = db
        .users()
        .create(&NewUser {
            first_name: "Ana".to_string(),
            last_name: "Rojas".to_string(),
            is_staff: true,
            ..NewUser::new("caja1", DEFAULT_SELLER_PASSWORD)
        })
        .await?;
    db.users().grant(&seller.id, Permission::ViewUser).await?;
    println!("✓ Users: admin / {}, caja1 / {}", DEFAULT_ADMIN_PASSWORD, DEFAULT_SELLER_PASSWORD);

    println!();
    println!("Registering sales...");

    let owners = [admin.identity(), seller.identity()];
    let start = std::time::Instant::now();
    let mut registered = 0;
    let mut rejected = 0;

    for n in 0..sales {
        // Up to three rows per sale, as the form would post them.
        let rows = 1 + n % 3;
        let mut fields = Vec::with_capacity(rows * 2);
        for row in 0..rows {
            let product = &product_ids[(n * 7 + row * 3) % product_ids.len()];
            fields.push((format!("producto_{}", row), product.clone()));
            fields.push((format!("cantidad_{}", row), (1 + (n + row) % 4).to_string()));
        }

        let requests = line_requests_from_fields(fields);
        let owner = &owners[n % owners.len()];

        match db.sales().create_sale(owner, &requests).await {
            Ok(sale) => {
                if !db.sales().verify_total(&sale.id).await? {
                    return Err(format!("sale {} failed its total check", sale.id).into());
                }
                registered += 1;
            }
            Err(DbError::Domain(err @ (CoreError::InsufficientStock { .. } | CoreError::EmptySale))) => {
                println!("  Skipped sale {}: {}", n + 1, err);
                rejected += 1;
            }
            Err(err) => return Err(err.into()),
        }
    }

    println!(
        "✓ Registered {} sales in {:?} ({} rejected)",
        registered,
        start.elapsed(),
        rejected
    );

    println!();
    println!("✓ Seed complete!");
    Ok(())
}
