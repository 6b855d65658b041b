//! # Seed Tool
//!
//! Creates a database with the demo data set, or resets an existing one.
//!
//! ## Usage
//! ```bash
//! # Create (or upgrade) the database at the default location
//! cargo run -p warung-db --bin seed
//!
//! # Specify database path
//! cargo run -p warung-db --bin seed -- --db ./data/warung.db
//!
//! # Wipe everything and start again from the demo data
//! cargo run -p warung-db --bin seed -- --db ./data/warung.db --reset
//! ```
//!
//! Log verbosity follows `RUST_LOG` (default `info`).

use std::env;
use std::path::PathBuf;

use tracing_subscriber::EnvFilter;
use warung_db::{Database, DbConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = env::args().collect();

    let mut db_path: Option<PathBuf> = None;
    let mut reset = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--reset" | "-r" => reset = true,
            "--help" | "-h" => {
                println!("Warung POS Seed Tool");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>    Database file path (default: $WARUNG_DB_PATH or data dir)");
                println!("  -r, --reset        Drop all data and re-seed");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            other => eprintln!("Ignoring unknown argument: {other}"),
        }
        i += 1;
    }

    let mut config = DbConfig::from_env()?;
    if let Some(path) = db_path {
        config.database_path = path;
    }

    println!("Warung POS Seed Tool");
    println!("====================");
    println!("Database: {}", config.database_path.display());
    println!();

    let db = Database::new(config).await?;
    let (stored, latest) = db.migration_status().await?;
    println!("✓ Schema at version {stored} (latest {latest})");

    if reset {
        db.reset().await?;
        println!("✓ Database reset and re-seeded");
    }

    let created = db.ensure_demo_users().await?;
    if created > 0 {
        println!("✓ Re-created {created} demo account(s)");
    }

    println!();
    println!("Users:      {}", db.users().count().await?);
    println!("Products:   {}", db.products().count().await?);
    println!("Suppliers:  {}", db.suppliers().count().await?);
    println!("Customers:  {}", db.customers().count().await?);
    println!("Sales:      {}", db.transactions().count().await?);
    println!();
    println!("✓ Done. Sign in with admin123/admin123 or kasir123/kasir123.");

    db.close().await;
    Ok(())
}
