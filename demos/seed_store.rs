//! Seed Store Example
//!
//! Imports a sales CSV into the SQLite store used by the API server.
//!
//! Run with: cargo run --example seed_store -- supermarket_sales.csv sales.db

use sales_analytics::{load_sales_csv, SqliteSalesStore};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let csv_path = args.next().unwrap_or_else(|| "supermarket_sales.csv".to_string());
    let db_path = args.next().unwrap_or_else(|| "sales.db".to_string());

    println!("Importing {} into {}...", csv_path, db_path);

    let sales = load_sales_csv(&csv_path)?;
    println!("✓ Parsed {} sales", sales.len());

    let total = SqliteSalesStore::with_store(&db_path, |store| {
        let inserted = store.insert_sales_batch(&sales)?;
        println!("✓ Inserted {} rows", inserted);
        store.count()
    })?;
    println!("✓ Store now holds {} sales", total);

    println!();
    println!("Done. Start the server with:");
    println!("  DATABASE_PATH={} cargo run --bin sales-server", db_path);

    Ok(())
}
