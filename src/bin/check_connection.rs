//! Connectivity probe
//!
//! Run with: cargo run --bin check_connection -- --sample 5
//!
//! Reads a few rows from every table through both roles and reports tables
//! that are missing or unreadable. Row-level security shows up as fewer rows
//! on the unprivileged side.

#![deny(unused_imports)]

use std::sync::Arc;
use std::time::Instant;

use beeconta::backend::{tables, Backend, GoTrueAuth, Select};
use beeconta::{db, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let args: Vec<String> = std::env::args().collect();
    let sample: usize = args
        .iter()
        .position(|a| a == "--sample")
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
        .unwrap_or(5);

    let config = Config::from_env()?;

    println!("Connection check - sampling {} rows per table", sample);
    println!("Connecting to database...");

    let (client_pool, admin_pool) = db::connect_pools(&config).await?;
    db::verify_connection(&client_pool).await?;
    db::verify_connection(&admin_pool).await?;

    let missing = db::missing_tables(&admin_pool).await?;
    let auth = GoTrueAuth::new(&config.auth_url, config.auth_anon_key.clone())?;
    let backend = Backend::postgres(client_pool.clone(), admin_pool.clone(), Arc::new(auth));
    let (client, admin) = (backend.client(), backend.admin());
    let mut failures = 0usize;

    for table in tables::ALL {
        if missing.contains(table) {
            println!("  {:<28} MISSING", table);
            failures += 1;
            continue;
        }

        let query = Select::from(*table).limit(sample);
        let start = Instant::now();
        match (client.select(&query).await, admin.select(&query).await) {
            (Ok(visible), Ok(all)) => println!(
                "  {:<28} {}/{} rows in {}ms",
                table,
                visible.len(),
                all.len(),
                start.elapsed().as_millis()
            ),
            (Err(e), _) | (_, Err(e)) => {
                println!("  {:<28} ERROR {}", table, e);
                failures += 1;
            }
        }
    }

    client_pool.close().await;
    admin_pool.close().await;

    println!("\n=== Connection Check Results ===");
    println!("Tables: {}", tables::ALL.len());
    println!("Failures: {}", failures);

    if failures > 0 {
        anyhow::bail!("{} table(s) unreachable", failures);
    }
    Ok(())
}
