//! Delete every row from every analysis table.
//!
//! Usage: `clear-database` (asks for confirmation)

use std::io::{self, BufRead, Write};

use anyhow::{bail, Context};
use talk_store::{PgJobStore, StoreConfig};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr).with_target(false))
        .with(env_filter)
        .init();

    let config = StoreConfig::from_env();
    if config.database_url.is_none() {
        bail!("DATABASE_URL is not set; nothing to clear");
    }

    if !confirm()? {
        println!("\n❌ Operation cancelled.");
        return Ok(());
    }

    let store = PgJobStore::connect(&config)
        .await
        .context("connecting to database")?;

    println!("🗑️  Clearing all data from database...");
    let summary = talk_store::JobStore::clear_all(&store)
        .await
        .context("clearing tables")?;

    for (table, removed) in &summary.tables {
        if *removed > 0 {
            println!("  ✓ Deleted {removed} rows from {table}");
        } else {
            println!("  - {table} was already empty");
        }
    }
    println!("\n✅ All data cleared successfully!");
    Ok(())
}

fn confirm() -> anyhow::Result<bool> {
    println!("⚠️  WARNING: This will delete ALL data from the database!");
    println!("   - All videos");
    println!("   - All analyses");
    println!("   - All emotions, gestures, transcripts");
    println!("   - All LLM insights and key moments");
    println!();
    print!("Are you sure you want to continue? (yes/no): ");
    io::stdout().flush()?;

    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(is_confirmation(&answer))
}

fn is_confirmation(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "yes" | "y")
}
