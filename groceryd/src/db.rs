//! Database CLI subcommands for groceryd.
//!
//! Provides `db migrate`, `db status`, and `db seed` commands.

use anyhow::{anyhow, Result};
use tracing::info;

use grocery_db::{connect, migrate, seed_sample_data, status};

use crate::config::Config;

/// Run database CLI subcommands.
///
/// Supported commands:
/// - `groceryd db migrate` - Run pending migrations
/// - `groceryd db status` - Check migration status
/// - `groceryd db seed` - Insert the sample catalogue and lists (idempotent)
pub async fn run_db_command(args: Vec<String>) -> Result<()> {
    if args.len() < 3 {
        return Err(anyhow!("Usage: groceryd db <migrate|status|seed>"));
    }

    let config = Config::from_env()?;
    if config.store.is_memory() {
        return Err(anyhow!(
            "GROCERY_DATABASE_URL selects the in-memory store; db commands need a SQLite URL"
        ));
    }

    let pool = connect(&config.store.database_url).await?;

    match args[2].as_str() {
        "migrate" => {
            migrate(&pool).await?;
        },
        "status" => {
            status(&pool).await?;
        },
        "seed" => {
            migrate(&pool).await?;
            let summary = seed_sample_data(&pool).await?;
            info!(
                "Seeded: {} product(s), {} list item(s)",
                summary.products, summary.list_items
            );
        },
        _ => {
            return Err(anyhow!("Unknown db command: {}. Use migrate, status, or seed", args[2]));
        },
    }

    Ok(())
}
