//! Grocery Daemon
//!
//! Serves the grocery ledger over HTTP.
//!
//! # Usage
//!
//! ```bash
//! # Start with default configuration (SQLite file grocery.db)
//! cargo run -p groceryd
//!
//! # Start against the in-memory store on another port
//! GROCERY_DATABASE_URL=memory GROCERY_API_PORT=8081 cargo run -p groceryd
//!
//! # Database maintenance
//! cargo run -p groceryd -- db migrate
//! ```
//!
//! # Environment Variables
//!
//! - `GROCERY_ENV`: Environment (test, development, production)
//! - `GROCERY_API_HOST`: API host (default: 0.0.0.0)
//! - `GROCERY_API_PORT`: API port (default: 8080)
//! - `GROCERY_DATABASE_URL`: SQLite URL or `memory` (default: sqlite://grocery.db)
//! - `GROCERY_SEED`: Seed sample data on start (default: true outside production)
//! - `GROCERY_MAX_TRANSFER_ATTEMPTS`: Retries per stock transfer (default: 8)
//! - `GROCERY_LOG_FORMAT`: `json` for JSON log lines

use groceryd::{Config, Daemon};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env may set the log format, so load it before tracing
    let _ = dotenvy::dotenv();

    // Initialize tracing
    let filter = EnvFilter::from_default_env().add_directive("groceryd=info".parse()?);
    let json_logs = std::env::var("GROCERY_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    if json_logs {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry().with(fmt::layer()).with(filter).init();
    }

    let args: Vec<String> = std::env::args().collect();
    if args.get(1).map(String::as_str) == Some("db") {
        return run_db(args).await;
    }

    // Load configuration
    let config = Config::from_env()?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = %config.environment,
        api_host = %config.api.host,
        api_port = config.api.port,
        database_url = %config.store.database_url,
        "Grocery Daemon"
    );

    if config.store.is_memory() {
        Daemon::in_memory(config).run().await?;
    } else {
        run_sqlite(config).await?;
    }

    Ok(())
}

#[cfg(feature = "sqlite")]
async fn run_db(args: Vec<String>) -> anyhow::Result<()> {
    groceryd::db::run_db_command(args).await
}

#[cfg(not(feature = "sqlite"))]
async fn run_db(_args: Vec<String>) -> anyhow::Result<()> {
    anyhow::bail!("groceryd was built without the `sqlite` feature; db commands are unavailable")
}

#[cfg(feature = "sqlite")]
async fn run_sqlite(config: Config) -> anyhow::Result<()> {
    Daemon::open_sqlite(config).await?.run().await?;
    Ok(())
}

#[cfg(not(feature = "sqlite"))]
async fn run_sqlite(config: Config) -> anyhow::Result<()> {
    anyhow::bail!(
        "GROCERY_DATABASE_URL={} needs the `sqlite` feature; use `memory` instead",
        config.store.database_url
    )
}
