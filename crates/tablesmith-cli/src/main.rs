//! Introspect a live Postgres schema and report the derived contracts.

mod config;

use std::path::PathBuf;

use clap::Parser;
use tokio_postgres::NoTls;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use tablesmith::{Introspector, TableSource, build_registry};

use crate::config::{Config, ConfigError};

#[derive(Debug, Parser)]
#[command(
    name = "tablesmith",
    about = "Derive data-access contracts from a live Postgres schema"
)]
struct Args {
    /// Configuration file (default: search for .config/tablesmith.toml
    /// upward from the current directory).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the configured schema name.
    #[arg(long)]
    schema: Option<String>,

    /// Worker pool size for per-table model building.
    #[arg(long, default_value_t = 8)]
    workers: usize,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => config::load_path(path)?,
        None => match config::load() {
            Ok((config, path)) => {
                info!(path = %path.display(), "loaded configuration");
                config
            }
            Err(ConfigError::NotFound) => {
                info!("no configuration file found, using defaults");
                Config::default()
            }
            Err(err) => return Err(err.into()),
        },
    };
    let schema = args.schema.clone().unwrap_or_else(|| config.schema.clone());

    let database_url = std::env::var("DATABASE_URL")
        .map_err(|_| "DATABASE_URL is not set (try a .env file)")?;
    let mut pool_config = deadpool_postgres::Config::new();
    pool_config.url = Some(database_url);
    pool_config.pool = Some(deadpool_postgres::PoolConfig::new(config.max_connections));
    let pool = pool_config.create_pool(Some(deadpool_postgres::Runtime::Tokio1), NoTls)?;

    let introspector = Introspector::new(pool, schema.clone());
    let tables: Vec<_> = introspector
        .tables()
        .await?
        .into_iter()
        .filter(|t| {
            let keep = config.should_process(t.name());
            if !keep {
                info!(table = %t.name(), "skipping table per configuration");
            }
            keep
        })
        .collect();

    info!(schema = %schema, tables = tables.len(), "building entity models");
    let outcome = build_registry(tables, args.workers).await;

    for desc in outcome.registry.tables() {
        println!("table {} (entity {})", desc.table_name(), desc.entity_name());
        for field in desc.fields() {
            println!("  {}: {}", field.name, field.ty);
        }
    }

    if !outcome.failures.is_empty() {
        for failure in &outcome.failures {
            warn!(table = %failure.table, error = %failure.error, "table failed");
        }
        return Err(format!("{} table(s) failed to build", outcome.failures.len()).into());
    }
    Ok(())
}
