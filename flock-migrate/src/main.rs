//! # flock-migrate
//!
//! Runs one SQL file against the administrative database connection.
//!
//! ## Usage
//!
//! ```bash
//! ADMIN_DATABASE_URL=postgres://admin@localhost/flock flock-migrate sql/2026_fix_ages.sql
//! ```
//!
//! `ADMIN_DATABASE_URL` falls back to `DATABASE_URL`. Exits non-zero when the
//! file cannot be read or any statement fails.

use anyhow::Context;
use clap::Parser;
use flock_migrate::run_file;
use flock_shared::db::pool::{close_pool, create_pool, DatabaseConfig};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Apply a SQL file to the Flock database inside a transaction
#[derive(Parser)]
#[command(name = "flock-migrate", version)]
struct Cli {
    /// Path of the SQL file to execute
    path: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "flock_migrate=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let url = admin_database_url(|key| std::env::var(key).ok())
        .context("ADMIN_DATABASE_URL or DATABASE_URL must be set")?;

    let pool = create_pool(DatabaseConfig {
        max_connections: 1,
        min_connections: 0,
        ..DatabaseConfig::with_url(url)
    })
    .await
    .context("failed to connect to the database")?;

    let result = run_file(&pool, &cli.path).await;
    close_pool(pool).await;

    let run = result.with_context(|| format!("failed to apply {}", cli.path.display()))?;
    println!("applied {} (sha256 {})", run.file_name, run.checksum);
    Ok(())
}

fn admin_database_url(lookup: impl Fn(&str) -> Option<String>) -> Option<String> {
    lookup("ADMIN_DATABASE_URL")
        .filter(|url| !url.is_empty())
        .or_else(|| lookup("DATABASE_URL").filter(|url| !url.is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_cli_requires_path() {
        assert!(Cli::try_parse_from(["flock-migrate"]).is_err());
        let cli = Cli::try_parse_from(["flock-migrate", "fix.sql"]).unwrap();
        assert_eq!(cli.path, PathBuf::from("fix.sql"));
    }

    #[test]
    fn test_admin_url_preferred() {
        let url = admin_database_url(|key| match key {
            "ADMIN_DATABASE_URL" => Some("postgres://admin@db/flock".to_string()),
            "DATABASE_URL" => Some("postgres://app@db/flock".to_string()),
            _ => None,
        });
        assert_eq!(url.as_deref(), Some("postgres://admin@db/flock"));
    }

    #[test]
    fn test_falls_back_to_database_url() {
        let url = admin_database_url(|key| match key {
            "ADMIN_DATABASE_URL" => Some(String::new()),
            "DATABASE_URL" => Some("postgres://app@db/flock".to_string()),
            _ => None,
        });
        assert_eq!(url.as_deref(), Some("postgres://app@db/flock"));
        assert!(admin_database_url(|_| None).is_none());
    }
}
