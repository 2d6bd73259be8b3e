//! Payment ledger persistence
//!
//! The services only see [`LedgerStore`]/[`LedgerTx`]. Postgres backs the
//! deployed service; the in-memory store backs tests and local runs.

pub mod error;
pub mod ledger;
pub mod memory_ledger;
pub mod models;
pub mod pg_ledger;

use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::{error as log_error, info};

use self::error::{DatabaseError, DatabaseErrorKind};
use crate::config::DatabaseConfig;

pub use self::ledger::{LedgerResult, LedgerStore, LedgerTx, TransactionLookup};
pub use self::memory_ledger::InMemoryLedgerStore;
pub use self::pg_ledger::PgLedgerStore;

const MAX_LIFETIME: Duration = Duration::from_secs(1800);
const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 600;

fn pool_options(config: &DatabaseConfig) -> PgPoolOptions {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.connection_timeout))
        .idle_timeout(Duration::from_secs(
            config.idle_timeout.unwrap_or(DEFAULT_IDLE_TIMEOUT_SECS),
        ))
        .max_lifetime(MAX_LIFETIME)
}

/// Connects the pool and verifies one connection can be acquired.
pub async fn connect(config: &DatabaseConfig) -> Result<PgPool, DatabaseError> {
    info!(
        max_connections = config.max_connections,
        min_connections = config.min_connections,
        connection_timeout_secs = config.connection_timeout,
        "connecting ledger database"
    );

    let pool = pool_options(config)
        .connect(&config.url)
        .await
        .map_err(|e| {
            log_error!("ledger database unreachable: {}", e);
            DatabaseError::from_sqlx(e)
        })?;

    sqlx::query("SELECT 1").execute(&pool).await?;
    Ok(pool)
}

/// Connects, applies pending migrations and returns the Postgres ledger.
pub async fn open_ledger(config: &DatabaseConfig) -> Result<PgLedgerStore, DatabaseError> {
    let pool = connect(config).await?;

    sqlx::migrate!("./migrations").run(&pool).await.map_err(|e| {
        log_error!("ledger migrations failed: {}", e);
        DatabaseError::new(DatabaseErrorKind::Query {
            message: format!("migration failed: {}", e),
        })
    })?;

    info!("ledger database ready");
    Ok(PgLedgerStore::new(pool))
}
