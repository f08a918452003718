//! Cageledger Database Layer
//!
//! SQLite persistence for the chip ledger using sqlx.
//!
//! # Repository Pattern
//!
//! Each table group has its own repository. Read paths borrow the pool;
//! mutation methods take a `&mut SqliteConnection` so the caller owns the
//! transaction scope — every mutating sequence in the ledger runs inside
//! exactly one transaction, including the nested ledger calls made by
//! settlement commit.

pub mod config;
pub mod error;
pub mod models;
pub mod repos;

use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use tracing::info;

pub use config::DatabaseConfig;
pub use error::{DbError, DbResult};
pub use models::*;
pub use repos::*;

/// Database connection pool
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Connect to SQLite
    pub async fn connect(config: &DatabaseConfig) -> DbResult<Self> {
        info!("Connecting to SQLite: {}", config.database_url_masked());

        // An in-memory database lives inside its connection; pin the pool to
        // one connection and never recycle it, or the store would vanish.
        let max_connections = if config.is_in_memory() {
            1
        } else {
            config.max_connections
        };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .idle_timeout(None)
            .max_lifetime(None)
            .acquire_timeout(std::time::Duration::from_secs(config.acquire_timeout_secs))
            .connect(&config.database_url)
            .await
            .map_err(|e| DbError::Connection(format!("SQLite: {}", e)))?;

        info!("Connected to SQLite");

        Ok(Self { pool })
    }

    /// Connect to a fresh in-memory database and run migrations
    pub async fn connect_in_memory() -> DbResult<Self> {
        let config = DatabaseConfig {
            database_url: "sqlite::memory:".to_string(),
            ..Default::default()
        };
        let db = Self::connect(&config).await?;
        db.migrate().await?;
        Ok(db)
    }

    /// Run database migrations
    pub async fn migrate(&self) -> DbResult<()> {
        info!("Running database migrations...");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| DbError::Migration(e.to_string()))?;
        info!("Migrations complete");
        Ok(())
    }

    /// Health check
    pub async fn health_check(&self) -> DbResult<bool> {
        Ok(sqlx::query("SELECT 1").fetch_one(&self.pool).await.is_ok())
    }

    /// The underlying pool, for transaction control
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Create repository instances
    pub fn balance_repo(&self) -> BalanceRepo {
        BalanceRepo::new(self.pool.clone())
    }

    pub fn lot_repo(&self) -> LotRepo {
        LotRepo::new(self.pool.clone())
    }

    pub fn withdrawal_repo(&self) -> WithdrawalRepo {
        WithdrawalRepo::new(self.pool.clone())
    }

    pub fn settlement_repo(&self) -> SettlementRepo {
        SettlementRepo::new(self.pool.clone())
    }
}
