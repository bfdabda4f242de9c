//! # reverie-db
//!
//! PostgreSQL database layer for reverie.
//!
//! This crate provides:
//! - Connection pool management
//! - Repository implementations for entries and insights
//! - Embedded schema migrations
//!
//! ## Example
//!
//! ```rust,ignore
//! use reverie_db::Database;
//! use reverie_core::{CreateEntryRequest, EntryRepository};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("postgres://localhost/reverie").await?;
//!     db.migrate().await?;
//!
//!     let owner = uuid::Uuid::now_v7();
//!     let entry_id = db.entries.insert(owner, CreateEntryRequest {
//!         content: "Today was a good day. I felt happy and productive.".to_string(),
//!         mood: None,
//!         entry_date: None,
//!     }).await?;
//!
//!     println!("Created entry: {}", entry_id);
//!     Ok(())
//! }
//! ```

pub mod entries;
pub mod insights;
pub mod pool;

pub use entries::PgEntryRepository;
pub use insights::PgInsightRepository;
pub use pool::{create_pool, create_pool_with_config, log_pool_metrics, PoolConfig};

// Re-export core types
pub use reverie_core::*;

/// Combined database context with all repositories.
#[derive(Clone)]
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::Pool<sqlx::Postgres>,
    /// Journal entry repository.
    pub entries: PgEntryRepository,
    /// Batch insight repository.
    pub insights: PgInsightRepository,
}

impl Database {
    /// Create a new Database instance from a connection pool.
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        Self {
            entries: PgEntryRepository::new(pool.clone()),
            insights: PgInsightRepository::new(pool.clone()),
            pool,
        }
    }

    /// Connect with default pool configuration.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = create_pool(database_url).await?;
        Ok(Self::new(pool))
    }

    /// Connect with custom pool configuration.
    pub async fn connect_with_config(database_url: &str, config: PoolConfig) -> Result<Self> {
        let pool = create_pool_with_config(database_url, config).await?;
        Ok(Self::new(pool))
    }

    /// Run pending embedded migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Internal(format!("Migration failed: {}", e)))?;
        Ok(())
    }

    /// Lightweight liveness probe for the health endpoint.
    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(())
    }
}
