//! # cinemax-db
//!
//! PostgreSQL database layer for the cinemax pipeline.
//!
//! This crate provides:
//! - Connection settings and pool management
//! - Validation of configured relation names
//! - The staging reader over the ingestion collaborator's relation
//! - The production repository: pgvector schema bootstrap and
//!   merge-on-key upsert in a single transaction
//!
//! ## Example
//!
//! ```rust,ignore
//! use cinemax_db::{Database, DatabaseConfig, PoolConfig, RelationName};
//!
//! let db = Database::connect(
//!     &DatabaseConfig::default(),
//!     PoolConfig::default(),
//!     RelationName::parse("tmdb_data.raw_movies")?,
//!     RelationName::parse("public.movies_production")?,
//!     768,
//! )
//! .await?;
//! db.production.ensure_schema().await?;
//! let pending = db.staging.fetch_pending().await?;
//! db.close().await;
//! ```

pub mod pool;
pub mod production;
pub mod relation;
pub mod staging;

// Test fixtures for integration tests
// Note: Always compiled so integration tests (in tests/) can use DEFAULT_TEST_DATABASE_URL
pub mod test_fixtures;

// Re-export core types
pub use cinemax_core::*;

pub use pool::{close_pool, create_pool, DatabaseConfig, PoolConfig};
pub use production::PgProductionRepository;
pub use relation::{validate_identifier, RelationName};
pub use staging::PgStagingReader;

/// Combined database context for one pipeline run.
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::Pool<sqlx::Postgres>,
    /// Reader over the staging relation.
    pub staging: PgStagingReader,
    /// Writer for the production relation.
    pub production: PgProductionRepository,
}

impl Database {
    /// Create a new Database instance from a connection pool.
    pub fn new(
        pool: sqlx::Pool<sqlx::Postgres>,
        staging: RelationName,
        production: RelationName,
        dimension: usize,
    ) -> Self {
        Self {
            staging: PgStagingReader::new(pool.clone(), staging),
            production: PgProductionRepository::new(pool.clone(), production, dimension),
            pool,
        }
    }

    /// Create a new Database instance by connecting with the given settings.
    pub async fn connect(
        config: &DatabaseConfig,
        pool_config: PoolConfig,
        staging: RelationName,
        production: RelationName,
        dimension: usize,
    ) -> Result<Self> {
        let pool = create_pool(config, pool_config).await?;
        Ok(Self::new(pool, staging, production, dimension))
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &sqlx::Pool<sqlx::Postgres> {
        &self.pool
    }

    /// Release every connection held by this context.
    pub async fn close(&self) {
        close_pool(&self.pool).await;
    }
}
