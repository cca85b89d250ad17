//! # coachnote-db
//!
//! PostgreSQL store for coachnote search.
//!
//! This crate provides:
//! - Connection pool management
//! - The coach note repository (insert, fetch, share, audit, delete)
//! - Full-text search with a weighted, accent-insensitive tsvector
//!
//! ## Example
//!
//! ```rust,ignore
//! use coachnote_db::{Database, CoachNoteRepository, CreateCoachNoteRequest};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("postgres://localhost/coachnote").await?;
//!
//!     let id = db.notes.insert(
//!         CreateCoachNoteRequest::new("coach1", "Discussed quarterly goals")
//!             .with_title("Q1 review")
//!             .with_tags(["goals"]),
//!     ).await?;
//!
//!     println!("Created note: {}", id);
//!     Ok(())
//! }
//! ```
pub mod notes;
pub mod pool;
pub mod search;
pub mod search_filter;

// Always compiled so integration tests (in tests/) can use DEFAULT_TEST_DATABASE_URL
pub mod test_fixtures;

// Re-export core types
pub use coachnote_core::*;

pub use notes::PgCoachNoteRepository;
pub use pool::{create_pool, create_pool_with_config, PoolConfig};
pub use search::PgNoteSearch;
pub use search_filter::{
    escape_like, order_clause, QueryParam, SearchFilterClause, SearchFilterQueryBuilder,
    TEXT_SEARCH_CONFIG,
};

/// Combined database context with all repositories.
#[derive(Clone)]
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::Pool<sqlx::Postgres>,
    /// Coach note repository for writes and lookups.
    pub notes: PgCoachNoteRepository,
    /// Full-text search store.
    pub search: PgNoteSearch,
}

impl Database {
    /// Create a new Database instance from a connection pool.
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        Self {
            notes: PgCoachNoteRepository::new(pool.clone()),
            search: PgNoteSearch::new(pool.clone()),
            pool,
        }
    }

    /// Connect to the database with default pool settings.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = create_pool(database_url).await?;
        Ok(Self::new(pool))
    }

    /// Connect to the database with custom pool settings.
    pub async fn connect_with_config(database_url: &str, config: PoolConfig) -> Result<Self> {
        let pool = create_pool_with_config(database_url, config).await?;
        Ok(Self::new(pool))
    }

    /// Run database migrations.
    #[cfg(feature = "migrations")]
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
        Ok(())
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &sqlx::Pool<sqlx::Postgres> {
        &self.pool
    }
}
