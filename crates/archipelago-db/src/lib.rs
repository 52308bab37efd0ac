//! # archipelago-db
//!
//! PostgreSQL persistence for archipelago.
//!
//! This crate provides:
//! - Connection pool management
//! - Directory hierarchy stored as an `ltree` materialized path
//! - Notes with per-user access overrides
//! - The transactional tag linker
//! - Meeting summaries
//!
//! ## Example
//!
//! ```rust,ignore
//! use archipelago_db::{Database, DirectoryRepository};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("postgres://localhost/archipelago").await?;
//!     let inbox = db.dirs.create("Inbox", None).await?;
//!     println!("Created directory {}", inbox.id);
//!     Ok(())
//! }
//! ```

pub mod dirs;
pub mod notes;
pub mod pool;
pub mod summaries;
pub mod tags;

// Always compiled so integration tests in tests/ can use it.
pub mod test_fixtures;

pub use archipelago_core::*;

pub use dirs::PgDirectoryRepository;
pub use notes::PgNoteRepository;
pub use pool::{create_pool, create_pool_with_config, log_pool_metrics, PoolConfig};
pub use summaries::PgSummaryRepository;
pub use tags::PgTagRepository;

/// Whether the error is a PostgreSQL foreign key violation.
pub(crate) fn is_foreign_key_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_foreign_key_violation())
}

/// Whether the error is a PostgreSQL unique constraint violation.
pub(crate) fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_unique_violation())
}

/// All repositories over one connection pool.
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::Pool<sqlx::Postgres>,
    /// Directory hierarchy.
    pub dirs: PgDirectoryRepository,
    /// Notes and access overrides.
    pub notes: PgNoteRepository,
    /// Tags and their links.
    pub tags: PgTagRepository,
    /// Meeting summaries.
    pub summaries: PgSummaryRepository,
}

impl Database {
    /// Create a new Database instance from a connection pool.
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        Self {
            dirs: PgDirectoryRepository::new(pool.clone()),
            notes: PgNoteRepository::new(pool.clone()),
            tags: PgTagRepository::new(pool.clone()),
            summaries: PgSummaryRepository::new(pool.clone()),
            pool,
        }
    }

    /// Connect with the default pool configuration.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = create_pool(url).await?;
        Ok(Self::new(pool))
    }

    /// Connect with a custom pool configuration.
    pub async fn connect_with_config(url: &str, config: PoolConfig) -> Result<Self> {
        let pool = create_pool_with_config(url, config).await?;
        Ok(Self::new(pool))
    }

    /// Run pending migrations.
    #[cfg(feature = "migrations")]
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
        tracing::info!(
            subsystem = "db",
            component = "migrations",
            op = "migrate",
            "Database migrations applied"
        );
        Ok(())
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &sqlx::Pool<sqlx::Postgres> {
        &self.pool
    }
}
