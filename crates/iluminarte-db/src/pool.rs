//! # Database Handle
//!
//! Opens the SQLite pool the repositories share.
//!
//! ## Locking Model
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      One file, many connections                         │
//! │                                                                         │
//! │   dashboard ──┐                                                         │
//! │   list_sales ─┼──► readers: WAL snapshots, never blocked               │
//! │   catalog ────┘                                                         │
//! │                                                                         │
//! │   create_sale ─┐                                                        │
//! │   edit_sale ───┼──► writers: one at a time; the others wait up to      │
//! │   delete_sale ─┘    busy_timeout, then the ledger retries               │
//! │                                                                         │
//! │   Every connection: journal_mode=WAL, synchronous=NORMAL,              │
//! │                     foreign_keys=ON                                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::LedgerConfig;
use crate::error::{DbError, DbResult};
use crate::migrations;
use crate::repository::product::ProductRepository;
use crate::repository::report::ReportRepository;
use crate::repository::sale::SaleRepository;
use crate::repository::user::UserRepository;

const MEMORY_PATH: &str = ":memory:";

// =============================================================================
// Configuration
// =============================================================================

/// How to open the database.
///
/// ## Example
/// ```rust
/// use std::time::Duration;
/// use iluminarte_db::DbConfig;
///
/// let config = DbConfig::new("/var/lib/iluminarte/shop.db")
///     .max_connections(8)
///     .busy_timeout(Duration::from_secs(2));
/// assert_eq!(config.max_connections, 8);
/// assert!(!config.is_in_memory());
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// SQLite file, created on first open. `:memory:` for a private
    /// in-memory database.
    pub database_path: PathBuf,

    pub max_connections: u32,

    /// How long a caller may wait for a free pooled connection.
    pub acquire_timeout: Duration,

    /// How long a writer waits on the SQLite lock before the statement
    /// fails with "database is locked".
    pub busy_timeout: Duration,

    /// Apply pending migrations when the pool opens.
    pub run_migrations: bool,

    /// Retry policy handed to every [`SaleRepository`].
    pub ledger: LedgerConfig,
}

impl DbConfig {
    /// File-backed database with five connections and a 5s busy timeout.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            database_path: path.into(),
            max_connections: 5,
            acquire_timeout: Duration::from_secs(30),
            busy_timeout: Duration::from_secs(5),
            run_migrations: true,
            ledger: LedgerConfig::default(),
        }
    }

    /// Fresh, isolated in-memory database for tests.
    ///
    /// Each SQLite connection to `:memory:` sees its own database, so the
    /// pool is pinned to a single connection that never expires.
    pub fn in_memory() -> Self {
        DbConfig {
            max_connections: 1,
            acquire_timeout: Duration::from_secs(5),
            busy_timeout: Duration::from_secs(1),
            ..DbConfig::new(MEMORY_PATH)
        }
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    /// Opens the pool without touching the schema.
    pub fn without_migrations(mut self) -> Self {
        self.run_migrations = false;
        self
    }

    pub fn ledger(mut self, ledger: LedgerConfig) -> Self {
        self.ledger = ledger;
        self
    }

    pub fn is_in_memory(&self) -> bool {
        self.database_path.as_os_str() == MEMORY_PATH
    }

    fn connect_options(&self) -> DbResult<SqliteConnectOptions> {
        let options = if self.is_in_memory() {
            SqliteConnectOptions::from_str("sqlite::memory:")
                .map_err(|e| DbError::ConnectionFailed(e.to_string()))?
        } else {
            SqliteConnectOptions::new()
                .filename(&self.database_path)
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal)
        };

        Ok(options
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true)
            .busy_timeout(self.busy_timeout))
    }

    fn pool_options(&self) -> SqlitePoolOptions {
        let options = SqlitePoolOptions::new()
            .max_connections(self.max_connections.max(1))
            .acquire_timeout(self.acquire_timeout);

        if self.is_in_memory() {
            // Dropping the only connection would drop the database.
            options
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            options
        }
    }
}

// =============================================================================
// Database
// =============================================================================

/// Shared handle to the pool; hands out repositories.
///
/// Clones share the same pool.
///
/// ```rust,ignore
/// let db = Database::new(AppConfig::from_env()?.db_config()).await?;
/// let products = db.products().list_in_stock().await?;
/// ```
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
    ledger: LedgerConfig,
}

impl Database {
    /// Opens the pool described by `config` and, unless disabled, brings
    /// the schema up to date.
    ///
    /// ## Returns
    /// * `Err(ConnectionFailed)` - The file could not be opened or created
    /// * `Err(MigrationFailed)` - A pending migration did not apply
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        info!(
            path = %config.database_path.display(),
            max_connections = config.max_connections,
            "Opening database"
        );

        let pool = config
            .pool_options()
            .connect_with(config.connect_options()?)
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        debug!(busy_timeout_ms = config.busy_timeout.as_millis() as u64, "Pool ready");

        let db = Database {
            pool,
            ledger: config.ledger,
        };

        if config.run_migrations {
            db.run_migrations().await?;
        }

        Ok(db)
    }

    /// Applies pending migrations. Safe to call repeatedly.
    pub async fn run_migrations(&self) -> DbResult<()> {
        migrations::run_migrations(&self.pool).await
    }

    /// The underlying pool, for ad-hoc queries.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Catalog.
    pub fn products(&self) -> ProductRepository {
        ProductRepository::new(self.pool.clone())
    }

    /// Sale ledger, using this database's retry policy.
    pub fn sales(&self) -> SaleRepository {
        SaleRepository::new(self.pool.clone()).with_config(self.ledger)
    }

    /// Account directory.
    pub fn users(&self) -> UserRepository {
        UserRepository::new(self.pool.clone())
    }

    /// Dashboard queries.
    pub fn reports(&self) -> ReportRepository {
        ReportRepository::new(self.pool.clone())
    }

    /// Waits for checked-out connections and closes the pool.
    pub async fn close(&self) {
        info!("Closing database");
        self.pool.close().await;
    }

    /// True while the pool can still run a statement.
    pub async fn health_check(&self) -> bool {
        sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .is_ok()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_open_and_close() {
        let config = DbConfig::in_memory();
        assert!(config.is_in_memory());

        let db = Database::new(config).await.unwrap();
        assert!(db.health_check().await);

        db.close().await;
        assert!(!db.health_check().await);
    }

    #[test]
    fn test_builder() {
        let config = DbConfig::new("/tmp/shop.db")
            .max_connections(10)
            .acquire_timeout(Duration::from_secs(3))
            .busy_timeout(Duration::from_millis(300))
            .without_migrations()
            .ledger(LedgerConfig {
                max_attempts: 5,
                retry_backoff: Duration::from_millis(1),
            });

        assert!(!config.is_in_memory());
        assert!(!config.run_migrations);
        assert_eq!(config.max_connections, 10);
        assert_eq!(config.acquire_timeout, Duration::from_secs(3));
        assert_eq!(config.busy_timeout, Duration::from_millis(300));
        assert_eq!(config.ledger.max_attempts, 5);
    }

    #[tokio::test]
    async fn test_in_memory_databases_are_isolated() {
        let a = Database::new(DbConfig::in_memory()).await.unwrap();
        let b = Database::new(DbConfig::in_memory()).await.unwrap();

        sqlx::query("CREATE TABLE marker (id INTEGER)")
            .execute(a.pool())
            .await
            .unwrap();

        let seen: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'marker'",
        )
        .fetch_one(b.pool())
        .await
        .unwrap();
        assert_eq!(seen, 0);
    }

    #[tokio::test]
    async fn test_foreign_keys_enabled() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let on: i64 = sqlx::query_scalar("PRAGMA foreign_keys")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(on, 1);
    }

    #[tokio::test]
    async fn test_without_migrations_leaves_schema_empty() {
        let db = Database::new(DbConfig::in_memory().without_migrations())
            .await
            .unwrap();
        let tables: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'products'",
        )
        .fetch_one(db.pool())
        .await
        .unwrap();
        assert_eq!(tables, 0);

        db.run_migrations().await.unwrap();
        assert_eq!(db.products().count().await.unwrap(), 0);
    }
}
