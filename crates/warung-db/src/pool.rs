//! # Database Handle
//!
//! Opens the SQLite file, brings the schema up to date, seeds a brand-new
//! store and hands out repositories.
//!
//! ## Startup
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  DbConfig::from_env() / DbConfig::new(path)                             │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Database::new(config).await                                            │
//! │       │                                                                 │
//! │       ├── open SqlitePool (WAL, busy timeout, create if missing)        │
//! │       ├── version 0: every step + seed::populate() in ONE transaction   │
//! │       ├── otherwise: pending steps, one transaction each, no seed       │
//! │       └── build Coordinator (locks + change feed) and SessionManager    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  db.products() · db.coordinator().complete_sale() · db.watch(...)       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## WAL Mode
//! Readers never wait for the writer, so list pages keep rendering while a
//! sale commits. Writers still serialize in SQLite; the coordinator's
//! collection locks decide the order before SQLite sees them.

use std::env;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use directories::ProjectDirs;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::coordinator::Coordinator;
use crate::error::{DbError, DbResult};
use crate::feed::{ChangeFeed, LiveQuery};
use crate::migrations;
use crate::repository::{
    CustomerRepository, IncomingGoodsRepository, ProductRepository, SettingsRepository,
    SupplierRepository, TransactionRepository, UserRepository,
};
use crate::schema::Collection;
use crate::seed;
use crate::session::{SessionFile, SessionManager};
use warung_core::ValidationError;

const IN_MEMORY: &str = ":memory:";

// =============================================================================
// Configuration
// =============================================================================

/// Database configuration.
///
/// ## Example
/// ```rust,ignore
/// let config = DbConfig::new("/path/to/warung.db")
///     .max_connections(5)
///     .seed_on_create(false);
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Path to the SQLite database file.
    pub database_path: PathBuf,

    /// Maximum number of connections in the pool.
    /// Default: 5
    pub max_connections: u32,

    /// Minimum number of connections to keep alive.
    /// Default: 1
    pub min_connections: u32,

    /// How long to wait for a free connection.
    /// Default: 30 seconds
    pub connect_timeout: Duration,

    /// Idle timeout before closing a connection.
    /// Default: 10 minutes
    pub idle_timeout: Duration,

    /// How long SQLite retries a locked database before failing.
    /// Default: 5 seconds
    pub busy_timeout: Duration,

    /// Whether to run migrations on connect.
    /// Default: true
    pub run_migrations: bool,

    /// Whether a freshly created database gets the demo data set.
    /// Default: true
    pub seed_on_create: bool,
}

impl DbConfig {
    /// Creates a configuration for the database file at `path`. The file
    /// and its directory are created if missing.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            database_path: path.into(),
            max_connections: 5,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            busy_timeout: Duration::from_secs(5),
            run_migrations: true,
            seed_on_create: true,
        }
    }

    /// Reads the configuration from the environment.
    ///
    /// | Variable                 | Default                          |
    /// |--------------------------|----------------------------------|
    /// | `WARUNG_DB_PATH`         | [`DbConfig::default_path`]       |
    /// | `WARUNG_MAX_CONNECTIONS` | 5                                |
    /// | `WARUNG_SEED_ON_CREATE`  | `true`                           |
    pub fn from_env() -> DbResult<Self> {
        let path = env::var_os("WARUNG_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(Self::default_path);
        let mut config = DbConfig::new(path);

        if let Ok(raw) = env::var("WARUNG_MAX_CONNECTIONS") {
            config.max_connections = raw
                .trim()
                .parse()
                .map_err(|_| invalid_env("WARUNG_MAX_CONNECTIONS", &raw))?;
        }
        if let Ok(raw) = env::var("WARUNG_SEED_ON_CREATE") {
            config.seed_on_create = parse_flag(&raw)
                .ok_or_else(|| invalid_env("WARUNG_SEED_ON_CREATE", &raw))?;
        }

        Ok(config)
    }

    /// `warung.db` in the platform data directory, or the working
    /// directory if the platform has none.
    pub fn default_path() -> PathBuf {
        ProjectDirs::from("com", "warung", "pos")
            .map(|dirs| dirs.data_dir().join("warung.db"))
            .unwrap_or_else(|| PathBuf::from("warung.db"))
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    pub fn run_migrations(mut self, run: bool) -> Self {
        self.run_migrations = run;
        self
    }

    pub fn seed_on_create(mut self, seed: bool) -> Self {
        self.seed_on_create = seed;
        self
    }

    /// Creates an in-memory database configuration (for testing).
    ///
    /// ## Usage
    /// ```rust,ignore
    /// let db = Database::new(DbConfig::in_memory().seed_on_create(false)).await?;
    /// ```
    pub fn in_memory() -> Self {
        DbConfig {
            database_path: PathBuf::from(IN_MEMORY),
            max_connections: 1, // In-memory requires single connection
            min_connections: 1,
            connect_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(60),
            busy_timeout: Duration::from_secs(5),
            run_migrations: true,
            seed_on_create: true,
        }
    }

    pub fn is_in_memory(&self) -> bool {
        self.database_path == Path::new(IN_MEMORY)
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn invalid_env(name: &str, raw: &str) -> DbError {
    DbError::Validation(ValidationError::InvalidFormat {
        field: name.to_string(),
        reason: format!("unrecognised value '{raw}'"),
    })
}

// =============================================================================
// Database
// =============================================================================

/// Main database handle providing repository access.
///
/// Cheap to clone; clones share the pool, the collection locks, the change
/// feed and the session.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
    coordinator: Coordinator,
    session: SessionManager,
    config: DbConfig,
}

impl Database {
    /// Opens (or creates) the database.
    ///
    /// ## What This Does
    /// 1. Creates the directory and file if they don't exist
    /// 2. Configures SQLite: WAL, NORMAL synchronous, busy timeout
    /// 3. Runs migrations (if enabled)
    /// 4. Seeds demo data if the file was just created (if enabled)
    ///
    /// ## Returns
    /// * `Ok(Database)` - Ready-to-use handle
    /// * `Err(DbError::StorageUnavailable)` - File could not be opened
    /// * `Err(DbError::UnsupportedVersion)` - File written by a newer build
    /// * `Err(DbError::MigrationFailed)` - A schema step failed
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        info!(
            path = %config.database_path.display(),
            "Initializing database connection"
        );

        let base_options = if config.is_in_memory() {
            SqliteConnectOptions::from_str("sqlite::memory:")
                .map_err(|e| DbError::StorageUnavailable(e.to_string()))?
        } else {
            if let Some(dir) = config.database_path.parent().filter(|d| !d.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(dir)
                    .await
                    .map_err(|e| DbError::StorageUnavailable(e.to_string()))?;
            }
            SqliteConnectOptions::new()
                .filename(&config.database_path)
                .create_if_missing(true)
        };
        let connect_options = base_options
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(config.busy_timeout);

        let mut pool_options = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.connect_timeout);
        pool_options = if config.is_in_memory() {
            // The database lives only as long as its one connection.
            pool_options.idle_timeout(None).max_lifetime(None)
        } else {
            pool_options.idle_timeout(Some(config.idle_timeout))
        };

        let pool = pool_options
            .connect_with(connect_options)
            .await
            .map_err(|e| DbError::StorageUnavailable(e.to_string()))?;

        info!(max_connections = config.max_connections, "Database pool created");

        let coordinator = Coordinator::new(pool.clone(), ChangeFeed::new());
        let session_file =
            (!config.is_in_memory()).then(|| SessionFile::beside(&config.database_path));
        let session = SessionManager::new(UserRepository::new(coordinator.clone()), session_file);

        let db = Database {
            pool,
            coordinator,
            session,
            config,
        };

        if db.config.run_migrations {
            let previous =
                migrations::create_or_upgrade(&db.pool, db.config.seed_on_create).await?;
            info!(previous, "Migrations complete");
        }

        Ok(db)
    }

    /// Brings the schema to the latest version. Returns the version stored
    /// before this call.
    pub async fn run_migrations(&self) -> DbResult<i64> {
        info!("Running database migrations");
        let previous = migrations::run_migrations(&self.pool).await?;
        info!(previous, "Migrations complete");
        Ok(previous)
    }

    /// `(stored, latest)` schema versions.
    pub async fn migration_status(&self) -> DbResult<(i64, i64)> {
        migrations::migration_status(&self.pool).await
    }

    /// Re-creates missing demo accounts. Returns how many were created.
    pub async fn ensure_demo_users(&self) -> DbResult<usize> {
        seed::ensure_demo_users(&self.coordinator).await
    }

    /// Destroys every record and recreates the store as if new.
    ///
    /// Waits for in-flight units of work, drops every table, migrates from
    /// version 0, re-seeds (if `seed_on_create`) and wakes every live query.
    /// The current session is signed out.
    pub async fn reset(&self) -> DbResult<()> {
        info!("Resetting database");
        let guards = self.coordinator.lock_all().await;

        let mut tx = self.pool.begin().await?;
        for collection in Collection::ALL {
            debug!(%collection, "Dropping collection");
            sqlx::query(&format!("DROP TABLE IF EXISTS {}", collection.table()))
                .execute(&mut *tx)
                .await?;
        }
        sqlx::query("DROP TABLE IF EXISTS _store_meta")
            .execute(&mut *tx)
            .await?;
        sqlx::query("PRAGMA user_version = 0")
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        migrations::create_or_upgrade(&self.pool, self.config.seed_on_create).await?;

        self.coordinator.feed().publish(&Collection::ALL);
        drop(guards);

        self.session.logout().await?;
        info!("Database reset complete");
        Ok(())
    }

    /// Re-runs `query` every time a commit touches `scope`.
    ///
    /// Dropping the returned [`LiveQuery`] unsubscribes it.
    pub fn watch<T, F, Fut>(&self, scope: &[Collection], query: F) -> LiveQuery<T>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = DbResult<T>> + Send + 'static,
    {
        LiveQuery::new(self.coordinator.feed().subscribe(scope), query)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn config(&self) -> &DbConfig {
        &self.config
    }

    /// Units of work, sale completion and goods receipts.
    pub fn coordinator(&self) -> &Coordinator {
        &self.coordinator
    }

    pub fn feed(&self) -> &ChangeFeed {
        self.coordinator.feed()
    }

    /// Login, logout and the signed-in user.
    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    pub fn users(&self) -> UserRepository {
        UserRepository::new(self.coordinator.clone())
    }

    pub fn products(&self) -> ProductRepository {
        ProductRepository::new(self.coordinator.clone())
    }

    pub fn suppliers(&self) -> SupplierRepository {
        SupplierRepository::new(self.coordinator.clone())
    }

    pub fn customers(&self) -> CustomerRepository {
        CustomerRepository::new(self.coordinator.clone())
    }

    pub fn transactions(&self) -> TransactionRepository {
        TransactionRepository::new(self.coordinator.clone())
    }

    pub fn incoming_goods(&self) -> IncomingGoodsRepository {
        IncomingGoodsRepository::new(self.coordinator.clone())
    }

    pub fn settings(&self) -> SettingsRepository {
        SettingsRepository::new(self.coordinator.clone())
    }

    /// Closes the pool. Every later operation fails with
    /// [`DbError::StorageUnavailable`].
    pub async fn close(&self) {
        info!("Closing database connection pool");
        self.pool.close().await;
    }

    /// Checks if the database answers queries.
    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use uuid::Uuid;
    use warung_core::ledger::{SaleLine, SaleRequest};
    use warung_core::{NewProduct, SaleType};

    #[tokio::test]
    async fn test_in_memory_database() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        assert!(db.health_check().await);
        assert_eq!(db.migration_status().await.unwrap(), (4, 4));
    }

    #[test]
    fn test_config_builder() {
        let config = DbConfig::new("/tmp/test.db")
            .max_connections(10)
            .min_connections(2)
            .seed_on_create(false);

        assert_eq!(config.max_connections, 10);
        assert_eq!(config.min_connections, 2);
        assert!(!config.seed_on_create);
        assert!(!config.is_in_memory());
        assert!(DbConfig::in_memory().is_in_memory());
    }

    #[test]
    fn test_parse_flag() {
        assert_eq!(parse_flag(" TRUE "), Some(true));
        assert_eq!(parse_flag("0"), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }

    #[tokio::test]
    async fn test_reopen_does_not_reseed() {
        let path = std::env::temp_dir()
            .join(format!("warung-{}", Uuid::new_v4()))
            .join("warung.db");

        let db = Database::new(DbConfig::new(&path)).await.unwrap();
        let kopi = db.products().find_by_code("P001").await.unwrap().unwrap();
        db.products().delete(kopi.id).await.unwrap();
        db.close().await;

        let reopened = Database::new(DbConfig::new(&path)).await.unwrap();
        assert_eq!(reopened.products().count().await.unwrap(), 7);
        assert!(reopened.products().find_by_code("P001").await.unwrap().is_none());
        reopened.close().await;

        if let Some(dir) = path.parent() {
            let _ = std::fs::remove_dir_all(dir);
        }
    }

    #[tokio::test]
    async fn test_failed_seed_leaves_store_new() {
        let path = std::env::temp_dir()
            .join(format!("warung-{}", Uuid::new_v4()))
            .join("warung.db");

        // A stray settings table without the seeded columns makes populate fail.
        let db = Database::new(DbConfig::new(&path).run_migrations(false))
            .await
            .unwrap();
        sqlx::query("CREATE TABLE settings (id TEXT PRIMARY KEY)")
            .execute(db.pool())
            .await
            .unwrap();

        let err = migrations::create_or_upgrade(db.pool(), true).await;
        assert!(err.is_err());
        assert_eq!(db.migration_status().await.unwrap(), (0, 4));
        let tables: Vec<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name = 'products'",
        )
        .fetch_all(db.pool())
        .await
        .unwrap();
        assert!(tables.is_empty());

        sqlx::query("DROP TABLE settings")
            .execute(db.pool())
            .await
            .unwrap();
        db.close().await;

        let reopened = Database::new(DbConfig::new(&path)).await.unwrap();
        assert_eq!(reopened.migration_status().await.unwrap(), (4, 4));
        assert_eq!(reopened.products().count().await.unwrap(), 8);
        assert!(reopened.settings().find().await.unwrap().is_some());
        reopened.close().await;

        if let Some(dir) = path.parent() {
            let _ = std::fs::remove_dir_all(dir);
        }
    }

    #[tokio::test]
    async fn test_reset_restores_seed_and_wakes_watchers() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let kopi = db.products().find_by_code("P001").await.unwrap().unwrap();
        db.coordinator()
            .complete_sale(&SaleRequest {
                sale_type: SaleType::Retail,
                lines: vec![SaleLine {
                    product_id: kopi.id,
                    unit_price: 5000,
                    qty: 3,
                    note: None,
                }],
                customer_id: None,
                discount: 0,
                cash_received: 20000,
            })
            .await
            .unwrap();
        db.session().login("admin123", "admin123").await.unwrap();

        let transactions = db.transactions();
        let live = db.watch(&[Collection::Transactions], move || {
            let transactions = transactions.clone();
            async move { transactions.count().await }
        });
        assert_eq!(live.current().await.unwrap(), 1);

        db.reset().await.unwrap();

        let after = tokio::time::timeout(Duration::from_millis(200), live.changed())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(after, 0);
        assert_eq!(db.products().find_by_code("P001").await.unwrap().unwrap().stock_qty, 100);
        assert_eq!(db.users().count().await.unwrap(), 2);
        assert!(db.session().current().await.is_none());
        assert_eq!(db.migration_status().await.unwrap(), (4, 4));
    }

    #[tokio::test]
    async fn test_live_query_follows_writes() {
        let db = Database::new(DbConfig::in_memory().seed_on_create(false))
            .await
            .unwrap();
        let products = db.products();
        let live = db.watch(&[Collection::Products], move || {
            let products = products.clone();
            async move { products.in_stock().await }
        });
        assert!(live.current().await.unwrap().is_empty());

        db.products()
            .add(&NewProduct {
                code: "P001".to_string(),
                name: "Kopi".to_string(),
                retail_price: 5000,
                wholesale_price: 4000,
                cost_price: 2000,
                stock_qty: 3,
            })
            .await
            .unwrap();

        let listed = tokio::time::timeout(Duration::from_millis(200), live.changed())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(listed.len(), 1);

        assert_eq!(db.feed().subscriber_count(), 1);
        drop(live);
        assert_eq!(db.feed().subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_closed_pool_is_unavailable() {
        let db = Database::new(DbConfig::in_memory().seed_on_create(false))
            .await
            .unwrap();
        db.close().await;
        assert!(!db.health_check().await);
        assert!(matches!(
            db.products().count().await,
            Err(DbError::StorageUnavailable(_))
        ));
    }
}
