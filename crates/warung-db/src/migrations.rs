//! # Database Migrations
//!
//! Versioned schema upgrades with record backfills.
//!
//! ## How Migrations Work
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Migration Process                                  │
//! │                                                                         │
//! │  App Startup                                                           │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  PRAGMA user_version  (0 = brand-new file)                             │
//! │       │                                                                 │
//! │       ├── > LATEST_VERSION? → UnsupportedVersion (refuse to open)      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  For each step with stored < step.version ≤ target, ascending:         │
//! │     BEGIN                                                              │
//! │       1. structural DDL                                                │
//! │       2. CREATE INDEX for the registry's delta (v-1 → v)               │
//! │       3. record transform (pure fn old → new, changed rows written)    │
//! │       4. PRAGMA user_version = v                                       │
//! │     COMMIT                                                             │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Record store and coordinator become reachable                         │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Steps commit one at a time: if step 3 fails, steps 1 and 2 stay applied
//! and the stored version reads 2.
//!
//! ## Adding New Migrations
//!
//! 1. Declare the new index set in [`crate::schema`] and bump `LATEST_VERSION`
//! 2. Append a [`Migration`] with the next version number
//! 3. Keep transforms pure: old record in, new record out
//! 4. **NEVER** modify an existing step - always add a new one

use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::schema::{self, LATEST_VERSION};
use crate::seed;
use warung_core::pricing::as_int;
use warung_core::Role;

// =============================================================================
// Legacy Record Shapes
// =============================================================================

/// A user row as it may exist before normalization.
///
/// Every column is read as optional text so that anything an older
/// installation stored can be inspected without failing to decode.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct LegacyUser {
    pub id: i64,
    pub username: Option<String>,
    pub username_norm: Option<String>,
    pub role: Option<String>,
}

/// The pricing columns of a product row, as optional text.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct LegacyProduct {
    pub id: i64,
    pub retail_price: Option<String>,
    pub wholesale_price: Option<String>,
}

/// Pure record upgrade applied by a migration step.
#[derive(Debug, Clone, Copy)]
pub enum RecordTransform {
    Users(fn(LegacyUser) -> LegacyUser),
    Products(fn(LegacyProduct) -> LegacyProduct),
}

/// One step of the chain, tagged with the version it upgrades *to*.
#[derive(Debug, Clone, Copy)]
pub struct Migration {
    pub version: i64,
    pub description: &'static str,
    /// Structural statements run before the index delta.
    pub ddl: &'static str,
    pub transform: Option<RecordTransform>,
}

// =============================================================================
// Record Transforms
// =============================================================================

/// v2: derive `username_norm` where missing and canonicalize the role.
pub fn normalize_user(mut user: LegacyUser) -> LegacyUser {
    let has_norm = user.username_norm.as_deref().is_some_and(|n| !n.is_empty());
    if !has_norm {
        if let Some(username) = user.username.as_deref().filter(|u| !u.is_empty()) {
            user.username_norm = Some(warung_core::normalize_username(username));
        }
    }
    user.role = Some(Role::coerce(user.role.as_deref()).as_str().to_string());
    user
}

/// v3: copy the retail price into an unusable wholesale price.
pub fn backfill_wholesale(mut product: LegacyProduct) -> LegacyProduct {
    let retail = product.retail_price.as_deref().and_then(as_int);
    let wholesale = product.wholesale_price.as_deref().and_then(as_int);
    if let (None, Some(retail)) = (wholesale, retail) {
        product.wholesale_price = Some(retail.to_string());
    }
    product
}

// =============================================================================
// Migration Chain
// =============================================================================

const V1_BASELINE: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    username    TEXT NOT NULL,
    password    TEXT NOT NULL,
    role        TEXT,
    created_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS products (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    code            TEXT NOT NULL,
    name            TEXT NOT NULL,
    retail_price    INTEGER,
    wholesale_price INTEGER,
    cost_price      INTEGER NOT NULL DEFAULT 0,
    stock_qty       INTEGER NOT NULL DEFAULT 0 CHECK (stock_qty >= 0),
    created_at      TEXT NOT NULL,
    updated_at      TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS suppliers (
    id                  INTEGER PRIMARY KEY AUTOINCREMENT,
    name                TEXT NOT NULL,
    bank_name           TEXT NOT NULL DEFAULT '',
    bank_account_number TEXT NOT NULL DEFAULT '',
    created_at          TEXT NOT NULL,
    updated_at          TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS customers (
    id                 INTEGER PRIMARY KEY AUTOINCREMENT,
    member_no          TEXT NOT NULL,
    name               TEXT NOT NULL,
    phone              TEXT NOT NULL,
    address            TEXT NOT NULL DEFAULT '',
    total_transactions INTEGER NOT NULL DEFAULT 0 CHECK (total_transactions >= 0),
    birth_date         TEXT,
    created_at         TEXT NOT NULL,
    updated_at         TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS transactions (
    id                INTEGER PRIMARY KEY AUTOINCREMENT,
    sale_type         TEXT NOT NULL,
    date              TEXT NOT NULL,
    customer_id       INTEGER,
    customer_snapshot TEXT,
    items             TEXT NOT NULL,
    subtotal          INTEGER NOT NULL,
    discount          INTEGER NOT NULL DEFAULT 0,
    total             INTEGER NOT NULL,
    payment_type      TEXT NOT NULL DEFAULT 'CASH',
    cash_received     INTEGER NOT NULL,
    change_due        INTEGER NOT NULL,
    receipt_no        TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS incoming_goods (
    id               INTEGER PRIMARY KEY AUTOINCREMENT,
    invoice_no       TEXT NOT NULL,
    supplier_id      INTEGER,
    items            TEXT NOT NULL,
    grand_total      INTEGER NOT NULL,
    transaction_time TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS settings (
    id            TEXT PRIMARY KEY,
    business_name TEXT NOT NULL,
    address       TEXT NOT NULL DEFAULT '',
    logo_url      TEXT,
    theme         TEXT NOT NULL DEFAULT 'light',
    currency      TEXT NOT NULL DEFAULT 'IDR'
);

CREATE TABLE IF NOT EXISTS _store_meta (
    id        INTEGER PRIMARY KEY CHECK (id = 1),
    write_seq INTEGER NOT NULL DEFAULT 0
);

INSERT OR IGNORE INTO _store_meta (id, write_seq) VALUES (1, 0);
"#;

/// The full chain, ascending.
pub const MIGRATIONS: [Migration; 4] = [
    Migration {
        version: 1,
        description: "baseline collections",
        ddl: V1_BASELINE,
        transform: None,
    },
    Migration {
        version: 2,
        description: "normalized username index, role coercion",
        ddl: "ALTER TABLE users ADD COLUMN username_norm TEXT;",
        transform: Some(RecordTransform::Users(normalize_user)),
    },
    Migration {
        version: 3,
        description: "backfill missing wholesale prices",
        ddl: "",
        transform: Some(RecordTransform::Products(backfill_wholesale)),
    },
    Migration {
        version: 4,
        description: "stockQty index",
        ddl: "",
        transform: None,
    },
];

// =============================================================================
// Runner
// =============================================================================

/// Reads the stored schema version (0 for a brand-new database).
pub async fn stored_version(conn: &mut SqliteConnection) -> DbResult<i64> {
    let version: i64 = sqlx::query_scalar("PRAGMA user_version")
        .fetch_one(conn)
        .await?;
    Ok(version)
}

/// Brings the database to [`LATEST_VERSION`].
///
/// ## Returns
/// The version stored before any step ran; `0` means the database was
/// created by this call.
pub async fn run_migrations(pool: &SqlitePool) -> DbResult<i64> {
    migrate_to(pool, LATEST_VERSION).await
}

/// Like [`run_migrations`], but a brand-new database is built in a single
/// transaction: every step, then the demo data when `seed` is set.
///
/// A failure anywhere leaves the store at version 0, so the next open
/// creates and seeds it again. An existing database upgrades step by step
/// and is never seeded.
pub async fn create_or_upgrade(pool: &SqlitePool, seed: bool) -> DbResult<i64> {
    let mut conn = pool.acquire().await?;
    let stored = stored_version(&mut conn).await?;
    drop(conn);

    if stored != 0 {
        return run_migrations(pool).await;
    }

    info!(seed, "Creating database");
    let mut tx = pool.begin().await?;
    for migration in &MIGRATIONS {
        apply_step(&mut tx, migration)
            .await
            .map_err(|e| DbError::MigrationFailed {
                version: migration.version,
                reason: e.to_string(),
            })?;
    }
    if seed {
        seed::populate(&mut tx).await?;
    }
    tx.commit().await?;

    info!(version = LATEST_VERSION, "Database created");
    Ok(0)
}

/// Applies every pending step up to and including `target`.
///
/// ## Errors
/// - [`DbError::UnsupportedVersion`] if the stored version is above the
///   latest known version (or `target` is)
/// - [`DbError::MigrationFailed`] naming the step that failed; earlier
///   steps remain committed
pub async fn migrate_to(pool: &SqlitePool, target: i64) -> DbResult<i64> {
    let mut conn = pool.acquire().await?;
    let stored = stored_version(&mut conn).await?;
    drop(conn);

    if stored > LATEST_VERSION || target > LATEST_VERSION {
        return Err(DbError::UnsupportedVersion {
            found: stored.max(target),
            latest: LATEST_VERSION,
        });
    }

    info!(stored, target, "Checking for pending migrations");

    for migration in MIGRATIONS
        .iter()
        .filter(|m| m.version > stored && m.version <= target)
    {
        apply(pool, migration)
            .await
            .map_err(|e| DbError::MigrationFailed {
                version: migration.version,
                reason: e.to_string(),
            })?;

        info!(
            version = migration.version,
            description = migration.description,
            "Migration applied"
        );
    }

    Ok(stored)
}

/// Returns `(stored_version, latest_version)` for diagnostics.
pub async fn migration_status(pool: &SqlitePool) -> DbResult<(i64, i64)> {
    let mut conn = pool.acquire().await?;
    Ok((stored_version(&mut conn).await?, LATEST_VERSION))
}

async fn apply(pool: &SqlitePool, migration: &Migration) -> DbResult<()> {
    let mut tx = pool.begin().await?;
    apply_step(&mut tx, migration).await?;
    tx.commit().await?;
    Ok(())
}

/// One step on a connection whose transaction the caller owns.
async fn apply_step(conn: &mut SqliteConnection, migration: &Migration) -> DbResult<()> {
    if !migration.ddl.trim().is_empty() {
        sqlx::raw_sql(migration.ddl).execute(&mut *conn).await?;
    }

    for (collection, index) in schema::index_delta(migration.version - 1, migration.version) {
        debug!(index = %index.sql_name(collection), "Creating index");
        sqlx::query(&index.create_sql(collection))
            .execute(&mut *conn)
            .await?;
    }

    if let Some(transform) = migration.transform {
        let changed = apply_transform(&mut *conn, transform).await?;
        debug!(version = migration.version, changed, "Records transformed");
    }

    sqlx::query(&format!("PRAGMA user_version = {}", migration.version))
        .execute(&mut *conn)
        .await?;

    Ok(())
}

/// Runs a record transform over its collection, writing back only the
/// rows it changed. Returns the number of rows written.
pub(crate) async fn apply_transform(
    conn: &mut SqliteConnection,
    transform: RecordTransform,
) -> DbResult<u64> {
    let mut changed = 0;

    match transform {
        RecordTransform::Users(upgrade) => {
            let users: Vec<LegacyUser> = sqlx::query_as(
                "SELECT id, CAST(username AS TEXT) AS username, \
                 CAST(username_norm AS TEXT) AS username_norm, \
                 CAST(role AS TEXT) AS role FROM users ORDER BY id",
            )
            .fetch_all(&mut *conn)
            .await?;

            for old in users {
                let new = upgrade(old.clone());
                if new != old {
                    sqlx::query("UPDATE users SET username_norm = ?, role = ? WHERE id = ?")
                        .bind(&new.username_norm)
                        .bind(&new.role)
                        .bind(new.id)
                        .execute(&mut *conn)
                        .await?;
                    changed += 1;
                }
            }
        }
        RecordTransform::Products(upgrade) => {
            let products: Vec<LegacyProduct> = sqlx::query_as(
                "SELECT id, CAST(retail_price AS TEXT) AS retail_price, \
                 CAST(wholesale_price AS TEXT) AS wholesale_price FROM products ORDER BY id",
            )
            .fetch_all(&mut *conn)
            .await?;

            for old in products {
                let new = upgrade(old.clone());
                if new.wholesale_price != old.wholesale_price {
                    let wholesale = new.wholesale_price.as_deref().and_then(as_int);
                    sqlx::query("UPDATE products SET wholesale_price = ? WHERE id = ?")
                        .bind(wholesale)
                        .bind(new.id)
                        .execute(&mut *conn)
                        .await?;
                    changed += 1;
                }
            }
        }
    }

    Ok(changed)
}

// =============================================================================
// Unit Tests
// =============================================================================
