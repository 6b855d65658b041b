//! # Seed Data
//!
//! Demo records written when a database is created for the first time.
//!
//! ## When Seeding Runs
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Database::new                                                          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  create_or_upgrade() ──► stored version                                 │
//! │       │                                                                 │
//! │       ├── 0 (new file): v1..v4 + populate(), one transaction            │
//! │       └── 1..=4 (existing data)     ──► leave records alone             │
//! │                                                                         │
//! │  Database::reset() ──► drop everything ──► migrate ──► populate()       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! [`ensure_demo_users`] is separate: it can run against any database and
//! only re-creates the two demo accounts if they are missing.

use chrono::Utc;
use sqlx::SqliteConnection;
use tracing::{info, warn};

use crate::coordinator::Coordinator;
use crate::error::DbResult;
use crate::repository::user::{find_by_norm, insert_user};
use crate::schema::Collection;
use warung_core::{normalize_username, NewUser, Role, Theme, SETTINGS_ID};

/// `(username, password, role)` of the built-in demo accounts.
pub const DEMO_USERS: &[(&str, &str, Role)] = &[
    ("admin123", "admin123", Role::Admin),
    ("kasir123", "kasir123", Role::Cashier),
];

/// `(code, name, retail, wholesale, cost, stock)`
const PRODUCTS: &[(&str, &str, i64, i64, i64, i64)] = &[
    ("P001", "Kopi Hitam", 5000, 4000, 2000, 100),
    ("P002", "Es Teh Manis", 4000, 3000, 1500, 150),
    ("P003", "Indomie Goreng", 8000, 7000, 4000, 80),
    ("P004", "Nasi Goreng Spesial", 15000, 13000, 8000, 50),
    ("P005", "Air Mineral 600ml", 3000, 2500, 1000, 200),
    ("P006", "Gorengan (Bakwan)", 1000, 800, 400, 300),
    ("P007", "Roti Bakar Coklat", 10000, 8500, 5000, 40),
    ("P008", "Teh Botol Sosro", 5000, 4000, 2500, 120),
];

/// `(name, bank, account number)`
const SUPPLIERS: &[(&str, &str, &str)] = &[
    ("Supplier Sembako Jaya", "BCA", "1234567890"),
    ("Grosir Minuman Segar", "Mandiri", "0987654321"),
    ("Pasar Induk Kramat Jati", "BRI", "1122334455"),
];

/// `(member no, name, phone, address)`
const CUSTOMERS: &[(&str, &str, &str, &str)] = &[
    ("C001", "Budi Santoso", "081234567890", "Jl. Merdeka No. 1"),
    ("C002", "Siti Aminah", "081345678901", "Jl. Pahlawan No. 10"),
    ("C003", "Agus Wijaya", "081456789012", "Jl. Sudirman No. 5A"),
    ("C004", "Dewi Lestari", "081567890123", "Jl. Gatot Subroto No. 22"),
    ("C005", "Eko Prasetyo", "081678901234", "Jl. Diponegoro No. 8"),
];

const BUSINESS_NAME: &str = "Warung Kita";
const BUSINESS_ADDRESS: &str = "Jl. Raya Bogor KM 20, Jakarta Timur";

fn demo_user(&(username, password, role): &(&str, &str, Role)) -> NewUser {
    NewUser {
        username: username.to_string(),
        password: password.to_string(),
        role,
    }
}

/// Writes the full demo data set on an open connection.
///
/// The caller owns the transaction; a failure part way leaves nothing
/// behind once it rolls back.
pub async fn populate(conn: &mut SqliteConnection) -> DbResult<()> {
    let now = Utc::now();

    for account in DEMO_USERS {
        insert_user(&mut *conn, &demo_user(account)).await?;
    }

    for &(code, name, retail, wholesale, cost, stock) in PRODUCTS {
        sqlx::query(
            r#"
            INSERT INTO products (
                code, name, retail_price, wholesale_price, cost_price, stock_qty,
                created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(code)
        .bind(name)
        .bind(retail)
        .bind(wholesale)
        .bind(cost)
        .bind(stock)
        .bind(now)
        .bind(now)
        .execute(&mut *conn)
        .await?;
    }

    for &(name, bank, account) in SUPPLIERS {
        sqlx::query(
            r#"
            INSERT INTO suppliers (name, bank_name, bank_account_number, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(name)
        .bind(bank)
        .bind(account)
        .bind(now)
        .bind(now)
        .execute(&mut *conn)
        .await?;
    }

    for &(member_no, name, phone, address) in CUSTOMERS {
        sqlx::query(
            r#"
            INSERT INTO customers (
                member_no, name, phone, address, total_transactions, created_at, updated_at
            ) VALUES (?, ?, ?, ?, 0, ?, ?)
            "#,
        )
        .bind(member_no)
        .bind(name)
        .bind(phone)
        .bind(address)
        .bind(now)
        .bind(now)
        .execute(&mut *conn)
        .await?;
    }

    sqlx::query(
        r#"
        INSERT INTO settings (id, business_name, address, logo_url, theme, currency)
        VALUES (?, ?, ?, NULL, ?, 'IDR')
        "#,
    )
    .bind(SETTINGS_ID)
    .bind(BUSINESS_NAME)
    .bind(BUSINESS_ADDRESS)
    .bind(Theme::Light)
    .execute(&mut *conn)
    .await?;

    info!(
        users = DEMO_USERS.len(),
        products = PRODUCTS.len(),
        suppliers = SUPPLIERS.len(),
        customers = CUSTOMERS.len(),
        "Demo data seeded"
    );
    Ok(())
}

/// Re-creates any demo account that is missing, matching by normalized
/// username. Existing accounts are never touched, so a changed demo
/// password survives.
///
/// ## Returns
/// Number of accounts created.
pub async fn ensure_demo_users(coordinator: &Coordinator) -> DbResult<usize> {
    let mut uow = coordinator.begin(&[Collection::Users]).await?;

    let mut created = 0;
    for account in DEMO_USERS {
        let norm = normalize_username(account.0);
        if find_by_norm(&mut uow, &norm).await?.is_some() {
            continue;
        }
        insert_user(&mut uow, &demo_user(account)).await?;
        warn!(username = account.0, "Demo account was missing, re-created");
        created += 1;
    }

    uow.commit().await?;
    Ok(created)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    #[tokio::test]
    async fn test_first_open_seeds_demo_data() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        assert_eq!(db.users().count().await.unwrap(), 2);
        assert_eq!(db.products().count().await.unwrap(), 8);
        assert_eq!(db.suppliers().count().await.unwrap(), 3);
        assert_eq!(db.customers().count().await.unwrap(), 5);
        assert_eq!(db.transactions().count().await.unwrap(), 0);

        let admin = db.users().authenticate("admin123", "admin123").await.unwrap();
        assert_eq!(admin.role, Role::Admin);
        let kasir = db.users().authenticate("KASIR123", "kasir123").await.unwrap();
        assert_eq!(kasir.role, Role::Cashier);

        let kopi = db.products().find_by_code("P001").await.unwrap().unwrap();
        assert_eq!(kopi.retail_price, Some(5000));
        assert_eq!(kopi.stock_qty, 100);
    }

    #[tokio::test]
    async fn test_ensure_demo_users_is_idempotent() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        assert_eq!(ensure_demo_users(db.coordinator()).await.unwrap(), 0);

        let kasir = db.users().find_by_username("kasir123").await.unwrap().unwrap();
        db.users().delete(kasir.id, None).await.unwrap();

        assert_eq!(ensure_demo_users(db.coordinator()).await.unwrap(), 1);
        assert_eq!(ensure_demo_users(db.coordinator()).await.unwrap(), 0);
        assert_eq!(db.users().count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_ensure_demo_users_keeps_changed_password() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let admin = db.users().find_by_username("admin123").await.unwrap().unwrap();
        db.users()
            .update(
                admin.id,
                &warung_core::UserPatch {
                    password: Some("baru123".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        ensure_demo_users(db.coordinator()).await.unwrap();
        assert!(db.users().authenticate("admin123", "baru123").await.is_ok());
    }
}
