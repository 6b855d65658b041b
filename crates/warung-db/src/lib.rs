//! # warung-db: Embedded Data Layer for Warung POS
//!
//! Owns the local SQLite database: the versioned schema, every read the
//! pages make and every write that must land all-or-nothing.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Warung POS Data Flow                             │
//! │                                                                         │
//! │  Kasir page (complete sale)        Admin pages (CRUD, reports)          │
//! │       │                                   │                             │
//! │       ▼                                   ▼                             │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    warung-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌──────────────┐   ┌──────────────┐   ┌──────────────────┐   │   │
//! │  │   │ Coordinator  │   │ Repositories │   │    ChangeFeed    │   │   │
//! │  │   │ locks + tx   │◄──│ CRUD, search │   │  live queries    │   │   │
//! │  │   │ sale/receipt │──►│ index scans  │   │  wake on commit  │   │   │
//! │  │   └──────┬───────┘   └──────┬───────┘   └────────▲─────────┘   │   │
//! │  │          │  commit ─────────┼────────────────────┘             │   │
//! │  │          ▼                  ▼                                   │   │
//! │  │   ┌─────────────────────────────────────────────────────────┐  │   │
//! │  │   │  store (typed rows, Query)  ·  schema (v1..v4 indexes)  │  │   │
//! │  │   │  migrations (user_version)  ·  seed (first creation)    │  │   │
//! │  │   └─────────────────────────────────────────────────────────┘  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │   SQLite (WAL)   <data dir>/warung.db  +  warung.session.json   │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - `DbConfig` and the `Database` handle
//! - [`schema`] - Collections and index declarations per schema version
//! - [`migrations`] - Versioned schema steps and record backfills
//! - [`store`] - Typed rows and index queries
//! - [`feed`] - Change notifications and live queries
//! - [`coordinator`] - Collection locks, units of work, sales, goods receipts
//! - [`repository`] - One repository per collection
//! - [`seed`] - Demo data for a new database
//! - [`session`] - Login and the signed-in user
//! - [`error`] - Database error types
//!
//! ## Usage
//!
//! ```rust,ignore
//! use warung_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::from_env()?).await?;
//! let cashier = db.session().login("kasir123", "kasir123").await?;
//!
//! let receipt = db.coordinator().complete_sale(&cart.checkout(None, 20_000)).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod coordinator;
pub mod error;
pub mod feed;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod schema;
pub mod seed;
pub mod session;
pub mod store;

// =============================================================================
// Re-exports
// =============================================================================

pub use coordinator::{receipt_number, Coordinator, UnitOfWork};
pub use error::{DbError, DbResult};
pub use feed::{ChangeFeed, LiveQuery, Subscription};
pub use pool::{Database, DbConfig};
pub use schema::{Collection, LATEST_VERSION};
pub use session::{SessionFile, SessionManager};
pub use store::{Predicate, Query, Value};

// Repository re-exports for convenience
pub use repository::{
    CustomerRepository, IncomingGoodsRepository, ProductRepository, SettingsRepository,
    SupplierRepository, TransactionRepository, UserRepository,
};
