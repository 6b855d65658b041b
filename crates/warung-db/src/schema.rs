//! # Schema Registry
//!
//! Declares, for every schema version, the collections of the store and
//! the indexes each one carries. The migration engine reads index deltas
//! from here and the record store validates query index names against the
//! latest declaration.
//!
//! ## Version History
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  v1  users          &username                                           │
//! │      products       &code, name                                         │
//! │      suppliers      name                                                │
//! │      customers      &memberNo, name, phone                              │
//! │      transactions   date, type, customerId, &receiptNo                  │
//! │      incomingGoods  transactionTime, supplierId, invoiceNo              │
//! │      settings       (keyed by id)                                       │
//! │                                                                         │
//! │  v2  users          + &usernameNorm           (+ backfill, roles)       │
//! │  v3  (no structural change)                   (+ wholesale backfill)    │
//! │  v4  products       + stockQty                                          │
//! │                                                                         │
//! │  & = unique                                                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each version is a superset of the one before it: indexes and
//! collections may be added, never removed.

use std::fmt;

use crate::error::{DbError, DbResult};

/// Latest schema version known to this build.
pub const LATEST_VERSION: i64 = 4;

// =============================================================================
// Collections
// =============================================================================

/// The seven record collections.
///
/// The derived ordering is the canonical lock order used by the
/// transaction coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Collection {
    Users,
    Products,
    Suppliers,
    Customers,
    Transactions,
    IncomingGoods,
    Settings,
}

impl Collection {
    pub const ALL: [Collection; 7] = [
        Collection::Users,
        Collection::Products,
        Collection::Suppliers,
        Collection::Customers,
        Collection::Transactions,
        Collection::IncomingGoods,
        Collection::Settings,
    ];

    /// SQLite table backing the collection.
    pub const fn table(&self) -> &'static str {
        match self {
            Collection::Users => "users",
            Collection::Products => "products",
            Collection::Suppliers => "suppliers",
            Collection::Customers => "customers",
            Collection::Transactions => "transactions",
            Collection::IncomingGoods => "incoming_goods",
            Collection::Settings => "settings",
        }
    }

    /// Singular entity name used in error messages.
    pub const fn entity(&self) -> &'static str {
        match self {
            Collection::Users => "User",
            Collection::Products => "Product",
            Collection::Suppliers => "Supplier",
            Collection::Customers => "Customer",
            Collection::Transactions => "Transaction",
            Collection::IncomingGoods => "IncomingGoods",
            Collection::Settings => "Settings",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table())
    }
}

// =============================================================================
// Index Declarations
// =============================================================================

/// A secondary index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexDef {
    /// Name callers query by (`"stockQty"`, `"memberNo"`, ...).
    pub name: &'static str,
    /// Column the index covers.
    pub column: &'static str,
    pub unique: bool,
}

impl IndexDef {
    const fn plain(name: &'static str, column: &'static str) -> Self {
        IndexDef {
            name,
            column,
            unique: false,
        }
    }

    const fn unique(name: &'static str, column: &'static str) -> Self {
        IndexDef {
            name,
            column,
            unique: true,
        }
    }

    /// Name of the SQLite index object.
    pub fn sql_name(&self, collection: Collection) -> String {
        format!("idx_{}_{}", collection.table(), self.column)
    }

    /// `CREATE INDEX` statement for this index.
    pub fn create_sql(&self, collection: Collection) -> String {
        format!(
            "CREATE {}INDEX IF NOT EXISTS {} ON {} ({})",
            if self.unique { "UNIQUE " } else { "" },
            self.sql_name(collection),
            collection.table(),
            self.column
        )
    }
}

/// One collection's declaration at a given version.
#[derive(Debug, Clone, Copy)]
pub struct CollectionDef {
    pub collection: Collection,
    pub indexes: &'static [IndexDef],
}

/// Full declaration of one schema version.
#[derive(Debug, Clone, Copy)]
pub struct SchemaVersion {
    pub version: i64,
    pub collections: &'static [CollectionDef],
}

impl SchemaVersion {
    pub fn indexes(&self, collection: Collection) -> &'static [IndexDef] {
        self.collections
            .iter()
            .find(|c| c.collection == collection)
            .map(|c| c.indexes)
            .unwrap_or(&[])
    }
}

// -----------------------------------------------------------------------------
// Per-version index sets
// -----------------------------------------------------------------------------

const USERS_V1: &[IndexDef] = &[IndexDef::unique("username", "username")];
const USERS_V2: &[IndexDef] = &[
    IndexDef::unique("username", "username"),
    IndexDef::unique("usernameNorm", "username_norm"),
];
const PRODUCTS_V1: &[IndexDef] = &[
    IndexDef::unique("code", "code"),
    IndexDef::plain("name", "name"),
];
const PRODUCTS_V4: &[IndexDef] = &[
    IndexDef::unique("code", "code"),
    IndexDef::plain("name", "name"),
    IndexDef::plain("stockQty", "stock_qty"),
];
const SUPPLIERS: &[IndexDef] = &[IndexDef::plain("name", "name")];
const CUSTOMERS: &[IndexDef] = &[
    IndexDef::unique("memberNo", "member_no"),
    IndexDef::plain("name", "name"),
    IndexDef::plain("phone", "phone"),
];
const TRANSACTIONS: &[IndexDef] = &[
    IndexDef::plain("date", "date"),
    IndexDef::plain("type", "sale_type"),
    IndexDef::plain("customerId", "customer_id"),
    IndexDef::unique("receiptNo", "receipt_no"),
];
const INCOMING_GOODS: &[IndexDef] = &[
    IndexDef::plain("transactionTime", "transaction_time"),
    IndexDef::plain("supplierId", "supplier_id"),
    IndexDef::plain("invoiceNo", "invoice_no"),
];

const fn collections(users: &'static [IndexDef], products: &'static [IndexDef]) -> [CollectionDef; 7] {
    [
        CollectionDef {
            collection: Collection::Users,
            indexes: users,
        },
        CollectionDef {
            collection: Collection::Products,
            indexes: products,
        },
        CollectionDef {
            collection: Collection::Suppliers,
            indexes: SUPPLIERS,
        },
        CollectionDef {
            collection: Collection::Customers,
            indexes: CUSTOMERS,
        },
        CollectionDef {
            collection: Collection::Transactions,
            indexes: TRANSACTIONS,
        },
        CollectionDef {
            collection: Collection::IncomingGoods,
            indexes: INCOMING_GOODS,
        },
        CollectionDef {
            collection: Collection::Settings,
            indexes: &[],
        },
    ]
}

const V1: [CollectionDef; 7] = collections(USERS_V1, PRODUCTS_V1);
const V2: [CollectionDef; 7] = collections(USERS_V2, PRODUCTS_V1);
const V4: [CollectionDef; 7] = collections(USERS_V2, PRODUCTS_V4);

/// Every declared version, ascending.
pub const VERSIONS: [SchemaVersion; 4] = [
    SchemaVersion {
        version: 1,
        collections: &V1,
    },
    SchemaVersion {
        version: 2,
        collections: &V2,
    },
    SchemaVersion {
        version: 3,
        collections: &V2,
    },
    SchemaVersion {
        version: 4,
        collections: &V4,
    },
];

// =============================================================================
// Lookups
// =============================================================================

/// Declaration of `version`, if known.
pub fn version(version: i64) -> Option<&'static SchemaVersion> {
    VERSIONS.iter().find(|v| v.version == version)
}

/// Declaration of [`LATEST_VERSION`].
pub fn latest() -> &'static SchemaVersion {
    &VERSIONS[VERSIONS.len() - 1]
}

/// Indexes declared at `to` that were not declared at `from`.
///
/// `from = 0` stands for an empty database, so every index of `to` is new.
pub fn index_delta(from: i64, to: i64) -> Vec<(Collection, IndexDef)> {
    let Some(target) = version(to) else {
        return Vec::new();
    };
    let previous = version(from);

    target
        .collections
        .iter()
        .flat_map(|def| {
            def.indexes.iter().filter_map(move |index| {
                let existed = previous
                    .map(|p| p.indexes(def.collection).contains(index))
                    .unwrap_or(false);
                (!existed).then_some((def.collection, *index))
            })
        })
        .collect()
}

/// Looks up a queryable index on the latest schema.
pub fn find_index(collection: Collection, name: &str) -> DbResult<IndexDef> {
    latest()
        .indexes(collection)
        .iter()
        .find(|i| i.name == name)
        .copied()
        .ok_or_else(|| DbError::UnknownIndex {
            collection: collection.table().to_string(),
            index: name.to_string(),
        })
}

/// Checks that every version only adds to its predecessor.
///
/// Returns the first offending `(version, collection, index)` on failure.
pub fn verify_evolution() -> Result<(), (i64, Collection, &'static str)> {
    for pair in VERSIONS.windows(2) {
        let (older, newer) = (&pair[0], &pair[1]);
        for def in older.collections {
            for index in def.indexes {
                if !newer.indexes(def.collection).contains(index) {
                    return Err((newer.version, def.collection, index.name));
                }
            }
        }
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
