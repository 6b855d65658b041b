//! # Repository Module
//!
//! One repository per collection. Reads go straight to the pool; every
//! write runs as a unit of work through the [`Coordinator`], so plain CRUD
//! queues behind sales and goods receipts touching the same collections
//! and wakes the same live queries.
//!
//! ## Repository Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  db.users()           add · update · delete (not self) · search        │
//! │  db.products()        add · update · delete · in_stock · search        │
//! │  db.suppliers()       add · update · delete · search                   │
//! │  db.customers()       add · update · delete (no sales) · search        │
//! │  db.transactions()    read-only ledger · between dates · by customer   │
//! │  db.incoming_goods()  read-only ledger · between dates · by supplier   │
//! │  db.settings()        get · update                                     │
//! │                                                                         │
//! │  Ledger inserts only happen in Coordinator::complete_sale and          │
//! │  Coordinator::receive_goods.                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! [`Coordinator`]: crate::coordinator::Coordinator

pub mod customer;
pub mod incoming_goods;
pub mod product;
pub mod settings;
pub mod supplier;
pub mod transaction;
pub mod user;

pub use customer::CustomerRepository;
pub use incoming_goods::IncomingGoodsRepository;
pub use product::ProductRepository;
pub use settings::SettingsRepository;
pub use supplier::SupplierRepository;
pub use transaction::TransactionRepository;
pub use user::UserRepository;

use std::collections::BTreeMap;

/// Merges the results of several index scans, dropping duplicates by id.
pub(crate) fn merge_by_id<T>(batches: Vec<Vec<T>>, id: impl Fn(&T) -> i64) -> Vec<T> {
    let mut merged = BTreeMap::new();
    for record in batches.into_iter().flatten() {
        merged.entry(id(&record)).or_insert(record);
    }
    merged.into_values().collect()
}
