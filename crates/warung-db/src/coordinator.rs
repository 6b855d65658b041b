//! # Transaction Coordinator
//!
//! Every write in the data layer runs as a unit of work: a declared set of
//! collections, locked up front, plus one SQLite transaction.
//!
//! ## Unit of Work
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Unit of Work Protocol                             │
//! │                                                                         │
//! │  begin(&[Transactions, Products, Customers])                           │
//! │       │                                                                 │
//! │       ├── 1. lock collections in canonical order (queue behind others) │
//! │       ├── 2. BEGIN                                                     │
//! │       ├── 3. bump _store_meta.write_seq (takes the SQLite write lock)  │
//! │       ▼                                                                 │
//! │  reads + writes on the unit's connection                               │
//! │       │                                                                 │
//! │       ├── any error ──► drop ──► ROLLBACK, locks released, no events   │
//! │       ▼                                                                 │
//! │  commit()                                                              │
//! │       ├── COMMIT                                                       │
//! │       ├── publish scope to the change feed                             │
//! │       └── release locks                                                │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Two units with overlapping scopes never interleave: the second waits
//! on the first collection they share. Locks are always taken in
//! [`Collection`] order, so waiting never forms a cycle.
//!
//! ## Sale Completion
//! ```text
//! SaleRequest ──► totals() (validation, nothing locked yet)
//!      │
//!      ▼
//! lock [Products, Customers?, Transactions]
//!      │
//!      ├── customer exists?              else NotFound
//!      ├── per line: product exists?     else NotFound
//!      │            stock ≥ qty now?     else InsufficientStock
//!      │            stock -= qty
//!      ├── INSERT transaction (receiptNo unique)
//!      ├── customer.totalTransactions += 1
//!      ▼
//! COMMIT ──► Transaction { id, .. }
//! ```

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{Sqlite, SqliteConnection, SqlitePool};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::feed::ChangeFeed;
use crate::schema::Collection;
use crate::store;
use warung_core::ledger::{GoodsReceiptRequest, SaleRequest};
use warung_core::{Customer, IncomingGoods, PaymentType, Product, Supplier, Transaction};

// =============================================================================
// Collection Locks
// =============================================================================

/// One FIFO async mutex per collection.
#[derive(Debug)]
pub struct LockManager {
    locks: [Arc<Mutex<()>>; Collection::ALL.len()],
}

impl Default for LockManager {
    fn default() -> Self {
        LockManager {
            locks: std::array::from_fn(|_| Arc::new(Mutex::new(()))),
        }
    }
}

impl LockManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Locks every collection in `scope`, in canonical order.
    pub async fn acquire(&self, scope: &[Collection]) -> Vec<OwnedMutexGuard<()>> {
        let mut ordered = scope.to_vec();
        ordered.sort();
        ordered.dedup();

        let mut guards = Vec::with_capacity(ordered.len());
        for collection in ordered {
            let lock = self.locks[collection as usize].clone();
            guards.push(lock.lock_owned().await);
        }
        guards
    }
}

// =============================================================================
// Unit of Work
// =============================================================================

/// An open, locked SQLite transaction.
///
/// Dereferences to the underlying connection so store functions and raw
/// queries can run inside it. Dropping without [`UnitOfWork::commit`]
/// rolls everything back.
pub struct UnitOfWork {
    // Field order matters: the transaction rolls back before locks release.
    tx: sqlx::Transaction<'static, Sqlite>,
    scope: Vec<Collection>,
    guards: Vec<OwnedMutexGuard<()>>,
    feed: ChangeFeed,
}

impl UnitOfWork {
    /// Collections this unit may write.
    pub fn scope(&self) -> &[Collection] {
        &self.scope
    }

    /// Commits, then notifies subscribers of every collection in scope.
    pub async fn commit(self) -> DbResult<()> {
        let UnitOfWork {
            tx,
            scope,
            guards,
            feed,
        } = self;

        tx.commit().await?;
        feed.publish(&scope);
        drop(guards);

        debug!(?scope, "Unit of work committed");
        Ok(())
    }
}

impl Deref for UnitOfWork {
    type Target = SqliteConnection;

    fn deref(&self) -> &SqliteConnection {
        &self.tx
    }
}

impl DerefMut for UnitOfWork {
    fn deref_mut(&mut self) -> &mut SqliteConnection {
        &mut self.tx
    }
}

// =============================================================================
// Coordinator
// =============================================================================

/// Shared handle for running units of work.
///
/// Cheap to clone; every clone shares the pool, the locks and the feed.
#[derive(Debug, Clone)]
pub struct Coordinator {
    pool: SqlitePool,
    locks: Arc<LockManager>,
    feed: ChangeFeed,
}

impl Coordinator {
    pub fn new(pool: SqlitePool, feed: ChangeFeed) -> Self {
        Coordinator {
            pool,
            locks: Arc::new(LockManager::new()),
            feed,
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn feed(&self) -> &ChangeFeed {
        &self.feed
    }

    /// Opens a unit of work over `scope`, waiting for any overlapping unit.
    pub async fn begin(&self, scope: &[Collection]) -> DbResult<UnitOfWork> {
        let guards = self.locks.acquire(scope).await;
        debug!(?scope, "Collection locks acquired");

        let mut tx = self.pool.begin().await?;
        sqlx::query("UPDATE _store_meta SET write_seq = write_seq + 1 WHERE id = 1")
            .execute(&mut *tx)
            .await?;

        Ok(UnitOfWork {
            tx,
            scope: scope.to_vec(),
            guards,
            feed: self.feed.clone(),
        })
    }

    /// Locks every collection without opening a transaction. Used by
    /// operations that replace the schema itself.
    pub(crate) async fn lock_all(&self) -> Vec<OwnedMutexGuard<()>> {
        self.locks.acquire(&Collection::ALL).await
    }

    /// Number of units committed since the store was created.
    pub async fn write_seq(&self) -> DbResult<i64> {
        let seq: i64 = sqlx::query_scalar("SELECT write_seq FROM _store_meta WHERE id = 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(seq)
    }

    // -------------------------------------------------------------------------
    // Sale completion
    // -------------------------------------------------------------------------

    /// Records a sale, decrements stock and bumps the customer counter,
    /// all or nothing.
    ///
    /// ## Errors
    /// - [`DbError::Validation`]: empty cart, bad quantities, not enough cash
    /// - [`DbError::NotFound`]: product or customer missing
    /// - [`DbError::InsufficientStock`]: stock changed since the cart was built
    /// - [`DbError::UniqueViolation`]: receipt number collision; retry
    pub async fn complete_sale(&self, request: &SaleRequest) -> DbResult<Transaction> {
        let totals = request.totals()?;

        let mut scope = vec![Collection::Products, Collection::Transactions];
        if request.customer_id.is_some() {
            scope.push(Collection::Customers);
        }
        let mut uow = self.begin(&scope).await?;

        let customer = match request.customer_id {
            Some(id) => Some(
                store::get::<Customer, _>(&mut *uow, id)
                    .await?
                    .ok_or_else(|| DbError::not_found("Customer", id))?,
            ),
            None => None,
        };

        let mut items = Vec::with_capacity(request.lines.len());
        for line in &request.lines {
            let product = store::get::<Product, _>(&mut *uow, line.product_id)
                .await?
                .ok_or_else(|| DbError::not_found("Product", line.product_id))?;

            if product.stock_qty < line.qty {
                return Err(DbError::InsufficientStock {
                    product_id: product.id,
                    code: product.code,
                    available: product.stock_qty,
                    requested: line.qty,
                });
            }

            sqlx::query("UPDATE products SET stock_qty = stock_qty - ? WHERE id = ?")
                .bind(line.qty)
                .bind(product.id)
                .execute(&mut *uow)
                .await?;

            items.push(line.to_item(&product.code, &product.name));
        }

        let date = Utc::now();
        let receipt_no = receipt_number(date);
        let snapshot = customer.as_ref().map(Customer::snapshot);

        let id = sqlx::query(
            r#"
            INSERT INTO transactions (
                sale_type, date, customer_id, customer_snapshot, items,
                subtotal, discount, total, payment_type,
                cash_received, change_due, receipt_no
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(request.sale_type)
        .bind(date)
        .bind(request.customer_id)
        .bind(snapshot.as_ref().map(Json))
        .bind(Json(&items))
        .bind(totals.subtotal)
        .bind(totals.discount)
        .bind(totals.total)
        .bind(PaymentType::Cash)
        .bind(totals.cash_received)
        .bind(totals.change_due)
        .bind(&receipt_no)
        .execute(&mut *uow)
        .await
        .map_err(|e| DbError::from(e).with_conflict(&[("receipt_no", receipt_no.as_str())]))?
        .last_insert_rowid();

        if let Some(customer) = &customer {
            sqlx::query(
                "UPDATE customers SET total_transactions = total_transactions + 1 WHERE id = ?",
            )
            .bind(customer.id)
            .execute(&mut *uow)
            .await?;
        }

        uow.commit().await?;

        info!(
            id,
            receipt_no = %receipt_no,
            total = totals.total,
            lines = items.len(),
            "Sale completed"
        );

        Ok(Transaction {
            id,
            sale_type: request.sale_type,
            date,
            customer_id: request.customer_id,
            customer_snapshot: snapshot,
            items,
            subtotal: totals.subtotal,
            discount: totals.discount,
            total: totals.total,
            payment_type: PaymentType::Cash,
            cash_received: totals.cash_received,
            change_due: totals.change_due,
            receipt_no,
        })
    }

    // -------------------------------------------------------------------------
    // Goods receipt
    // -------------------------------------------------------------------------

    /// Records a supplier delivery and adds its quantities to stock.
    ///
    /// ## Errors
    /// - [`DbError::Validation`]: missing invoice number, no lines, bad line
    /// - [`DbError::NotFound`]: product or supplier missing
    pub async fn receive_goods(&self, request: &GoodsReceiptRequest) -> DbResult<IncomingGoods> {
        let (items, grand_total) = request.items()?;

        let mut scope = vec![Collection::Products, Collection::IncomingGoods];
        if request.supplier_id.is_some() {
            scope.push(Collection::Suppliers);
        }
        let mut uow = self.begin(&scope).await?;

        if let Some(supplier_id) = request.supplier_id {
            store::get::<Supplier, _>(&mut *uow, supplier_id)
                .await?
                .ok_or_else(|| DbError::not_found("Supplier", supplier_id))?;
        }

        for item in &items {
            let updated = sqlx::query("UPDATE products SET stock_qty = stock_qty + ? WHERE id = ?")
                .bind(item.qty)
                .bind(item.product_id)
                .execute(&mut *uow)
                .await?;
            if updated.rows_affected() == 0 {
                return Err(DbError::not_found("Product", item.product_id));
            }
        }

        let transaction_time = Utc::now();
        let invoice_no = request.invoice_no.trim().to_string();

        let id = sqlx::query(
            r#"
            INSERT INTO incoming_goods (invoice_no, supplier_id, items, grand_total, transaction_time)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&invoice_no)
        .bind(request.supplier_id)
        .bind(Json(&items))
        .bind(grand_total)
        .bind(transaction_time)
        .execute(&mut *uow)
        .await
        .map_err(|e| DbError::from(e).with_conflict(&[("invoice_no", invoice_no.as_str())]))?
        .last_insert_rowid();

        uow.commit().await?;

        info!(id, invoice_no = %invoice_no, grand_total, "Goods received");

        Ok(IncomingGoods {
            id,
            invoice_no,
            supplier_id: request.supplier_id,
            items,
            grand_total,
            transaction_time,
        })
    }
}

/// Receipt number: `TX-{unix millis}-{4 hex}`.
///
/// The random suffix keeps two sales in the same millisecond apart.
pub fn receipt_number(at: DateTime<Utc>) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!(
        "TX-{}-{}",
        at.timestamp_millis(),
        suffix[..4].to_uppercase()
    )
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use std::time::Duration;
    use warung_core::ledger::{ReceiptLine, SaleLine};
    use warung_core::{NewCustomer, NewProduct, SaleType, ValidationError};

    async fn empty_db() -> Database {
        Database::new(DbConfig::in_memory().seed_on_create(false))
            .await
            .unwrap()
    }

    async fn product(db: &Database, code: &str, stock: i64) -> Product {
        db.products()
            .add(&NewProduct {
                code: code.to_string(),
                name: format!("Produk {}", code),
                retail_price: 5000,
                wholesale_price: 4000,
                cost_price: 2000,
                stock_qty: stock,
            })
            .await
            .unwrap()
    }

    fn sale(lines: Vec<(i64, i64)>, customer_id: Option<i64>) -> SaleRequest {
        let lines: Vec<SaleLine> = lines
            .into_iter()
            .map(|(product_id, qty)| SaleLine {
                product_id,
                unit_price: 5000,
                qty,
                note: None,
            })
            .collect();
        let subtotal: i64 = lines.iter().map(SaleLine::line_total).sum();
        SaleRequest {
            sale_type: SaleType::Retail,
            lines,
            customer_id,
            discount: 0,
            cash_received: subtotal,
        }
    }

    #[test]
    fn test_receipt_number_format() {
        let at = DateTime::parse_from_rfc3339("2024-05-01T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let receipt = receipt_number(at);

        assert!(receipt.starts_with("TX-1714557600000-"));
        assert_eq!(receipt.len(), "TX-1714557600000-".len() + 4);
    }

    #[tokio::test]
    async fn test_sell_down_to_zero_then_refuse() {
        let db = empty_db().await;
        let p = product(&db, "P1", 5).await;

        let tx = db.coordinator().complete_sale(&sale(vec![(p.id, 5)], None)).await.unwrap();
        assert_eq!(tx.total, 25000);
        assert_eq!(tx.items[0].code, "P1");
        assert_eq!(db.products().get(p.id).await.unwrap().stock_qty, 0);

        let err = db
            .coordinator()
            .complete_sale(&sale(vec![(p.id, 5)], None))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::InsufficientStock { available: 0, requested: 5, .. }
        ));
        assert_eq!(db.products().get(p.id).await.unwrap().stock_qty, 0);
        assert_eq!(db.transactions().count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_failed_second_line_rolls_back_everything() {
        let db = empty_db().await;
        let a = product(&db, "A", 10).await;
        let b = product(&db, "B", 1).await;
        let customer = db
            .customers()
            .add(&NewCustomer {
                member_no: "C001".to_string(),
                name: "Budi".to_string(),
                phone: "0812".to_string(),
                address: String::new(),
                birth_date: None,
            })
            .await
            .unwrap();

        let err = db
            .coordinator()
            .complete_sale(&sale(vec![(a.id, 3), (b.id, 2)], Some(customer.id)))
            .await
            .unwrap_err();

        assert!(matches!(err, DbError::InsufficientStock { ref code, .. } if code == "B"));
        assert_eq!(db.products().get(a.id).await.unwrap().stock_qty, 10);
        assert_eq!(db.products().get(b.id).await.unwrap().stock_qty, 1);
        assert_eq!(db.transactions().count().await.unwrap(), 0);
        assert_eq!(
            db.customers().get(customer.id).await.unwrap().total_transactions,
            0
        );
    }

    #[tokio::test]
    async fn test_customer_counter_tracks_sales() {
        let db = empty_db().await;
        let p = product(&db, "P1", 100).await;
        let customer = db
            .customers()
            .add(&NewCustomer {
                member_no: "C001".to_string(),
                name: "Siti".to_string(),
                phone: "0813".to_string(),
                address: "Jl. Pahlawan".to_string(),
                birth_date: None,
            })
            .await
            .unwrap();

        for _ in 0..3 {
            db.coordinator()
                .complete_sale(&sale(vec![(p.id, 1)], Some(customer.id)))
                .await
                .unwrap();
        }

        assert_eq!(
            db.customers().get(customer.id).await.unwrap().total_transactions,
            3
        );
        let sales = db.transactions().by_customer(customer.id).await.unwrap();
        assert_eq!(sales.len(), 3);
        assert!(sales
            .iter()
            .all(|t| t.customer_snapshot.as_ref().map(|s| s.name.as_str()) == Some("Siti")));
    }

    #[tokio::test]
    async fn test_sale_validation_happens_before_any_write() {
        let db = empty_db().await;
        let seq = db.coordinator().write_seq().await.unwrap();

        let err = db
            .coordinator()
            .complete_sale(&sale(vec![], None))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Validation(ValidationError::EmptyCart)));

        let p = product(&db, "P1", 5).await;
        let mut short = sale(vec![(p.id, 1)], None);
        short.cash_received = 1000;
        assert!(matches!(
            db.coordinator().complete_sale(&short).await,
            Err(DbError::Validation(ValidationError::InsufficientCash { .. }))
        ));

        let mut huge = sale(vec![(p.id, 2)], None);
        huge.lines[0].unit_price = i64::MAX;
        huge.cash_received = i64::MAX;
        assert!(matches!(
            db.coordinator().complete_sale(&huge).await,
            Err(DbError::Validation(ValidationError::AmountTooLarge { .. }))
        ));
        assert_eq!(db.products().get(p.id).await.unwrap().stock_qty, 5);

        // Only the product insert bumped the write sequence.
        assert_eq!(db.coordinator().write_seq().await.unwrap(), seq + 1);
    }

    #[tokio::test]
    async fn test_sale_missing_references() {
        let db = empty_db().await;
        let p = product(&db, "P1", 5).await;

        let err = db
            .coordinator()
            .complete_sale(&sale(vec![(p.id, 1)], Some(999)))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::NotFound { ref entity, .. } if entity == "Customer"));

        let err = db
            .coordinator()
            .complete_sale(&sale(vec![(p.id, 1), (404, 1)], None))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::NotFound { ref entity, .. } if entity == "Product"));
        assert_eq!(db.products().get(p.id).await.unwrap().stock_qty, 5);
    }

    #[tokio::test]
    async fn test_goods_receipt_totals_and_stock() {
        let db = empty_db().await;
        let a = product(&db, "A", 0).await;
        let b = product(&db, "B", 3).await;

        let receipt = db
            .coordinator()
            .receive_goods(&GoodsReceiptRequest {
                invoice_no: "INV-001".to_string(),
                supplier_id: None,
                lines: vec![
                    ReceiptLine {
                        product_id: a.id,
                        qty: 10,
                        unit_cost: 100,
                    },
                    ReceiptLine {
                        product_id: b.id,
                        qty: 5,
                        unit_cost: 200,
                    },
                ],
            })
            .await
            .unwrap();

        assert_eq!(receipt.grand_total, 2000);
        assert_eq!(receipt.items[1].line_total, 1000);
        assert_eq!(db.products().get(a.id).await.unwrap().stock_qty, 10);
        assert_eq!(db.products().get(b.id).await.unwrap().stock_qty, 8);

        let stored = db.incoming_goods().get(receipt.id).await.unwrap();
        assert_eq!(stored, receipt);
    }

    #[tokio::test]
    async fn test_goods_receipt_unknown_product_leaves_stock() {
        let db = empty_db().await;
        let a = product(&db, "A", 2).await;

        let err = db
            .coordinator()
            .receive_goods(&GoodsReceiptRequest {
                invoice_no: "INV-002".to_string(),
                supplier_id: None,
                lines: vec![
                    ReceiptLine {
                        product_id: a.id,
                        qty: 10,
                        unit_cost: 100,
                    },
                    ReceiptLine {
                        product_id: 77,
                        qty: 1,
                        unit_cost: 100,
                    },
                ],
            })
            .await
            .unwrap_err();

        assert!(matches!(err, DbError::NotFound { .. }));
        assert_eq!(db.products().get(a.id).await.unwrap().stock_qty, 2);
        assert_eq!(db.incoming_goods().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_overlapping_units_queue() {
        let db = empty_db().await;
        let coordinator = db.coordinator();

        let locks = LockManager::new();
        let first = locks.acquire(&[Collection::Products, Collection::Transactions]).await;
        let waiting = tokio::time::timeout(
            Duration::from_millis(50),
            locks.acquire(&[Collection::Transactions]),
        )
        .await;
        assert!(waiting.is_err());

        // Disjoint scope proceeds.
        let users = locks.acquire(&[Collection::Users]).await;
        drop(users);
        drop(first);
        let again = locks.acquire(&[Collection::Transactions]).await;
        assert_eq!(again.len(), 1);

        // Concurrent sales of the last unit: exactly one wins.
        let p = product(&db, "P1", 1).await;
        let (first_sale, second_sale) = (sale(vec![(p.id, 1)], None), sale(vec![(p.id, 1)], None));
        let (a, b) = tokio::join!(
            coordinator.complete_sale(&first_sale),
            coordinator.complete_sale(&second_sale),
        );
        assert_eq!(a.is_ok() as u8 + b.is_ok() as u8, 1);
        assert_eq!(db.products().get(p.id).await.unwrap().stock_qty, 0);
    }
}
