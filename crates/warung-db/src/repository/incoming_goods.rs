//! # Incoming Goods Repository
//!
//! Read side of the goods-receipt ledger. Rows are inserted only by
//! [`Coordinator::receive_goods`](crate::coordinator::Coordinator::receive_goods).

use chrono::{DateTime, Utc};

use crate::coordinator::Coordinator;
use crate::error::{DbError, DbResult};
use crate::schema::Collection;
use crate::store::{self, Query};
use warung_core::IncomingGoods;

#[derive(Debug, Clone)]
pub struct IncomingGoodsRepository {
    coordinator: Coordinator,
}

impl IncomingGoodsRepository {
    pub fn new(coordinator: Coordinator) -> Self {
        IncomingGoodsRepository { coordinator }
    }

    pub async fn get(&self, id: i64) -> DbResult<IncomingGoods> {
        store::get(self.coordinator.pool(), id)
            .await?
            .ok_or_else(|| DbError::not_found("IncomingGoods", id))
    }

    pub async fn query(&self, query: &Query) -> DbResult<Vec<IncomingGoods>> {
        store::query(self.coordinator.pool(), query).await
    }

    /// Every delivery, newest first.
    pub async fn list(&self) -> DbResult<Vec<IncomingGoods>> {
        self.query(&Query::on("transactionTime").reverse()).await
    }

    /// Deliveries received with `start <= time < end`, newest first.
    pub async fn between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> DbResult<Vec<IncomingGoods>> {
        self.query(&Query::on("transactionTime").between(start, end).reverse())
            .await
    }

    pub async fn by_supplier(&self, supplier_id: i64) -> DbResult<Vec<IncomingGoods>> {
        self.query(&Query::on("supplierId").equals(supplier_id))
            .await
    }

    /// Deliveries filed under an invoice number. Suppliers may reuse numbers.
    pub async fn by_invoice(&self, invoice_no: &str) -> DbResult<Vec<IncomingGoods>> {
        self.query(&Query::on("invoiceNo").equals(invoice_no.trim()))
            .await
    }

    pub async fn count(&self) -> DbResult<i64> {
        store::count(self.coordinator.pool(), Collection::IncomingGoods).await
    }
}

#[cfg(test)]
mod tests {
    use crate::error::DbError;
    use crate::pool::{Database, DbConfig};
    use warung_core::ledger::{GoodsReceiptRequest, ReceiptLine};
    use warung_core::{NewProduct, NewSupplier, ValidationError};

    #[tokio::test]
    async fn test_receipts_by_supplier_and_invoice() {
        let db = Database::new(DbConfig::in_memory().seed_on_create(false))
            .await
            .unwrap();
        let supplier = db
            .suppliers()
            .add(&NewSupplier {
                name: "Supplier Sembako Jaya".to_string(),
                bank_name: "BCA".to_string(),
                bank_account_number: "1234567890".to_string(),
            })
            .await
            .unwrap();
        let p = db
            .products()
            .add(&NewProduct {
                code: "P001".to_string(),
                name: "Kopi".to_string(),
                retail_price: 5000,
                wholesale_price: 4000,
                cost_price: 2000,
                stock_qty: 0,
            })
            .await
            .unwrap();

        let request = GoodsReceiptRequest {
            invoice_no: " INV-9 ".to_string(),
            supplier_id: Some(supplier.id),
            lines: vec![ReceiptLine {
                product_id: p.id,
                qty: 4,
                unit_cost: 2000,
            }],
        };
        db.coordinator().receive_goods(&request).await.unwrap();
        db.coordinator().receive_goods(&request).await.unwrap();

        assert_eq!(db.incoming_goods().by_supplier(supplier.id).await.unwrap().len(), 2);
        assert_eq!(db.incoming_goods().by_invoice("INV-9").await.unwrap().len(), 2);
        assert_eq!(db.products().get(p.id).await.unwrap().stock_qty, 8);

        let unknown_supplier = GoodsReceiptRequest {
            supplier_id: Some(999),
            ..request.clone()
        };
        assert!(matches!(
            db.coordinator().receive_goods(&unknown_supplier).await,
            Err(DbError::NotFound { .. })
        ));

        let empty = GoodsReceiptRequest {
            lines: vec![],
            ..request
        };
        assert!(matches!(
            db.coordinator().receive_goods(&empty).await,
            Err(DbError::Validation(ValidationError::EmptyItems))
        ));
        assert_eq!(db.incoming_goods().list().await.unwrap().len(), 2);
    }
}
