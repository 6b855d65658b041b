//! # Transaction Repository
//!
//! Read side of the sales ledger. Rows are inserted only by
//! [`Coordinator::complete_sale`](crate::coordinator::Coordinator::complete_sale)
//! and never updated or deleted.

use chrono::{DateTime, Utc};

use crate::coordinator::Coordinator;
use crate::error::{DbError, DbResult};
use crate::schema::Collection;
use crate::store::{self, Query};
use warung_core::{SaleType, Transaction};

#[derive(Debug, Clone)]
pub struct TransactionRepository {
    coordinator: Coordinator,
}

impl TransactionRepository {
    pub fn new(coordinator: Coordinator) -> Self {
        TransactionRepository { coordinator }
    }

    pub async fn get(&self, id: i64) -> DbResult<Transaction> {
        store::get(self.coordinator.pool(), id)
            .await?
            .ok_or_else(|| DbError::not_found("Transaction", id))
    }

    pub async fn find_by_receipt_no(&self, receipt_no: &str) -> DbResult<Option<Transaction>> {
        let mut hits = self
            .query(&Query::on("receiptNo").equals(receipt_no))
            .await?;
        Ok(hits.pop())
    }

    pub async fn query(&self, query: &Query) -> DbResult<Vec<Transaction>> {
        store::query(self.coordinator.pool(), query).await
    }

    /// The whole ledger, newest first.
    pub async fn list(&self) -> DbResult<Vec<Transaction>> {
        self.query(&Query::on("date").reverse()).await
    }

    /// The `limit` most recent sales.
    pub async fn recent(&self, limit: u32) -> DbResult<Vec<Transaction>> {
        self.query(&Query::on("date").reverse().limit(limit)).await
    }

    /// Sales with `start <= date < end`, newest first, optionally of one type.
    pub async fn between_dates(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        sale_type: Option<SaleType>,
    ) -> DbResult<Vec<Transaction>> {
        let mut sales = self
            .query(&Query::on("date").between(start, end).reverse())
            .await?;
        if let Some(sale_type) = sale_type {
            sales.retain(|t| t.sale_type == sale_type);
        }
        Ok(sales)
    }

    /// Sales attached to a customer, oldest first.
    pub async fn by_customer(&self, customer_id: i64) -> DbResult<Vec<Transaction>> {
        self.query(&Query::on("customerId").equals(customer_id))
            .await
    }

    pub async fn by_type(&self, sale_type: SaleType) -> DbResult<Vec<Transaction>> {
        self.query(&Query::on("type").equals(sale_type)).await
    }

    pub async fn count(&self) -> DbResult<i64> {
        store::count(self.coordinator.pool(), Collection::Transactions).await
    }
}
