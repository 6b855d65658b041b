//! # Customer Repository
//!
//! Member customers. `total_transactions` is read-only here: it only moves
//! when the coordinator records a sale for the customer.

use chrono::Utc;
use tracing::debug;

use super::merge_by_id;
use crate::coordinator::Coordinator;
use crate::error::{DbError, DbResult};
use crate::schema::Collection;
use crate::store::{self, Query};
use warung_core::validation::{validate_customer_patch, validate_new_customer};
use warung_core::{Customer, CustomerPatch, NewCustomer};

#[derive(Debug, Clone)]
pub struct CustomerRepository {
    coordinator: Coordinator,
}

impl CustomerRepository {
    pub fn new(coordinator: Coordinator) -> Self {
        CustomerRepository { coordinator }
    }

    /// Adds a customer with a zero transaction counter.
    ///
    /// ## Returns
    /// * `Err(DbError::UniqueViolation)` - Member number already exists
    pub async fn add(&self, customer: &NewCustomer) -> DbResult<Customer> {
        validate_new_customer(customer)?;
        debug!(member_no = %customer.member_no, "Inserting customer");

        let now = Utc::now();
        let member_no = customer.member_no.trim();
        let mut uow = self.coordinator.begin(&[Collection::Customers]).await?;

        let id = sqlx::query(
            r#"
            INSERT INTO customers (
                member_no, name, phone, address, total_transactions,
                birth_date, created_at, updated_at
            ) VALUES (?, ?, ?, ?, 0, ?, ?, ?)
            "#,
        )
        .bind(member_no)
        .bind(customer.name.trim())
        .bind(customer.phone.trim())
        .bind(customer.address.trim())
        .bind(customer.birth_date)
        .bind(now)
        .bind(now)
        .execute(&mut *uow)
        .await
        .map_err(|e| DbError::from(e).with_conflict(&[("member_no", member_no)]))?
        .last_insert_rowid();

        let stored = store::get::<Customer, _>(&mut *uow, id)
            .await?
            .ok_or_else(|| DbError::not_found("Customer", id))?;
        uow.commit().await?;

        Ok(stored)
    }

    pub async fn get(&self, id: i64) -> DbResult<Customer> {
        self.find(id)
            .await?
            .ok_or_else(|| DbError::not_found("Customer", id))
    }

    pub async fn find(&self, id: i64) -> DbResult<Option<Customer>> {
        store::get(self.coordinator.pool(), id).await
    }

    pub async fn find_by_member_no(&self, member_no: &str) -> DbResult<Option<Customer>> {
        let mut hits: Vec<Customer> = self
            .query(&Query::on("memberNo").equals(member_no.trim()))
            .await?;
        Ok(hits.pop())
    }

    /// Applies a partial update. Past sales keep their snapshot.
    pub async fn update(&self, id: i64, patch: &CustomerPatch) -> DbResult<Customer> {
        validate_customer_patch(patch)?;
        debug!(id, "Updating customer");

        let mut uow = self.coordinator.begin(&[Collection::Customers]).await?;
        let current = store::get::<Customer, _>(&mut *uow, id)
            .await?
            .ok_or_else(|| DbError::not_found("Customer", id))?;

        let member_no = patch
            .member_no
            .as_deref()
            .map(str::trim)
            .unwrap_or(&current.member_no)
            .to_string();

        sqlx::query(
            r#"
            UPDATE customers SET
                member_no = ?,
                name = ?,
                phone = ?,
                address = ?,
                birth_date = ?,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&member_no)
        .bind(patch.name.as_deref().map(str::trim).unwrap_or(&current.name))
        .bind(patch.phone.as_deref().map(str::trim).unwrap_or(&current.phone))
        .bind(patch.address.as_deref().map(str::trim).unwrap_or(&current.address))
        .bind(patch.birth_date.or(current.birth_date))
        .bind(Utc::now())
        .bind(id)
        .execute(&mut *uow)
        .await
        .map_err(|e| DbError::from(e).with_conflict(&[("member_no", member_no.as_str())]))?;

        let updated = store::get::<Customer, _>(&mut *uow, id)
            .await?
            .ok_or_else(|| DbError::not_found("Customer", id))?;
        uow.commit().await?;

        Ok(updated)
    }

    /// Deletes a customer that has never been attached to a sale.
    ///
    /// ## Errors
    /// * `DbError::DeleteBlocked` - At least one transaction references it
    /// * `DbError::NotFound` - No customer with this id
    pub async fn delete(&self, id: i64) -> DbResult<()> {
        debug!(id, "Deleting customer");

        let mut uow = self
            .coordinator
            .begin(&[Collection::Customers, Collection::Transactions])
            .await?;

        let sales: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM transactions WHERE customer_id = ?")
            .bind(id)
            .fetch_one(&mut *uow)
            .await?;
        if sales > 0 {
            return Err(DbError::DeleteBlocked {
                entity: "Customer".to_string(),
                id: id.to_string(),
                reason: format!("customer has {} recorded transaction(s)", sales),
            });
        }

        if !store::delete(&mut *uow, Collection::Customers, id).await? {
            return Err(DbError::not_found("Customer", id));
        }
        uow.commit().await
    }

    pub async fn query(&self, query: &Query) -> DbResult<Vec<Customer>> {
        store::query(self.coordinator.pool(), query).await
    }

    /// Every customer, by name.
    pub async fn list(&self) -> DbResult<Vec<Customer>> {
        self.query(&Query::on("name")).await
    }

    /// Customers whose name, phone or member number starts with `term`.
    pub async fn search(&self, term: &str) -> DbResult<Vec<Customer>> {
        let term = term.trim();
        if term.is_empty() {
            return self.list().await;
        }

        let mut batches = Vec::with_capacity(3);
        for index in ["name", "phone", "memberNo"] {
            batches.push(
                self.query(&Query::on(index).starts_with_ignore_case(term))
                    .await?,
            );
        }

        let mut hits = merge_by_id(batches, |c| c.id);
        hits.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(hits)
    }

    pub async fn count(&self) -> DbResult<i64> {
        store::count(self.coordinator.pool(), Collection::Customers).await
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
