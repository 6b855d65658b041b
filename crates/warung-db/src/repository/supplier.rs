//! # Supplier Repository

use chrono::Utc;
use tracing::debug;

use crate::coordinator::Coordinator;
use crate::error::{DbError, DbResult};
use crate::schema::Collection;
use crate::store::{self, Query};
use warung_core::validation::{validate_new_supplier, validate_supplier_patch};
use warung_core::{NewSupplier, Supplier, SupplierPatch};

#[derive(Debug, Clone)]
pub struct SupplierRepository {
    coordinator: Coordinator,
}

impl SupplierRepository {
    pub fn new(coordinator: Coordinator) -> Self {
        SupplierRepository { coordinator }
    }

    pub async fn add(&self, supplier: &NewSupplier) -> DbResult<Supplier> {
        validate_new_supplier(supplier)?;
        debug!(name = %supplier.name, "Inserting supplier");

        let now = Utc::now();
        let mut uow = self.coordinator.begin(&[Collection::Suppliers]).await?;

        let id = sqlx::query(
            r#"
            INSERT INTO suppliers (name, bank_name, bank_account_number, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(supplier.name.trim())
        .bind(supplier.bank_name.trim())
        .bind(supplier.bank_account_number.trim())
        .bind(now)
        .bind(now)
        .execute(&mut *uow)
        .await?
        .last_insert_rowid();

        let stored = store::get::<Supplier, _>(&mut *uow, id)
            .await?
            .ok_or_else(|| DbError::not_found("Supplier", id))?;
        uow.commit().await?;

        Ok(stored)
    }

    pub async fn get(&self, id: i64) -> DbResult<Supplier> {
        self.find(id)
            .await?
            .ok_or_else(|| DbError::not_found("Supplier", id))
    }

    pub async fn find(&self, id: i64) -> DbResult<Option<Supplier>> {
        store::get(self.coordinator.pool(), id).await
    }

    pub async fn update(&self, id: i64, patch: &SupplierPatch) -> DbResult<Supplier> {
        validate_supplier_patch(patch)?;
        debug!(id, "Updating supplier");

        let mut uow = self.coordinator.begin(&[Collection::Suppliers]).await?;
        let current = store::get::<Supplier, _>(&mut *uow, id)
            .await?
            .ok_or_else(|| DbError::not_found("Supplier", id))?;

        sqlx::query(
            r#"
            UPDATE suppliers SET
                name = ?,
                bank_name = ?,
                bank_account_number = ?,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(patch.name.as_deref().map(str::trim).unwrap_or(&current.name))
        .bind(
            patch
                .bank_name
                .as_deref()
                .map(str::trim)
                .unwrap_or(&current.bank_name),
        )
        .bind(
            patch
                .bank_account_number
                .as_deref()
                .map(str::trim)
                .unwrap_or(&current.bank_account_number),
        )
        .bind(Utc::now())
        .bind(id)
        .execute(&mut *uow)
        .await?;

        let updated = store::get::<Supplier, _>(&mut *uow, id)
            .await?
            .ok_or_else(|| DbError::not_found("Supplier", id))?;
        uow.commit().await?;

        Ok(updated)
    }

    /// Deletes a supplier. Past deliveries keep the dangling `supplier_id`.
    pub async fn delete(&self, id: i64) -> DbResult<()> {
        debug!(id, "Deleting supplier");

        let mut uow = self.coordinator.begin(&[Collection::Suppliers]).await?;
        if !store::delete(&mut *uow, Collection::Suppliers, id).await? {
            return Err(DbError::not_found("Supplier", id));
        }
        uow.commit().await
    }

    pub async fn list(&self) -> DbResult<Vec<Supplier>> {
        store::query(self.coordinator.pool(), &Query::on("name")).await
    }

    /// Suppliers whose name starts with `term`, ignoring case.
    pub async fn search(&self, term: &str) -> DbResult<Vec<Supplier>> {
        let term = term.trim();
        if term.is_empty() {
            return self.list().await;
        }
        store::query(
            self.coordinator.pool(),
            &Query::on("name").starts_with_ignore_case(term),
        )
        .await
    }

    pub async fn count(&self) -> DbResult<i64> {
        store::count(self.coordinator.pool(), Collection::Suppliers).await
    }
}

#[cfg(test)]
mod tests {
    use crate::error::DbError;
    use crate::pool::{Database, DbConfig};
    use warung_core::{NewSupplier, SupplierPatch, ValidationError};

    #[tokio::test]
    async fn test_supplier_crud() {
        let db = Database::new(DbConfig::in_memory().seed_on_create(false))
            .await
            .unwrap();
        let repo = db.suppliers();

        let s = repo
            .add(&NewSupplier {
                name: "Grosir Minuman Segar".to_string(),
                bank_name: "Mandiri".to_string(),
                bank_account_number: "0987654321".to_string(),
            })
            .await
            .unwrap();

        let renamed = repo
            .update(
                s.id,
                &SupplierPatch {
                    bank_name: Some("BCA".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(renamed.bank_name, "BCA");
        assert_eq!(renamed.name, "Grosir Minuman Segar");

        assert_eq!(repo.search("grosir").await.unwrap().len(), 1);
        assert!(repo.search("pasar").await.unwrap().is_empty());

        let blank = repo
            .add(&NewSupplier {
                name: "  ".to_string(),
                bank_name: String::new(),
                bank_account_number: String::new(),
            })
            .await;
        assert!(matches!(
            blank,
            Err(DbError::Validation(ValidationError::Required { .. }))
        ));

        repo.delete(s.id).await.unwrap();
        assert_eq!(repo.count().await.unwrap(), 0);
    }
}
