//! # Product Repository
//!
//! Catalog CRUD and the index scans the POS screens run.
//!
//! ## Stock
//! `stock_qty` is edited here only by an administrator correcting a
//! count. Sales and deliveries change it through the coordinator, which
//! holds the products lock for the whole unit.
//!
//! ## Search
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Cashier types: "ko"                                                    │
//! │       │                                                                 │
//! │       ├── name index:  startsWithIgnoreCase("ko") → Kopi Hitam         │
//! │       └── code index:  startsWithIgnoreCase("ko") → (none)             │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  union by id, sorted by name                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use tracing::debug;

use super::merge_by_id;
use crate::coordinator::Coordinator;
use crate::error::{DbError, DbResult};
use crate::schema::Collection;
use crate::store::{self, Query};
use warung_core::validation::{validate_new_product, validate_product_patch};
use warung_core::{NewProduct, Product, ProductPatch};

/// Repository for product database operations.
///
/// ## Usage
/// ```rust,ignore
/// let repo = db.products();
///
/// let shelf = repo.in_stock().await?;
/// let hits = repo.search("kopi").await?;
/// ```
#[derive(Debug, Clone)]
pub struct ProductRepository {
    coordinator: Coordinator,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(coordinator: Coordinator) -> Self {
        ProductRepository { coordinator }
    }

    /// Adds a product.
    ///
    /// ## Returns
    /// * `Ok(Product)` - Stored product with its assigned id
    /// * `Err(DbError::UniqueViolation)` - Code already exists
    pub async fn add(&self, product: &NewProduct) -> DbResult<Product> {
        validate_new_product(product)?;
        debug!(code = %product.code, "Inserting product");

        let now = Utc::now();
        let mut uow = self.coordinator.begin(&[Collection::Products]).await?;

        let id = sqlx::query(
            r#"
            INSERT INTO products (
                code, name, retail_price, wholesale_price, cost_price,
                stock_qty, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(product.code.trim())
        .bind(product.name.trim())
        .bind(product.retail_price)
        .bind(product.wholesale_price)
        .bind(product.cost_price)
        .bind(product.stock_qty)
        .bind(now)
        .bind(now)
        .execute(&mut *uow)
        .await
        .map_err(|e| DbError::from(e).with_conflict(&[("code", product.code.trim())]))?
        .last_insert_rowid();

        let stored = store::get::<Product, _>(&mut *uow, id)
            .await?
            .ok_or_else(|| DbError::not_found("Product", id))?;
        uow.commit().await?;

        Ok(stored)
    }

    /// Gets a product by id.
    pub async fn get(&self, id: i64) -> DbResult<Product> {
        self.find(id)
            .await?
            .ok_or_else(|| DbError::not_found("Product", id))
    }

    /// Gets a product by id, `None` if absent.
    pub async fn find(&self, id: i64) -> DbResult<Option<Product>> {
        store::get(self.coordinator.pool(), id).await
    }

    /// Gets a product by its code.
    pub async fn find_by_code(&self, code: &str) -> DbResult<Option<Product>> {
        let mut hits: Vec<Product> = self.query(&Query::on("code").equals(code.trim())).await?;
        Ok(hits.pop())
    }

    /// Applies a partial update.
    ///
    /// ## Returns
    /// * `Err(DbError::NotFound)` - No product with this id
    /// * `Err(DbError::UniqueViolation)` - New code collides
    pub async fn update(&self, id: i64, patch: &ProductPatch) -> DbResult<Product> {
        validate_product_patch(patch)?;
        debug!(id, "Updating product");

        let mut uow = self.coordinator.begin(&[Collection::Products]).await?;
        let current = store::get::<Product, _>(&mut *uow, id)
            .await?
            .ok_or_else(|| DbError::not_found("Product", id))?;

        let code = patch
            .code
            .as_deref()
            .map(str::trim)
            .unwrap_or(&current.code)
            .to_string();

        sqlx::query(
            r#"
            UPDATE products SET
                code = ?,
                name = ?,
                retail_price = ?,
                wholesale_price = ?,
                cost_price = ?,
                stock_qty = ?,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&code)
        .bind(patch.name.as_deref().map(str::trim).unwrap_or(&current.name))
        .bind(patch.retail_price.or(current.retail_price))
        .bind(patch.wholesale_price.or(current.wholesale_price))
        .bind(patch.cost_price.unwrap_or(current.cost_price))
        .bind(patch.stock_qty.unwrap_or(current.stock_qty))
        .bind(Utc::now())
        .bind(id)
        .execute(&mut *uow)
        .await
        .map_err(|e| DbError::from(e).with_conflict(&[("code", code.as_str())]))?;

        let updated = store::get::<Product, _>(&mut *uow, id)
            .await?
            .ok_or_else(|| DbError::not_found("Product", id))?;
        uow.commit().await?;

        Ok(updated)
    }

    /// Deletes a product. Past sales keep their code/name snapshots.
    pub async fn delete(&self, id: i64) -> DbResult<()> {
        debug!(id, "Deleting product");

        let mut uow = self.coordinator.begin(&[Collection::Products]).await?;
        if !store::delete(&mut *uow, Collection::Products, id).await? {
            return Err(DbError::not_found("Product", id));
        }
        uow.commit().await
    }

    /// Runs an index query on the products collection.
    pub async fn query(&self, query: &Query) -> DbResult<Vec<Product>> {
        store::query(self.coordinator.pool(), query).await
    }

    /// Every product, by name.
    pub async fn list(&self) -> DbResult<Vec<Product>> {
        self.query(&Query::on("name")).await
    }

    /// Products with at least one unit on the shelf.
    pub async fn in_stock(&self) -> DbResult<Vec<Product>> {
        self.query(&Query::on("stockQty").above(0i64)).await
    }

    /// Products whose name or code starts with `term`, ignoring case.
    ///
    /// An empty term lists the whole catalog.
    pub async fn search(&self, term: &str) -> DbResult<Vec<Product>> {
        let term = term.trim();
        if term.is_empty() {
            return self.list().await;
        }

        let by_name = self.query(&Query::on("name").starts_with_ignore_case(term)).await?;
        let by_code = self.query(&Query::on("code").starts_with_ignore_case(term)).await?;

        let mut hits = merge_by_id(vec![by_name, by_code], |p| p.id);
        hits.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(hits)
    }

    /// Counts products (for diagnostics).
    pub async fn count(&self) -> DbResult<i64> {
        store::count(self.coordinator.pool(), Collection::Products).await
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use crate::error::DbError;
    use crate::pool::{Database, DbConfig};
    use crate::store::Query;
    use warung_core::pricing::as_int;
    use warung_core::{NewProduct, ProductPatch, ValidationError};

    fn new_product(code: &str, name: &str, stock: i64) -> NewProduct {
        NewProduct {
            code: code.to_string(),
            name: name.to_string(),
            retail_price: 5000,
            wholesale_price: 4000,
            cost_price: 2000,
            stock_qty: stock,
        }
    }

    async fn db() -> Database {
        Database::new(DbConfig::in_memory().seed_on_create(false))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_duplicate_code_rejected() {
        let db = db().await;
        let first = db.products().add(&new_product("P001", "Kopi Hitam", 10)).await.unwrap();

        let err = db
            .products()
            .add(&new_product("P001", "Kopi Susu", 3))
            .await
            .unwrap_err();
        match err {
            DbError::UniqueViolation { field, value } => {
                assert_eq!(field, "products.code");
                assert_eq!(value, "P001");
            }
            other => panic!("expected UniqueViolation, got {other:?}"),
        }

        assert_eq!(db.products().get(first.id).await.unwrap(), first);
        assert_eq!(db.products().count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_update_patch() {
        let db = db().await;
        let p = db.products().add(&new_product("P001", "Kopi", 10)).await.unwrap();
        let other = db.products().add(&new_product("P002", "Teh", 10)).await.unwrap();

        let updated = db
            .products()
            .update(
                p.id,
                &ProductPatch {
                    retail_price: Some(6000),
                    stock_qty: Some(7),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.retail_price, Some(6000));
        assert_eq!(updated.wholesale_price, Some(4000));
        assert_eq!(updated.stock_qty, 7);
        assert_eq!(updated.code, "P001");

        let clash = db
            .products()
            .update(
                other.id,
                &ProductPatch {
                    code: Some("P001".to_string()),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(clash, Err(DbError::UniqueViolation { .. })));

        let missing = db.products().update(99, &ProductPatch::default()).await;
        assert!(matches!(missing, Err(DbError::NotFound { .. })));

        let negative = db
            .products()
            .update(
                p.id,
                &ProductPatch {
                    cost_price: Some(-1),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(
            negative,
            Err(DbError::Validation(ValidationError::Negative { .. }))
        ));
    }

    #[tokio::test]
    async fn test_index_queries() {
        let db = db().await;
        let repo = db.products();
        repo.add(&new_product("P001", "Kopi Hitam", 0)).await.unwrap();
        repo.add(&new_product("P002", "Es Teh", 5)).await.unwrap();
        repo.add(&new_product("KP01", "Roti", 12)).await.unwrap();

        let shelf: Vec<String> = repo.in_stock().await.unwrap().into_iter().map(|p| p.code).collect();
        assert_eq!(shelf, vec!["P002", "KP01"]);

        let range = repo.query(&Query::on("stockQty").between(5i64, 12i64)).await.unwrap();
        assert_eq!(range.len(), 1);

        let hits: Vec<String> = repo.search("k").await.unwrap().into_iter().map(|p| p.code).collect();
        assert_eq!(hits, vec!["P001", "KP01"]);

        assert!(repo.find_by_code("P002").await.unwrap().is_some());
        assert_eq!(repo.search("  ").await.unwrap().len(), 3);

        let unknown = repo.query(&Query::on("retailPrice").above(0i64)).await;
        assert!(matches!(unknown, Err(DbError::UnknownIndex { .. })));
    }

    #[tokio::test]
    async fn test_legacy_prices_read_as_absent() {
        let db = db().await;
        let p = db.products().add(&new_product("P001", "Kopi", 1)).await.unwrap();
        sqlx::query("UPDATE products SET wholesale_price = 'abc', retail_price = -5 WHERE id = ?")
            .bind(p.id)
            .execute(db.pool())
            .await
            .unwrap();

        let read = db.products().get(p.id).await.unwrap();
        assert_eq!(read.retail_price, None);
        assert_eq!(read.wholesale_price, None);
    }

    #[tokio::test]
    async fn test_legacy_text_prices_match_in_memory_parse() {
        let db = db().await;
        let p = db.products().add(&new_product("P001", "Kopi", 1)).await.unwrap();

        for raw in [" +5 ", "-0", "-07", "12.9", "4000abc", "+", "abc", "-3"] {
            sqlx::query("UPDATE products SET wholesale_price = ? WHERE id = ?")
                .bind(raw)
                .bind(p.id)
                .execute(db.pool())
                .await
                .unwrap();

            let read = db.products().get(p.id).await.unwrap();
            assert_eq!(read.wholesale_price, as_int(raw), "raw {raw:?}");
        }
    }

    #[tokio::test]
    async fn test_delete() {
        let db = db().await;
        let p = db.products().add(&new_product("P001", "Kopi", 1)).await.unwrap();

        db.products().delete(p.id).await.unwrap();
        assert!(db.products().find(p.id).await.unwrap().is_none());
        assert!(matches!(
            db.products().delete(p.id).await,
            Err(DbError::NotFound { .. })
        ));
    }
}
