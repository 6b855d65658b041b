//! # Record Store
//!
//! Typed, index-aware reads shared by every repository.
//!
//! ## Query Model
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Query::on("stockQty").above(0).limit(20)                               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  schema::find_index(Products, "stockQty")  → column stock_qty          │
//! │       │        (UnknownIndex if not declared on the latest version)    │
//! │       ▼                                                                 │
//! │  SELECT … FROM products                                                 │
//! │   WHERE stock_qty > ?                                                   │
//! │   ORDER BY stock_qty, id                                                │
//! │   LIMIT 20                                                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A `Query` is a plain value. Running it again reads current data.
//!
//! ## Predicates
//!
//! | Predicate               | SQL                                  |
//! |-------------------------|--------------------------------------|
//! | `All`                   | (no filter)                          |
//! | `Equals(v)`             | `col = v`                            |
//! | `Above(v)`              | `col > v`                            |
//! | `Below(v)`              | `col < v`                            |
//! | `Between(lo, hi)`       | `col >= lo AND col < hi`             |
//! | `StartsWithIgnoreCase`  | `col IS NOT NULL`, then folded below |
//!
//! SQLite's `lower()` and `LIKE` fold ASCII only, so a prefix search scans
//! the index in order and compares Unicode-lowercased text in Rust. The
//! limit is applied after that filter.

use chrono::{DateTime, Utc};
use sqlx::query::QueryAs;
use sqlx::sqlite::{SqliteArguments, SqliteRow};
use sqlx::types::Json;
use sqlx::{Executor, FromRow, Row as _, Sqlite};

use crate::error::DbResult;
use crate::schema::{self, Collection};
use warung_core::{
    Customer, CustomerSnapshot, IncomingGoods, IncomingGoodsItem, PaymentType, Product, SaleType,
    Supplier, Transaction, TransactionItem, User,
};

// =============================================================================
// Record Trait
// =============================================================================

/// A type stored in one collection.
pub trait Record: Sized + Send + Unpin + 'static {
    const COLLECTION: Collection;

    /// Select list producing [`Record::Row`].
    const COLUMNS: &'static str;

    /// Shape decoded straight from SQLite.
    type Row: for<'r> FromRow<'r, SqliteRow> + Send + Unpin;

    fn from_row(row: Self::Row) -> DbResult<Self>;
}

impl Record for User {
    const COLLECTION: Collection = Collection::Users;
    const COLUMNS: &'static str = "id, username, username_norm, role, created_at";
    type Row = User;

    fn from_row(row: User) -> DbResult<Self> {
        Ok(row)
    }
}

/// Select expression reading a price column leniently, with the same rule
/// as [`warung_core::pricing::as_int`]: optional sign, leading digits, and
/// a negative value reads as absent unless it is zero.
macro_rules! lenient_price {
    ($col:literal) => {
        concat!(
            "CASE WHEN typeof(", $col, ") = 'integer' AND ", $col, " >= 0 THEN ", $col, " ",
            "WHEN typeof(", $col, ") = 'real' AND ", $col, " > -1 THEN CAST(", $col, " AS INTEGER) ",
            "WHEN typeof(", $col, ") = 'text' AND (trim(", $col, ") GLOB '[0-9]*' ",
            "OR trim(", $col, ") GLOB '+[0-9]*' ",
            "OR (trim(", $col, ") GLOB '-[0-9]*' AND CAST(trim(", $col, ") AS INTEGER) = 0)) ",
            "THEN CAST(trim(", $col, ") AS INTEGER) ",
            "END AS ", $col
        )
    };
}

/// Prices are read leniently: anything that is not a non-negative
/// integer (text left by older installations, negatives) reads as absent.
impl Record for Product {
    const COLLECTION: Collection = Collection::Products;
    const COLUMNS: &'static str = concat!(
        "id, code, name, ",
        lenient_price!("retail_price"),
        ", ",
        lenient_price!("wholesale_price"),
        ", ",
        "COALESCE(CASE WHEN typeof(cost_price) = 'integer' AND cost_price >= 0 THEN cost_price \
             WHEN typeof(cost_price) = 'real' AND cost_price >= 0 THEN CAST(cost_price AS INTEGER) \
         END, 0) AS cost_price, \
         stock_qty, created_at, updated_at"
    );
    type Row = Product;

    fn from_row(row: Product) -> DbResult<Self> {
        Ok(row)
    }
}

impl Record for Supplier {
    const COLLECTION: Collection = Collection::Suppliers;
    const COLUMNS: &'static str =
        "id, name, bank_name, bank_account_number, created_at, updated_at";
    type Row = Supplier;

    fn from_row(row: Supplier) -> DbResult<Self> {
        Ok(row)
    }
}

impl Record for Customer {
    const COLLECTION: Collection = Collection::Customers;
    const COLUMNS: &'static str = "id, member_no, name, phone, address, total_transactions, \
        birth_date, created_at, updated_at";
    type Row = Customer;

    fn from_row(row: Customer) -> DbResult<Self> {
        Ok(row)
    }
}

/// Sale row with its JSON columns still wrapped.
#[derive(Debug, FromRow)]
pub struct TransactionRow {
    id: i64,
    sale_type: SaleType,
    date: DateTime<Utc>,
    customer_id: Option<i64>,
    customer_snapshot: Option<Json<CustomerSnapshot>>,
    items: Json<Vec<TransactionItem>>,
    subtotal: i64,
    discount: i64,
    total: i64,
    payment_type: PaymentType,
    cash_received: i64,
    change_due: i64,
    receipt_no: String,
}

impl Record for Transaction {
    const COLLECTION: Collection = Collection::Transactions;
    const COLUMNS: &'static str = "id, sale_type, date, customer_id, customer_snapshot, items, \
        subtotal, discount, total, payment_type, cash_received, change_due, receipt_no";
    type Row = TransactionRow;

    fn from_row(row: TransactionRow) -> DbResult<Self> {
        Ok(Transaction {
            id: row.id,
            sale_type: row.sale_type,
            date: row.date,
            customer_id: row.customer_id,
            customer_snapshot: row.customer_snapshot.map(|s| s.0),
            items: row.items.0,
            subtotal: row.subtotal,
            discount: row.discount,
            total: row.total,
            payment_type: row.payment_type,
            cash_received: row.cash_received,
            change_due: row.change_due,
            receipt_no: row.receipt_no,
        })
    }
}

/// Goods receipt row with its JSON column still wrapped.
#[derive(Debug, FromRow)]
pub struct IncomingGoodsRow {
    id: i64,
    invoice_no: String,
    supplier_id: Option<i64>,
    items: Json<Vec<IncomingGoodsItem>>,
    grand_total: i64,
    transaction_time: DateTime<Utc>,
}

impl Record for IncomingGoods {
    const COLLECTION: Collection = Collection::IncomingGoods;
    const COLUMNS: &'static str =
        "id, invoice_no, supplier_id, items, grand_total, transaction_time";
    type Row = IncomingGoodsRow;

    fn from_row(row: IncomingGoodsRow) -> DbResult<Self> {
        Ok(IncomingGoods {
            id: row.id,
            invoice_no: row.invoice_no,
            supplier_id: row.supplier_id,
            items: row.items.0,
            grand_total: row.grand_total,
            transaction_time: row.transaction_time,
        })
    }
}

// =============================================================================
// Query
// =============================================================================

/// A value compared against an indexed column.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Text(String),
    Time(DateTime<Utc>),
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::Time(v)
    }
}

impl From<SaleType> for Value {
    fn from(v: SaleType) -> Self {
        Value::Text(v.as_str().to_string())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    All,
    Equals(Value),
    Above(Value),
    Below(Value),
    /// Lower bound inclusive, upper bound exclusive.
    Between(Value, Value),
    StartsWithIgnoreCase(String),
}

/// An index scan.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub index: String,
    pub predicate: Predicate,
    pub reverse: bool,
    pub limit: Option<u32>,
}

impl Query {
    /// Scans the whole index.
    pub fn on(index: impl Into<String>) -> Self {
        Query {
            index: index.into(),
            predicate: Predicate::All,
            reverse: false,
            limit: None,
        }
    }

    pub fn equals(mut self, value: impl Into<Value>) -> Self {
        self.predicate = Predicate::Equals(value.into());
        self
    }

    pub fn above(mut self, value: impl Into<Value>) -> Self {
        self.predicate = Predicate::Above(value.into());
        self
    }

    pub fn below(mut self, value: impl Into<Value>) -> Self {
        self.predicate = Predicate::Below(value.into());
        self
    }

    pub fn between(mut self, lower: impl Into<Value>, upper: impl Into<Value>) -> Self {
        self.predicate = Predicate::Between(lower.into(), upper.into());
        self
    }

    pub fn starts_with_ignore_case(mut self, prefix: impl Into<String>) -> Self {
        self.predicate = Predicate::StartsWithIgnoreCase(prefix.into());
        self
    }

    /// Descending index order.
    pub fn reverse(mut self) -> Self {
        self.reverse = true;
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Builds the SQL for `collection` and the values to bind, in order.
    fn to_sql(&self, collection: Collection, columns: &str) -> DbResult<(String, Vec<Value>)> {
        let index = schema::find_index(collection, &self.index)?;
        let column = index.column;

        let (filter, values) = match &self.predicate {
            Predicate::All => (String::new(), vec![]),
            Predicate::Equals(v) => (format!(" WHERE {} = ?", column), vec![v.clone()]),
            Predicate::Above(v) => (format!(" WHERE {} > ?", column), vec![v.clone()]),
            Predicate::Below(v) => (format!(" WHERE {} < ?", column), vec![v.clone()]),
            Predicate::Between(lo, hi) => (
                format!(" WHERE {} >= ? AND {} < ?", column, column),
                vec![lo.clone(), hi.clone()],
            ),
            Predicate::StartsWithIgnoreCase(_) => {
                (format!(" WHERE {} IS NOT NULL", column), vec![])
            }
        };

        let select = match self.predicate {
            Predicate::StartsWithIgnoreCase(_) => {
                format!("{}, CAST({} AS TEXT) AS {}", columns, column, SEARCH_KEY)
            }
            _ => columns.to_string(),
        };

        let direction = if self.reverse { "DESC" } else { "ASC" };
        let mut sql = format!(
            "SELECT {} FROM {}{} ORDER BY {} {}, id {}",
            select,
            collection.table(),
            filter,
            column,
            direction,
            direction
        );
        if let (Some(limit), false) = (self.limit, self.folds_in_rust()) {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        Ok((sql, values))
    }
}

impl Query {
    fn folds_in_rust(&self) -> bool {
        matches!(self.predicate, Predicate::StartsWithIgnoreCase(_))
    }
}

/// Extra column carrying the indexed text for prefix matching.
const SEARCH_KEY: &str = "search_key";

/// Case-insensitive prefix test using Unicode lowercasing on both sides.
fn starts_with_folded(key: &str, folded_prefix: &str) -> bool {
    key.to_lowercase().starts_with(folded_prefix)
}

fn bind_value<'q, O>(
    query: QueryAs<'q, Sqlite, O, SqliteArguments<'q>>,
    value: Value,
) -> QueryAs<'q, Sqlite, O, SqliteArguments<'q>> {
    match value {
        Value::Int(v) => query.bind(v),
        Value::Text(v) => query.bind(v),
        Value::Time(v) => query.bind(v),
    }
}

// =============================================================================
// Generic Reads
// =============================================================================

/// Fetches one record by id.
pub async fn get<'c, R, E>(executor: E, id: i64) -> DbResult<Option<R>>
where
    R: Record,
    E: Executor<'c, Database = Sqlite>,
{
    let sql = format!(
        "SELECT {} FROM {} WHERE id = ?",
        R::COLUMNS,
        R::COLLECTION.table()
    );
    let row = sqlx::query_as::<_, R::Row>(&sql)
        .bind(id)
        .fetch_optional(executor)
        .await?;

    row.map(R::from_row).transpose()
}

/// Every record of the collection in id order.
pub async fn all<'c, R, E>(executor: E) -> DbResult<Vec<R>>
where
    R: Record,
    E: Executor<'c, Database = Sqlite>,
{
    let sql = format!(
        "SELECT {} FROM {} ORDER BY id",
        R::COLUMNS,
        R::COLLECTION.table()
    );
    let rows = sqlx::query_as::<_, R::Row>(&sql)
        .fetch_all(executor)
        .await?;

    rows.into_iter().map(R::from_row).collect()
}

/// Runs an index query.
pub async fn query<'c, R, E>(executor: E, query: &Query) -> DbResult<Vec<R>>
where
    R: Record,
    E: Executor<'c, Database = Sqlite>,
{
    let (sql, values) = query.to_sql(R::COLLECTION, R::COLUMNS)?;

    if let Predicate::StartsWithIgnoreCase(prefix) = &query.predicate {
        let folded = prefix.to_lowercase();
        let limit = query.limit.map_or(usize::MAX, |l| l as usize);

        let rows = sqlx::query(&sql).fetch_all(executor).await?;
        let mut records = Vec::new();
        for row in rows {
            if records.len() >= limit {
                break;
            }
            let key: Option<String> = row.try_get(SEARCH_KEY)?;
            if key.is_some_and(|k| starts_with_folded(&k, &folded)) {
                records.push(R::from_row(<R::Row as FromRow<'_, SqliteRow>>::from_row(&row)?)?);
            }
        }
        return Ok(records);
    }

    let mut q = sqlx::query_as::<_, R::Row>(&sql);
    for value in values {
        q = bind_value(q, value);
    }
    let rows = q.fetch_all(executor).await?;

    rows.into_iter().map(R::from_row).collect()
}

/// Counts the records of a collection.
pub async fn count<'c, E>(executor: E, collection: Collection) -> DbResult<i64>
where
    E: Executor<'c, Database = Sqlite>,
{
    let sql = format!("SELECT COUNT(*) FROM {}", collection.table());
    let count: i64 = sqlx::query_scalar(&sql).fetch_one(executor).await?;
    Ok(count)
}

/// Deletes a record by id. Returns `false` if it did not exist.
pub async fn delete<'c, E>(executor: E, collection: Collection, id: i64) -> DbResult<bool>
where
    E: Executor<'c, Database = Sqlite>,
{
    let sql = format!("DELETE FROM {} WHERE id = ?", collection.table());
    let result = sqlx::query(&sql).bind(id).execute(executor).await?;
    Ok(result.rows_affected() > 0)
}

// =============================================================================
// Unit Tests
// =============================================================================
