//! # Domain Types
//!
//! Entity records stored by the data layer, plus the input shapes used to
//! create and edit them.
//!
//! ## Type Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  Master data (admin CRUD)          Ledger entries (append-only)         │
//! │  ────────────────────────          ─────────────────────────────        │
//! │  User      username, role          Transaction    receiptNo, items      │
//! │  Product   code, prices, stock       ├─ customerId      (weak ref)      │
//! │  Supplier  bank details              └─ customerSnapshot (copy)         │
//! │  Customer  memberNo, counter       IncomingGoods  invoiceNo, items      │
//! │  Settings  single "app" row          └─ supplierId      (weak ref)      │
//! │                                                                         │
//! │  Side effects of ledger creation:                                       │
//! │    Product.stock_qty          (decrement on sale, increment on receipt) │
//! │    Customer.total_transactions (+1 per attached sale)                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Identity
//! Every stored record has a store-assigned integer `id`. Business keys
//! (`code`, `memberNo`, `receiptNo`, `username`) are unique but editable.
//! References between records (`product_id`, `customer_id`, `supplier_id`)
//! are weak: deleting or editing the parent never touches ledger entries,
//! which keep their own snapshot copies.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;

/// Trims and lowercases a username for case/whitespace-insensitive matching.
///
/// ## Example
/// ```rust
/// use warung_core::normalize_username;
///
/// assert_eq!(normalize_username("  Admin123 "), "admin123");
/// ```
pub fn normalize_username(username: &str) -> String {
    username.trim().to_lowercase()
}

// =============================================================================
// User
// =============================================================================

/// Access level of an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "UPPERCASE"))]
#[ts(export)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Admin,
    Cashier,
}

impl Role {
    /// Canonical stored form.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Cashier => "CASHIER",
        }
    }

    /// Coerces a loosely typed stored role into a canonical one.
    ///
    /// Comparison is case-insensitive; anything unrecognised (or missing)
    /// becomes [`Role::Cashier`], the least privileged role.
    pub fn coerce(raw: Option<&str>) -> Role {
        match raw.map(|r| r.to_uppercase()) {
            Some(r) if r == "ADMIN" => Role::Admin,
            _ => Role::Cashier,
        }
    }
}

/// An account, as returned to callers. The password never leaves the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub username: String,
    /// Trimmed, lowercased `username`; unique.
    pub username_norm: String,
    pub role: Role,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// Input for creating an account.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub username: String,
    pub password: String,
    pub role: Role,
}

/// Partial update for an account. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPatch {
    pub username: Option<String>,
    pub password: Option<String>,
    pub role: Option<Role>,
}

// =============================================================================
// Product
// =============================================================================

/// A catalog item.
///
/// Prices may be missing on records carried over from old installations;
/// [`crate::pricing::price_for`] decides what a missing price means at
/// checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: i64,
    pub code: String,
    pub name: String,
    pub retail_price: Option<i64>,
    pub wholesale_price: Option<i64>,
    pub cost_price: i64,
    pub stock_qty: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Whether at least one unit is on the shelf.
    #[inline]
    pub fn in_stock(&self) -> bool {
        self.stock_qty > 0
    }
}

/// Input for creating a product.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProduct {
    pub code: String,
    pub name: String,
    pub retail_price: i64,
    pub wholesale_price: i64,
    pub cost_price: i64,
    pub stock_qty: i64,
}

/// Partial update for a product.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductPatch {
    pub code: Option<String>,
    pub name: Option<String>,
    pub retail_price: Option<i64>,
    pub wholesale_price: Option<i64>,
    pub cost_price: Option<i64>,
    pub stock_qty: Option<i64>,
}

// =============================================================================
// Supplier
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Supplier {
    pub id: i64,
    pub name: String,
    pub bank_name: String,
    pub bank_account_number: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSupplier {
    pub name: String,
    pub bank_name: String,
    pub bank_account_number: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupplierPatch {
    pub name: Option<String>,
    pub bank_name: Option<String>,
    pub bank_account_number: Option<String>,
}

// =============================================================================
// Customer
// =============================================================================

/// A member customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: i64,
    pub member_no: String,
    pub name: String,
    pub phone: String,
    pub address: String,
    /// Number of sales that referenced this customer.
    pub total_transactions: i64,
    #[ts(as = "Option<String>")]
    pub birth_date: Option<NaiveDate>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Customer {
    /// Copies the identity fields printed on a receipt.
    pub fn snapshot(&self) -> CustomerSnapshot {
        CustomerSnapshot {
            member_no: self.member_no.clone(),
            name: self.name.clone(),
            phone: self.phone.clone(),
            address: self.address.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCustomer {
    pub member_no: String,
    pub name: String,
    pub phone: String,
    pub address: String,
    #[serde(default)]
    pub birth_date: Option<NaiveDate>,
}

/// Partial update for a customer. The transaction counter is not editable.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerPatch {
    pub member_no: Option<String>,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub birth_date: Option<NaiveDate>,
}

/// Customer identity frozen into a sale at checkout time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CustomerSnapshot {
    pub member_no: String,
    pub name: String,
    pub phone: String,
    pub address: String,
}

// =============================================================================
// Transaction (sales ledger)
// =============================================================================

/// Price list a sale is rung up against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "UPPERCASE"))]
#[ts(export)]
#[serde(rename_all = "UPPERCASE")]
pub enum SaleType {
    Retail,
    Wholesale,
}

impl SaleType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            SaleType::Retail => "RETAIL",
            SaleType::Wholesale => "WHOLESALE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "UPPERCASE"))]
#[ts(export)]
#[serde(rename_all = "UPPERCASE")]
pub enum PaymentType {
    #[default]
    Cash,
}

impl PaymentType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            PaymentType::Cash => "CASH",
        }
    }
}

/// Marks a line whose unit price did not come from the requested price list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum PriceNote {
    /// Wholesale price was unusable; the retail price was charged.
    #[serde(rename = "fallback-retail")]
    FallbackRetail,
}

/// One line of a sale. Code and name are snapshots of the product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct TransactionItem {
    pub product_id: i64,
    pub code: String,
    pub name: String,
    pub unit_price: i64,
    pub qty: i64,
    /// Always `unit_price * qty`.
    pub line_total: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<PriceNote>,
}

impl TransactionItem {
    #[inline]
    pub fn line_total(&self) -> Money {
        Money::from_rupiah(self.line_total)
    }
}

/// A completed sale. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: i64,
    #[serde(rename = "type")]
    pub sale_type: SaleType,
    #[ts(as = "String")]
    pub date: DateTime<Utc>,
    pub customer_id: Option<i64>,
    pub customer_snapshot: Option<CustomerSnapshot>,
    pub items: Vec<TransactionItem>,
    pub subtotal: i64,
    #[serde(default)]
    pub discount: i64,
    pub total: i64,
    pub payment_type: PaymentType,
    pub cash_received: i64,
    pub change_due: i64,
    pub receipt_no: String,
}

impl Transaction {
    /// Customer name for receipts and exports, or the walk-in placeholder.
    pub fn customer_name(&self) -> &str {
        self.customer_snapshot
            .as_ref()
            .map(|c| c.name.as_str())
            .filter(|name| !name.is_empty())
            .unwrap_or(crate::WALK_IN_CUSTOMER)
    }

    #[inline]
    pub fn total(&self) -> Money {
        Money::from_rupiah(self.total)
    }
}

// =============================================================================
// Incoming Goods (goods-receipt ledger)
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct IncomingGoodsItem {
    pub product_id: i64,
    pub qty: i64,
    pub unit_cost: i64,
    /// Always `qty * unit_cost`.
    pub line_total: i64,
}

/// A supplier delivery. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct IncomingGoods {
    pub id: i64,
    pub invoice_no: String,
    pub supplier_id: Option<i64>,
    pub items: Vec<IncomingGoodsItem>,
    pub grand_total: i64,
    #[ts(as = "String")]
    pub transaction_time: DateTime<Utc>,
}

// =============================================================================
// Settings
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

/// Business display metadata. Exactly one row, keyed by [`crate::SETTINGS_ID`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub id: String,
    pub business_name: String,
    pub address: String,
    pub logo_url: Option<String>,
    pub theme: Theme,
    /// ISO 4217 code; the shop only trades in IDR.
    pub currency: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsPatch {
    pub business_name: Option<String>,
    pub address: Option<String>,
    pub logo_url: Option<Option<String>>,
    pub theme: Option<Theme>,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_username() {
        assert_eq!(normalize_username("Admin123 "), "admin123");
        assert_eq!(normalize_username("\tKASIR123\n"), "kasir123");
        assert_eq!(normalize_username("kasir"), "kasir");
    }

    #[test]
    fn test_role_coercion() {
        assert_eq!(Role::coerce(Some("ADMIN")), Role::Admin);
        assert_eq!(Role::coerce(Some("admin")), Role::Admin);
        assert_eq!(Role::coerce(Some("cashier")), Role::Cashier);
        assert_eq!(Role::coerce(Some("manager")), Role::Cashier);
        assert_eq!(Role::coerce(None), Role::Cashier);
    }

    #[test]
    fn test_enum_wire_names() {
        assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), "\"ADMIN\"");
        assert_eq!(serde_json::to_string(&SaleType::Wholesale).unwrap(), "\"WHOLESALE\"");
        assert_eq!(
            serde_json::to_string(&PriceNote::FallbackRetail).unwrap(),
            "\"fallback-retail\""
        );
        assert_eq!(serde_json::to_string(&Theme::Dark).unwrap(), "\"dark\"");
    }

    #[test]
    fn test_transaction_item_omits_empty_note() {
        let item = TransactionItem {
            product_id: 1,
            code: "P001".to_string(),
            name: "Kopi Hitam".to_string(),
            unit_price: 5000,
            qty: 2,
            line_total: 10000,
            note: None,
        };
        let json = serde_json::to_value(&item).unwrap();
        assert!(json.get("note").is_none());
        assert_eq!(json["lineTotal"], 10000);
    }
}
