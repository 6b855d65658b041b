//! # Cart
//!
//! The checkout cart shown on the kasir page.
//!
//! ## Cart Operations Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Frontend Action          Cart Method              Effect               │
//! │  ───────────────          ───────────              ──────               │
//! │                                                                         │
//! │  Tap product ───────────► add_product() ─────────► qty + 1 (≤ stock)    │
//! │                                                                         │
//! │  Edit quantity ─────────► set_quantity() ────────► clamp to stock,      │
//! │                                                    remove at ≤ 0        │
//! │                                                                         │
//! │  Click remove ──────────► remove() ──────────────► line dropped         │
//! │                                                                         │
//! │  Confirm payment ───────► checkout() ────────────► SaleRequest          │
//! │                                                                         │
//! │  NOTE: clamping is a convenience for the cashier only. The data layer   │
//! │        re-checks stock at commit and fails instead of clamping.         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::ledger::{SaleLine, SaleRequest};
use crate::pricing::price_for;
use crate::types::{PriceNote, Product, SaleType};

/// A line in the cart. Code, name and price are frozen when first added.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub product_id: i64,
    pub code: String,
    pub name: String,
    pub unit_price: i64,
    pub qty: i64,
    pub note: Option<PriceNote>,
}

impl CartLine {
    #[inline]
    pub fn line_total(&self) -> i64 {
        self.unit_price.saturating_mul(self.qty)
    }
}

/// Outcome of [`Cart::set_quantity`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantityChange {
    /// Quantity set as requested.
    Set(i64),
    /// Request exceeded stock; quantity set to the available amount.
    Clamped { requested: i64, available: i64 },
    /// Line removed (requested or clamped quantity was zero or less).
    Removed,
}

/// The shopping cart.
///
/// ## Invariants
/// - Lines are unique by `product_id`
/// - Every line has `qty >= 1`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    sale_type: SaleType,
    lines: Vec<CartLine>,
}

impl Cart {
    /// Creates an empty cart priced against `sale_type`.
    pub fn new(sale_type: SaleType) -> Self {
        Cart {
            sale_type,
            lines: Vec::new(),
        }
    }

    pub fn sale_type(&self) -> SaleType {
        self.sale_type
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Adds one unit of `product`, or bumps the existing line by one.
    ///
    /// ## Errors
    /// - [`CoreError::NoValidPrice`] if the product cannot be priced
    /// - [`CoreError::InsufficientStock`] if the shelf is already exhausted
    pub fn add_product(&mut self, product: &Product) -> CoreResult<()> {
        let price = price_for(self.sale_type, product)?;

        if let Some(line) = self.lines.iter_mut().find(|l| l.product_id == product.id) {
            if line.qty >= product.stock_qty {
                return Err(CoreError::InsufficientStock {
                    code: product.code.clone(),
                    available: product.stock_qty,
                    requested: line.qty + 1,
                });
            }
            line.qty += 1;
            return Ok(());
        }

        if !product.in_stock() {
            return Err(CoreError::InsufficientStock {
                code: product.code.clone(),
                available: product.stock_qty,
                requested: 1,
            });
        }

        self.lines.push(CartLine {
            product_id: product.id,
            code: product.code.clone(),
            name: product.name.clone(),
            unit_price: price.amount,
            qty: 1,
            note: price.note,
        });
        Ok(())
    }

    /// Sets a line's quantity, clamped to the product's current stock.
    pub fn set_quantity(&mut self, product: &Product, qty: i64) -> CoreResult<QuantityChange> {
        let index = self
            .lines
            .iter()
            .position(|l| l.product_id == product.id)
            .ok_or(CoreError::NotInCart(product.id))?;

        let (qty, change) = if qty > product.stock_qty {
            (
                product.stock_qty,
                QuantityChange::Clamped {
                    requested: qty,
                    available: product.stock_qty,
                },
            )
        } else {
            (qty, QuantityChange::Set(qty))
        };

        if qty <= 0 {
            self.lines.remove(index);
            return Ok(QuantityChange::Removed);
        }

        self.lines[index].qty = qty;
        Ok(change)
    }

    /// Removes a line. Returns whether it was present.
    pub fn remove(&mut self, product_id: i64) -> bool {
        let before = self.lines.len();
        self.lines.retain(|l| l.product_id != product_id);
        self.lines.len() != before
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    /// Sum of line totals.
    pub fn subtotal(&self) -> i64 {
        self.lines
            .iter()
            .map(CartLine::line_total)
            .fold(0, i64::saturating_add)
    }

    /// Builds the checkout request. Validation happens in the data layer.
    pub fn checkout(&self, customer_id: Option<i64>, cash_received: i64) -> SaleRequest {
        SaleRequest {
            sale_type: self.sale_type,
            lines: self
                .lines
                .iter()
                .map(|l| SaleLine {
                    product_id: l.product_id,
                    unit_price: l.unit_price,
                    qty: l.qty,
                    note: l.note,
                })
                .collect(),
            customer_id,
            discount: 0,
            cash_received,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
