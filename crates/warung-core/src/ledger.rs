//! # Ledger Construction
//!
//! Pure computation of the money fields of the two ledger entries. The
//! data layer calls these before opening a storage transaction, so every
//! input problem surfaces as a [`ValidationError`] with nothing written.
//!
//! ## Sale Totals
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  lines ──► line_total = unit_price × qty   (per line)                   │
//! │        ──► subtotal   = Σ line_total                                    │
//! │        ──► total      = subtotal − discount                             │
//! │        ──► change_due = cash_received − total                           │
//! │                                                                         │
//! │  Rejected up front:                                                     │
//! │    no lines · qty ≤ 0 · negative price · discount > subtotal            │
//! │    cash_received < subtotal · any amount outside i64                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::types::{IncomingGoodsItem, PriceNote, SaleType, TransactionItem};
use crate::validation::{validate_amount, validate_quantity, validate_required, ValidationResult};

// =============================================================================
// Sale
// =============================================================================

/// One cart line as submitted for checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleLine {
    pub product_id: i64,
    pub unit_price: i64,
    pub qty: i64,
    #[serde(default)]
    pub note: Option<PriceNote>,
}

// =============================================================================
// Checked Arithmetic
// =============================================================================

fn checked_product(field: &str, a: i64, b: i64) -> ValidationResult<i64> {
    a.checked_mul(b).ok_or_else(|| ValidationError::AmountTooLarge {
        field: field.to_string(),
    })
}

fn checked_sum(field: &str, amounts: impl IntoIterator<Item = i64>) -> ValidationResult<i64> {
    amounts.into_iter().try_fold(0i64, |acc, amount| {
        acc.checked_add(amount).ok_or_else(|| ValidationError::AmountTooLarge {
            field: field.to_string(),
        })
    })
}

impl SaleLine {
    /// `unit_price × qty`, saturating at `i64::MAX`.
    ///
    /// [`SaleRequest::totals`] rejects lines where this would saturate,
    /// so on a validated request it is exact.
    #[inline]
    pub fn line_total(&self) -> i64 {
        self.unit_price.saturating_mul(self.qty)
    }

    /// Freezes the line into a ledger item with the product's current
    /// code and name.
    pub fn to_item(&self, code: &str, name: &str) -> TransactionItem {
        TransactionItem {
            product_id: self.product_id,
            code: code.to_string(),
            name: name.to_string(),
            unit_price: self.unit_price,
            qty: self.qty,
            line_total: self.line_total(),
            note: self.note,
        }
    }
}

/// Everything needed to complete a sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleRequest {
    #[serde(rename = "type")]
    pub sale_type: SaleType,
    pub lines: Vec<SaleLine>,
    #[serde(default)]
    pub customer_id: Option<i64>,
    #[serde(default)]
    pub discount: i64,
    pub cash_received: i64,
}

/// Money fields of a sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaleTotals {
    pub subtotal: i64,
    pub discount: i64,
    pub total: i64,
    pub cash_received: i64,
    pub change_due: i64,
}

impl SaleRequest {
    /// Validates the request and computes its totals.
    ///
    /// ## Example
    /// ```rust
    /// use warung_core::ledger::{SaleLine, SaleRequest};
    /// use warung_core::SaleType;
    ///
    /// let request = SaleRequest {
    ///     sale_type: SaleType::Retail,
    ///     lines: vec![SaleLine { product_id: 1, unit_price: 5000, qty: 2, note: None }],
    ///     customer_id: None,
    ///     discount: 0,
    ///     cash_received: 20000,
    /// };
    /// let totals = request.totals().unwrap();
    /// assert_eq!(totals.total, 10000);
    /// assert_eq!(totals.change_due, 10000);
    /// ```
    pub fn totals(&self) -> ValidationResult<SaleTotals> {
        if self.lines.is_empty() {
            return Err(ValidationError::EmptyCart);
        }
        for line in &self.lines {
            validate_quantity(line.qty)?;
            validate_amount("unitPrice", line.unit_price)?;
        }
        validate_amount("discount", self.discount)?;

        let line_totals = self
            .lines
            .iter()
            .map(|line| checked_product("lineTotal", line.unit_price, line.qty))
            .collect::<ValidationResult<Vec<i64>>>()?;
        let subtotal = checked_sum("subtotal", line_totals)?;
        if self.discount > subtotal {
            return Err(ValidationError::DiscountExceedsSubtotal {
                discount: self.discount,
                subtotal,
            });
        }
        if self.cash_received < subtotal {
            return Err(ValidationError::InsufficientCash {
                received: self.cash_received,
                due: subtotal,
            });
        }

        let total = subtotal - self.discount;
        Ok(SaleTotals {
            subtotal,
            discount: self.discount,
            total,
            cash_received: self.cash_received,
            change_due: self.cash_received.checked_sub(total).ok_or_else(|| {
                ValidationError::AmountTooLarge {
                    field: "changeDue".to_string(),
                }
            })?,
        })
    }
}

// =============================================================================
// Goods Receipt
// =============================================================================

/// One delivered product line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptLine {
    pub product_id: i64,
    pub qty: i64,
    pub unit_cost: i64,
}

/// Everything needed to record a supplier delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoodsReceiptRequest {
    pub invoice_no: String,
    #[serde(default)]
    pub supplier_id: Option<i64>,
    pub lines: Vec<ReceiptLine>,
}

impl GoodsReceiptRequest {
    /// Validates the request and returns the ledger items with the grand total.
    pub fn items(&self) -> ValidationResult<(Vec<IncomingGoodsItem>, i64)> {
        validate_required("invoiceNo", &self.invoice_no)?;
        if self.lines.is_empty() {
            return Err(ValidationError::EmptyItems);
        }

        let mut items = Vec::with_capacity(self.lines.len());
        for line in &self.lines {
            validate_quantity(line.qty)?;
            validate_amount("unitCost", line.unit_cost)?;
            items.push(IncomingGoodsItem {
                product_id: line.product_id,
                qty: line.qty,
                unit_cost: line.unit_cost,
                line_total: checked_product("lineTotal", line.qty, line.unit_cost)?,
            });
        }

        let grand_total = checked_sum("grandTotal", items.iter().map(|i| i.line_total))?;
        Ok((items, grand_total))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn line(product_id: i64, unit_price: i64, qty: i64) -> SaleLine {
        SaleLine {
            product_id,
            unit_price,
            qty,
            note: None,
        }
    }

    fn sale(lines: Vec<SaleLine>, discount: i64, cash: i64) -> SaleRequest {
        SaleRequest {
            sale_type: SaleType::Retail,
            lines,
            customer_id: None,
            discount,
            cash_received: cash,
        }
    }

    #[test]
    fn test_sale_totals() {
        let request = sale(vec![line(1, 5000, 2), line(2, 1000, 5)], 0, 20000);
        let totals = request.totals().unwrap();

        assert_eq!(totals.subtotal, 15000);
        assert_eq!(totals.total, 15000);
        assert_eq!(totals.change_due, 5000);
    }

    #[test]
    fn test_discount_reduces_total() {
        let totals = sale(vec![line(1, 10000, 1)], 1500, 10000).totals().unwrap();
        assert_eq!(totals.total, 8500);
        assert_eq!(totals.change_due, 1500);
    }

    #[test]
    fn test_empty_cart_rejected() {
        assert_eq!(sale(vec![], 0, 0).totals(), Err(ValidationError::EmptyCart));
    }

    #[test]
    fn test_insufficient_cash_rejected() {
        assert_eq!(
            sale(vec![line(1, 5000, 1)], 0, 4999).totals(),
            Err(ValidationError::InsufficientCash {
                received: 4999,
                due: 5000
            })
        );
    }

    #[test]
    fn test_zero_quantity_rejected() {
        assert!(sale(vec![line(1, 5000, 0)], 0, 5000).totals().is_err());
    }

    #[test]
    fn test_overflowing_amounts_rejected() {
        assert_eq!(
            sale(vec![line(1, i64::MAX, 2)], 0, i64::MAX).totals(),
            Err(ValidationError::AmountTooLarge {
                field: "lineTotal".to_string()
            })
        );
        assert_eq!(
            sale(vec![line(1, i64::MAX, 1), line(2, 1, 1)], 0, i64::MAX).totals(),
            Err(ValidationError::AmountTooLarge {
                field: "subtotal".to_string()
            })
        );

        let receipt = GoodsReceiptRequest {
            invoice_no: "INV-1".to_string(),
            supplier_id: None,
            lines: vec![ReceiptLine {
                product_id: 1,
                qty: 3,
                unit_cost: i64::MAX / 2,
            }],
        };
        assert!(matches!(
            receipt.items(),
            Err(ValidationError::AmountTooLarge { .. })
        ));
    }

    #[test]
    fn test_discount_above_subtotal_rejected() {
        assert!(matches!(
            sale(vec![line(1, 1000, 1)], 2000, 5000).totals(),
            Err(ValidationError::DiscountExceedsSubtotal { .. })
        ));
    }

    #[test]
    fn test_goods_receipt_totals() {
        let request = GoodsReceiptRequest {
            invoice_no: "INV-001".to_string(),
            supplier_id: Some(1),
            lines: vec![
                ReceiptLine {
                    product_id: 1,
                    qty: 10,
                    unit_cost: 100,
                },
                ReceiptLine {
                    product_id: 2,
                    qty: 5,
                    unit_cost: 200,
                },
            ],
        };
        let (items, grand_total) = request.items().unwrap();

        assert_eq!(items[0].line_total, 1000);
        assert_eq!(items[1].line_total, 1000);
        assert_eq!(grand_total, 2000);
    }

    #[test]
    fn test_goods_receipt_requires_invoice_and_lines() {
        let empty = GoodsReceiptRequest {
            invoice_no: "INV-002".to_string(),
            supplier_id: None,
            lines: vec![],
        };
        assert_eq!(empty.items(), Err(ValidationError::EmptyItems));

        let no_invoice = GoodsReceiptRequest {
            invoice_no: " ".to_string(),
            ..empty
        };
        assert_eq!(no_invoice.items(), Err(ValidationError::required("invoiceNo")));
    }
}
