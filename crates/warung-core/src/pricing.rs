//! # Pricing
//!
//! Picks the unit price for a product under a given price list.
//!
//! ```text
//!   SaleType::Retail     retail valid? ── yes ──► retail
//!                                       └─ no ──► NoValidPrice
//!
//!   SaleType::Wholesale  wholesale valid? ── yes ──► wholesale
//!                                          └─ no ──► retail valid? ── yes ──► retail + FallbackRetail
//!                                                                  └─ no ──► NoValidPrice
//! ```
//!
//! "Valid" means a non-negative integer. Prices on old records may be
//! missing or stored as text, so the lenient [`as_int`] parser is shared
//! with the wholesale-price backfill migration.

use crate::error::{CoreError, CoreResult};
use crate::types::{PriceNote, Product, SaleType};

/// Leniently parses a non-negative integer.
///
/// Leading/trailing whitespace is ignored, an optional sign is accepted,
/// and parsing stops at the first non-digit (`"12abc"` is 12, `"12.9"` is
/// 12). Returns `None` when there are no leading digits or the value is
/// negative.
///
/// ## Example
/// ```rust
/// use warung_core::pricing::as_int;
///
/// assert_eq!(as_int(" 4000 "), Some(4000));
/// assert_eq!(as_int("12.9"), Some(12));
/// assert_eq!(as_int(""), None);
/// assert_eq!(as_int("-5"), None);
/// ```
pub fn as_int(raw: &str) -> Option<i64> {
    let s = raw.trim();
    let (negative, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };

    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }

    let value: i64 = digits[..end].parse().ok()?;
    if negative && value != 0 {
        return None;
    }
    Some(value)
}

/// Same rule as [`as_int`] for values already typed as integers.
#[inline]
pub fn valid_price(value: Option<i64>) -> Option<i64> {
    value.filter(|v| *v >= 0)
}

/// Unit price chosen for a cart line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnitPrice {
    pub amount: i64,
    pub note: Option<PriceNote>,
}

/// Returns the unit price of `product` under `sale_type`.
///
/// ## Errors
/// [`CoreError::NoValidPrice`] when the applicable price (and, for
/// wholesale, the retail fallback) is unusable.
pub fn price_for(sale_type: SaleType, product: &Product) -> CoreResult<UnitPrice> {
    let retail = valid_price(product.retail_price);
    let no_price = || CoreError::NoValidPrice {
        code: product.code.clone(),
        sale_type: sale_type.as_str().to_string(),
    };

    match sale_type {
        SaleType::Retail => retail
            .map(|amount| UnitPrice { amount, note: None })
            .ok_or_else(no_price),
        SaleType::Wholesale => match valid_price(product.wholesale_price) {
            Some(amount) => Ok(UnitPrice { amount, note: None }),
            None => retail
                .map(|amount| UnitPrice {
                    amount,
                    note: Some(PriceNote::FallbackRetail),
                })
                .ok_or_else(no_price),
        },
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
