//! # Error Types
//!
//! Domain-specific error types for warung-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  warung-core errors (this file)                                        │
//! │  ├── CoreError        - Pricing and cart failures                      │
//! │  └── ValidationError  - Input rejected before storage                  │
//! │                                                                         │
//! │  warung-db errors (separate crate)                                     │
//! │  └── DbError          - Storage, uniqueness, stock, not found          │
//! │                                                                         │
//! │  Flow: ValidationError → DbError::Validation → caller message           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    /// Neither the requested nor the fallback price is usable.
    ///
    /// ## When This Occurs
    /// - RETAIL sale of a product whose retail price is missing or negative
    /// - WHOLESALE sale where both wholesale and retail prices are invalid
    #[error("No valid {sale_type} price for product {code}")]
    NoValidPrice { code: String, sale_type: String },

    /// Cart line cannot be added because nothing is left on the shelf.
    ///
    /// ## User Workflow
    /// ```text
    /// Tap product (stock 0)
    ///      │
    ///      ▼
    /// Cart::add_product
    ///      │
    ///      ▼
    /// InsufficientStock { code: "P003", available: 0, requested: 1 }
    ///      │
    ///      ▼
    /// UI shows: "Stok P003 habis"
    /// ```
    #[error("Insufficient stock for {code}: available {available}, requested {requested}")]
    InsufficientStock {
        code: String,
        available: i64,
        requested: i64,
    },

    /// Product is not in the cart.
    #[error("Product {0} is not in the cart")]
    NotInCart(i64),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised before any storage access; a failed validation never leaves a
/// partial write behind.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too short.
    #[error("{field} must be at least {min} characters")]
    TooShort { field: String, min: usize },

    /// Value must be strictly positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must be zero or more.
    #[error("{field} must not be negative")]
    Negative { field: String },

    /// Invalid format.
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Checkout attempted with nothing in the cart.
    #[error("Cart is empty")]
    EmptyCart,

    /// Goods receipt submitted without any line.
    #[error("At least one item is required")]
    EmptyItems,

    /// Tendered cash does not cover the amount due.
    #[error("Cash received {received} is less than total {due}")]
    InsufficientCash { received: i64, due: i64 },

    /// Discount larger than the subtotal it applies to.
    #[error("Discount {discount} exceeds subtotal {subtotal}")]
    DiscountExceedsSubtotal { discount: i64, subtotal: i64 },

    /// A computed amount does not fit the currency range.
    #[error("{field} is too large")]
    AmountTooLarge { field: String },
}

impl ValidationError {
    /// Shorthand for [`ValidationError::Required`].
    pub fn required(field: impl Into<String>) -> Self {
        ValidationError::Required {
            field: field.into(),
        }
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::InsufficientStock {
            code: "P001".to_string(),
            available: 3,
            requested: 5,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for P001: available 3, requested 5"
        );
    }

    #[test]
    fn test_validation_error_messages() {
        assert_eq!(ValidationError::required("username").to_string(), "username is required");

        let err = ValidationError::TooShort {
            field: "password".to_string(),
            min: 6,
        };
        assert_eq!(err.to_string(), "password must be at least 6 characters");

        let err = ValidationError::InsufficientCash {
            received: 1000,
            due: 5000,
        };
        assert_eq!(err.to_string(), "Cash received 1000 is less than total 5000");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let core_err: CoreError = ValidationError::EmptyCart.into();
        assert!(matches!(core_err, CoreError::Validation(ValidationError::EmptyCart)));
    }
}
