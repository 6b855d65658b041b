//! # Validation Module
//!
//! Input rules for the admin forms and the two ledger flows.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Presentation                                                 │
//! │  └── Immediate feedback while typing                                   │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                  │
//! │  └── Rejects bad input before any storage access                       │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: SQLite                                                       │
//! │  ├── UNIQUE indexes (code, memberNo, username, receiptNo)              │
//! │  └── CHECK (stock_qty >= 0)                                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::ValidationError;
use crate::types::{
    CustomerPatch, NewCustomer, NewProduct, NewSupplier, NewUser, ProductPatch, SupplierPatch,
    UserPatch,
};
use crate::MIN_PASSWORD_LEN;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Field Validators
// =============================================================================

/// Requires a non-blank string.
pub fn validate_required(field: &str, value: &str) -> ValidationResult<()> {
    if value.trim().is_empty() {
        return Err(ValidationError::required(field));
    }
    Ok(())
}

/// Validates a password.
///
/// ## Rules
/// - At least [`MIN_PASSWORD_LEN`] characters
/// - Compared exactly at login, so it is never trimmed
///
/// ## Example
/// ```rust
/// use warung_core::validation::validate_password;
///
/// assert!(validate_password("kasir123").is_ok());
/// assert!(validate_password("12345").is_err());
/// ```
pub fn validate_password(password: &str) -> ValidationResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ValidationError::TooShort {
            field: "password".to_string(),
            min: MIN_PASSWORD_LEN,
        });
    }
    Ok(())
}

/// Validates a price or cost in rupiah. Zero is allowed.
pub fn validate_amount(field: &str, value: i64) -> ValidationResult<()> {
    if value < 0 {
        return Err(ValidationError::Negative {
            field: field.to_string(),
        });
    }
    Ok(())
}

/// Validates a line quantity.
///
/// ## Rules
/// - Must be positive (> 0)
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "qty".to_string(),
        });
    }
    Ok(())
}

// =============================================================================
// Record Validators
// =============================================================================

pub fn validate_new_user(user: &NewUser) -> ValidationResult<()> {
    validate_required("username", &user.username)?;
    validate_password(&user.password)
}

/// On edit the password is optional; when given it must still be long enough.
pub fn validate_user_patch(patch: &UserPatch) -> ValidationResult<()> {
    if let Some(username) = &patch.username {
        validate_required("username", username)?;
    }
    if let Some(password) = &patch.password {
        validate_password(password)?;
    }
    Ok(())
}

pub fn validate_new_product(product: &NewProduct) -> ValidationResult<()> {
    validate_required("code", &product.code)?;
    validate_required("name", &product.name)?;
    validate_amount("retailPrice", product.retail_price)?;
    validate_amount("wholesalePrice", product.wholesale_price)?;
    validate_amount("costPrice", product.cost_price)?;
    validate_amount("stockQty", product.stock_qty)
}

pub fn validate_product_patch(patch: &ProductPatch) -> ValidationResult<()> {
    if let Some(code) = &patch.code {
        validate_required("code", code)?;
    }
    if let Some(name) = &patch.name {
        validate_required("name", name)?;
    }
    let amounts = [
        ("retailPrice", patch.retail_price),
        ("wholesalePrice", patch.wholesale_price),
        ("costPrice", patch.cost_price),
        ("stockQty", patch.stock_qty),
    ];
    for (field, value) in amounts {
        if let Some(value) = value {
            validate_amount(field, value)?;
        }
    }
    Ok(())
}

pub fn validate_new_customer(customer: &NewCustomer) -> ValidationResult<()> {
    validate_required("memberNo", &customer.member_no)?;
    validate_required("name", &customer.name)?;
    validate_required("phone", &customer.phone)
}

pub fn validate_customer_patch(patch: &CustomerPatch) -> ValidationResult<()> {
    if let Some(member_no) = &patch.member_no {
        validate_required("memberNo", member_no)?;
    }
    if let Some(name) = &patch.name {
        validate_required("name", name)?;
    }
    if let Some(phone) = &patch.phone {
        validate_required("phone", phone)?;
    }
    Ok(())
}

pub fn validate_new_supplier(supplier: &NewSupplier) -> ValidationResult<()> {
    validate_required("name", &supplier.name)
}

pub fn validate_supplier_patch(patch: &SupplierPatch) -> ValidationResult<()> {
    match &patch.name {
        Some(name) => validate_required("name", name),
        None => Ok(()),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Role;

    #[test]
    fn test_validate_password() {
        assert!(validate_password("admin123").is_ok());
        assert!(validate_password("123456").is_ok());
        assert!(validate_password("12345").is_err());
        assert!(validate_password("").is_err());
    }

    #[test]
    fn test_validate_new_user() {
        let ok = NewUser {
            username: "kasir2".to_string(),
            password: "rahasia".to_string(),
            role: Role::Cashier,
        };
        assert!(validate_new_user(&ok).is_ok());

        let blank = NewUser {
            username: "   ".to_string(),
            ..ok.clone()
        };
        assert_eq!(
            validate_new_user(&blank),
            Err(ValidationError::required("username"))
        );
    }

    #[test]
    fn test_user_patch_password_optional() {
        assert!(validate_user_patch(&UserPatch::default()).is_ok());

        let short = UserPatch {
            password: Some("abc".to_string()),
            ..Default::default()
        };
        assert!(validate_user_patch(&short).is_err());
    }

    #[test]
    fn test_validate_new_product() {
        let product = NewProduct {
            code: "P009".to_string(),
            name: "Kerupuk".to_string(),
            retail_price: 2000,
            wholesale_price: 1500,
            cost_price: 800,
            stock_qty: 0,
        };
        assert!(validate_new_product(&product).is_ok());

        let negative = NewProduct {
            stock_qty: -1,
            ..product.clone()
        };
        assert!(matches!(
            validate_new_product(&negative),
            Err(ValidationError::Negative { .. })
        ));

        let no_code = NewProduct {
            code: String::new(),
            ..product
        };
        assert_eq!(
            validate_new_product(&no_code),
            Err(ValidationError::required("code"))
        );
    }

    #[test]
    fn test_validate_customer() {
        let customer = NewCustomer {
            member_no: "C006".to_string(),
            name: "Rina".to_string(),
            phone: String::new(),
            address: String::new(),
            birth_date: None,
        };
        assert_eq!(
            validate_new_customer(&customer),
            Err(ValidationError::required("phone"))
        );
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(-3).is_err());
    }
}
