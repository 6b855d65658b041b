//! # warung-core: Pure Business Logic for Warung POS
//!
//! Every calculation the shop relies on lives here as a pure function:
//! line totals, change due, retail/wholesale price selection, cart stock
//! clamping, report KPIs and the CSV export. Nothing in this crate touches
//! a database, a file or the clock of another component.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Warung POS Architecture                          │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    Presentation layer                           │   │
//! │  │   Kasir page ──► Cart ──► Payment ──► Receipt / Reports        │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ warung-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐  │   │
//! │  │   │  types  │ │ pricing │ │  cart   │ │ ledger  │ │ export  │  │   │
//! │  │   │ Product │ │priceFor │ │ clamp   │ │ totals  │ │  CSV    │  │   │
//! │  │   └─────────┘ └─────────┘ └─────────┘ └─────────┘ └─────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                   warung-db (Data Layer)                        │   │
//! │  │     schema registry, migrations, record store, coordinator      │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Entity records (User, Product, Customer, Transaction, ...)
//! - [`money`] - Whole-rupiah money type and IDR formatting
//! - [`error`] - Domain error types
//! - [`validation`] - Admin form and ledger input rules
//! - [`pricing`] - Lenient price parsing and retail/wholesale selection
//! - [`cart`] - Checkout cart with quantity clamping to stock
//! - [`ledger`] - Builds sale and goods-receipt ledger lines and totals
//! - [`report`] - Sales summary KPIs
//! - [`export`] - Transaction CSV export
//!
//! ## Example Usage
//!
//! ```rust
//! use warung_core::money::Money;
//!
//! let kopi = Money::from_rupiah(5000);
//! assert_eq!((kopi * 3).to_string(), "Rp 15.000");
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cart;
pub mod error;
pub mod export;
pub mod ledger;
pub mod money;
pub mod pricing;
pub mod report;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Fixed key of the single settings row.
pub const SETTINGS_ID: &str = "app";

/// Minimum password length accepted by user management.
pub const MIN_PASSWORD_LEN: usize = 6;

/// Placeholder written to exports and reports for walk-in sales.
pub const WALK_IN_CUSTOMER: &str = "N/A";
