//! # iluminarte-core: Pure Business Logic for the Iluminarte Back Office
//!
//! Every rule that does not need a database lives here as a pure function.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Iluminarte Architecture                             │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │             Web adapter (forms, sessions, templates)            │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ form::line_requests_from_fields        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ iluminarte-core (THIS CRATE) ★                  │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   money   │  │  ledger   │  │ reporting │  │   │
//! │  │   │  Product  │  │   Money   │  │ plan_lines│  │  monthly  │  │   │
//! │  │   │   Sale    │  │           │  │ StockView │  │  series   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                  iluminarte-db (Database Layer)                 │   │
//! │  │         SQLite transactions, migrations, repositories           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Product, Sale, SaleLine, User, ...)
//! - [`money`] - Integer money
//! - [`error`] - Domain error types
//! - [`validation`] - Field validation
//! - [`ledger`] - Line acceptance against a running stock view
//! - [`form`] - Translation of submitted form fields into line requests
//! - [`reporting`] - Dashboard aggregation helpers
//!
//! ## Example Usage
//!
//! ```rust
//! use iluminarte_core::ledger::{plan_lines, StockView};
//! use iluminarte_core::types::{LineRequest, ProductSnapshot};
//!
//! let mut stock = StockView::new(vec![ProductSnapshot {
//!     id: "p1".to_string(),
//!     code: "A1".to_string(),
//!     name: "Lamp".to_string(),
//!     sale_price: 100,
//!     stock: 10,
//! }]);
//!
//! let plan = plan_lines(&mut stock, &[LineRequest::new("p1", 3), LineRequest::new("p1", 4)])
//!     .unwrap();
//!
//! assert_eq!(plan.total().amount(), 700);
//! assert_eq!(stock.available("p1"), Some(3));
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod form;
pub mod ledger;
pub mod money;
pub mod reporting;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, Entity, ValidationError};
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Stock level at or below which a product shows up in the low-stock panel.
pub const LOW_STOCK_THRESHOLD: i64 = 5;

/// Number of latest sales shown on the dashboard.
pub const RECENT_SALES_LIMIT: usize = 8;

/// Number of entries in the top-products, low-stock and newest-products panels.
pub const DASHBOARD_PANEL_LIMIT: usize = 5;
