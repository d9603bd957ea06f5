//! # Error Types
//!
//! Domain-specific error types for iluminarte-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  iluminarte-core errors (this file)                                     │
//! │  ├── CoreError        - Business rule violations                       │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  iluminarte-db errors (separate crate)                                  │
//! │  └── DbError          - Storage failures, wraps CoreError              │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → request boundary         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every variant is request-scoped: the operation aborts, nothing is
//! committed, and the caller shows the message and lets the operator retry.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// =============================================================================
// Entity
// =============================================================================

/// Kind of record a [`CoreError::NotFound`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Entity {
    Product,
    Sale,
    User,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Entity::Product => "Product",
            Entity::Sale => "Sale",
            Entity::User => "User",
        };
        f.write_str(name)
    }
}

// =============================================================================
// Core Error
// =============================================================================

/// Business rule violations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// A product with this code already exists.
    #[error("Product code '{code}' already exists")]
    DuplicateCode { code: String },

    /// A user with this username already exists.
    #[error("Username '{username}' already exists")]
    DuplicateUsername { username: String },

    /// Product, sale or user does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: Entity, id: String },

    /// A line asked for more units than the product has left.
    ///
    /// ## User Workflow
    /// ```text
    /// Register sale: (A1, 5), (A1, 8)     A1 stock = 10
    ///      │
    ///      ▼
    /// line 1 accepted → running stock 5
    ///      │
    ///      ▼
    /// line 2 wants 8 > 5
    ///      │
    ///      ▼
    /// InsufficientStock { code: "A1", available: 5, requested: 8 }
    ///      │
    ///      ▼
    /// Whole sale discarded, stock still 10
    /// ```
    #[error("Not enough stock of {name} ({code}): available {available}, requested {requested}")]
    InsufficientStock {
        product_id: String,
        code: String,
        name: String,
        available: i64,
        requested: i64,
    },

    /// No submitted line had a known product and a positive quantity.
    #[error("A sale needs at least one product with a quantity greater than zero")]
    EmptySale,

    /// The product is still referenced by recorded sale lines.
    #[error("Product {product_id} is referenced by {lines} sale line(s) and cannot be deleted")]
    ProductInUse { product_id: String, lines: i64 },

    /// A subtotal, total or dashboard sum does not fit in an `i64`.
    #[error("Amount too large to record: {context}")]
    AmountOverflow { context: String },

    /// Input failed validation.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Creates a NotFound error for a given entity and ID.
    pub fn not_found(entity: Entity, id: impl Into<String>) -> Self {
        CoreError::NotFound {
            entity,
            id: id.into(),
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too short.
    #[error("{field} must be at least {min} characters")]
    TooShort { field: String, min: usize },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value must not be negative.
    #[error("{field} must not be negative")]
    Negative { field: String },

    /// Numeric value exceeds its upper bound.
    #[error("{field} must be at most {max}")]
    TooLarge { field: String, max: i64 },

    /// Invalid format.
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;
