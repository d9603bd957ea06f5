//! # Domain Types
//!
//! Core domain types used throughout the back office.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │      Sale       │   │    SaleLine     │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │◄─┐│  id (UUID)      │◄──│  sale_id (FK)   │       │
//! │  │  code (unique)  │  ││  user_id (FK)   │   │  product_id(FK) │──┐    │
//! │  │  sale_price     │  ││  total          │   │  quantity       │  │    │
//! │  │  cost, stock    │  ││  created_at     │   │  unit_price     │  │    │
//! │  └─────────────────┘  │└─────────────────┘   │  subtotal       │  │    │
//! │                       │                      └─────────────────┘  │    │
//! │                       └───────────────────────────────────────────┘    │
//! │  ┌─────────────────┐   ┌─────────────────┐                             │
//! │  │      User       │   │  UserIdentity   │                             │
//! │  │  username       │──►│  id             │ (owner of a sale)           │
//! │  │  permissions    │   │  display_name   │                             │
//! │  └─────────────────┘   └─────────────────┘                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Products have an immutable `id` (UUID v4, used for relations) and a
//! human-facing `code` that staff may edit.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;

// =============================================================================
// Product
// =============================================================================

/// A product in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Business identifier, unique across the catalog.
    pub code: String,

    /// Display name.
    pub name: String,

    /// Current sale price, in the smallest currency unit.
    pub sale_price: i64,

    /// Purchase cost, used for inventory valuation.
    pub cost: i64,

    /// Units on hand. Never negative.
    pub stock: i64,

    /// Opaque reference to an uploaded picture.
    pub image: Option<String>,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Returns the sale price as Money.
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_amount(self.sale_price)
    }

    /// Returns the cost as Money.
    #[inline]
    pub fn cost(&self) -> Money {
        Money::from_amount(self.cost)
    }

    /// Active iff there is stock left.
    pub fn status(&self) -> ProductStatus {
        if self.stock > 0 {
            ProductStatus::Active
        } else {
            ProductStatus::Inactive
        }
    }

    /// Value of the units on hand at cost; `None` if it leaves `i64`.
    pub fn inventory_value(&self) -> Option<Money> {
        self.cost().checked_multiply_quantity(self.stock)
    }

    /// The subset of fields the ledger plans against.
    pub fn snapshot(&self) -> ProductSnapshot {
        ProductSnapshot {
            id: self.id.clone(),
            code: self.code.clone(),
            name: self.name.clone(),
            sale_price: self.sale_price,
            stock: self.stock,
        }
    }
}

impl fmt::Display for Product {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {} ({})", self.name, self.code, self.status())
    }
}

/// Derived availability of a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ProductStatus {
    Active,
    Inactive,
}

impl fmt::Display for ProductStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProductStatus::Active => f.write_str("Active"),
            ProductStatus::Inactive => f.write_str("Inactive"),
        }
    }
}

/// Fields for a new catalog entry.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewProduct {
    pub name: String,
    pub code: String,
    pub sale_price: i64,
    pub cost: i64,
    pub stock: i64,
    pub image: Option<String>,
}

/// Replacement fields for an existing product.
///
/// `image: None` keeps the stored image.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ProductUpdate {
    pub name: String,
    pub code: String,
    pub sale_price: i64,
    pub cost: i64,
    pub stock: i64,
    pub image: Option<String>,
}

/// Product fields needed to accept sale lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct ProductSnapshot {
    pub id: String,
    pub code: String,
    pub name: String,
    pub sale_price: i64,
    pub stock: i64,
}

// =============================================================================
// Line Request
// =============================================================================

/// One requested (product, quantity) pair, in submission order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LineRequest {
    pub product_id: String,
    pub quantity: i64,
}

impl LineRequest {
    pub fn new(product_id: impl Into<String>, quantity: i64) -> Self {
        LineRequest {
            product_id: product_id.into(),
            quantity,
        }
    }

    /// A request the ledger skips without looking anything up.
    pub fn is_blank(&self) -> bool {
        self.quantity <= 0 || self.product_id.trim().is_empty()
    }
}

// =============================================================================
// Sale
// =============================================================================

/// A recorded sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Sale {
    pub id: String,
    /// Staff member who registered the sale.
    pub user_id: String,
    /// Cached Σ line subtotal.
    pub total: i64,
    /// Set once at creation.
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Sale {
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_amount(self.total)
    }

    /// Short human label, e.g. `Sale #1a2b3c4d - 16/10/2026`.
    pub fn label(&self) -> String {
        let short: String = self.id.chars().take(8).collect();
        format!("Sale #{} - {}", short, self.created_at.format("%d/%m/%Y"))
    }
}

// =============================================================================
// Sale Line
// =============================================================================

/// A line item of a sale.
///
/// The unit price is frozen at the moment the line is written, so later
/// price changes never alter history. The subtotal has no setter: it is
/// derived from quantity and unit price in [`SaleLine::new`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct SaleLine {
    pub id: String,
    pub sale_id: String,
    pub product_id: String,
    pub quantity: i64,
    pub unit_price: i64,
    subtotal: i64,
    /// Zero-based submission order within the sale.
    pub position: i64,
}

impl SaleLine {
    pub fn new(
        id: impl Into<String>,
        sale_id: impl Into<String>,
        product_id: impl Into<String>,
        quantity: i64,
        unit_price: i64,
        position: i64,
    ) -> CoreResult<Self> {
        let subtotal = Money::from_amount(unit_price)
            .checked_multiply_quantity(quantity)
            .ok_or_else(|| CoreError::AmountOverflow {
                context: format!("{} x {}", quantity, unit_price),
            })?;

        Ok(SaleLine {
            id: id.into(),
            sale_id: sale_id.into(),
            product_id: product_id.into(),
            quantity,
            unit_price,
            subtotal: subtotal.amount(),
            position,
        })
    }

    #[inline]
    pub fn subtotal(&self) -> Money {
        Money::from_amount(self.subtotal)
    }

    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_amount(self.unit_price)
    }

    /// Whether the stored subtotal still matches quantity × unit price.
    pub fn is_consistent(&self) -> bool {
        self.quantity.checked_mul(self.unit_price) == Some(self.subtotal)
    }
}

/// A sale line joined with the product it references.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct SaleLineDetail {
    #[serde(flatten)]
    #[ts(flatten)]
    #[cfg_attr(feature = "sqlx", sqlx(flatten))]
    pub line: SaleLine,
    pub product_code: String,
    pub product_name: String,
}

/// A sale with its owner and lines, as shown in the sales list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleDetail {
    pub sale: Sale,
    /// Display name of the owning user.
    pub seller: String,
    pub lines: Vec<SaleLineDetail>,
}

impl SaleDetail {
    /// Σ subtotal recomputed from the lines; `None` on overflow.
    pub fn lines_total(&self) -> Option<Money> {
        self.lines
            .iter()
            .try_fold(Money::zero(), |acc, l| acc.checked_add(l.line.subtotal()))
    }

    /// Cached total equals the recomputed one and every line is consistent.
    pub fn is_consistent(&self) -> bool {
        self.lines.iter().all(|l| l.line.is_consistent()) && self.lines_total() == Some(self.sale.total())
    }
}

/// Compact sale row for the dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct SaleSummary {
    pub id: String,
    pub seller: String,
    pub total: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Users
// =============================================================================

/// A staff account.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct User {
    pub id: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub is_staff: bool,
    pub is_active: bool,
    pub is_superuser: bool,
    /// argon2 PHC string. Never leaves the server.
    #[serde(skip)]
    #[ts(skip)]
    pub password_hash: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Full name when known, username otherwise.
    pub fn display_name(&self) -> String {
        let full = format!("{} {}", self.first_name.trim(), self.last_name.trim());
        let full = full.trim();
        if full.is_empty() {
            self.username.clone()
        } else {
            full.to_string()
        }
    }

    pub fn identity(&self) -> UserIdentity {
        UserIdentity {
            id: self.id.clone(),
            display_name: self.display_name(),
        }
    }
}

/// The authenticated user on whose behalf an operation runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct UserIdentity {
    pub id: String,
    pub display_name: String,
}

/// Fields for a new staff account.
#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub is_staff: bool,
    pub is_active: bool,
}

impl NewUser {
    /// Active, non-staff account with empty profile fields.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        NewUser {
            username: username.into(),
            password: password.into(),
            first_name: String::new(),
            last_name: String::new(),
            email: String::new(),
            is_staff: false,
            is_active: true,
        }
    }
}

/// Editable profile fields of an account.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct UserUpdate {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub is_staff: bool,
    pub is_active: bool,
}

/// Capabilities checked by the account screens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    ViewUser,
    AddUser,
    ChangeUser,
}

impl Permission {
    pub const ALL: [Permission; 3] = [
        Permission::ViewUser,
        Permission::AddUser,
        Permission::ChangeUser,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::ViewUser => "view_user",
            Permission::AddUser => "add_user",
            Permission::ChangeUser => "change_user",
        }
    }
}

impl FromStr for Permission {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Permission::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| ValidationError::InvalidFormat {
                field: "permission".to_string(),
                reason: format!("unknown permission '{}'", s),
            })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn product(stock: i64) -> Product {
        let now = Utc::now();
        Product {
            id: "p1".to_string(),
            code: "A1".to_string(),
            name: "Lamp".to_string(),
            sale_price: 100,
            cost: 60,
            stock,
            image: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_product_status() {
        assert_eq!(product(3).status(), ProductStatus::Active);
        assert_eq!(product(0).status(), ProductStatus::Inactive);
        assert_eq!(product(3).to_string(), "Lamp - A1 (Active)");
    }

    #[test]
    fn test_inventory_value() {
        assert_eq!(product(10).inventory_value(), Some(Money::from_amount(600)));

        let mut warehouse = product(10_000_000);
        warehouse.cost = 1_000_000_000_000;
        assert_eq!(warehouse.inventory_value(), None);
    }

    #[test]
    fn test_sale_line_subtotal_is_derived() {
        let line = SaleLine::new("l1", "s1", "p1", 4, 100, 0).unwrap();
        assert_eq!(line.subtotal().amount(), 400);
        assert!(line.is_consistent());

        assert!(matches!(
            SaleLine::new("l2", "s1", "p1", 10_000_000, 1_000_000_000_000, 1),
            Err(CoreError::AmountOverflow { .. })
        ));
    }

    #[test]
    fn test_blank_requests() {
        assert!(LineRequest::new("p1", 0).is_blank());
        assert!(LineRequest::new("p1", -2).is_blank());
        assert!(LineRequest::new("  ", 2).is_blank());
        assert!(!LineRequest::new("p1", 1).is_blank());
    }

    #[test]
    fn test_display_name_falls_back_to_username() {
        let mut user = User {
            id: "u1".to_string(),
            username: "caja1".to_string(),
            first_name: String::new(),
            last_name: String::new(),
            email: String::new(),
            is_staff: false,
            is_active: true,
            is_superuser: false,
            password_hash: String::new(),
            created_at: Utc::now(),
        };
        assert_eq!(user.display_name(), "caja1");

        user.first_name = "Ana".to_string();
        assert_eq!(user.display_name(), "Ana");

        user.last_name = "Rojas".to_string();
        assert_eq!(user.identity().display_name, "Ana Rojas");
    }

    #[test]
    fn test_permission_round_trip() {
        for p in Permission::ALL {
            assert_eq!(p.as_str().parse::<Permission>().unwrap(), p);
        }
        assert!("delete_everything".parse::<Permission>().is_err());
    }
}
