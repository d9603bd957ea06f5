//! # Money
//!
//! Integer currency amounts.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Prices, costs, subtotals and totals are whole amounts of the smallest │
//! │  currency unit. The store sells in pesos without decimals, so one      │
//! │  unit is one peso.                                                     │
//! │                                                                         │
//! │    subtotal = quantity × unit_price      (exact, integer)              │
//! │    total    = Σ subtotal                 (exact, integer)              │
//! │                                                                         │
//! │  No rounding step exists anywhere, so a cached total can always be     │
//! │  compared for equality with a recomputed one.                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ```rust
//! use iluminarte_core::money::Money;
//!
//! let price = Money::from_amount(12_500);
//! let subtotal = price.multiply_quantity(3);
//! assert_eq!(subtotal.amount(), 37_500);
//! assert_eq!(subtotal.to_string(), "$37.500");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, Mul, Sub};
use ts_rs::TS;

/// Whole currency units. Signed so that differences can go below zero.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize, TS,
)]
#[serde(transparent)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    pub const fn from_amount(amount: i64) -> Self {
        Money(amount)
    }

    pub const fn amount(&self) -> i64 {
        self.0
    }

    pub const fn zero() -> Self {
        Money(0)
    }

    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Line subtotal: this unit price times `qty`.
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0 * qty)
    }

    /// Subtotal that refuses to wrap: `None` when the product leaves `i64`.
    pub const fn checked_multiply_quantity(&self, qty: i64) -> Option<Self> {
        match self.0.checked_mul(qty) {
            Some(amount) => Some(Money(amount)),
            None => None,
        }
    }

    pub const fn checked_add(&self, rhs: Money) -> Option<Self> {
        match self.0.checked_add(rhs.0) {
            Some(amount) => Some(Money(amount)),
            None => None,
        }
    }

    /// `symbol` followed by the amount with `.` between thousands groups,
    /// the way receipts print it: `$1.234.567`.
    pub fn format_with(&self, symbol: &str) -> String {
        let digits = self.0.unsigned_abs().to_string();
        let len = digits.len();

        let mut out = String::with_capacity(symbol.len() + len + len / 3 + 1);
        if self.is_negative() {
            out.push('-');
        }
        out.push_str(symbol);
        for (i, ch) in digits.char_indices() {
            if i > 0 && (len - i) % 3 == 0 {
                out.push('.');
            }
            out.push(ch);
        }
        out
    }
}

impl From<i64> for Money {
    fn from(amount: i64) -> Self {
        Money(amount)
    }
}

/// Uses `$`; see [`Money::format_with`] for other symbols.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format_with("$"))
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money(self.0 + rhs.0)
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Money) -> Money {
        Money(self.0 - rhs.0)
    }
}

impl Mul<i64> for Money {
    type Output = Money;

    fn mul(self, qty: i64) -> Money {
        self.multiply_quantity(qty)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), Add::add)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
