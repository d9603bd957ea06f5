//! # Ledger Module
//!
//! The line-acceptance algorithm shared by sale creation and sale edits.
//!
//! ## Sequential Acceptance
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  requests (in submission order)        StockView (running stock)        │
//! │                                                                         │
//! │  (A1, 3) ── blank? no ── known? yes ── 3 <= 10 ──► accept   A1: 10 → 7  │
//! │  (A1, 0) ── blank? yes ─────────────────────────► skip                  │
//! │  (ZZ, 2) ── blank? no ── known? no ─────────────► skip                  │
//! │  (A1, 4) ── blank? no ── known? yes ── 4 <= 7 ───► accept   A1:  7 → 3  │
//! │  (A1, 9) ── blank? no ── known? yes ── 9 >  3 ───► ABORT (whole sale)   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Validation and deduction are interleaved per line, so two lines for the
//! same product can never together take more than its stock. The database
//! layer loads a [`StockView`], runs [`plan_lines`], and applies the
//! resulting [`LinePlan`] inside one transaction.

use std::collections::HashMap;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::{LineRequest, ProductSnapshot};

// =============================================================================
// Stock View
// =============================================================================

/// In-memory view of the products referenced by a submission.
#[derive(Debug, Clone, Default)]
pub struct StockView {
    products: HashMap<String, ProductSnapshot>,
}

impl StockView {
    pub fn new(products: impl IntoIterator<Item = ProductSnapshot>) -> Self {
        StockView {
            products: products.into_iter().map(|p| (p.id.clone(), p)).collect(),
        }
    }

    /// Units currently available, or `None` for an unknown product.
    pub fn available(&self, product_id: &str) -> Option<i64> {
        self.products.get(product_id).map(|p| p.stock)
    }

    /// Adds units back, e.g. when the lines of a sale are reverted.
    ///
    /// Unknown products are ignored.
    pub fn restore(&mut self, product_id: &str, quantity: i64) {
        if let Some(product) = self.products.get_mut(product_id) {
            product.stock = product.stock.saturating_add(quantity);
        }
    }

    fn take(&mut self, request: &LineRequest) -> CoreResult<Option<PlannedLine>> {
        let Some(product) = self.products.get_mut(&request.product_id) else {
            return Ok(None);
        };

        if product.stock < request.quantity {
            return Err(CoreError::InsufficientStock {
                product_id: product.id.clone(),
                code: product.code.clone(),
                name: product.name.clone(),
                available: product.stock,
                requested: request.quantity,
            });
        }

        let subtotal = Money::from_amount(product.sale_price)
            .checked_multiply_quantity(request.quantity)
            .ok_or_else(|| CoreError::AmountOverflow {
                context: format!("{} x {}", request.quantity, product.code),
            })?;

        product.stock -= request.quantity;

        Ok(Some(PlannedLine {
            product_id: product.id.clone(),
            quantity: request.quantity,
            unit_price: product.sale_price,
            subtotal,
        }))
    }
}

// =============================================================================
// Plan
// =============================================================================

/// A line that passed validation and will be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedLine {
    pub product_id: String,
    pub quantity: i64,
    /// Sale price captured at planning time.
    pub unit_price: i64,
    subtotal: Money,
}

impl PlannedLine {
    /// `quantity × unit_price`, known to fit in an `i64`.
    pub fn subtotal(&self) -> Money {
        self.subtotal
    }
}

/// The accepted lines of one submission, in input order. Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinePlan {
    lines: Vec<PlannedLine>,
    total: Money,
}

impl LinePlan {
    pub fn lines(&self) -> &[PlannedLine] {
        &self.lines
    }

    pub fn total(&self) -> Money {
        self.total
    }

    /// Units taken per product, summed over lines.
    pub fn quantities_by_product(&self) -> HashMap<&str, i64> {
        let mut out: HashMap<&str, i64> = HashMap::new();
        for line in &self.lines {
            *out.entry(line.product_id.as_str()).or_default() += line.quantity;
        }
        out
    }
}

/// Accepts requests in order against `stock`, deducting as it goes.
///
/// - blank requests (no product id, quantity ≤ 0) are skipped
/// - requests for unknown products are skipped
/// - the first request exceeding the running stock aborts with
///   [`CoreError::InsufficientStock`]
/// - if nothing was accepted the result is [`CoreError::EmptySale`]
/// - a subtotal or the total leaving `i64` is [`CoreError::AmountOverflow`]
///
/// On error `stock` may be partially deducted; callers discard it.
pub fn plan_lines(stock: &mut StockView, requests: &[LineRequest]) -> CoreResult<LinePlan> {
    let mut lines = Vec::with_capacity(requests.len());
    let mut total = Money::zero();

    for request in requests {
        if request.is_blank() {
            continue;
        }

        if let Some(line) = stock.take(request)? {
            total = total
                .checked_add(line.subtotal)
                .ok_or_else(|| CoreError::AmountOverflow {
                    context: "sale total".to_string(),
                })?;
            lines.push(line);
        }
    }

    if lines.is_empty() {
        return Err(CoreError::EmptySale);
    }

    Ok(LinePlan { lines, total })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn lamp(stock: i64) -> ProductSnapshot {
        ProductSnapshot {
            id: "p1".to_string(),
            code: "A1".to_string(),
            name: "Lamp".to_string(),
            sale_price: 100,
            stock,
        }
    }

    fn shade(stock: i64) -> ProductSnapshot {
        ProductSnapshot {
            id: "p2".to_string(),
            code: "B7".to_string(),
            name: "Shade".to_string(),
            sale_price: 250,
            stock,
        }
    }

    #[test]
    fn test_two_lines_same_product() {
        let mut view = StockView::new([lamp(10)]);
        let plan = plan_lines(
            &mut view,
            &[LineRequest::new("p1", 3), LineRequest::new("p1", 4)],
        )
        .unwrap();

        assert_eq!(plan.lines().len(), 2);
        assert_eq!(plan.lines()[0].subtotal().amount(), 300);
        assert_eq!(plan.lines()[1].subtotal().amount(), 400);
        assert_eq!(plan.total().amount(), 700);
        assert_eq!(view.available("p1"), Some(3));
        assert_eq!(plan.quantities_by_product()["p1"], 7);
    }

    #[test]
    fn test_later_line_sees_earlier_deduction() {
        let mut view = StockView::new([lamp(10)]);
        let err = plan_lines(
            &mut view,
            &[LineRequest::new("p1", 5), LineRequest::new("p1", 8)],
        )
        .unwrap_err();

        assert_eq!(
            err,
            CoreError::InsufficientStock {
                product_id: "p1".to_string(),
                code: "A1".to_string(),
                name: "Lamp".to_string(),
                available: 5,
                requested: 8,
            }
        );
    }

    #[test]
    fn test_blank_and_unknown_lines_are_skipped() {
        let mut view = StockView::new([lamp(10), shade(2)]);
        let plan = plan_lines(
            &mut view,
            &[
                LineRequest::new("", 4),
                LineRequest::new("p1", 0),
                LineRequest::new("missing", 1),
                LineRequest::new("p2", 2),
            ],
        )
        .unwrap();

        assert_eq!(plan.lines().len(), 1);
        assert_eq!(plan.total().amount(), 500);
        assert_eq!(view.available("p1"), Some(10));
        assert_eq!(view.available("p2"), Some(0));
    }

    #[test]
    fn test_nothing_accepted_is_empty_sale() {
        let mut view = StockView::new([lamp(10)]);
        assert_eq!(plan_lines(&mut view, &[]), Err(CoreError::EmptySale));
        assert_eq!(
            plan_lines(&mut view, &[LineRequest::new("nope", 1), LineRequest::new("p1", -1)]),
            Err(CoreError::EmptySale)
        );
    }

    #[test]
    fn test_restore_before_replanning() {
        // Sale held (p1, 3); stock already at 0 after it.
        let mut view = StockView::new([lamp(0)]);
        view.restore("p1", 3);
        view.restore("unknown", 3);

        let plan = plan_lines(&mut view, &[LineRequest::new("p1", 2)]).unwrap();
        assert_eq!(plan.total().amount(), 200);
        assert_eq!(view.available("p1"), Some(1));
    }

    #[test]
    fn test_oversized_amounts_are_rejected_not_wrapped() {
        let chandelier = ProductSnapshot {
            id: "p9".to_string(),
            code: "CH-1".to_string(),
            name: "Chandelier".to_string(),
            sale_price: 1_000_000_000_000,
            stock: 10_000_000,
        };

        let mut view = StockView::new([chandelier.clone()]);
        let err = plan_lines(&mut view, &[LineRequest::new("p9", 10_000_000)]).unwrap_err();
        assert!(matches!(err, CoreError::AmountOverflow { .. }));

        // Each line fits on its own; their sum does not.
        let mut view = StockView::new([ProductSnapshot {
            sale_price: i64::MAX / 2 + 1,
            stock: 2,
            ..chandelier
        }]);
        let err = plan_lines(
            &mut view,
            &[LineRequest::new("p9", 1), LineRequest::new("p9", 1)],
        )
        .unwrap_err();
        assert_eq!(
            err,
            CoreError::AmountOverflow {
                context: "sale total".to_string()
            }
        );
    }

    fn request_strategy() -> impl Strategy<Value = LineRequest> {
        (prop_oneof![Just("p1"), Just("p2"), Just("p3"), Just("")], -3i64..15)
            .prop_map(|(id, qty)| LineRequest::new(id, qty))
    }

    proptest! {
        /// Property: accepted plans never overdraw stock and total = Σ subtotal.
        #[test]
        fn prop_plan_respects_stock(
            lamp_stock in 0i64..30,
            shade_stock in 0i64..30,
            requests in proptest::collection::vec(request_strategy(), 0..12),
        ) {
            let mut view = StockView::new([lamp(lamp_stock), shade(shade_stock)]);

            match plan_lines(&mut view, &requests) {
                Ok(plan) => {
                    let taken = plan.quantities_by_product();
                    let lamp_taken = taken.get("p1").copied().unwrap_or(0);
                    let shade_taken = taken.get("p2").copied().unwrap_or(0);

                    prop_assert!(lamp_taken <= lamp_stock);
                    prop_assert!(shade_taken <= shade_stock);
                    prop_assert_eq!(view.available("p1"), Some(lamp_stock - lamp_taken));
                    prop_assert_eq!(view.available("p2"), Some(shade_stock - shade_taken));

                    let expected: i64 = plan.lines().iter().map(|l| l.quantity * l.unit_price).sum();
                    prop_assert_eq!(plan.total().amount(), expected);
                    prop_assert!(plan.lines().iter().all(|l| l.quantity > 0));
                }
                Err(CoreError::InsufficientStock { available, requested, .. }) => {
                    prop_assert!(available < requested);
                    prop_assert!(available >= 0);
                }
                Err(CoreError::EmptySale) => {
                    prop_assert!(requests
                        .iter()
                        .all(|r| r.is_blank() || view.available(&r.product_id).is_none()));
                }
                Err(other) => prop_assert!(false, "unexpected error: {}", other),
            }
        }
    }
}
