//! # Reporting
//!
//! Dashboard shapes and the pure aggregation that does not need SQL.
//!
//! ## Dashboard Panels
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  revenue_total   invoice_count   inventory_value        (year / all)   │
//! │  monthly_revenue ─ Jan ▇▇▇  Mar ▇▇▇▇▇  Oct ▇            (year)         │
//! │  recent_sales    ─ last 8 sales with seller name        (all years)    │
//! │  top_products    ─ top 5 by revenue, qty sold           (all years)    │
//! │  low_stock       ─ stock <= threshold, by stock, name                  │
//! │  newest_products ─ last 5 created                                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Datelike, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;
use crate::types::{Product, SaleSummary};
use crate::{DASHBOARD_PANEL_LIMIT, LOW_STOCK_THRESHOLD, RECENT_SALES_LIMIT};

const MONTH_LABELS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

// =============================================================================
// Options
// =============================================================================

/// Limits and thresholds for one dashboard computation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardOptions {
    pub low_stock_threshold: i64,
    pub recent_sales_limit: usize,
    pub top_products_limit: usize,
    pub low_stock_limit: usize,
    pub newest_products_limit: usize,
}

impl Default for DashboardOptions {
    fn default() -> Self {
        DashboardOptions {
            low_stock_threshold: LOW_STOCK_THRESHOLD,
            recent_sales_limit: RECENT_SALES_LIMIT,
            top_products_limit: DASHBOARD_PANEL_LIMIT,
            low_stock_limit: DASHBOARD_PANEL_LIMIT,
            newest_products_limit: DASHBOARD_PANEL_LIMIT,
        }
    }
}

impl DashboardOptions {
    pub fn with_low_stock_threshold(mut self, threshold: i64) -> Self {
        self.low_stock_threshold = threshold;
        self
    }
}

// =============================================================================
// Dashboard
// =============================================================================

/// Revenue of one calendar month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct MonthlyRevenue {
    /// 1-12.
    pub month: u32,
    pub label: String,
    pub total: i64,
}

/// A product ranked by revenue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct TopProduct {
    pub product_id: String,
    pub code: String,
    pub name: String,
    pub quantity_sold: i64,
    pub revenue: i64,
}

/// Everything the home page shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Dashboard {
    pub year: i32,
    pub revenue_total: i64,
    pub invoice_count: i64,
    pub monthly_revenue: Vec<MonthlyRevenue>,
    pub inventory_value: i64,
    pub recent_sales: Vec<SaleSummary>,
    pub top_products: Vec<TopProduct>,
    pub low_stock: Vec<Product>,
    pub newest_products: Vec<Product>,
}

impl Dashboard {
    pub fn revenue(&self) -> Money {
        Money::from_amount(self.revenue_total)
    }

    pub fn inventory(&self) -> Money {
        Money::from_amount(self.inventory_value)
    }
}

// =============================================================================
// Aggregation
// =============================================================================

/// Abbreviated English month name, or `None` outside 1-12.
pub fn month_label(month: u32) -> Option<&'static str> {
    month
        .checked_sub(1)
        .and_then(|i| MONTH_LABELS.get(i as usize))
        .copied()
}

/// Half-open UTC range `[Jan 1 year, Jan 1 year+1)`.
///
/// Returns `None` for years chrono cannot represent.
pub fn year_bounds(year: i32) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let start = Utc.with_ymd_and_hms(year, 1, 1, 0, 0, 0).single()?;
    let end = Utc.with_ymd_and_hms(year.checked_add(1)?, 1, 1, 0, 0, 0).single()?;
    Some((start, end))
}

/// Buckets `(created_at, total)` pairs by month.
///
/// Only months with at least one sale appear, in ascending order. Callers
/// pass sales of a single year.
pub fn monthly_series(sales: &[(DateTime<Utc>, i64)]) -> Vec<MonthlyRevenue> {
    let mut buckets: [Option<i64>; 12] = [None; 12];

    for (created_at, total) in sales {
        let slot = &mut buckets[created_at.month0() as usize];
        *slot = Some(slot.unwrap_or(0) + total);
    }

    buckets
        .iter()
        .enumerate()
        .filter_map(|(i, total)| {
            let month = i as u32 + 1;
            total.map(|total| MonthlyRevenue {
                month,
                label: MONTH_LABELS[i].to_string(),
                total,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(year: i32, month: u32, day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(year, month, day, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_monthly_series_skips_empty_months() {
        let series = monthly_series(&[
            (at(2026, 10, 1), 500),
            (at(2026, 1, 15), 100),
            (at(2026, 1, 31), 250),
        ]);

        assert_eq!(
            series,
            vec![
                MonthlyRevenue {
                    month: 1,
                    label: "Jan".to_string(),
                    total: 350
                },
                MonthlyRevenue {
                    month: 10,
                    label: "Oct".to_string(),
                    total: 500
                },
            ]
        );
    }

    #[test]
    fn test_month_with_zero_total_sales_still_appears() {
        let series = monthly_series(&[(at(2026, 3, 3), 0)]);
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].label, "Mar");
    }

    #[test]
    fn test_month_label() {
        assert_eq!(month_label(1), Some("Jan"));
        assert_eq!(month_label(12), Some("Dec"));
        assert_eq!(month_label(0), None);
        assert_eq!(month_label(13), None);
    }

    #[test]
    fn test_year_bounds() {
        let (start, end) = year_bounds(2026).unwrap();
        assert_eq!(start, Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2027, 1, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_default_options() {
        let options = DashboardOptions::default();
        assert_eq!(options.low_stock_threshold, 5);
        assert_eq!(options.recent_sales_limit, 8);
        assert_eq!(options.top_products_limit, 5);
        assert_eq!(options.with_low_stock_threshold(2).low_stock_threshold, 2);
    }
}
