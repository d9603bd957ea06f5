//! # Report Repository
//!
//! Read-only dashboard queries. Nothing here runs inside a transaction;
//! each call sees committed data and recomputes every figure.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::repository::product::PRODUCT_COLUMNS;
use crate::repository::sale::SELLER_EXPR;
use iluminarte_core::reporting::{monthly_series, year_bounds, Dashboard, DashboardOptions, TopProduct};
use iluminarte_core::{CoreError, Product, SaleSummary, ValidationError};

/// Repository for dashboard queries.
#[derive(Debug, Clone)]
pub struct ReportRepository {
    pool: SqlitePool,
}

impl ReportRepository {
    /// Creates a new ReportRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ReportRepository { pool }
    }

    /// Computes the home page figures for `year`.
    ///
    /// Revenue, invoice count and the monthly series cover `year` only.
    /// The other panels cover all time.
    pub async fn dashboard(&self, year: i32, options: &DashboardOptions) -> DbResult<Dashboard> {
        debug!(year, "Computing dashboard");

        let year_sales = self.sales_in_year(year).await?;

        // Totals are non-negative, so no month can overflow once the year fits.
        let revenue_total = year_sales
            .iter()
            .try_fold(0i64, |acc, (_, total)| acc.checked_add(*total))
            .ok_or_else(|| overflow("revenue"))?;

        Ok(Dashboard {
            year,
            revenue_total,
            invoice_count: year_sales.len() as i64,
            monthly_revenue: monthly_series(&year_sales),
            inventory_value: self.inventory_value().await?,
            recent_sales: self.recent_sales(options.recent_sales_limit).await?,
            top_products: self.top_products(options.top_products_limit).await?,
            low_stock: self
                .low_stock(options.low_stock_threshold, options.low_stock_limit)
                .await?,
            newest_products: self.newest_products(options.newest_products_limit).await?,
        })
    }

    /// `(created_at, total)` of every sale created in `year`.
    async fn sales_in_year(&self, year: i32) -> DbResult<Vec<(DateTime<Utc>, i64)>> {
        let (start, end) = year_bounds(year).ok_or_else(|| {
            DbError::from(ValidationError::InvalidFormat {
                field: "year".to_string(),
                reason: format!("{} is out of range", year),
            })
        })?;

        let rows = sqlx::query_as::<_, (DateTime<Utc>, i64)>(
            "SELECT created_at, total FROM sales WHERE created_at >= ?1 AND created_at < ?2",
        )
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Σ stock × cost over the catalog.
    ///
    /// Summed here rather than in SQL: SQLite turns an overflowing
    /// integer product into a REAL, which would not decode.
    pub async fn inventory_value(&self) -> DbResult<i64> {
        let rows = sqlx::query_as::<_, (i64, i64)>("SELECT stock, cost FROM products")
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .try_fold(0i64, |acc, (stock, cost)| {
                stock.checked_mul(*cost).and_then(|value| acc.checked_add(value))
            })
            .ok_or_else(|| overflow("inventory value"))
    }

    /// Latest sales of any year with their owner's name.
    pub async fn recent_sales(&self, limit: usize) -> DbResult<Vec<SaleSummary>> {
        let sql = format!(
            "SELECT s.id, {} AS seller, s.total, s.created_at \
             FROM sales s INNER JOIN users u ON u.id = s.user_id \
             ORDER BY s.created_at DESC, s.rowid DESC LIMIT ?1",
            SELLER_EXPR
        );
        let sales = sqlx::query_as::<_, SaleSummary>(&sql)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;

        Ok(sales)
    }

    /// Products ranked by all-time revenue; ties by name.
    pub async fn top_products(&self, limit: usize) -> DbResult<Vec<TopProduct>> {
        let products = sqlx::query_as::<_, TopProduct>(
            r#"
            SELECT
                p.id AS product_id,
                p.code,
                p.name,
                SUM(l.quantity) AS quantity_sold,
                SUM(l.subtotal) AS revenue
            FROM sale_lines l
            INNER JOIN products p ON p.id = l.product_id
            GROUP BY p.id, p.code, p.name
            ORDER BY revenue DESC, p.name ASC
            LIMIT ?1
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    /// Products at or below `threshold`, lowest stock first, then by name.
    pub async fn low_stock(&self, threshold: i64, limit: usize) -> DbResult<Vec<Product>> {
        let sql = format!(
            "SELECT {} FROM products WHERE stock <= ?1 ORDER BY stock ASC, name ASC LIMIT ?2",
            PRODUCT_COLUMNS
        );
        let products = sqlx::query_as::<_, Product>(&sql)
            .bind(threshold)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;

        Ok(products)
    }

    /// Most recently created products.
    pub async fn newest_products(&self, limit: usize) -> DbResult<Vec<Product>> {
        let sql = format!(
            "SELECT {} FROM products ORDER BY rowid DESC LIMIT ?1",
            PRODUCT_COLUMNS
        );
        let products = sqlx::query_as::<_, Product>(&sql)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;

        Ok(products)
    }
}

fn overflow(context: &str) -> DbError {
    DbError::Domain(CoreError::AmountOverflow {
        context: context.to_string(),
    })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use chrono::{Datelike, TimeZone};
    use iluminarte_core::validation::{MAX_AMOUNT, MAX_STOCK};
    use iluminarte_core::{LineRequest, NewProduct, UserIdentity};
    use uuid::Uuid;

    async fn setup() -> (Database, UserIdentity) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let id = Uuid::new_v4().to_string();
        sqlx::query(
            "INSERT INTO users (id, username, first_name, password_hash, created_at) \
             VALUES (?1, 'caja1', 'Ana', 'x', ?2)",
        )
        .bind(&id)
        .bind(Utc::now())
        .execute(db.pool())
        .await
        .unwrap();

        let user = UserIdentity {
            id,
            display_name: "Ana".to_string(),
        };
        (db, user)
    }

    async fn product(db: &Database, code: &str, name: &str, price: i64, cost: i64, stock: i64) -> String {
        db.products()
            .create(&NewProduct {
                name: name.to_string(),
                code: code.to_string(),
                sale_price: price,
                cost,
                stock,
                image: None,
            })
            .await
            .unwrap()
            .id
    }

    async fn backdate(db: &Database, sale_id: &str, at: DateTime<Utc>) {
        sqlx::query("UPDATE sales SET created_at = ?2 WHERE id = ?1")
            .bind(sale_id)
            .bind(at)
            .execute(db.pool())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_empty_dashboard() {
        let (db, _) = setup().await;
        let dashboard = db
            .reports()
            .dashboard(2026, &DashboardOptions::default())
            .await
            .unwrap();

        assert_eq!(dashboard.revenue_total, 0);
        assert_eq!(dashboard.invoice_count, 0);
        assert!(dashboard.monthly_revenue.is_empty());
        assert!(dashboard.recent_sales.is_empty());
        assert!(dashboard.top_products.is_empty());
        assert_eq!(dashboard.inventory_value, 0);
    }

    #[tokio::test]
    async fn test_year_revenue_and_monthly_series() {
        let (db, user) = setup().await;
        let lamp = product(&db, "A1", "Lamp", 100, 60, 50).await;

        let jan = db.sales().create_sale(&user, &[LineRequest::new(&lamp, 1)]).await.unwrap();
        let oct = db.sales().create_sale(&user, &[LineRequest::new(&lamp, 3)]).await.unwrap();
        let old = db.sales().create_sale(&user, &[LineRequest::new(&lamp, 5)]).await.unwrap();

        backdate(&db, &jan.id, Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()).await;
        backdate(&db, &oct.id, Utc.with_ymd_and_hms(2025, 10, 31, 23, 59, 59).unwrap()).await;
        backdate(&db, &old.id, Utc.with_ymd_and_hms(2024, 12, 31, 23, 59, 59).unwrap()).await;

        let dashboard = db
            .reports()
            .dashboard(2025, &DashboardOptions::default())
            .await
            .unwrap();

        assert_eq!(dashboard.revenue_total, 400);
        assert_eq!(dashboard.invoice_count, 2);
        let months: Vec<(&str, i64)> = dashboard
            .monthly_revenue
            .iter()
            .map(|m| (m.label.as_str(), m.total))
            .collect();
        assert_eq!(months, vec![("Jan", 100), ("Oct", 300)]);

        // Recent sales cover every year.
        assert_eq!(dashboard.recent_sales.len(), 3);
        assert_eq!(dashboard.recent_sales[0].id, oct.id);
        assert_eq!(dashboard.recent_sales[0].seller, "Ana");
        assert_eq!(dashboard.recent_sales[2].created_at.year(), 2024);
    }

    #[tokio::test]
    async fn test_top_products_and_inventory() {
        let (db, user) = setup().await;
        let lamp = product(&db, "A1", "Lamp", 100, 60, 10).await;
        let shade = product(&db, "B2", "Shade", 200, 50, 10).await;
        let bulb = product(&db, "C3", "Bulb", 50, 10, 10).await;

        db.sales()
            .create_sale(
                &user,
                &[LineRequest::new(&lamp, 4), LineRequest::new(&shade, 2), LineRequest::new(&bulb, 1)],
            )
            .await
            .unwrap();

        let dashboard = db
            .reports()
            .dashboard(2026, &DashboardOptions::default())
            .await
            .unwrap();

        // Lamp and Shade tie at 400; Lamp sorts first by name.
        let ranking: Vec<(&str, i64, i64)> = dashboard
            .top_products
            .iter()
            .map(|p| (p.name.as_str(), p.quantity_sold, p.revenue))
            .collect();
        assert_eq!(
            ranking,
            vec![("Lamp", 4, 400), ("Shade", 2, 400), ("Bulb", 1, 50)]
        );

        assert_eq!(dashboard.inventory_value, 6 * 60 + 8 * 50 + 9 * 10);
    }

    #[tokio::test]
    async fn test_low_stock_and_newest_panels() {
        let (db, _) = setup().await;
        for (code, name, stock) in [
            ("A1", "Lamp", 0),
            ("B2", "Shade", 5),
            ("C3", "Bulb", 6),
            ("D4", "Cable", 2),
            ("E5", "Arm", 2),
            ("F6", "Base", 1),
            ("G7", "Hook", 3),
        ] {
            product(&db, code, name, 100, 10, stock).await;
        }

        let dashboard = db
            .reports()
            .dashboard(2026, &DashboardOptions::default())
            .await
            .unwrap();

        let low: Vec<&str> = dashboard.low_stock.iter().map(|p| p.code.as_str()).collect();
        assert_eq!(low, vec!["A1", "F6", "E5", "D4", "G7"]);

        let newest: Vec<&str> = dashboard.newest_products.iter().map(|p| p.code.as_str()).collect();
        assert_eq!(newest, vec!["G7", "F6", "E5", "D4", "C3"]);

        let strict = db
            .reports()
            .dashboard(2026, &DashboardOptions::default().with_low_stock_threshold(1))
            .await
            .unwrap();
        assert_eq!(strict.low_stock.len(), 2);
    }

    #[tokio::test]
    async fn test_inventory_value_at_catalog_ceiling() {
        let (db, _) = setup().await;

        // One product at the ceiling still fits.
        product(&db, "BIG-1", "Chandelier", 1, MAX_AMOUNT, 100_000_000).await;
        assert_eq!(
            db.reports().inventory_value().await.unwrap(),
            MAX_AMOUNT * 100_000_000
        );

        // Enough of them overflow the sum: a typed error, not a decode failure.
        for n in 2..=10 {
            product(&db, &format!("BIG-{}", n), "Chandelier", 1, MAX_AMOUNT, 100_000_000).await;
        }
        let err = db.reports().inventory_value().await.unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::AmountOverflow { .. })));

        let err = db
            .reports()
            .dashboard(2026, &DashboardOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::AmountOverflow { .. })));
    }

    #[tokio::test]
    async fn test_single_product_stock_times_cost_overflow() {
        let (db, _) = setup().await;
        product(&db, "BIG-1", "Chandelier", 1, MAX_AMOUNT, MAX_STOCK).await;

        let err = db.reports().inventory_value().await.unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::AmountOverflow { .. })));
    }
}
