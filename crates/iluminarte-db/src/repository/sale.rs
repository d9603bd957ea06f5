//! # Sale Repository
//!
//! The sale ledger: registers, edits and deletes sales while keeping
//! product stock in step.
//!
//! ## Transaction Shape
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    create_sale / edit_sale / delete_sale                │
//! │                                                                         │
//! │  BEGIN                                                                  │
//! │   1. write the sale row first       ← takes the SQLite write lock      │
//! │      (insert / touch updated_at)      before any stock is read         │
//! │   2. load StockView for the products involved                          │
//! │   3. restore quantities of existing lines (edit / delete)              │
//! │   4. plan_lines() in memory         ← sequential acceptance            │
//! │   5. for each planned line:                                            │
//! │        UPDATE products SET stock = stock - q                           │
//! │         WHERE id = ? AND stock >= q  ← 0 rows = InsufficientStock       │
//! │        INSERT sale_lines (unit_price frozen, subtotal derived)         │
//! │   6. UPDATE sales SET total = Σ subtotal                               │
//! │  COMMIT                                                                 │
//! │                                                                         │
//! │  Any error drops the transaction: nothing is committed.                │
//! │  SQLITE_BUSY after busy_timeout → whole operation retried.             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashMap;
use std::future::Future;

use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::LedgerConfig;
use crate::error::{DbError, DbResult};
use iluminarte_core::ledger::{plan_lines, LinePlan, StockView};
use iluminarte_core::{
    CoreError, Entity, LineRequest, ProductSnapshot, Sale, SaleDetail, SaleLine, SaleLineDetail,
    UserIdentity,
};

/// Display name of `u`: trimmed full name, or the username when blank.
pub(crate) const SELLER_EXPR: &str = "CASE \
    WHEN trim(trim(u.first_name) || ' ' || trim(u.last_name)) = '' THEN u.username \
    ELSE trim(trim(u.first_name) || ' ' || trim(u.last_name)) END";

const SALE_COLUMNS: &str = "s.id, s.user_id, s.total, s.created_at, s.updated_at";

const LINE_DETAIL_SELECT: &str = r#"
    SELECT
        l.id, l.sale_id, l.product_id, l.quantity, l.unit_price, l.subtotal, l.position,
        p.code AS product_code,
        p.name AS product_name
    FROM sale_lines l
    INNER JOIN products p ON p.id = l.product_id
"#;

/// A sale joined with its owner's display name.
#[derive(Debug, sqlx::FromRow)]
struct SaleRow {
    #[sqlx(flatten)]
    sale: Sale,
    seller: String,
}

/// Repository for sale database operations.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
    config: LedgerConfig,
}

impl SaleRepository {
    /// Creates a new SaleRepository with the default retry policy.
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository {
            pool,
            config: LedgerConfig::default(),
        }
    }

    /// Replaces the retry policy.
    pub fn with_config(mut self, config: LedgerConfig) -> Self {
        self.config = config;
        self
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Registers a sale owned by `user`.
    ///
    /// Requests are accepted in order against running stock; see
    /// [`plan_lines`] for the skip and abort rules.
    ///
    /// ## Returns
    /// * `Ok(Sale)` - Committed sale with its total
    /// * `Err(Domain(InsufficientStock))` - A line exceeded stock; nothing written
    /// * `Err(Domain(EmptySale))` - No line was accepted; nothing written
    /// * `Err(Domain(NotFound))` - `user` is unknown or inactive
    pub async fn create_sale(
        &self,
        user: &UserIdentity,
        requests: &[LineRequest],
    ) -> DbResult<Sale> {
        let sale = self
            .with_retry("create_sale", || self.try_create_sale(user, requests))
            .await?;

        info!(sale_id = %sale.id, total = sale.total, "Sale registered");
        Ok(sale)
    }

    /// Replaces every line of a sale.
    ///
    /// Existing quantities are returned to stock, then `requests` are
    /// accepted against the restored stock. All or nothing: on any error
    /// the sale, its lines and every stock level are left as they were.
    /// `created_at` never changes.
    pub async fn edit_sale(&self, sale_id: &str, requests: &[LineRequest]) -> DbResult<Sale> {
        let sale = self
            .with_retry("edit_sale", || self.try_edit_sale(sale_id, requests))
            .await?;

        info!(sale_id = %sale.id, total = sale.total, "Sale edited");
        Ok(sale)
    }

    /// Deletes a sale and returns its quantities to stock.
    pub async fn delete_sale(&self, sale_id: &str) -> DbResult<()> {
        self.with_retry("delete_sale", || self.try_delete_sale(sale_id))
            .await?;

        info!(sale_id = %sale_id, "Sale deleted");
        Ok(())
    }

    async fn try_create_sale(
        &self,
        user: &UserIdentity,
        requests: &[LineRequest],
    ) -> DbResult<Sale> {
        let sale_id = Uuid::new_v4().to_string();
        let now = Utc::now();

        debug!(sale_id = %sale_id, user_id = %user.id, lines = requests.len(), "Creating sale");

        let mut tx = self.pool.begin().await?;

        // Write first; the owner must be an active account.
        let inserted = sqlx::query(
            r#"
            INSERT INTO sales (id, user_id, total, created_at, updated_at)
            SELECT ?1, id, 0, ?3, ?3 FROM users WHERE id = ?2 AND is_active = 1
            "#,
        )
        .bind(&sale_id)
        .bind(&user.id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        if inserted.rows_affected() == 0 {
            return Err(DbError::not_found(Entity::User, &user.id));
        }

        let mut stock = load_stock_view(&mut tx, requested_ids(requests)).await?;
        let plan = plan_lines(&mut stock, requests)?;

        write_lines(&mut tx, &sale_id, &plan, now).await?;
        let sale = write_total(&mut tx, &sale_id, &plan, now).await?;

        tx.commit().await?;
        Ok(sale)
    }

    async fn try_edit_sale(&self, sale_id: &str, requests: &[LineRequest]) -> DbResult<Sale> {
        let now = Utc::now();

        debug!(sale_id = %sale_id, lines = requests.len(), "Editing sale");

        let mut tx = self.pool.begin().await?;

        touch_sale(&mut tx, sale_id, now).await?;

        let old_lines = fetch_lines(&mut tx, sale_id).await?;

        let mut ids = requested_ids(requests);
        ids.extend(old_lines.iter().map(|l| l.product_id.as_str()));

        let mut stock = load_stock_view(&mut tx, ids).await?;
        for line in &old_lines {
            stock.restore(&line.product_id, line.quantity);
        }
        let plan = plan_lines(&mut stock, requests)?;

        restore_stock(&mut tx, &old_lines, now).await?;
        sqlx::query("DELETE FROM sale_lines WHERE sale_id = ?1")
            .bind(sale_id)
            .execute(&mut *tx)
            .await?;

        write_lines(&mut tx, sale_id, &plan, now).await?;
        let sale = write_total(&mut tx, sale_id, &plan, now).await?;

        tx.commit().await?;
        Ok(sale)
    }

    async fn try_delete_sale(&self, sale_id: &str) -> DbResult<()> {
        let now = Utc::now();

        debug!(sale_id = %sale_id, "Deleting sale");

        let mut tx = self.pool.begin().await?;

        touch_sale(&mut tx, sale_id, now).await?;

        let old_lines = fetch_lines(&mut tx, sale_id).await?;
        restore_stock(&mut tx, &old_lines, now).await?;

        // Lines go with the sale (ON DELETE CASCADE).
        sqlx::query("DELETE FROM sales WHERE id = ?1")
            .bind(sale_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Runs `op` until it succeeds, fails for a non-busy reason, or
    /// `max_attempts` is reached.
    async fn with_retry<T, F, Fut>(&self, operation: &'static str, mut op: F) -> DbResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = DbResult<T>>,
    {
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 1;
        let mut delay = self.config.retry_backoff;

        loop {
            match op().await {
                Err(err) if err.is_busy() && attempt < max_attempts => {
                    warn!(
                        operation,
                        attempt,
                        max_attempts,
                        error = %err,
                        "Database busy, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Lists every sale, most recent first, with owner and lines.
    ///
    /// Three queries in total, regardless of the number of sales.
    pub async fn list_sales(&self) -> DbResult<Vec<SaleDetail>> {
        let sql = format!(
            "SELECT {}, {} AS seller FROM sales s \
             INNER JOIN users u ON u.id = s.user_id \
             ORDER BY s.created_at DESC, s.rowid DESC",
            SALE_COLUMNS, SELLER_EXPR
        );
        let rows = sqlx::query_as::<_, SaleRow>(&sql)
            .fetch_all(&self.pool)
            .await?;

        let line_sql = format!("{} ORDER BY l.sale_id, l.position", LINE_DETAIL_SELECT);
        let lines = sqlx::query_as::<_, SaleLineDetail>(&line_sql)
            .fetch_all(&self.pool)
            .await?;

        let mut by_sale: HashMap<String, Vec<SaleLineDetail>> = HashMap::new();
        for line in lines {
            by_sale
                .entry(line.line.sale_id.clone())
                .or_default()
                .push(line);
        }

        let sales: Vec<SaleDetail> = rows
            .into_iter()
            .map(|row| SaleDetail {
                lines: by_sale.remove(&row.sale.id).unwrap_or_default(),
                seller: row.seller,
                sale: row.sale,
            })
            .collect();

        debug!(count = sales.len(), "Listed sales");
        Ok(sales)
    }

    /// Gets one sale with owner and lines.
    pub async fn get_sale(&self, sale_id: &str) -> DbResult<SaleDetail> {
        let sql = format!(
            "SELECT {}, {} AS seller FROM sales s \
             INNER JOIN users u ON u.id = s.user_id \
             WHERE s.id = ?1",
            SALE_COLUMNS, SELLER_EXPR
        );
        let row = sqlx::query_as::<_, SaleRow>(&sql)
            .bind(sale_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found(Entity::Sale, sale_id))?;

        let line_sql = format!("{} WHERE l.sale_id = ?1 ORDER BY l.position", LINE_DETAIL_SELECT);
        let lines = sqlx::query_as::<_, SaleLineDetail>(&line_sql)
            .bind(sale_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(SaleDetail {
            sale: row.sale,
            seller: row.seller,
            lines,
        })
    }

    /// Recomputes Σ subtotal from the stored lines and compares it with the
    /// cached total. Also false if any line's subtotal drifted.
    pub async fn verify_total(&self, sale_id: &str) -> DbResult<bool> {
        let row: Option<(i64, i64, i64)> = sqlx::query_as(
            r#"
            SELECT
                s.total,
                COALESCE(SUM(l.subtotal), 0),
                COALESCE(SUM(CASE WHEN l.subtotal != l.quantity * l.unit_price THEN 1 ELSE 0 END), 0)
            FROM sales s
            LEFT JOIN sale_lines l ON l.sale_id = s.id
            WHERE s.id = ?1
            GROUP BY s.id
            "#,
        )
        .bind(sale_id)
        .fetch_optional(&self.pool)
        .await?;

        let (total, lines_total, drifted) =
            row.ok_or_else(|| DbError::not_found(Entity::Sale, sale_id))?;

        Ok(total == lines_total && drifted == 0)
    }

    /// Counts recorded sales.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sales")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

// =============================================================================
// Transaction Steps
// =============================================================================

fn requested_ids(requests: &[LineRequest]) -> Vec<&str> {
    requests
        .iter()
        .filter(|r| !r.is_blank())
        .map(|r| r.product_id.as_str())
        .collect()
}

/// Refreshes `updated_at`; this is the write that takes the lock.
async fn touch_sale(conn: &mut SqliteConnection, sale_id: &str, now: DateTime<Utc>) -> DbResult<()> {
    let result = sqlx::query("UPDATE sales SET updated_at = ?2 WHERE id = ?1")
        .bind(sale_id)
        .bind(now)
        .execute(&mut *conn)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found(Entity::Sale, sale_id));
    }

    Ok(())
}

async fn fetch_lines(conn: &mut SqliteConnection, sale_id: &str) -> DbResult<Vec<SaleLine>> {
    let lines = sqlx::query_as::<_, SaleLine>(
        r#"
        SELECT id, sale_id, product_id, quantity, unit_price, subtotal, position
        FROM sale_lines
        WHERE sale_id = ?1
        ORDER BY position
        "#,
    )
    .bind(sale_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(lines)
}

/// Snapshots of the given products, one query.
async fn load_stock_view(conn: &mut SqliteConnection, mut ids: Vec<&str>) -> DbResult<StockView> {
    ids.sort_unstable();
    ids.dedup();

    if ids.is_empty() {
        return Ok(StockView::default());
    }

    let mut builder: QueryBuilder<Sqlite> =
        QueryBuilder::new("SELECT id, code, name, sale_price, stock FROM products WHERE id IN (");
    let mut separated = builder.separated(", ");
    for id in &ids {
        separated.push_bind(*id);
    }
    separated.push_unseparated(")");

    let snapshots = builder
        .build_query_as::<ProductSnapshot>()
        .fetch_all(&mut *conn)
        .await?;

    Ok(StockView::new(snapshots))
}

async fn restore_stock(
    conn: &mut SqliteConnection,
    lines: &[SaleLine],
    now: DateTime<Utc>,
) -> DbResult<()> {
    for line in lines {
        sqlx::query("UPDATE products SET stock = stock + ?2, updated_at = ?3 WHERE id = ?1")
            .bind(&line.product_id)
            .bind(line.quantity)
            .bind(now)
            .execute(&mut *conn)
            .await?;
    }

    Ok(())
}

/// Decrements stock and inserts each planned line, in plan order.
async fn write_lines(
    conn: &mut SqliteConnection,
    sale_id: &str,
    plan: &LinePlan,
    now: DateTime<Utc>,
) -> DbResult<()> {
    for (position, planned) in plan.lines().iter().enumerate() {
        let decremented = sqlx::query(
            r#"
            UPDATE products SET stock = stock - ?2, updated_at = ?3
            WHERE id = ?1 AND stock >= ?2
            "#,
        )
        .bind(&planned.product_id)
        .bind(planned.quantity)
        .bind(now)
        .execute(&mut *conn)
        .await?;

        if decremented.rows_affected() == 0 {
            return Err(stock_conflict(conn, &planned.product_id, planned.quantity).await);
        }

        let line = SaleLine::new(
            Uuid::new_v4().to_string(),
            sale_id,
            planned.product_id.as_str(),
            planned.quantity,
            planned.unit_price,
            position as i64,
        )?;

        sqlx::query(
            r#"
            INSERT INTO sale_lines (
                id, sale_id, product_id, quantity, unit_price, subtotal, position
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&line.id)
        .bind(&line.sale_id)
        .bind(&line.product_id)
        .bind(line.quantity)
        .bind(line.unit_price)
        .bind(line.subtotal().amount())
        .bind(line.position)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

/// Error for a guarded decrement that matched no row.
async fn stock_conflict(conn: &mut SqliteConnection, product_id: &str, requested: i64) -> DbError {
    let current = sqlx::query_as::<_, ProductSnapshot>(
        "SELECT id, code, name, sale_price, stock FROM products WHERE id = ?1",
    )
    .bind(product_id)
    .fetch_optional(&mut *conn)
    .await;

    match current {
        Ok(Some(product)) => {
            warn!(product_id = %product_id, available = product.stock, requested, "Stock changed under the ledger");
            DbError::Domain(CoreError::InsufficientStock {
                product_id: product.id,
                code: product.code,
                name: product.name,
                available: product.stock,
                requested,
            })
        }
        Ok(None) => DbError::not_found(Entity::Product, product_id),
        Err(err) => err.into(),
    }
}

async fn write_total(
    conn: &mut SqliteConnection,
    sale_id: &str,
    plan: &LinePlan,
    now: DateTime<Utc>,
) -> DbResult<Sale> {
    let sale = sqlx::query_as::<_, Sale>(
        r#"
        UPDATE sales SET total = ?2, updated_at = ?3
        WHERE id = ?1
        RETURNING id, user_id, total, created_at, updated_at
        "#,
    )
    .bind(sale_id)
    .bind(plan.total().amount())
    .bind(now)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| DbError::not_found(Entity::Sale, sale_id))?;

    Ok(sale)
}

// =============================================================================
// Unit Tests
// =============================================================================
