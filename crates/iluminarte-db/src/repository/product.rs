//! # Product Repository
//!
//! The catalog: create, update, delete and list products.
//!
//! ## Key Operations
//! - CRUD with field validation and unique codes
//! - Insertion-ordered listing (SQLite `rowid`)
//! - In-stock listing for the sale form
//!
//! Stock is only changed here by an explicit update. Sales change it
//! through the ledger in [`crate::repository::sale`].

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use iluminarte_core::validation::{validate_new_product, validate_product_update};
use iluminarte_core::{CoreError, Entity, NewProduct, Product, ProductUpdate};

pub(crate) const PRODUCT_COLUMNS: &str =
    "id, code, name, sale_price, cost, stock, image, created_at, updated_at";

/// Repository for product database operations.
///
/// ## Usage
/// ```rust,ignore
/// let repo = ProductRepository::new(pool);
///
/// let lamp = repo.create(&new_product).await?;
/// let all = repo.list().await?;
/// ```
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Adds a product to the catalog.
    ///
    /// ## Returns
    /// * `Ok(Product)` - The stored product
    /// * `Err(Domain(Validation))` - A field failed validation
    /// * `Err(Domain(DuplicateCode))` - Code already exists
    pub async fn create(&self, new: &NewProduct) -> DbResult<Product> {
        validate_new_product(new)?;

        let code = new.code.trim();
        debug!(code = %code, "Creating product");

        if self.get_by_code(code).await?.is_some() {
            return Err(CoreError::DuplicateCode {
                code: code.to_string(),
            }
            .into());
        }

        let now = Utc::now();
        let product = Product {
            id: generate_product_id(),
            code: code.to_string(),
            name: new.name.trim().to_string(),
            sale_price: new.sale_price,
            cost: new.cost,
            stock: new.stock,
            image: new.image.clone(),
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO products (
                id, code, name, sale_price, cost, stock, image, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&product.id)
        .bind(&product.code)
        .bind(&product.name)
        .bind(product.sale_price)
        .bind(product.cost)
        .bind(product.stock)
        .bind(&product.image)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| duplicate_code(e, code))?;

        Ok(product)
    }

    /// Replaces the editable fields of a product.
    ///
    /// `update.image == None` keeps the stored image.
    ///
    /// ## Returns
    /// * `Err(Domain(NotFound))` - Product doesn't exist
    /// * `Err(Domain(DuplicateCode))` - Code belongs to another product
    pub async fn update(&self, id: &str, update: &ProductUpdate) -> DbResult<Product> {
        validate_product_update(update)?;

        let code = update.code.trim();
        debug!(id = %id, code = %code, "Updating product");

        if self.get_by_id(id).await?.is_none() {
            return Err(DbError::not_found(Entity::Product, id));
        }

        if let Some(other) = self.get_by_code(code).await? {
            if other.id != id {
                return Err(CoreError::DuplicateCode {
                    code: code.to_string(),
                }
                .into());
            }
        }

        let result = sqlx::query(
            r#"
            UPDATE products SET
                code = ?2,
                name = ?3,
                sale_price = ?4,
                cost = ?5,
                stock = ?6,
                image = COALESCE(?7, image),
                updated_at = ?8
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(code)
        .bind(update.name.trim())
        .bind(update.sale_price)
        .bind(update.cost)
        .bind(update.stock)
        .bind(&update.image)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| duplicate_code(e, code))?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found(Entity::Product, id));
        }

        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found(Entity::Product, id))
    }

    /// Removes a product from the catalog.
    ///
    /// Products referenced by recorded sale lines are kept; deleting them
    /// would change the totals of past sales.
    ///
    /// ## Returns
    /// * `Err(Domain(NotFound))` - Product doesn't exist
    /// * `Err(Domain(ProductInUse))` - Sale lines still reference it
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        debug!(id = %id, "Deleting product");

        let lines: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sale_lines WHERE product_id = ?1")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;

        if lines > 0 {
            return Err(CoreError::ProductInUse {
                product_id: id.to_string(),
                lines,
            }
            .into());
        }

        let result = sqlx::query("DELETE FROM products WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| match DbError::from(e) {
                // A line was written between the count and the delete.
                DbError::ForeignKeyViolation { .. } => DbError::Domain(CoreError::ProductInUse {
                    product_id: id.to_string(),
                    lines: 1,
                }),
                other => other,
            })?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found(Entity::Product, id));
        }

        Ok(())
    }

    /// Lists every product in insertion order.
    pub async fn list(&self) -> DbResult<Vec<Product>> {
        let sql = format!("SELECT {} FROM products ORDER BY rowid", PRODUCT_COLUMNS);
        let products = sqlx::query_as::<_, Product>(&sql)
            .fetch_all(&self.pool)
            .await?;

        debug!(count = products.len(), "Listed products");
        Ok(products)
    }

    /// Products with stock left, in insertion order.
    ///
    /// ## Usage
    /// The choices offered when registering or editing a sale.
    pub async fn list_in_stock(&self) -> DbResult<Vec<Product>> {
        let sql = format!(
            "SELECT {} FROM products WHERE stock > 0 ORDER BY rowid",
            PRODUCT_COLUMNS
        );
        let products = sqlx::query_as::<_, Product>(&sql)
            .fetch_all(&self.pool)
            .await?;

        Ok(products)
    }

    /// Gets a product by its ID.
    ///
    /// ## Returns
    /// * `Ok(Some(Product))` - Product found
    /// * `Ok(None)` - Product not found
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let sql = format!("SELECT {} FROM products WHERE id = ?1", PRODUCT_COLUMNS);
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(product)
    }

    /// Gets a product by its code.
    pub async fn get_by_code(&self, code: &str) -> DbResult<Option<Product>> {
        let sql = format!("SELECT {} FROM products WHERE code = ?1", PRODUCT_COLUMNS);
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(code.trim())
            .fetch_optional(&self.pool)
            .await?;

        Ok(product)
    }

    /// Counts catalog entries.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

/// Helper to generate a new product ID.
pub fn generate_product_id() -> String {
    Uuid::new_v4().to_string()
}

/// Maps a UNIQUE violation on `products.code` to the domain error.
fn duplicate_code(err: sqlx::Error, code: &str) -> DbError {
    match DbError::from(err) {
        DbError::UniqueViolation { field, .. } if field.contains("products.code") => {
            DbError::Domain(CoreError::DuplicateCode {
                code: code.to_string(),
            })
        }
        other => other,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
