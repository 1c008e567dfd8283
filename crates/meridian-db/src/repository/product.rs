//! # Product Repository
//!
//! Catalog reads plus the two stock movements this subsystem performs.
//!
//! ## Guarded Decrement
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  UPDATE products SET stock = stock - :q                                │
//! │  WHERE id = :id AND stock >= :q                                        │
//! │                                                                         │
//! │  rows_affected = 1  → reserved                                         │
//! │  rows_affected = 0  → someone else got there first (or product gone)   │
//! │                                                                         │
//! │  The caller sums rows_affected over all distinct products and aborts   │
//! │  the whole transaction if the sum falls short.                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use meridian_core::{Product, ProductId};

const PRODUCT_COLUMNS: &str = "id, sku, name, image_url, price, sale_price, stock, is_active, \
                               created_at, updated_at";

/// Repository for product database operations.
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    pub async fn get_by_id(&self, id: &ProductId) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {} FROM products WHERE id = ?1",
            PRODUCT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    /// Fetches several products at once. Missing ids are simply absent.
    pub async fn get_many(&self, ids: &[ProductId]) -> DbResult<Vec<Product>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut qb: QueryBuilder<'_, Sqlite> =
            QueryBuilder::new(format!("SELECT {} FROM products WHERE id IN (", PRODUCT_COLUMNS));
        let mut separated = qb.separated(", ");
        for id in ids {
            separated.push_bind(id.clone());
        }
        separated.push_unseparated(")");

        let products = qb.build_query_as::<Product>().fetch_all(&self.pool).await?;
        Ok(products)
    }

    /// Inserts a product (seeding and tests; the catalog service owns CRUD).
    pub async fn insert(&self, product: &Product) -> DbResult<()> {
        debug!(id = %product.id, sku = %product.sku, "Inserting product");

        sqlx::query(
            r#"
            INSERT INTO products (
                id, sku, name, image_url, price, sale_price, stock, is_active,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&product.id)
        .bind(&product.sku)
        .bind(&product.name)
        .bind(&product.image_url)
        .bind(product.price)
        .bind(product.sale_price)
        .bind(product.stock)
        .bind(product.is_active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Current stock level, if the product exists.
    pub async fn stock_of(&self, id: &ProductId) -> DbResult<Option<i64>> {
        let stock = sqlx::query_scalar::<_, i64>("SELECT stock FROM products WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(stock)
    }

    /// Overwrites stock (seeding and tests).
    pub async fn set_stock(&self, id: &ProductId, stock: i64) -> DbResult<()> {
        sqlx::query("UPDATE products SET stock = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(id)
            .bind(stock)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

// =============================================================================
// Transaction-scoped operations
// =============================================================================

/// Decrements stock only if enough remains. Returns rows affected (0 or 1).
pub async fn decrement_stock(
    conn: &mut SqliteConnection,
    id: &ProductId,
    quantity: i64,
) -> DbResult<u64> {
    let result = sqlx::query(
        r#"
        UPDATE products SET
            stock = stock - ?2,
            updated_at = ?3
        WHERE id = ?1 AND stock >= ?2
        "#,
    )
    .bind(id)
    .bind(quantity)
    .bind(Utc::now())
    .execute(conn)
    .await?;

    Ok(result.rows_affected())
}

/// Puts stock back (cancellation). Unconditional.
pub async fn restore_stock(
    conn: &mut SqliteConnection,
    id: &ProductId,
    quantity: i64,
) -> DbResult<()> {
    sqlx::query(
        r#"
        UPDATE products SET
            stock = stock + ?2,
            updated_at = ?3
        WHERE id = ?1
        "#,
    )
    .bind(id)
    .bind(quantity)
    .bind(Utc::now())
    .execute(conn)
    .await?;

    Ok(())
}
