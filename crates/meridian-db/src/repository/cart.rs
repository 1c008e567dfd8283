//! # Cart Repository
//!
//! The cart itself is managed by the storefront; order placement reads the
//! selected lines and removes them once the order commits.

use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::error::DbResult;
use meridian_core::{CartItem, ProductId, UserId};

#[derive(Debug, Clone)]
pub struct CartRepository {
    pool: SqlitePool,
}

impl CartRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CartRepository { pool }
    }

    /// Cart lines whose ids are in `item_ids` AND belong to `user_id`.
    ///
    /// Ids from someone else's cart are silently dropped, which is what makes
    /// the selection an intersection with the caller's own cart.
    pub async fn get_selected(
        &self,
        user_id: &UserId,
        item_ids: &[String],
    ) -> DbResult<Vec<CartItem>> {
        if item_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut qb: QueryBuilder<'_, Sqlite> = QueryBuilder::new(
            "SELECT id, user_id, product_id, quantity, added_at FROM cart_items WHERE user_id = ",
        );
        qb.push_bind(user_id.clone());
        qb.push(" AND id IN (");
        let mut separated = qb.separated(", ");
        for id in item_ids {
            separated.push_bind(id.clone());
        }
        separated.push_unseparated(") ORDER BY added_at");

        let items = qb.build_query_as::<CartItem>().fetch_all(&self.pool).await?;
        Ok(items)
    }

    pub async fn list_for_user(&self, user_id: &UserId) -> DbResult<Vec<CartItem>> {
        let items = sqlx::query_as::<_, CartItem>(
            r#"
            SELECT id, user_id, product_id, quantity, added_at
            FROM cart_items
            WHERE user_id = ?1
            ORDER BY added_at
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    /// Adds a product to the cart, merging with an existing line.
    pub async fn add(
        &self,
        user_id: &UserId,
        product_id: &ProductId,
        quantity: i64,
    ) -> DbResult<CartItem> {
        let item = sqlx::query_as::<_, CartItem>(
            r#"
            INSERT INTO cart_items (id, user_id, product_id, quantity, added_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT (user_id, product_id)
                DO UPDATE SET quantity = cart_items.quantity + excluded.quantity
            RETURNING id, user_id, product_id, quantity, added_at
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(user_id)
        .bind(product_id)
        .bind(quantity)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(item)
    }
}

/// Deletes the given lines from the caller's cart. Returns rows deleted.
pub async fn remove_items(
    conn: &mut SqliteConnection,
    user_id: &UserId,
    item_ids: &[String],
) -> DbResult<u64> {
    if item_ids.is_empty() {
        return Ok(0);
    }

    let mut qb: QueryBuilder<'_, Sqlite> =
        QueryBuilder::new("DELETE FROM cart_items WHERE user_id = ");
    qb.push_bind(user_id.clone());
    qb.push(" AND id IN (");
    let mut separated = qb.separated(", ");
    for id in item_ids {
        separated.push_bind(id.clone());
    }
    separated.push_unseparated(")");

    let result = qb.build().execute(conn).await?;
    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};
    use meridian_core::Product;

    async fn setup() -> Database {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let now = Utc::now();
        for id in ["p1", "p2"] {
            db.products()
                .insert(&Product {
                    id: ProductId::from(id),
                    sku: id.to_uppercase(),
                    name: id.to_string(),
                    image_url: None,
                    price: 10_000,
                    sale_price: None,
                    stock: 10,
                    is_active: true,
                    created_at: now,
                    updated_at: now,
                })
                .await
                .unwrap();
        }
        db
    }

    #[tokio::test]
    async fn test_selection_is_scoped_to_owner() {
        let db = setup().await;
        let alice = UserId::from("alice");
        let bob = UserId::from("bob");

        let a1 = db.carts().add(&alice, &ProductId::from("p1"), 1).await.unwrap();
        let b1 = db.carts().add(&bob, &ProductId::from("p2"), 1).await.unwrap();

        let selected = db
            .carts()
            .get_selected(&alice, &[a1.id.clone(), b1.id.clone()])
            .await
            .unwrap();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].id, a1.id);
    }

    #[tokio::test]
    async fn test_add_merges_and_remove_is_scoped() {
        let db = setup().await;
        let alice = UserId::from("alice");
        let bob = UserId::from("bob");

        let first = db.carts().add(&alice, &ProductId::from("p1"), 1).await.unwrap();
        let merged = db.carts().add(&alice, &ProductId::from("p1"), 2).await.unwrap();
        assert_eq!(first.id, merged.id);
        assert_eq!(merged.quantity, 3);

        let mut conn = db.pool().acquire().await.unwrap();
        assert_eq!(remove_items(&mut conn, &bob, &[first.id.clone()]).await.unwrap(), 0);
        assert_eq!(remove_items(&mut conn, &alice, &[first.id.clone()]).await.unwrap(), 1);
        drop(conn);

        assert!(db.carts().list_for_user(&alice).await.unwrap().is_empty());
    }
}
