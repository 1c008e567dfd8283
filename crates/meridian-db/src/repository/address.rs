//! # Address Repository
//!
//! Read access to saved delivery addresses. Snapshotted into orders.

use sqlx::SqlitePool;
use uuid::Uuid;

use crate::error::DbResult;
use meridian_core::{Address, UserId};

#[derive(Debug, Clone)]
pub struct AddressRepository {
    pool: SqlitePool,
}

impl AddressRepository {
    pub fn new(pool: SqlitePool) -> Self {
        AddressRepository { pool }
    }

    /// Address by id, only if it belongs to `user_id`.
    pub async fn get_owned(&self, user_id: &UserId, id: &str) -> DbResult<Option<Address>> {
        let address = sqlx::query_as::<_, Address>(
            r#"
            SELECT id, user_id, full_name, phone, street, ward, district, city
            FROM addresses
            WHERE id = ?1 AND user_id = ?2
            "#,
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(address)
    }

    /// Saves a new address and returns it with a generated id.
    pub async fn insert(&self, mut address: Address) -> DbResult<Address> {
        if address.id.is_empty() {
            address.id = Uuid::new_v4().to_string();
        }

        sqlx::query(
            r#"
            INSERT INTO addresses (id, user_id, full_name, phone, street, ward, district, city)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&address.id)
        .bind(&address.user_id)
        .bind(&address.full_name)
        .bind(&address.phone)
        .bind(&address.street)
        .bind(&address.ward)
        .bind(&address.district)
        .bind(&address.city)
        .execute(&self.pool)
        .await?;

        Ok(address)
    }
}
