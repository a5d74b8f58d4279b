// src/repositories/sqlite/merchants.rs

use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Pool, Row, Sqlite};

use agoradeals_common::models::{Merchant, MerchantLocation};
use agoradeals_common::traits::repository_traits::{MerchantQuery, MerchantRepository};
use crate::utils::time::{from_epoch, to_epoch};
use crate::Error;

use super::parse_uuid;

pub struct SqliteMerchantRepository {
    pub pool: Pool<Sqlite>,
}

impl SqliteMerchantRepository {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }
}

const MERCHANT_COLUMNS: &str = r#"
    id, wallet_address, on_chain_address, name, category, description,
    latitude, longitude, address, total_coupons_created, total_coupons_redeemed,
    is_active, registration_tx_signature, created_at, updated_at
"#;

fn row_to_merchant(r: &SqliteRow) -> Result<Merchant, Error> {
    let latitude: Option<f64> = r.try_get("latitude")?;
    let longitude: Option<f64> = r.try_get("longitude")?;
    let location = match (latitude, longitude) {
        (Some(latitude), Some(longitude)) => Some(MerchantLocation {
            latitude,
            longitude,
            address: r.try_get("address")?,
        }),
        _ => None,
    };
    Ok(Merchant {
        id: parse_uuid(&r.try_get::<String, _>("id")?)?,
        wallet_address: r.try_get("wallet_address")?,
        on_chain_address: r.try_get("on_chain_address")?,
        name: r.try_get("name")?,
        category: r.try_get("category")?,
        description: r.try_get("description")?,
        location,
        total_coupons_created: r.try_get("total_coupons_created")?,
        total_coupons_redeemed: r.try_get("total_coupons_redeemed")?,
        is_active: r.try_get("is_active")?,
        registration_tx_signature: r.try_get("registration_tx_signature")?,
        created_at: from_epoch(r.try_get::<i64, _>("created_at")?),
        updated_at: from_epoch(r.try_get::<i64, _>("updated_at")?),
    })
}

#[async_trait]
impl MerchantRepository for SqliteMerchantRepository {
    async fn create_merchant(&self, m: &Merchant) -> Result<bool, Error> {
        let location = m.location.as_ref();
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO merchants (
                id, wallet_address, on_chain_address, name, category, description,
                latitude, longitude, address, total_coupons_created, total_coupons_redeemed,
                is_active, registration_tx_signature, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
            .bind(m.id.to_string())
            .bind(&m.wallet_address)
            .bind(&m.on_chain_address)
            .bind(&m.name)
            .bind(&m.category)
            .bind(&m.description)
            .bind(location.map(|l| l.latitude))
            .bind(location.map(|l| l.longitude))
            .bind(location.and_then(|l| l.address.clone()))
            .bind(m.total_coupons_created)
            .bind(m.total_coupons_redeemed)
            .bind(m.is_active)
            .bind(&m.registration_tx_signature)
            .bind(to_epoch(m.created_at))
            .bind(to_epoch(m.updated_at))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn get_merchant(&self, key: &str) -> Result<Option<Merchant>, Error> {
        let sql = format!(
            "SELECT {} FROM merchants WHERE id = ?1 OR on_chain_address = ?1 OR wallet_address = ?1",
            MERCHANT_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_merchant).transpose()
    }

    async fn list_merchants(&self, q: &MerchantQuery) -> Result<(Vec<Merchant>, i64), Error> {
        let filter = r#"
            WHERE is_active = 1
              AND (?1 IS NULL OR category = ?1)
              AND (?2 IS NULL
                   OR name LIKE '%' || ?2 || '%'
                   OR description LIKE '%' || ?2 || '%')
        "#;
        let search = q.search.as_deref().map(str::trim).filter(|s| !s.is_empty());

        let total: i64 = sqlx::query(&format!("SELECT COUNT(*) AS n FROM merchants {}", filter))
            .bind(q.category.as_deref())
            .bind(search)
            .fetch_one(&self.pool)
            .await?
            .try_get("n")?;

        let sql = format!(
            "SELECT {} FROM merchants {} ORDER BY created_at DESC, rowid DESC LIMIT ?3 OFFSET ?4",
            MERCHANT_COLUMNS, filter
        );
        let rows = sqlx::query(&sql)
            .bind(q.category.as_deref())
            .bind(search)
            .bind(q.limit)
            .bind(q.offset)
            .fetch_all(&self.pool)
            .await?;

        let items = rows.iter().map(row_to_merchant).collect::<Result<Vec<_>, _>>()?;
        Ok((items, total))
    }
}
