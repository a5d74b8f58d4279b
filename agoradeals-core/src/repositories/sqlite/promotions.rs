// src/repositories/sqlite/promotions.rs

use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Pool, Row, Sqlite};

use agoradeals_common::models::{Promotion, PromotionStats};
use agoradeals_common::traits::repository_traits::{PromotionQuery, PromotionRepository};
use crate::utils::time::{from_epoch, to_epoch};
use crate::Error;

use super::parse_uuid;

pub struct SqlitePromotionRepository {
    pub pool: Pool<Sqlite>,
}

impl SqlitePromotionRepository {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }
}

const PROMOTION_COLUMNS: &str = r#"
    id, on_chain_address, merchant, title, description, category,
    discount_percentage, max_supply, current_supply, price, original_price,
    expires_at, is_active, image_url, total_minted, total_redeemed,
    created_at, updated_at
"#;

fn row_to_promotion(r: &SqliteRow) -> Result<Promotion, Error> {
    Ok(Promotion {
        id: parse_uuid(&r.try_get::<String, _>("id")?)?,
        on_chain_address: r.try_get("on_chain_address")?,
        merchant: r.try_get("merchant")?,
        title: r.try_get("title")?,
        description: r.try_get("description")?,
        category: r.try_get("category")?,
        discount_percentage: r.try_get("discount_percentage")?,
        max_supply: r.try_get("max_supply")?,
        current_supply: r.try_get("current_supply")?,
        price: r.try_get("price")?,
        original_price: r.try_get("original_price")?,
        expires_at: from_epoch(r.try_get::<i64, _>("expires_at")?),
        is_active: r.try_get("is_active")?,
        image_url: r.try_get("image_url")?,
        stats: PromotionStats {
            total_minted: r.try_get("total_minted")?,
            total_redeemed: r.try_get("total_redeemed")?,
        },
        created_at: from_epoch(r.try_get::<i64, _>("created_at")?),
        updated_at: from_epoch(r.try_get::<i64, _>("updated_at")?),
    })
}

#[async_trait]
impl PromotionRepository for SqlitePromotionRepository {
    async fn create_promotion(&self, p: &Promotion) -> Result<(), Error> {
        sqlx::query(
            r#"
            INSERT INTO promotions (
                id, on_chain_address, merchant, title, description, category,
                discount_percentage, max_supply, current_supply, price, original_price,
                expires_at, is_active, image_url, total_minted, total_redeemed,
                created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
            .bind(p.id.to_string())
            .bind(&p.on_chain_address)
            .bind(&p.merchant)
            .bind(&p.title)
            .bind(&p.description)
            .bind(&p.category)
            .bind(p.discount_percentage)
            .bind(p.max_supply)
            .bind(p.current_supply)
            .bind(p.price)
            .bind(p.original_price)
            .bind(to_epoch(p.expires_at))
            .bind(p.is_active)
            .bind(&p.image_url)
            .bind(p.stats.total_minted)
            .bind(p.stats.total_redeemed)
            .bind(to_epoch(p.created_at))
            .bind(to_epoch(p.updated_at))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get_promotion(&self, key: &str) -> Result<Option<Promotion>, Error> {
        let sql = format!(
            "SELECT {} FROM promotions WHERE id = ?1 OR on_chain_address = ?1",
            PROMOTION_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_promotion).transpose()
    }

    async fn list_promotions(&self, q: &PromotionQuery) -> Result<(Vec<Promotion>, i64), Error> {
        let filter = r#"
            WHERE (?1 IS NULL OR merchant = ?1)
              AND (?2 IS NULL OR category = ?2)
        "#;

        let total: i64 = sqlx::query(&format!("SELECT COUNT(*) AS n FROM promotions {}", filter))
            .bind(q.merchant.as_deref())
            .bind(q.category.as_deref())
            .fetch_one(&self.pool)
            .await?
            .try_get("n")?;

        let sql = format!(
            "SELECT {} FROM promotions {} ORDER BY created_at DESC, rowid DESC LIMIT ?3 OFFSET ?4",
            PROMOTION_COLUMNS, filter
        );
        let rows = sqlx::query(&sql)
            .bind(q.merchant.as_deref())
            .bind(q.category.as_deref())
            .bind(q.limit)
            .bind(q.offset)
            .fetch_all(&self.pool)
            .await?;

        let items = rows.iter().map(row_to_promotion).collect::<Result<Vec<_>, _>>()?;
        Ok((items, total))
    }
}
