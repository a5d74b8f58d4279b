// src/repositories/sqlite/coupons.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::{Pool, Row, Sqlite};
use uuid::Uuid;

use agoradeals_common::models::{Coupon, TransferRecord};
use agoradeals_common::traits::repository_traits::{CouponQuery, CouponRepository};
use crate::utils::time::{from_epoch, to_epoch};
use crate::Error;

use super::parse_uuid;

pub struct SqliteCouponRepository {
    pub pool: Pool<Sqlite>,
}

impl SqliteCouponRepository {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    async fn transfer_history(&self, coupon_id: &str) -> Result<Vec<TransferRecord>, Error> {
        let rows = sqlx::query(
            r#"
            SELECT from_address, to_address, transferred_at, transaction_signature
            FROM coupon_transfers
            WHERE coupon_id = ?
            ORDER BY seq ASC
            "#,
        )
            .bind(coupon_id)
            .fetch_all(&self.pool)
            .await?;

        let mut out = Vec::with_capacity(rows.len());
        for r in rows {
            out.push(TransferRecord {
                from: r.try_get("from_address")?,
                to: r.try_get("to_address")?,
                timestamp: from_epoch(r.try_get::<i64, _>("transferred_at")?),
                transaction_signature: r.try_get("transaction_signature")?,
            });
        }
        Ok(out)
    }

    async fn hydrate(&self, r: &SqliteRow) -> Result<Coupon, Error> {
        let id: String = r.try_get("id")?;
        let history = self.transfer_history(&id).await?;
        Ok(Coupon {
            id: parse_uuid(&id)?,
            on_chain_address: r.try_get("on_chain_address")?,
            coupon_id: r.try_get("coupon_id")?,
            nft_mint: r.try_get("nft_mint")?,
            promotion: r.try_get("promotion")?,
            owner: r.try_get("owner")?,
            merchant: r.try_get("merchant")?,
            discount_percentage: r.try_get("discount_percentage")?,
            expires_at: from_epoch(r.try_get::<i64, _>("expires_at")?),
            is_redeemed: r.try_get("is_redeemed")?,
            redeemed_at: r.try_get::<Option<i64>, _>("redeemed_at")?.map(from_epoch),
            redemption_code: r.try_get("redemption_code")?,
            is_listed: r.try_get("is_listed")?,
            listing_price: r.try_get("listing_price")?,
            auction: r.try_get("auction_address")?,
            transfer_history: history,
            created_at: from_epoch(r.try_get::<i64, _>("created_at")?),
            updated_at: from_epoch(r.try_get::<i64, _>("updated_at")?),
        })
    }
}

const COUPON_COLUMNS: &str = r#"
    id, on_chain_address, coupon_id, nft_mint, promotion, owner, merchant,
    discount_percentage, expires_at, is_redeemed, redeemed_at, redemption_code,
    is_listed, listing_price, auction_address, created_at, updated_at
"#;

/// Ownership move shared by transfers, sales and auction settlement.
///
/// Applies only to an un-redeemed coupon owned by `record.from` and pinned to
/// exactly `auction` (`None` meaning no auction). Clears any listing or
/// auction pin, appends the history record and cancels the coupon's active
/// redemption tickets with the transfer's signature.
pub(crate) async fn move_coupon(
    conn: &mut SqliteConnection,
    coupon_id: &str,
    record: &TransferRecord,
    auction: Option<&str>,
) -> Result<bool, Error> {
    let at = to_epoch(record.timestamp);
    let moved = sqlx::query(
        r#"
        UPDATE coupons
        SET owner = ?,
            is_listed = 0,
            listing_price = NULL,
            auction_address = NULL,
            updated_at = ?
        WHERE id = ?
          AND owner = ?
          AND is_redeemed = 0
          AND auction_address IS ?
        "#,
    )
        .bind(&record.to)
        .bind(at)
        .bind(coupon_id)
        .bind(&record.from)
        .bind(auction)
        .execute(&mut *conn)
        .await?;

    if moved.rows_affected() == 0 {
        return Ok(false);
    }

    sqlx::query(
        r#"
        INSERT INTO coupon_transfers (coupon_id, from_address, to_address, transferred_at, transaction_signature)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
        .bind(coupon_id)
        .bind(&record.from)
        .bind(&record.to)
        .bind(at)
        .bind(&record.transaction_signature)
        .execute(&mut *conn)
        .await?;

    // Tickets were issued to the previous owner.
    sqlx::query(
        r#"
        UPDATE redemption_tickets
        SET status = 'cancelled',
            cancellation_tx_signature = ?,
            updated_at = ?
        WHERE status = 'active'
          AND coupon_address = (SELECT on_chain_address FROM coupons WHERE id = ?)
        "#,
    )
        .bind(&record.transaction_signature)
        .bind(at)
        .bind(coupon_id)
        .execute(&mut *conn)
        .await?;

    Ok(true)
}

#[async_trait]
impl CouponRepository for SqliteCouponRepository {
    async fn insert_minted_coupon(&self, c: &Coupon) -> Result<bool, Error> {
        let mut tx = self.pool.begin().await?;

        let bumped = sqlx::query(
            r#"
            UPDATE promotions
            SET current_supply = current_supply + 1,
                total_minted = total_minted + 1,
                updated_at = ?
            WHERE on_chain_address = ?
              AND current_supply < max_supply
            "#,
        )
            .bind(to_epoch(c.created_at))
            .bind(&c.promotion)
            .execute(&mut *tx)
            .await?;

        if bumped.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query(
            r#"
            INSERT INTO coupons (
                id, on_chain_address, coupon_id, nft_mint, promotion, owner, merchant,
                discount_percentage, expires_at, is_redeemed, redeemed_at, redemption_code,
                is_listed, listing_price, auction_address, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
            .bind(c.id.to_string())
            .bind(&c.on_chain_address)
            .bind(c.coupon_id)
            .bind(&c.nft_mint)
            .bind(&c.promotion)
            .bind(&c.owner)
            .bind(&c.merchant)
            .bind(c.discount_percentage)
            .bind(to_epoch(c.expires_at))
            .bind(c.is_redeemed)
            .bind(c.redeemed_at.map(to_epoch))
            .bind(&c.redemption_code)
            .bind(c.is_listed)
            .bind(c.listing_price)
            .bind(&c.auction)
            .bind(to_epoch(c.created_at))
            .bind(to_epoch(c.updated_at))
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            UPDATE merchants
            SET total_coupons_created = total_coupons_created + 1,
                updated_at = ?
            WHERE wallet_address = ?
            "#,
        )
            .bind(to_epoch(c.created_at))
            .bind(&c.merchant)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn get_coupon(&self, key: &str) -> Result<Option<Coupon>, Error> {
        let sql = format!(
            "SELECT {} FROM coupons WHERE id = ?1 OR on_chain_address = ?1",
            COUPON_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(r) => Ok(Some(self.hydrate(&r).await?)),
            None => Ok(None),
        }
    }

    async fn list_coupons(&self, q: &CouponQuery) -> Result<(Vec<Coupon>, i64), Error> {
        let filter = r#"
            WHERE (?1 IS NULL OR owner = ?1)
              AND (?2 IS NULL OR promotion = ?2)
              AND (?3 = 0 OR is_listed = 1)
        "#;

        let total: i64 = sqlx::query(&format!("SELECT COUNT(*) AS n FROM coupons {}", filter))
            .bind(q.owner.as_deref())
            .bind(q.promotion.as_deref())
            .bind(q.listed_only)
            .fetch_one(&self.pool)
            .await?
            .try_get("n")?;

        let sql = format!(
            "SELECT {} FROM coupons {} ORDER BY created_at DESC, rowid DESC LIMIT ?4 OFFSET ?5",
            COUPON_COLUMNS, filter
        );
        let rows = sqlx::query(&sql)
            .bind(q.owner.as_deref())
            .bind(q.promotion.as_deref())
            .bind(q.listed_only)
            .bind(q.limit)
            .bind(q.offset)
            .fetch_all(&self.pool)
            .await?;

        let mut items = Vec::with_capacity(rows.len());
        for r in &rows {
            items.push(self.hydrate(r).await?);
        }
        Ok((items, total))
    }

    async fn transfer_coupon(&self, coupon_id: Uuid, record: &TransferRecord) -> Result<bool, Error> {
        let mut tx = self.pool.begin().await?;
        if !move_coupon(&mut *tx, &coupon_id.to_string(), record, None).await? {
            tx.rollback().await?;
            return Ok(false);
        }
        tx.commit().await?;
        Ok(true)
    }

    async fn set_listing(&self, coupon_id: Uuid, price: Option<i64>, at: DateTime<Utc>) -> Result<bool, Error> {
        let result = match price {
            Some(p) => {
                sqlx::query(
                    r#"
                    UPDATE coupons
                    SET is_listed = 1, listing_price = ?, updated_at = ?
                    WHERE id = ? AND is_redeemed = 0 AND is_listed = 0 AND auction_address IS NULL
                    "#,
                )
                    .bind(p)
                    .bind(to_epoch(at))
                    .bind(coupon_id.to_string())
                    .execute(&self.pool)
                    .await?
            }
            None => {
                sqlx::query(
                    r#"
                    UPDATE coupons
                    SET is_listed = 0, listing_price = NULL, updated_at = ?
                    WHERE id = ? AND is_listed = 1
                    "#,
                )
                    .bind(to_epoch(at))
                    .bind(coupon_id.to_string())
                    .execute(&self.pool)
                    .await?
            }
        };
        Ok(result.rows_affected() == 1)
    }
}
