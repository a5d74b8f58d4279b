// src/repositories/sqlite/redemption_tickets.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Pool, Row, Sqlite};
use uuid::Uuid;

use agoradeals_common::models::{GeoStamp, RedemptionTicket, TicketStatus};
use agoradeals_common::traits::repository_traits::{RedemptionTicketRepository, TicketQuery};
use crate::utils::time::{from_epoch, to_epoch};
use crate::Error;

use super::{parse_json, parse_uuid, ExpiryFilter};

pub struct SqliteRedemptionTicketRepository {
    pub pool: Pool<Sqlite>,
}

impl SqliteRedemptionTicketRepository {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }
}

const TICKET_COLUMNS: &str = r#"
    id, on_chain_address, coupon_address, user_address, merchant_address,
    ticket_hash, nonce, expires_at, status, consumed_at,
    generation_location, redemption_location, qr_code_data, qr_data_url,
    verification_method, generation_tx_signature, redemption_tx_signature,
    cancellation_tx_signature, created_at, updated_at
"#;

fn location_to_db(loc: &Option<GeoStamp>) -> Result<Option<String>, Error> {
    Ok(match loc {
        Some(l) => Some(serde_json::to_string(l)?),
        None => None,
    })
}

fn location_from_db(raw: Option<String>) -> Result<Option<GeoStamp>, Error> {
    raw.as_deref().map(parse_json).transpose()
}

fn row_to_ticket(r: &SqliteRow) -> Result<RedemptionTicket, Error> {
    let status: String = r.try_get("status")?;
    let method: String = r.try_get("verification_method")?;
    Ok(RedemptionTicket {
        id: parse_uuid(&r.try_get::<String, _>("id")?)?,
        on_chain_address: r.try_get("on_chain_address")?,
        coupon_address: r.try_get("coupon_address")?,
        user_address: r.try_get("user_address")?,
        merchant_address: r.try_get("merchant_address")?,
        ticket_hash: r.try_get("ticket_hash")?,
        nonce: r.try_get("nonce")?,
        expires_at: from_epoch(r.try_get::<i64, _>("expires_at")?),
        status: status.parse()?,
        consumed_at: r.try_get::<Option<i64>, _>("consumed_at")?.map(from_epoch),
        generation_location: location_from_db(r.try_get("generation_location")?)?,
        redemption_location: location_from_db(r.try_get("redemption_location")?)?,
        qr_code_data: r.try_get("qr_code_data")?,
        qr_data_url: r.try_get("qr_data_url")?,
        verification_method: method.parse()?,
        generation_tx_signature: r.try_get("generation_tx_signature")?,
        redemption_tx_signature: r.try_get("redemption_tx_signature")?,
        cancellation_tx_signature: r.try_get("cancellation_tx_signature")?,
        created_at: from_epoch(r.try_get::<i64, _>("created_at")?),
        updated_at: from_epoch(r.try_get::<i64, _>("updated_at")?),
    })
}

/// Maps an effective status onto (stored status, expiry filter).
fn status_filter(status: Option<TicketStatus>) -> (Option<&'static str>, ExpiryFilter) {
    match status {
        None => (None, ExpiryFilter::Any),
        Some(TicketStatus::Active) => (Some("active"), ExpiryFilter::Live),
        Some(TicketStatus::Expired) => (Some("active"), ExpiryFilter::Lapsed),
        Some(other) => (Some(other.as_str()), ExpiryFilter::Any),
    }
}

#[async_trait]
impl RedemptionTicketRepository for SqliteRedemptionTicketRepository {
    async fn insert_ticket(&self, t: &RedemptionTicket) -> Result<(), Error> {
        sqlx::query(
            r#"
            INSERT INTO redemption_tickets (
                id, on_chain_address, coupon_address, user_address, merchant_address,
                ticket_hash, nonce, expires_at, status, consumed_at,
                generation_location, redemption_location, qr_code_data, qr_data_url,
                verification_method, generation_tx_signature, redemption_tx_signature,
                cancellation_tx_signature, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
            .bind(t.id.to_string())
            .bind(&t.on_chain_address)
            .bind(&t.coupon_address)
            .bind(&t.user_address)
            .bind(&t.merchant_address)
            .bind(&t.ticket_hash)
            .bind(t.nonce)
            .bind(to_epoch(t.expires_at))
            .bind(t.status.as_str())
            .bind(t.consumed_at.map(to_epoch))
            .bind(location_to_db(&t.generation_location)?)
            .bind(location_to_db(&t.redemption_location)?)
            .bind(&t.qr_code_data)
            .bind(&t.qr_data_url)
            .bind(t.verification_method.as_str())
            .bind(&t.generation_tx_signature)
            .bind(&t.redemption_tx_signature)
            .bind(&t.cancellation_tx_signature)
            .bind(to_epoch(t.created_at))
            .bind(to_epoch(t.updated_at))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get_ticket(&self, key: &str) -> Result<Option<RedemptionTicket>, Error> {
        let sql = format!(
            "SELECT {} FROM redemption_tickets WHERE id = ?1 OR on_chain_address = ?1",
            TICKET_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_ticket).transpose()
    }

    async fn find_live_ticket_for_coupon(
        &self,
        coupon_address: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<RedemptionTicket>, Error> {
        let sql = format!(
            r#"
            SELECT {} FROM redemption_tickets
            WHERE coupon_address = ?
              AND status = 'active'
              AND expires_at >= ?
            ORDER BY created_at DESC, rowid DESC
            LIMIT 1
            "#,
            TICKET_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(coupon_address)
            .bind(to_epoch(now))
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_ticket).transpose()
    }

    async fn list_tickets(&self, q: &TicketQuery) -> Result<Vec<RedemptionTicket>, Error> {
        let (stored, expiry) = status_filter(q.status);
        let sql = format!(
            r#"
            SELECT {} FROM redemption_tickets
            WHERE (?1 IS NULL OR user_address = ?1)
              AND (?2 IS NULL OR merchant_address = ?2)
              AND (?3 IS NULL OR status = ?3)
              AND (?4 = 0
                   OR (?4 = 1 AND expires_at >= ?5)
                   OR (?4 = 2 AND expires_at < ?5))
            ORDER BY created_at DESC, rowid DESC
            LIMIT ?6
            "#,
            TICKET_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(q.user_address.as_deref())
            .bind(q.merchant_address.as_deref())
            .bind(stored)
            .bind(expiry as i64)
            .bind(to_epoch(q.now))
            .bind(q.limit)
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|r| row_to_ticket(r).map(|t| t.observed_at(q.now)))
            .collect()
    }

    async fn consume_ticket(
        &self,
        ticket_id: Uuid,
        consumed_at: DateTime<Utc>,
        location: Option<GeoStamp>,
        signature: &str,
    ) -> Result<bool, Error> {
        let id = ticket_id.to_string();
        let at = to_epoch(consumed_at);
        let mut tx = self.pool.begin().await?;

        let consumed = sqlx::query(
            r#"
            UPDATE redemption_tickets
            SET status = 'consumed',
                consumed_at = ?,
                redemption_location = ?,
                redemption_tx_signature = ?,
                updated_at = ?
            WHERE id = ? AND status = 'active'
            "#,
        )
            .bind(at)
            .bind(location_to_db(&location)?)
            .bind(signature)
            .bind(at)
            .bind(&id)
            .execute(&mut *tx)
            .await?;

        if consumed.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        let row = sqlx::query(
            "SELECT coupon_address, on_chain_address, user_address FROM redemption_tickets WHERE id = ?",
        )
            .bind(&id)
            .fetch_one(&mut *tx)
            .await?;
        let coupon_address: String = row.try_get("coupon_address")?;
        let ticket_address: String = row.try_get("on_chain_address")?;
        let user_address: String = row.try_get("user_address")?;

        let redeemed = sqlx::query(
            r#"
            UPDATE coupons
            SET is_redeemed = 1,
                redeemed_at = ?,
                redemption_code = ?,
                is_listed = 0,
                listing_price = NULL,
                updated_at = ?
            WHERE on_chain_address = ?
              AND owner = ?
              AND is_redeemed = 0
              AND auction_address IS NULL
            "#,
        )
            .bind(at)
            .bind(&ticket_address)
            .bind(at)
            .bind(&coupon_address)
            .bind(&user_address)
            .execute(&mut *tx)
            .await?;

        if redeemed.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query(
            r#"
            UPDATE promotions
            SET total_redeemed = total_redeemed + 1,
                updated_at = ?
            WHERE on_chain_address = (SELECT promotion FROM coupons WHERE on_chain_address = ?)
            "#,
        )
            .bind(at)
            .bind(&coupon_address)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            UPDATE merchants
            SET total_coupons_redeemed = total_coupons_redeemed + 1,
                updated_at = ?
            WHERE wallet_address = (SELECT merchant FROM coupons WHERE on_chain_address = ?)
            "#,
        )
            .bind(at)
            .bind(&coupon_address)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn cancel_ticket(&self, ticket_id: Uuid, signature: &str, at: DateTime<Utc>) -> Result<bool, Error> {
        let result = sqlx::query(
            r#"
            UPDATE redemption_tickets
            SET status = 'cancelled',
                cancellation_tx_signature = ?,
                updated_at = ?
            WHERE id = ? AND status = 'active'
            "#,
        )
            .bind(signature)
            .bind(to_epoch(at))
            .bind(ticket_id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }
}
