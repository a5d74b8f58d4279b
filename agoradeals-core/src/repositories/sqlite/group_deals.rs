// src/repositories/sqlite/group_deals.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Pool, Row, Sqlite};
use uuid::Uuid;

use agoradeals_common::models::{DealParticipant, DealStatus, GroupDeal};
use agoradeals_common::traits::repository_traits::{DealQuery, GroupDealRepository, NewParticipant};
use crate::utils::time::{from_epoch, to_epoch};
use crate::Error;

use super::{parse_json, parse_uuid, ExpiryFilter};

pub struct SqliteGroupDealRepository {
    pub pool: Pool<Sqlite>,
}

impl SqliteGroupDealRepository {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    async fn participants(&self, deal_id: &str) -> Result<Vec<DealParticipant>, Error> {
        let rows = sqlx::query(
            r#"
            SELECT seq, user_address, joined_at, quantity, paid_amount, tx_signature
            FROM group_deal_participants
            WHERE deal_id = ?
            ORDER BY seq ASC
            "#,
        )
            .bind(deal_id)
            .fetch_all(&self.pool)
            .await?;

        let mut out = Vec::with_capacity(rows.len());
        for r in rows {
            out.push(DealParticipant {
                sequence: r.try_get("seq")?,
                user_address: r.try_get("user_address")?,
                joined_at: from_epoch(r.try_get::<i64, _>("joined_at")?),
                quantity: r.try_get("quantity")?,
                paid_amount: r.try_get("paid_amount")?,
                tx_signature: r.try_get("tx_signature")?,
            });
        }
        Ok(out)
    }

    /// Builds the deal from its row plus its join log, then folds the counters.
    async fn hydrate(&self, r: &SqliteRow) -> Result<GroupDeal, Error> {
        let id: String = r.try_get("id")?;
        let status: String = r.try_get("status")?;
        let mut deal = GroupDeal {
            id: parse_uuid(&id)?,
            on_chain_address: r.try_get("on_chain_address")?,
            promotion_address: r.try_get("promotion_address")?,
            merchant_address: r.try_get("merchant_address")?,
            title: r.try_get("title")?,
            description: r.try_get("description")?,
            category: r.try_get("category")?,
            tiers: parse_json(&r.try_get::<String, _>("tiers")?)?,
            target_participants: r.try_get("target_participants")?,
            max_participants: r.try_get("max_participants")?,
            participants: self.participants(&id).await?,
            current_participants: 0,
            total_revenue: 0,
            current_tier: 0,
            start_time: from_epoch(r.try_get::<i64, _>("start_time")?),
            end_time: from_epoch(r.try_get::<i64, _>("end_time")?),
            status: status.parse()?,
            is_active: r.try_get("is_active")?,
            is_successful: r.try_get("is_successful")?,
            image_url: r.try_get("image_url")?,
            terms_and_conditions: parse_json(&r.try_get::<String, _>("terms_and_conditions")?)?,
            created_at: from_epoch(r.try_get::<i64, _>("created_at")?),
            updated_at: from_epoch(r.try_get::<i64, _>("updated_at")?),
        };
        deal.refold();
        Ok(deal)
    }
}

const DEAL_COLUMNS: &str = r#"
    id, on_chain_address, promotion_address, merchant_address, title, description,
    category, tiers, target_participants, max_participants, start_time, end_time,
    status, is_active, is_successful, image_url, terms_and_conditions,
    created_at, updated_at
"#;

fn status_filter(status: Option<DealStatus>) -> (Option<&'static str>, ExpiryFilter) {
    match status {
        None => (None, ExpiryFilter::Any),
        Some(DealStatus::Active) => (Some("active"), ExpiryFilter::Live),
        Some(DealStatus::Expired) => (Some("active"), ExpiryFilter::Lapsed),
        Some(other) => (Some(other.as_str()), ExpiryFilter::Any),
    }
}

#[async_trait]
impl GroupDealRepository for SqliteGroupDealRepository {
    async fn create_group_deal(&self, d: &GroupDeal) -> Result<(), Error> {
        sqlx::query(
            r#"
            INSERT INTO group_deals (
                id, on_chain_address, promotion_address, merchant_address, title, description,
                category, tiers, target_participants, max_participants, start_time, end_time,
                status, is_active, is_successful, image_url, terms_and_conditions,
                created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
            .bind(d.id.to_string())
            .bind(&d.on_chain_address)
            .bind(&d.promotion_address)
            .bind(&d.merchant_address)
            .bind(&d.title)
            .bind(&d.description)
            .bind(&d.category)
            .bind(serde_json::to_string(&d.tiers)?)
            .bind(d.target_participants)
            .bind(d.max_participants)
            .bind(to_epoch(d.start_time))
            .bind(to_epoch(d.end_time))
            .bind(d.status.as_str())
            .bind(d.is_active)
            .bind(d.is_successful)
            .bind(&d.image_url)
            .bind(serde_json::to_string(&d.terms_and_conditions)?)
            .bind(to_epoch(d.created_at))
            .bind(to_epoch(d.updated_at))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get_group_deal(&self, key: &str) -> Result<Option<GroupDeal>, Error> {
        let sql = format!(
            "SELECT {} FROM group_deals WHERE id = ?1 OR on_chain_address = ?1",
            DEAL_COLUMNS
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

    async fn list_group_deals(&self, q: &DealQuery) -> Result<(Vec<GroupDeal>, i64), Error> {
        let (stored, expiry) = status_filter(q.status);
        let filter = r#"
            WHERE (?1 IS NULL OR status = ?1)
              AND (?2 IS NULL OR category = ?2)
              AND (?3 IS NULL OR merchant_address = ?3)
              AND (?4 = 0
                   OR (?4 = 1 AND NOT (is_active = 1 AND end_time < ?5))
                   OR (?4 = 2 AND is_active = 1 AND end_time < ?5))
        "#;

        let total: i64 = sqlx::query(&format!("SELECT COUNT(*) AS n FROM group_deals {}", filter))
            .bind(stored)
            .bind(q.category.as_deref())
            .bind(q.merchant_address.as_deref())
            .bind(expiry as i64)
            .bind(to_epoch(q.now))
            .fetch_one(&self.pool)
            .await?
            .try_get("n")?;

        let sql = format!(
            "SELECT {} FROM group_deals {} ORDER BY created_at DESC, rowid DESC LIMIT ?6 OFFSET ?7",
            DEAL_COLUMNS, filter
        );
        let rows = sqlx::query(&sql)
            .bind(stored)
            .bind(q.category.as_deref())
            .bind(q.merchant_address.as_deref())
            .bind(expiry as i64)
            .bind(to_epoch(q.now))
            .bind(q.limit)
            .bind(q.offset)
            .fetch_all(&self.pool)
            .await?;

        let mut items = Vec::with_capacity(rows.len());
        for r in &rows {
            items.push(self.hydrate(r).await?.observed_at(q.now));
        }
        Ok((items, total))
    }

    async fn append_participant(
        &self,
        deal_id: Uuid,
        entry: &NewParticipant,
    ) -> Result<Option<DealParticipant>, Error> {
        let id = deal_id.to_string();
        let mut tx = self.pool.begin().await?;

        // Capacity is re-checked against the log inside the insert itself.
        let inserted = sqlx::query(
            r#"
            INSERT INTO group_deal_participants (deal_id, user_address, joined_at, quantity, paid_amount, tx_signature)
            SELECT g.id, ?2, ?3, ?4, ?5, ?6
            FROM group_deals g
            WHERE g.id = ?1
              AND g.is_active = 1
              AND (SELECT COALESCE(SUM(p.quantity), 0)
                   FROM group_deal_participants p
                   WHERE p.deal_id = g.id) + ?4 <= g.max_participants
            "#,
        )
            .bind(&id)
            .bind(&entry.user_address)
            .bind(to_epoch(entry.joined_at))
            .bind(entry.quantity)
            .bind(entry.paid_amount)
            .bind(&entry.tx_signature)
            .execute(&mut *tx)
            .await?;

        if inserted.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        sqlx::query("UPDATE group_deals SET updated_at = ? WHERE id = ?")
            .bind(to_epoch(entry.joined_at))
            .bind(&id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(Some(DealParticipant {
            sequence: inserted.last_insert_rowid(),
            user_address: entry.user_address.clone(),
            joined_at: from_epoch(to_epoch(entry.joined_at)),
            quantity: entry.quantity,
            paid_amount: entry.paid_amount,
            tx_signature: entry.tx_signature.clone(),
        }))
    }

    async fn mark_successful(&self, deal_id: Uuid, at: DateTime<Utc>) -> Result<bool, Error> {
        let result = sqlx::query(
            r#"
            UPDATE group_deals
            SET status = 'successful', is_successful = 1, updated_at = ?
            WHERE id = ? AND status = 'active'
            "#,
        )
            .bind(to_epoch(at))
            .bind(deal_id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn finalize_group_deal(&self, deal_id: Uuid, status: DealStatus, at: DateTime<Utc>) -> Result<bool, Error> {
        let result = sqlx::query(
            r#"
            UPDATE group_deals
            SET status = ?, is_active = 0, is_successful = ?, updated_at = ?
            WHERE id = ? AND is_active = 1
            "#,
        )
            .bind(status.as_str())
            .bind(status == DealStatus::Successful)
            .bind(to_epoch(at))
            .bind(deal_id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }
}
