// src/repositories/sqlite/auctions.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Pool, Row, Sqlite};
use uuid::Uuid;

use agoradeals_common::models::{Auction, AuctionBid, AuctionStatus, TransferRecord};
use agoradeals_common::traits::repository_traits::{
    AuctionClose, AuctionQuery, AuctionRepository, NewBid,
};
use crate::utils::time::{from_epoch, to_epoch};
use crate::Error;

use super::coupons::move_coupon;
use super::{parse_uuid, ExpiryFilter};

pub struct SqliteAuctionRepository {
    pub pool: Pool<Sqlite>,
}

impl SqliteAuctionRepository {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    async fn bids(&self, auction_id: &str) -> Result<Vec<AuctionBid>, Error> {
        let rows = sqlx::query(
            r#"
            SELECT seq, bidder_address, amount, placed_at, tx_signature
            FROM auction_bids
            WHERE auction_id = ?
            ORDER BY seq ASC
            "#,
        )
            .bind(auction_id)
            .fetch_all(&self.pool)
            .await?;

        let mut out = Vec::with_capacity(rows.len());
        for r in rows {
            out.push(AuctionBid {
                sequence: r.try_get("seq")?,
                bidder_address: r.try_get("bidder_address")?,
                amount: r.try_get("amount")?,
                placed_at: from_epoch(r.try_get::<i64, _>("placed_at")?),
                tx_signature: r.try_get("tx_signature")?,
                is_winning: false,
            });
        }
        Ok(out)
    }

    async fn hydrate(&self, r: &SqliteRow) -> Result<Auction, Error> {
        let id: String = r.try_get("id")?;
        let auction_type: String = r.try_get("auction_type")?;
        let status: String = r.try_get("status")?;
        let mut auction = Auction {
            id: parse_uuid(&id)?,
            on_chain_address: r.try_get("on_chain_address")?,
            auction_id: r.try_get("auction_id")?,
            coupon_address: r.try_get("coupon_address")?,
            seller_address: r.try_get("seller_address")?,
            merchant_address: r.try_get("merchant_address")?,
            category: r.try_get("category")?,
            auction_type: auction_type.parse()?,
            starting_price: r.try_get("starting_price")?,
            reserve_price: r.try_get("reserve_price")?,
            min_bid_increment: r.try_get("min_bid_increment")?,
            auto_extend: r.try_get("auto_extend")?,
            start_time: from_epoch(r.try_get::<i64, _>("start_time")?),
            end_time: from_epoch(r.try_get::<i64, _>("end_time")?),
            current_bid: r.try_get("current_bid")?,
            highest_bidder: r.try_get("highest_bidder")?,
            total_bids: r.try_get("total_bids")?,
            bids: self.bids(&id).await?,
            status: status.parse()?,
            winner: r.try_get("winner")?,
            final_price: r.try_get("final_price")?,
            settled_at: r.try_get::<Option<i64>, _>("settled_at")?.map(from_epoch),
            creation_tx_signature: r.try_get("creation_tx_signature")?,
            settlement_tx_signature: r.try_get("settlement_tx_signature")?,
            created_at: from_epoch(r.try_get::<i64, _>("created_at")?),
            updated_at: from_epoch(r.try_get::<i64, _>("updated_at")?),
        };
        auction.mark_winning();
        Ok(auction)
    }
}

const AUCTION_COLUMNS: &str = r#"
    id, on_chain_address, auction_id, coupon_address, seller_address, merchant_address,
    category, auction_type, starting_price, reserve_price, min_bid_increment, auto_extend,
    start_time, end_time, current_bid, highest_bidder, total_bids, status, winner,
    final_price, settled_at, creation_tx_signature, settlement_tx_signature,
    created_at, updated_at
"#;

fn status_filter(status: Option<AuctionStatus>) -> (Option<&'static str>, ExpiryFilter) {
    match status {
        None => (None, ExpiryFilter::Any),
        Some(AuctionStatus::Active) => (Some("active"), ExpiryFilter::Live),
        Some(AuctionStatus::Ended) => (Some("active"), ExpiryFilter::Lapsed),
        Some(other) => (Some(other.as_str()), ExpiryFilter::Any),
    }
}

#[async_trait]
impl AuctionRepository for SqliteAuctionRepository {
    async fn create_auction(&self, a: &Auction) -> Result<bool, Error> {
        let mut tx = self.pool.begin().await?;

        let pinned = sqlx::query(
            r#"
            UPDATE coupons
            SET auction_address = ?, updated_at = ?
            WHERE on_chain_address = ?
              AND owner = ?
              AND is_redeemed = 0
              AND is_listed = 0
              AND auction_address IS NULL
            "#,
        )
            .bind(&a.on_chain_address)
            .bind(to_epoch(a.created_at))
            .bind(&a.coupon_address)
            .bind(&a.seller_address)
            .execute(&mut *tx)
            .await?;

        if pinned.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query(
            r#"
            INSERT INTO auctions (
                id, on_chain_address, auction_id, coupon_address, seller_address, merchant_address,
                category, auction_type, starting_price, reserve_price, min_bid_increment, auto_extend,
                start_time, end_time, current_bid, highest_bidder, total_bids, status, winner,
                final_price, settled_at, creation_tx_signature, settlement_tx_signature,
                created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
            .bind(a.id.to_string())
            .bind(&a.on_chain_address)
            .bind(a.auction_id)
            .bind(&a.coupon_address)
            .bind(&a.seller_address)
            .bind(&a.merchant_address)
            .bind(&a.category)
            .bind(a.auction_type.as_str())
            .bind(a.starting_price)
            .bind(a.reserve_price)
            .bind(a.min_bid_increment)
            .bind(a.auto_extend)
            .bind(to_epoch(a.start_time))
            .bind(to_epoch(a.end_time))
            .bind(a.current_bid)
            .bind(&a.highest_bidder)
            .bind(a.total_bids)
            .bind(a.status.as_str())
            .bind(&a.winner)
            .bind(a.final_price)
            .bind(a.settled_at.map(to_epoch))
            .bind(&a.creation_tx_signature)
            .bind(&a.settlement_tx_signature)
            .bind(to_epoch(a.created_at))
            .bind(to_epoch(a.updated_at))
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn get_auction(&self, key: &str) -> Result<Option<Auction>, Error> {
        let sql = format!(
            "SELECT {} FROM auctions WHERE id = ?1 OR on_chain_address = ?1",
            AUCTION_COLUMNS
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

    async fn list_auctions(&self, q: &AuctionQuery) -> Result<(Vec<Auction>, i64), Error> {
        let (stored, expiry) = status_filter(q.status);
        let filter = r#"
            WHERE (?1 IS NULL OR status = ?1)
              AND (?2 IS NULL OR auction_type = ?2)
              AND (?3 IS NULL OR category = ?3)
              AND (?4 IS NULL OR seller_address = ?4)
              AND (?5 = 0
                   OR (?5 = 1 AND end_time >= ?6)
                   OR (?5 = 2 AND end_time < ?6))
        "#;
        let auction_type = q.auction_type.map(|t| t.as_str());

        let total: i64 = sqlx::query(&format!("SELECT COUNT(*) AS n FROM auctions {}", filter))
            .bind(stored)
            .bind(auction_type)
            .bind(q.category.as_deref())
            .bind(q.seller_address.as_deref())
            .bind(expiry as i64)
            .bind(to_epoch(q.now))
            .fetch_one(&self.pool)
            .await?
            .try_get("n")?;

        let sql = format!(
            "SELECT {} FROM auctions {} ORDER BY end_time ASC, rowid DESC LIMIT ?7 OFFSET ?8",
            AUCTION_COLUMNS, filter
        );
        let rows = sqlx::query(&sql)
            .bind(stored)
            .bind(auction_type)
            .bind(q.category.as_deref())
            .bind(q.seller_address.as_deref())
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

    async fn append_bid(
        &self,
        auction_id: Uuid,
        seen_bids: i64,
        bid: &NewBid,
    ) -> Result<Option<AuctionBid>, Error> {
        let id = auction_id.to_string();
        let at = to_epoch(bid.placed_at);
        let mut tx = self.pool.begin().await?;

        // SET expressions read the pre-update row.
        let updated = sqlx::query(
            r#"
            UPDATE auctions
            SET total_bids = total_bids + 1,
                highest_bidder = CASE WHEN ?1 > current_bid THEN ?2 ELSE highest_bidder END,
                current_bid = CASE WHEN ?1 > current_bid THEN ?1 ELSE current_bid END,
                end_time = COALESCE(?3, end_time),
                updated_at = ?4
            WHERE id = ?5
              AND status = 'active'
              AND total_bids = ?6
            "#,
        )
            .bind(bid.amount)
            .bind(&bid.bidder_address)
            .bind(bid.extended_end.map(to_epoch))
            .bind(at)
            .bind(&id)
            .bind(seen_bids)
            .execute(&mut *tx)
            .await?;

        if updated.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        let inserted = sqlx::query(
            r#"
            INSERT INTO auction_bids (auction_id, bidder_address, amount, placed_at, tx_signature)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
            .bind(&id)
            .bind(&bid.bidder_address)
            .bind(bid.amount)
            .bind(at)
            .bind(&bid.tx_signature)
            .execute(&mut *tx)
            .await?;

        let lead = sqlx::query("SELECT highest_bidder, current_bid FROM auctions WHERE id = ?")
            .bind(&id)
            .fetch_one(&mut *tx)
            .await?;
        let leader: Option<String> = lead.try_get("highest_bidder")?;
        let leading_amount: i64 = lead.try_get("current_bid")?;

        tx.commit().await?;

        Ok(Some(AuctionBid {
            sequence: inserted.last_insert_rowid(),
            bidder_address: bid.bidder_address.clone(),
            amount: bid.amount,
            placed_at: from_epoch(at),
            tx_signature: bid.tx_signature.clone(),
            is_winning: leader.as_deref() == Some(bid.bidder_address.as_str())
                && leading_amount == bid.amount,
        }))
    }

    async fn close_auction(&self, auction_id: Uuid, close: &AuctionClose) -> Result<bool, Error> {
        let id = auction_id.to_string();
        let at = to_epoch(close.closed_at);
        let status = if close.winner.is_some() {
            AuctionStatus::Settled
        } else {
            AuctionStatus::Cancelled
        };
        let mut tx = self.pool.begin().await?;

        let closed = sqlx::query(
            r#"
            UPDATE auctions
            SET status = ?,
                winner = ?,
                final_price = ?,
                settled_at = ?,
                settlement_tx_signature = ?,
                updated_at = ?
            WHERE id = ? AND status = 'active'
            "#,
        )
            .bind(status.as_str())
            .bind(&close.winner)
            .bind(close.final_price)
            .bind(at)
            .bind(&close.tx_signature)
            .bind(at)
            .bind(&id)
            .execute(&mut *tx)
            .await?;

        if closed.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        let row = sqlx::query(
            r#"
            SELECT a.on_chain_address, a.seller_address, c.id AS coupon_id
            FROM auctions a
            JOIN coupons c ON c.on_chain_address = a.coupon_address
            WHERE a.id = ?
            "#,
        )
            .bind(&id)
            .fetch_one(&mut *tx)
            .await?;
        let auction_address: String = row.try_get("on_chain_address")?;
        let seller: String = row.try_get("seller_address")?;
        let coupon_id: String = row.try_get("coupon_id")?;

        match &close.winner {
            Some(winner) => {
                let record = TransferRecord {
                    from: seller,
                    to: winner.clone(),
                    timestamp: close.closed_at,
                    transaction_signature: close.tx_signature.clone(),
                };
                if !move_coupon(&mut *tx, &coupon_id, &record, Some(&auction_address)).await? {
                    tx.rollback().await?;
                    return Err(Error::Conflict(
                        "Auctioned coupon is no longer held by the seller".into(),
                    ));
                }
            }
            None => {
                release_coupon(&mut tx, &coupon_id, &auction_address, at).await?;
            }
        }

        tx.commit().await?;
        Ok(true)
    }

    async fn cancel_auction(&self, auction_id: Uuid, signature: &str, at: DateTime<Utc>) -> Result<bool, Error> {
        let id = auction_id.to_string();
        let at = to_epoch(at);
        let mut tx = self.pool.begin().await?;

        let cancelled = sqlx::query(
            r#"
            UPDATE auctions
            SET status = 'cancelled',
                settled_at = ?,
                settlement_tx_signature = ?,
                updated_at = ?
            WHERE id = ? AND status = 'active' AND total_bids = 0
            "#,
        )
            .bind(at)
            .bind(signature)
            .bind(at)
            .bind(&id)
            .execute(&mut *tx)
            .await?;

        if cancelled.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        let row = sqlx::query(
            r#"
            SELECT a.on_chain_address, c.id AS coupon_id
            FROM auctions a
            JOIN coupons c ON c.on_chain_address = a.coupon_address
            WHERE a.id = ?
            "#,
        )
            .bind(&id)
            .fetch_one(&mut *tx)
            .await?;
        let auction_address: String = row.try_get("on_chain_address")?;
        let coupon_id: String = row.try_get("coupon_id")?;
        release_coupon(&mut tx, &coupon_id, &auction_address, at).await?;

        tx.commit().await?;
        Ok(true)
    }
}

async fn release_coupon(
    tx: &mut sqlx::Transaction<'_, Sqlite>,
    coupon_id: &str,
    auction_address: &str,
    at: i64,
) -> Result<(), Error> {
    sqlx::query(
        r#"
        UPDATE coupons
        SET auction_address = NULL, updated_at = ?
        WHERE id = ? AND auction_address = ?
        "#,
    )
        .bind(at)
        .bind(coupon_id)
        .bind(auction_address)
        .execute(&mut **tx)
        .await?;
    Ok(())
}
