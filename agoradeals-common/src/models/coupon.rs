// File: agoradeals-common/src/models/coupon.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Error;

/// A single minted coupon. `owner` moves on transfer/sale; the redemption
/// fields are written once and never cleared.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coupon {
    pub id: Uuid,
    pub on_chain_address: String,
    pub coupon_id: i64,
    pub nft_mint: String,
    pub promotion: String,
    pub owner: String,
    pub merchant: String,
    pub discount_percentage: i64,
    pub expires_at: DateTime<Utc>,
    pub is_redeemed: bool,
    pub redeemed_at: Option<DateTime<Utc>>,
    pub redemption_code: Option<String>,
    pub is_listed: bool,
    pub listing_price: Option<i64>,
    /// Address of the open auction holding this coupon, if any.
    pub auction: Option<String>,
    pub transfer_history: Vec<TransferRecord>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One entry of a coupon's append-only ownership log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRecord {
    pub from: String,
    pub to: String,
    pub timestamp: DateTime<Utc>,
    pub transaction_signature: String,
}

impl Coupon {
    pub fn ensure_owner(&self, wallet_address: &str) -> Result<(), Error> {
        if self.owner != wallet_address {
            return Err(Error::Forbidden("Not coupon owner".into()));
        }
        Ok(())
    }

    /// Redeemed coupons are frozen: no tickets, listings or transfers.
    pub fn ensure_not_redeemed(&self, message: &str) -> Result<(), Error> {
        if self.is_redeemed {
            return Err(Error::Conflict(message.to_string()));
        }
        Ok(())
    }

    /// A coupon under auction stays with its seller but cannot move, be
    /// listed or be redeemed until the auction closes.
    pub fn ensure_not_in_auction(&self) -> Result<(), Error> {
        if self.auction.is_some() {
            return Err(Error::Conflict("Coupon is up for auction".into()));
        }
        Ok(())
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}
