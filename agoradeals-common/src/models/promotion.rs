// File: agoradeals-common/src/models/promotion.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A merchant's discount campaign. Coupons are minted against it and
/// group deals are layered on top of it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Promotion {
    pub id: Uuid,
    pub on_chain_address: String,
    pub merchant: String,
    pub title: String,
    pub description: String,
    pub category: String,
    pub discount_percentage: i64,
    pub max_supply: i64,
    pub current_supply: i64,
    pub price: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_price: Option<i64>,
    pub expires_at: DateTime<Utc>,
    pub is_active: bool,
    pub image_url: String,
    pub stats: PromotionStats,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromotionStats {
    pub total_minted: i64,
    pub total_redeemed: i64,
}

impl Promotion {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    pub fn is_sold_out(&self) -> bool {
        self.current_supply >= self.max_supply
    }
}
