// src/repositories/sqlite/mod.rs

pub mod promotions;
pub mod coupons;
pub mod redemption_tickets;
pub mod group_deals;
pub mod merchants;
pub mod auctions;

pub use promotions::SqlitePromotionRepository;
pub use coupons::SqliteCouponRepository;
pub use redemption_tickets::SqliteRedemptionTicketRepository;
pub use group_deals::SqliteGroupDealRepository;
pub use merchants::SqliteMerchantRepository;
pub use auctions::SqliteAuctionRepository;

use serde::de::DeserializeOwned;
use uuid::Uuid;
use crate::Error;

/// Ids are stored as hyphenated TEXT.
pub(crate) fn parse_uuid(raw: &str) -> Result<Uuid, Error> {
    Uuid::parse_str(raw).map_err(|e| Error::Database(sqlx::Error::Decode(Box::new(e))))
}

/// Decodes a JSON TEXT column.
pub(crate) fn parse_json<T: DeserializeOwned>(raw: &str) -> Result<T, Error> {
    serde_json::from_str(raw).map_err(|e| Error::Database(sqlx::Error::Decode(Box::new(e))))
}

/// How a list query narrows on expiry relative to `now`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ExpiryFilter {
    Any = 0,
    Live = 1,
    Lapsed = 2,
}
