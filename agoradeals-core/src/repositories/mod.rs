// src/repositories/mod.rs

pub mod sqlite;

pub use sqlite::{
    SqliteAuctionRepository,
    SqliteCouponRepository,
    SqliteGroupDealRepository,
    SqliteMerchantRepository,
    SqlitePromotionRepository,
    SqliteRedemptionTicketRepository,
};
