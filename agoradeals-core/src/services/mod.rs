// File: src/services/mod.rs

pub mod promotion_service;
pub mod coupon_service;
pub mod redemption_ticket_service;
pub mod group_deal_service;
pub mod merchant_service;
pub mod auction_service;

pub use promotion_service::PromotionService;
pub use coupon_service::CouponService;
pub use redemption_ticket_service::RedemptionTicketService;
pub use group_deal_service::GroupDealService;
pub use merchant_service::MerchantService;
pub use auction_service::AuctionService;
