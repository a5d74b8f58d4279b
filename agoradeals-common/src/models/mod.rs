// File: agoradeals-common/src/models/mod.rs
pub mod promotion;
pub mod coupon;
pub mod redemption_ticket;
pub mod group_deal;
pub mod merchant;
pub mod auction;

pub use promotion::{Promotion, PromotionStats};
pub use coupon::{Coupon, TransferRecord};
pub use redemption_ticket::{GeoStamp, RedemptionTicket, TicketStatus, VerificationMethod};
pub use group_deal::{DealParticipant, DealStatus, DealTier, GroupDeal};
pub use merchant::{Merchant, MerchantLocation};
pub use auction::{Auction, AuctionBid, AuctionStatus, AuctionType};
