//! Contract of the external ledger service.
//!
//! Every authoritative state change (minting, redemption, group-deal
//! settlement, ...) goes through this trait first; local persistence only
//! mirrors what the ledger has confirmed. Request types serialize to the JSON
//! bodies expected by a ledger gateway, receipts deserialize from its replies.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::models::{AuctionType, DealTier};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterMerchantRequest {
    pub authority: String,
    pub name: String,
    pub category: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePromotionRequest {
    pub merchant: String,
    pub title: String,
    pub category: String,
    pub discount_percentage: i64,
    pub max_supply: i64,
    pub price: i64,
    /// Unix seconds.
    pub expires_at: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MintCouponRequest {
    pub promotion: String,
    pub recipient: String,
    pub merchant: String,
    pub coupon_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferCouponRequest {
    pub coupon: String,
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListCouponRequest {
    pub coupon: String,
    pub seller: String,
    pub price: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelListingRequest {
    pub coupon: String,
    pub seller: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuyListingRequest {
    pub coupon: String,
    pub seller: String,
    pub buyer: String,
    pub price: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateTicketRequest {
    pub coupon: String,
    pub user: String,
    pub nonce: u64,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedeemTicketRequest {
    pub ticket: String,
    pub coupon: String,
    pub merchant: String,
    pub user: String,
    pub expected_hash: [u8; 32],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelTicketRequest {
    pub ticket: String,
    pub user: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGroupDealRequest {
    pub promotion: String,
    pub merchant: String,
    pub deal_id: i64,
    pub target_participants: i64,
    pub max_participants: i64,
    pub base_price: i64,
    pub tiers: Vec<DealTier>,
    pub duration_secs: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinGroupDealRequest {
    pub group_deal: String,
    pub user: String,
    pub quantity: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalizeGroupDealRequest {
    pub group_deal: String,
    pub merchant: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAuctionRequest {
    pub coupon: String,
    pub seller: String,
    pub auction_id: i64,
    pub auction_type: AuctionType,
    pub starting_price: i64,
    pub reserve_price: i64,
    pub min_bid_increment: i64,
    pub duration_secs: i64,
    pub auto_extend: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceBidRequest {
    pub auction: String,
    pub bidder: String,
    pub amount: i64,
}

/// `max_price` caps what the buyer pays; the ledger charges its own current
/// price and refuses if that is higher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuyDutchAuctionRequest {
    pub auction: String,
    pub buyer: String,
    pub max_price: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettleAuctionRequest {
    pub auction: String,
    pub caller: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelAuctionRequest {
    pub auction: String,
    pub seller: String,
}

/// Minimal confirmation of a state-changing ledger call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settlement {
    pub signature: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromotionReceipt {
    pub signature: String,
    pub promotion: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MintReceipt {
    pub signature: String,
    pub coupon: String,
    pub mint: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingReceipt {
    pub signature: String,
    pub listing: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketReceipt {
    pub signature: String,
    pub ticket: String,
    /// Lowercase hex of the 32-byte ticket hash.
    pub ticket_hash: String,
    /// Unix seconds.
    pub expires_at: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupDealReceipt {
    pub signature: String,
    pub group_deal: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MerchantReceipt {
    pub signature: String,
    pub merchant: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuctionReceipt {
    pub signature: String,
    pub auction: String,
    /// Unix seconds.
    pub end_time: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseReceipt {
    pub signature: String,
    pub price: i64,
}

/// Outcome of closing an auction; `winner` is `None` when the reserve was
/// not met or nobody bid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuctionSettlementReceipt {
    pub signature: String,
    pub winner: Option<String>,
    pub final_price: Option<i64>,
}

#[async_trait]
pub trait LedgerService: Send + Sync {
    /// Identifies the ledger backend; used by health checks.
    async fn version(&self) -> Result<String, Error>;

    async fn register_merchant(&self, req: &RegisterMerchantRequest) -> Result<MerchantReceipt, Error>;

    async fn create_promotion(&self, req: &CreatePromotionRequest) -> Result<PromotionReceipt, Error>;
    async fn mint_coupon(&self, req: &MintCouponRequest) -> Result<MintReceipt, Error>;
    async fn transfer_coupon(&self, req: &TransferCouponRequest) -> Result<Settlement, Error>;
    async fn list_coupon_for_sale(&self, req: &ListCouponRequest) -> Result<ListingReceipt, Error>;
    async fn cancel_listing(&self, req: &CancelListingRequest) -> Result<Settlement, Error>;
    async fn buy_listing(&self, req: &BuyListingRequest) -> Result<Settlement, Error>;

    async fn generate_redemption_ticket(&self, req: &GenerateTicketRequest) -> Result<TicketReceipt, Error>;
    async fn verify_and_redeem_ticket(&self, req: &RedeemTicketRequest) -> Result<Settlement, Error>;
    async fn cancel_redemption_ticket(&self, req: &CancelTicketRequest) -> Result<Settlement, Error>;

    async fn create_group_deal(&self, req: &CreateGroupDealRequest) -> Result<GroupDealReceipt, Error>;
    async fn join_group_deal(&self, req: &JoinGroupDealRequest) -> Result<Settlement, Error>;
    async fn finalize_group_deal(&self, req: &FinalizeGroupDealRequest) -> Result<Settlement, Error>;

    async fn create_auction(&self, req: &CreateAuctionRequest) -> Result<AuctionReceipt, Error>;
    async fn place_auction_bid(&self, req: &PlaceBidRequest) -> Result<Settlement, Error>;
    async fn buy_dutch_auction(&self, req: &BuyDutchAuctionRequest) -> Result<PurchaseReceipt, Error>;
    async fn settle_auction(&self, req: &SettleAuctionRequest) -> Result<AuctionSettlementReceipt, Error>;
    async fn cancel_auction(&self, req: &CancelAuctionRequest) -> Result<Settlement, Error>;
}
