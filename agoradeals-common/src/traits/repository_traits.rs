use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Error;
use crate::models::{
    Auction, AuctionBid, AuctionStatus, AuctionType, Coupon, DealParticipant, DealStatus, GeoStamp,
    GroupDeal, Merchant, Promotion, RedemptionTicket, TicketStatus, TransferRecord,
};

/// Filter for promotion listings.
#[derive(Debug, Clone, Default)]
pub struct PromotionQuery {
    pub merchant: Option<String>,
    pub category: Option<String>,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Clone, Default)]
pub struct CouponQuery {
    pub owner: Option<String>,
    pub promotion: Option<String>,
    pub listed_only: bool,
    pub limit: i64,
    pub offset: i64,
}

/// Filter for ticket listings. `status` is matched against the effective
/// status at `now`, so `Active` excludes tickets that have run out.
#[derive(Debug, Clone)]
pub struct TicketQuery {
    pub user_address: Option<String>,
    pub merchant_address: Option<String>,
    pub status: Option<TicketStatus>,
    pub now: DateTime<Utc>,
    pub limit: i64,
}

#[derive(Debug, Clone)]
pub struct DealQuery {
    pub status: Option<DealStatus>,
    pub category: Option<String>,
    pub merchant_address: Option<String>,
    pub now: DateTime<Utc>,
    pub limit: i64,
    pub offset: i64,
}

/// A join about to be appended to a deal's log; the store assigns the sequence.
#[derive(Debug, Clone)]
pub struct NewParticipant {
    pub user_address: String,
    pub joined_at: DateTime<Utc>,
    pub quantity: i64,
    pub paid_amount: i64,
    pub tx_signature: String,
}

#[derive(Debug, Clone, Default)]
pub struct MerchantQuery {
    pub category: Option<String>,
    /// Case-insensitive match on name or description.
    pub search: Option<String>,
    pub limit: i64,
    pub offset: i64,
}

/// `status` is matched against the effective status at `now`, like tickets
/// and group deals.
#[derive(Debug, Clone)]
pub struct AuctionQuery {
    pub status: Option<AuctionStatus>,
    pub auction_type: Option<AuctionType>,
    pub category: Option<String>,
    pub seller_address: Option<String>,
    pub now: DateTime<Utc>,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Clone)]
pub struct NewBid {
    pub bidder_address: String,
    pub amount: i64,
    pub placed_at: DateTime<Utc>,
    pub tx_signature: String,
    /// Pushed-out end time when the bid triggers auto-extend.
    pub extended_end: Option<DateTime<Utc>>,
}

/// How an auction closes. With a winner the coupon moves to them and the
/// auction reads `settled`; without one it stays with the seller and the
/// auction reads `cancelled`.
#[derive(Debug, Clone)]
pub struct AuctionClose {
    pub winner: Option<String>,
    pub final_price: Option<i64>,
    pub closed_at: DateTime<Utc>,
    pub tx_signature: String,
}

#[async_trait]
pub trait MerchantRepository: Send + Sync {
    /// Returns `false` if the wallet is already registered.
    async fn create_merchant(&self, merchant: &Merchant) -> Result<bool, Error>;

    /// Looks up by local id, ledger address or wallet address.
    async fn get_merchant(&self, key: &str) -> Result<Option<Merchant>, Error>;

    async fn list_merchants(&self, query: &MerchantQuery) -> Result<(Vec<Merchant>, i64), Error>;
}

#[async_trait]
pub trait PromotionRepository: Send + Sync {
    async fn create_promotion(&self, promo: &Promotion) -> Result<(), Error>;

    /// Looks up by local id or ledger address.
    async fn get_promotion(&self, key: &str) -> Result<Option<Promotion>, Error>;

    /// Returns one page plus the total number of matches.
    async fn list_promotions(&self, query: &PromotionQuery) -> Result<(Vec<Promotion>, i64), Error>;
}

#[async_trait]
pub trait CouponRepository: Send + Sync {
    /// Inserts a freshly minted coupon and bumps its promotion's supply in one
    /// transaction. Returns `false` (and writes nothing) if the promotion is
    /// already at `max_supply`.
    async fn insert_minted_coupon(&self, coupon: &Coupon) -> Result<bool, Error>;

    async fn get_coupon(&self, key: &str) -> Result<Option<Coupon>, Error>;

    async fn list_coupons(&self, query: &CouponQuery) -> Result<(Vec<Coupon>, i64), Error>;

    /// Moves ownership from `record.from` to `record.to`, appends the record to
    /// the history, clears any listing and cancels the coupon's active
    /// redemption tickets, in one transaction. Only applies to an un-redeemed
    /// coupon still owned by `record.from` and not under auction.
    async fn transfer_coupon(&self, coupon_id: Uuid, record: &TransferRecord) -> Result<bool, Error>;

    /// `Some(price)` lists, `None` delists. Listing only applies to un-redeemed coupons.
    async fn set_listing(&self, coupon_id: Uuid, price: Option<i64>, at: DateTime<Utc>) -> Result<bool, Error>;
}

#[async_trait]
pub trait RedemptionTicketRepository: Send + Sync {
    async fn insert_ticket(&self, ticket: &RedemptionTicket) -> Result<(), Error>;

    async fn get_ticket(&self, key: &str) -> Result<Option<RedemptionTicket>, Error>;

    /// Newest stored-active ticket for the coupon that has not yet expired at `now`.
    async fn find_live_ticket_for_coupon(
        &self,
        coupon_address: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<RedemptionTicket>, Error>;

    async fn list_tickets(&self, query: &TicketQuery) -> Result<Vec<RedemptionTicket>, Error>;

    /// active → consumed, and marks the referenced coupon redeemed, in one
    /// transaction. Returns `false` (and writes nothing) if the ticket was no
    /// longer active, or the coupon is already redeemed, under auction or no
    /// longer owned by the ticket's user.
    async fn consume_ticket(
        &self,
        ticket_id: Uuid,
        consumed_at: DateTime<Utc>,
        location: Option<GeoStamp>,
        signature: &str,
    ) -> Result<bool, Error>;

    /// active → cancelled. Returns `false` if the ticket was no longer active.
    async fn cancel_ticket(&self, ticket_id: Uuid, signature: &str, at: DateTime<Utc>) -> Result<bool, Error>;
}

#[async_trait]
pub trait GroupDealRepository: Send + Sync {
    async fn create_group_deal(&self, deal: &GroupDeal) -> Result<(), Error>;

    /// Loads the deal with its full join log; counters are folded from the log.
    async fn get_group_deal(&self, key: &str) -> Result<Option<GroupDeal>, Error>;

    async fn list_group_deals(&self, query: &DealQuery) -> Result<(Vec<GroupDeal>, i64), Error>;

    /// Appends a join only if the deal is still open and the join fits under
    /// `max_participants`. Returns the stored entry, or `None` if rejected.
    async fn append_participant(
        &self,
        deal_id: Uuid,
        entry: &NewParticipant,
    ) -> Result<Option<DealParticipant>, Error>;

    /// active → successful. Never touches a deal in any other status.
    async fn mark_successful(&self, deal_id: Uuid, at: DateTime<Utc>) -> Result<bool, Error>;

    /// Closes the deal with its final status. Returns `false` if it was already closed.
    async fn finalize_group_deal(&self, deal_id: Uuid, status: DealStatus, at: DateTime<Utc>) -> Result<bool, Error>;
}

#[async_trait]
pub trait AuctionRepository: Send + Sync {
    /// Inserts the auction and pins its coupon in one transaction. Returns
    /// `false` (and writes nothing) unless the coupon is still owned by the
    /// seller, un-redeemed, unlisted and not already under auction.
    async fn create_auction(&self, auction: &Auction) -> Result<bool, Error>;

    /// Loads the auction with its full bid log.
    async fn get_auction(&self, key: &str) -> Result<Option<Auction>, Error>;

    async fn list_auctions(&self, query: &AuctionQuery) -> Result<(Vec<Auction>, i64), Error>;

    /// Appends a bid if the auction is still active and has seen exactly
    /// `seen_bids` bids; the lead moves only on a strictly higher amount.
    async fn append_bid(
        &self,
        auction_id: Uuid,
        seen_bids: i64,
        bid: &NewBid,
    ) -> Result<Option<AuctionBid>, Error>;

    /// Closes an active auction and releases its coupon, moving it to the
    /// winner if there is one. Returns `false` if it was already closed.
    async fn close_auction(&self, auction_id: Uuid, close: &AuctionClose) -> Result<bool, Error>;

    /// active → cancelled for an auction without bids.
    async fn cancel_auction(&self, auction_id: Uuid, signature: &str, at: DateTime<Utc>) -> Result<bool, Error>;
}
