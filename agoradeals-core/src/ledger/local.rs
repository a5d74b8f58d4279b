use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use tokio::sync::Mutex;
use tracing::debug;

use agoradeals_common::models::auction::{validate_auction_terms, AUTO_EXTEND_SECS};
use agoradeals_common::models::{AuctionType, DealTier};
use agoradeals_common::traits::ledger_traits::*;
use crate::utils::time::Clock;
use crate::Error;

use super::{derive_address, ticket_hash};

pub const DEFAULT_TICKET_TTL_SECS: i64 = 300;
pub const MAX_DEAL_TIERS: usize = 5;

struct MerchantAccount {
    is_active: bool,
}

struct PromotionAccount {
    merchant: String,
    max_supply: i64,
    current_supply: i64,
    expires_at: i64,
    is_active: bool,
}

struct CouponAccount {
    owner: String,
    merchant: String,
    is_redeemed: bool,
    /// (seller, price)
    listing: Option<(String, i64)>,
    auction: Option<String>,
}

struct TicketAccount {
    coupon: String,
    user: String,
    merchant: String,
    hash: [u8; 32],
    expires_at: i64,
    consumed: bool,
    cancelled: bool,
}

struct GroupDealAccount {
    merchant: String,
    target_participants: i64,
    max_participants: i64,
    current_participants: i64,
    end_time: i64,
    is_active: bool,
    finalized: bool,
}

struct AuctionAccount {
    coupon: String,
    seller: String,
    auction_type: AuctionType,
    start_time: i64,
    end_time: i64,
    starting_price: i64,
    reserve_price: i64,
    min_bid_increment: i64,
    auto_extend: bool,
    current_bid: i64,
    highest_bidder: Option<String>,
    bid_count: i64,
    closed: bool,
}

impl AuctionAccount {
    fn dutch_price(&self, now: i64) -> i64 {
        if now <= self.start_time {
            return self.starting_price;
        }
        if now >= self.end_time {
            return self.reserve_price;
        }
        let elapsed = (now - self.start_time) as i128;
        let duration = (self.end_time - self.start_time).max(1) as i128;
        let drop = (self.starting_price - self.reserve_price) as i128;
        self.starting_price - (drop * elapsed / duration) as i64
    }
}

#[derive(Default)]
struct LedgerState {
    merchants: HashMap<String, MerchantAccount>,
    promotions: HashMap<String, PromotionAccount>,
    coupons: HashMap<String, CouponAccount>,
    tickets: HashMap<String, TicketAccount>,
    deals: HashMap<String, GroupDealAccount>,
    auctions: HashMap<String, AuctionAccount>,
    promotion_seq: u64,
}

impl LedgerState {
    /// Tickets issued before an ownership change are void.
    fn void_tickets(&mut self, coupon: &str) {
        for ticket in self.tickets.values_mut() {
            if ticket.coupon == coupon && !ticket.consumed {
                ticket.cancelled = true;
            }
        }
    }
}

/// In-process ledger. Every call is checked against the current account
/// state and applied atomically under a single lock.
pub struct LocalLedger {
    state: Mutex<LedgerState>,
    clock: Arc<dyn Clock>,
    ticket_ttl: Duration,
}

fn reject(msg: &str) -> Error {
    Error::Ledger(msg.to_string())
}

fn signature() -> String {
    let mut rng = rand::rng();
    let a: [u8; 32] = rng.random();
    let b: [u8; 32] = rng.random();
    format!("{}{}", hex::encode(a), hex::encode(b))
}

impl LocalLedger {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_ticket_ttl(clock, Duration::seconds(DEFAULT_TICKET_TTL_SECS))
    }

    pub fn with_ticket_ttl(clock: Arc<dyn Clock>, ticket_ttl: Duration) -> Self {
        Self {
            state: Mutex::new(LedgerState::default()),
            clock,
            ticket_ttl,
        }
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Whether the ticket account exists and has been consumed.
    pub async fn is_ticket_consumed(&self, ticket: &str) -> bool {
        let state = self.state.lock().await;
        state.tickets.get(ticket).map(|t| t.consumed).unwrap_or(false)
    }

    pub async fn is_ticket_cancelled(&self, ticket: &str) -> bool {
        let state = self.state.lock().await;
        state.tickets.get(ticket).map(|t| t.cancelled).unwrap_or(false)
    }

    pub async fn coupon_owner(&self, coupon: &str) -> Option<String> {
        let state = self.state.lock().await;
        state.coupons.get(coupon).map(|c| c.owner.clone())
    }

    pub async fn deal_participants(&self, group_deal: &str) -> Option<i64> {
        let state = self.state.lock().await;
        state.deals.get(group_deal).map(|d| d.current_participants)
    }
}

fn check_tiers(tiers: &[DealTier]) -> Result<(), Error> {
    if tiers.is_empty() || tiers.len() > MAX_DEAL_TIERS {
        return Err(reject("Invalid tier configuration"));
    }
    Ok(())
}

#[async_trait]
impl LedgerService for LocalLedger {
    async fn version(&self) -> Result<String, Error> {
        Ok(format!("local-ledger/{}", env!("CARGO_PKG_VERSION")))
    }

    async fn register_merchant(&self, req: &RegisterMerchantRequest) -> Result<MerchantReceipt, Error> {
        if req.name.chars().count() > 50 || req.category.chars().count() > 30 {
            return Err(reject("Invalid merchant profile"));
        }
        let mut state = self.state.lock().await;
        if state.merchants.contains_key(&req.authority) {
            return Err(reject("Merchant account already in use"));
        }
        state.merchants.insert(req.authority.clone(), MerchantAccount { is_active: true });
        let merchant = derive_address(&["merchant", &req.authority]);
        debug!("ledger: merchant {} registered for {}", merchant, req.authority);
        Ok(MerchantReceipt { signature: signature(), merchant })
    }

    async fn create_promotion(&self, req: &CreatePromotionRequest) -> Result<PromotionReceipt, Error> {
        if !(1..=100).contains(&req.discount_percentage) {
            return Err(reject("Invalid discount percentage"));
        }
        if req.max_supply < 1 {
            return Err(reject("Invalid max supply"));
        }
        let now = self.now().timestamp();
        if req.expires_at <= now {
            return Err(reject("Invalid expiry time"));
        }

        let mut state = self.state.lock().await;
        match state.merchants.get(&req.merchant) {
            Some(m) if m.is_active => {}
            Some(_) => return Err(reject("Merchant inactive")),
            None => return Err(reject("Merchant account not found")),
        }
        state.promotion_seq += 1;
        let address = derive_address(&[
            "promotion",
            &req.merchant,
            &state.promotion_seq.to_string(),
        ]);
        state.promotions.insert(
            address.clone(),
            PromotionAccount {
                merchant: req.merchant.clone(),
                max_supply: req.max_supply,
                current_supply: 0,
                expires_at: req.expires_at,
                is_active: true,
            },
        );
        debug!("ledger: promotion {} created by {}", address, req.merchant);
        Ok(PromotionReceipt { signature: signature(), promotion: address })
    }

    async fn mint_coupon(&self, req: &MintCouponRequest) -> Result<MintReceipt, Error> {
        let now = self.now().timestamp();
        let mut state = self.state.lock().await;
        let promo = state
            .promotions
            .get(&req.promotion)
            .ok_or_else(|| reject("Promotion account not found"))?;
        if promo.merchant != req.merchant {
            return Err(reject("Unauthorized merchant"));
        }
        if !promo.is_active {
            return Err(reject("Promotion inactive"));
        }
        if now > promo.expires_at {
            return Err(reject("Promotion expired"));
        }
        if promo.current_supply >= promo.max_supply {
            return Err(reject("Max supply reached"));
        }

        let coupon = derive_address(&["coupon", &req.promotion, &req.coupon_id.to_string()]);
        if state.coupons.contains_key(&coupon) {
            return Err(reject("Coupon account already in use"));
        }
        if let Some(promo) = state.promotions.get_mut(&req.promotion) {
            promo.current_supply += 1;
        }
        let mint = derive_address(&["mint", &coupon]);
        state.coupons.insert(
            coupon.clone(),
            CouponAccount {
                owner: req.recipient.clone(),
                merchant: req.merchant.clone(),
                is_redeemed: false,
                listing: None,
                auction: None,
            },
        );
        Ok(MintReceipt { signature: signature(), coupon, mint })
    }

    async fn transfer_coupon(&self, req: &TransferCouponRequest) -> Result<Settlement, Error> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        let coupon = state
            .coupons
            .get_mut(&req.coupon)
            .ok_or_else(|| reject("Coupon account not found"))?;
        if coupon.owner != req.from {
            return Err(reject("Not coupon owner"));
        }
        if coupon.is_redeemed {
            return Err(reject("Coupon already redeemed"));
        }
        if coupon.auction.is_some() {
            return Err(reject("Coupon in auction"));
        }
        if req.to == req.from {
            return Err(reject("Cannot transfer to self"));
        }
        coupon.owner = req.to.clone();
        coupon.listing = None;
        state.void_tickets(&req.coupon);
        Ok(Settlement { signature: signature() })
    }

    async fn list_coupon_for_sale(&self, req: &ListCouponRequest) -> Result<ListingReceipt, Error> {
        if req.price < 0 {
            return Err(reject("Invalid price"));
        }
        let mut state = self.state.lock().await;
        let coupon = state
            .coupons
            .get_mut(&req.coupon)
            .ok_or_else(|| reject("Coupon account not found"))?;
        if coupon.owner != req.seller {
            return Err(reject("Not coupon owner"));
        }
        if coupon.is_redeemed {
            return Err(reject("Coupon already redeemed"));
        }
        if coupon.listing.is_some() {
            return Err(reject("Coupon already listed"));
        }
        if coupon.auction.is_some() {
            return Err(reject("Coupon in auction"));
        }
        coupon.listing = Some((req.seller.clone(), req.price));
        let listing = derive_address(&["listing", &req.coupon]);
        Ok(ListingReceipt { signature: signature(), listing })
    }

    async fn cancel_listing(&self, req: &CancelListingRequest) -> Result<Settlement, Error> {
        let mut state = self.state.lock().await;
        let coupon = state
            .coupons
            .get_mut(&req.coupon)
            .ok_or_else(|| reject("Coupon account not found"))?;
        match &coupon.listing {
            Some((seller, _)) if *seller == req.seller => {
                coupon.listing = None;
                Ok(Settlement { signature: signature() })
            }
            Some(_) => Err(reject("Not listing seller")),
            None => Err(reject("Coupon not listed")),
        }
    }

    async fn buy_listing(&self, req: &BuyListingRequest) -> Result<Settlement, Error> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        let coupon = state
            .coupons
            .get_mut(&req.coupon)
            .ok_or_else(|| reject("Coupon account not found"))?;
        let (seller, price) = coupon
            .listing
            .clone()
            .ok_or_else(|| reject("Coupon not listed"))?;
        if coupon.is_redeemed {
            return Err(reject("Coupon already redeemed"));
        }
        if seller != req.seller || price != req.price {
            return Err(reject("Listing mismatch"));
        }
        if req.buyer == seller {
            return Err(reject("Cannot buy own listing"));
        }
        coupon.owner = req.buyer.clone();
        coupon.listing = None;
        state.void_tickets(&req.coupon);
        Ok(Settlement { signature: signature() })
    }

    async fn generate_redemption_ticket(&self, req: &GenerateTicketRequest) -> Result<TicketReceipt, Error> {
        let now = self.now();
        let mut state = self.state.lock().await;
        let coupon = state
            .coupons
            .get(&req.coupon)
            .ok_or_else(|| reject("Coupon account not found"))?;
        if coupon.owner != req.user {
            return Err(reject("Not coupon owner"));
        }
        if coupon.is_redeemed {
            return Err(reject("Coupon already redeemed"));
        }
        if coupon.auction.is_some() {
            return Err(reject("Coupon in auction"));
        }
        let merchant = coupon.merchant.clone();

        let ticket = derive_address(&["redemption_ticket", &req.coupon, &req.user, &req.nonce.to_string()]);
        if state.tickets.contains_key(&ticket) {
            return Err(reject("Ticket account already in use"));
        }
        let hash = ticket_hash(&req.coupon, &req.user, req.nonce);
        let expires_at = (now + self.ticket_ttl).timestamp();
        state.tickets.insert(
            ticket.clone(),
            TicketAccount {
                coupon: req.coupon.clone(),
                user: req.user.clone(),
                merchant,
                hash,
                expires_at,
                consumed: false,
                cancelled: false,
            },
        );
        debug!("ledger: ticket {} issued for coupon {}", ticket, req.coupon);
        Ok(TicketReceipt {
            signature: signature(),
            ticket,
            ticket_hash: hex::encode(hash),
            expires_at,
        })
    }

    async fn verify_and_redeem_ticket(&self, req: &RedeemTicketRequest) -> Result<Settlement, Error> {
        let now = self.now().timestamp();
        let mut state = self.state.lock().await;
        let ticket = state
            .tickets
            .get(&req.ticket)
            .ok_or_else(|| reject("Ticket account not found"))?;
        if ticket.consumed {
            return Err(reject("Ticket already consumed"));
        }
        if ticket.cancelled {
            return Err(reject("Ticket cancelled"));
        }
        if now > ticket.expires_at {
            return Err(reject("Ticket expired"));
        }
        if ticket.hash != req.expected_hash {
            return Err(reject("Invalid ticket hash"));
        }
        if ticket.merchant != req.merchant {
            return Err(reject("Unauthorized merchant"));
        }
        if ticket.coupon != req.coupon || ticket.user != req.user {
            return Err(reject("Ticket does not match coupon"));
        }

        let coupon = state
            .coupons
            .get_mut(&req.coupon)
            .ok_or_else(|| reject("Coupon account not found"))?;
        if coupon.is_redeemed {
            return Err(reject("Coupon already redeemed"));
        }
        if coupon.owner != req.user {
            return Err(reject("Not coupon owner"));
        }
        if coupon.auction.is_some() {
            return Err(reject("Coupon in auction"));
        }
        coupon.is_redeemed = true;
        coupon.listing = None;
        if let Some(t) = state.tickets.get_mut(&req.ticket) {
            t.consumed = true;
        }
        Ok(Settlement { signature: signature() })
    }

    async fn cancel_redemption_ticket(&self, req: &CancelTicketRequest) -> Result<Settlement, Error> {
        let mut state = self.state.lock().await;
        let ticket = state
            .tickets
            .get_mut(&req.ticket)
            .ok_or_else(|| reject("Ticket account not found"))?;
        if ticket.user != req.user {
            return Err(reject("Not ticket owner"));
        }
        if ticket.consumed {
            return Err(reject("Ticket already consumed"));
        }
        if ticket.cancelled {
            return Err(reject("Ticket cancelled"));
        }
        ticket.cancelled = true;
        Ok(Settlement { signature: signature() })
    }

    async fn create_group_deal(&self, req: &CreateGroupDealRequest) -> Result<GroupDealReceipt, Error> {
        check_tiers(&req.tiers)?;
        if req.target_participants < 1 || req.max_participants < req.target_participants {
            return Err(reject("Invalid participant limits"));
        }
        if req.duration_secs <= 0 {
            return Err(reject("Invalid duration"));
        }
        let now = self.now().timestamp();

        let mut state = self.state.lock().await;
        let promo = state
            .promotions
            .get(&req.promotion)
            .ok_or_else(|| reject("Promotion account not found"))?;
        if promo.merchant != req.merchant {
            return Err(reject("Unauthorized merchant"));
        }

        let address = derive_address(&["group_deal", &req.promotion, &req.deal_id.to_string()]);
        if state.deals.contains_key(&address) {
            return Err(reject("Group deal account already in use"));
        }
        state.deals.insert(
            address.clone(),
            GroupDealAccount {
                merchant: req.merchant.clone(),
                target_participants: req.target_participants,
                max_participants: req.max_participants,
                current_participants: 0,
                end_time: now + req.duration_secs,
                is_active: true,
                finalized: false,
            },
        );
        Ok(GroupDealReceipt { signature: signature(), group_deal: address })
    }

    async fn join_group_deal(&self, req: &JoinGroupDealRequest) -> Result<Settlement, Error> {
        if req.quantity < 1 {
            return Err(reject("Invalid quantity"));
        }
        let now = self.now().timestamp();
        let mut state = self.state.lock().await;
        let deal = state
            .deals
            .get_mut(&req.group_deal)
            .ok_or_else(|| reject("Group deal account not found"))?;
        if !deal.is_active || deal.finalized {
            return Err(reject("Group deal inactive"));
        }
        if now > deal.end_time {
            return Err(reject("Group deal expired"));
        }
        if deal.current_participants + req.quantity > deal.max_participants {
            return Err(reject("Group deal full"));
        }
        deal.current_participants += req.quantity;
        Ok(Settlement { signature: signature() })
    }

    async fn finalize_group_deal(&self, req: &FinalizeGroupDealRequest) -> Result<Settlement, Error> {
        let now = self.now().timestamp();
        let mut state = self.state.lock().await;
        let deal = state
            .deals
            .get_mut(&req.group_deal)
            .ok_or_else(|| reject("Group deal account not found"))?;
        if deal.merchant != req.merchant {
            return Err(reject("Unauthorized merchant"));
        }
        if deal.finalized {
            return Err(reject("Group deal already finalized"));
        }
        let target_reached = deal.current_participants >= deal.target_participants;
        if !target_reached && now <= deal.end_time {
            return Err(reject("Group deal still running"));
        }
        deal.finalized = true;
        deal.is_active = false;
        Ok(Settlement { signature: signature() })
    }

    async fn create_auction(&self, req: &CreateAuctionRequest) -> Result<AuctionReceipt, Error> {
        validate_auction_terms(
            req.auction_type,
            req.starting_price,
            req.reserve_price,
            req.min_bid_increment,
            req.duration_secs,
        )
        .map_err(|e| reject(&e.to_string()))?;
        let now = self.now().timestamp();

        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        let address = derive_address(&["auction", &req.coupon, &req.auction_id.to_string()]);
        if state.auctions.contains_key(&address) {
            return Err(reject("Auction account already in use"));
        }
        let coupon = state
            .coupons
            .get_mut(&req.coupon)
            .ok_or_else(|| reject("Coupon account not found"))?;
        if coupon.owner != req.seller {
            return Err(reject("Not coupon owner"));
        }
        if coupon.is_redeemed {
            return Err(reject("Coupon already redeemed"));
        }
        if coupon.listing.is_some() || coupon.auction.is_some() {
            return Err(reject("Coupon already listed"));
        }
        coupon.auction = Some(address.clone());

        let end_time = now + req.duration_secs;
        state.auctions.insert(
            address.clone(),
            AuctionAccount {
                coupon: req.coupon.clone(),
                seller: req.seller.clone(),
                auction_type: req.auction_type,
                start_time: now,
                end_time,
                starting_price: req.starting_price,
                reserve_price: req.reserve_price,
                min_bid_increment: req.min_bid_increment,
                auto_extend: req.auto_extend,
                current_bid: match req.auction_type {
                    AuctionType::English => req.starting_price,
                    _ => 0,
                },
                highest_bidder: None,
                bid_count: 0,
                closed: false,
            },
        );
        debug!("ledger: auction {} opened for coupon {}", address, req.coupon);
        Ok(AuctionReceipt { signature: signature(), auction: address, end_time })
    }

    async fn place_auction_bid(&self, req: &PlaceBidRequest) -> Result<Settlement, Error> {
        let now = self.now().timestamp();
        let mut state = self.state.lock().await;
        let auction = state
            .auctions
            .get_mut(&req.auction)
            .ok_or_else(|| reject("Auction account not found"))?;
        if auction.closed {
            return Err(reject("Auction inactive"));
        }
        if now > auction.end_time {
            return Err(reject("Auction ended"));
        }
        if auction.seller == req.bidder {
            return Err(reject("Seller cannot bid"));
        }
        let minimum = match auction.auction_type {
            AuctionType::English => auction.current_bid + auction.min_bid_increment,
            AuctionType::SealedBid => auction.starting_price,
            AuctionType::Dutch => return Err(reject("Dutch auctions take no bids")),
        };
        if req.amount < minimum {
            return Err(reject("Bid too low"));
        }
        if req.amount > auction.current_bid {
            auction.current_bid = req.amount;
            auction.highest_bidder = Some(req.bidder.clone());
        }
        auction.bid_count += 1;
        if auction.auto_extend && auction.end_time - now < AUTO_EXTEND_SECS {
            auction.end_time += AUTO_EXTEND_SECS;
        }
        Ok(Settlement { signature: signature() })
    }

    async fn buy_dutch_auction(&self, req: &BuyDutchAuctionRequest) -> Result<PurchaseReceipt, Error> {
        let now = self.now().timestamp();
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        let auction = state
            .auctions
            .get_mut(&req.auction)
            .ok_or_else(|| reject("Auction account not found"))?;
        if auction.auction_type != AuctionType::Dutch {
            return Err(reject("Not a dutch auction"));
        }
        if auction.closed {
            return Err(reject("Auction inactive"));
        }
        if now > auction.end_time {
            return Err(reject("Auction ended"));
        }
        if auction.seller == req.buyer {
            return Err(reject("Seller cannot buy"));
        }
        let price = auction.dutch_price(now);
        if price > req.max_price {
            return Err(reject("Price above limit"));
        }
        auction.closed = true;
        auction.current_bid = price;
        auction.highest_bidder = Some(req.buyer.clone());
        let coupon_address = auction.coupon.clone();

        if let Some(coupon) = state.coupons.get_mut(&coupon_address) {
            coupon.owner = req.buyer.clone();
            coupon.auction = None;
        }
        state.void_tickets(&coupon_address);
        Ok(PurchaseReceipt { signature: signature(), price })
    }

    async fn settle_auction(&self, req: &SettleAuctionRequest) -> Result<AuctionSettlementReceipt, Error> {
        let now = self.now().timestamp();
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        let auction = state
            .auctions
            .get_mut(&req.auction)
            .ok_or_else(|| reject("Auction account not found"))?;
        if auction.closed {
            return Err(reject("Auction already finalized"));
        }
        if now <= auction.end_time {
            return Err(reject("Auction still running"));
        }
        auction.closed = true;
        let winner = match &auction.highest_bidder {
            Some(bidder) if auction.current_bid >= auction.reserve_price => {
                Some((bidder.clone(), auction.current_bid))
            }
            _ => None,
        };
        let coupon_address = auction.coupon.clone();

        if let Some(coupon) = state.coupons.get_mut(&coupon_address) {
            coupon.auction = None;
            if let Some((bidder, _)) = &winner {
                coupon.owner = bidder.clone();
            }
        }
        if winner.is_some() {
            state.void_tickets(&coupon_address);
        }
        Ok(AuctionSettlementReceipt {
            signature: signature(),
            final_price: winner.as_ref().map(|(_, price)| *price),
            winner: winner.map(|(bidder, _)| bidder),
        })
    }

    async fn cancel_auction(&self, req: &CancelAuctionRequest) -> Result<Settlement, Error> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        let auction = state
            .auctions
            .get_mut(&req.auction)
            .ok_or_else(|| reject("Auction account not found"))?;
        if auction.seller != req.seller {
            return Err(reject("Not auction seller"));
        }
        if auction.closed {
            return Err(reject("Auction inactive"));
        }
        if auction.bid_count > 0 {
            return Err(reject("Auction has bids"));
        }
        auction.closed = true;
        let coupon_address = auction.coupon.clone();
        if let Some(coupon) = state.coupons.get_mut(&coupon_address) {
            coupon.auction = None;
        }
        Ok(Settlement { signature: signature() })
    }
}
