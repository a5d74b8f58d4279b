use std::sync::Arc;
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use tracing::{info, warn};
use uuid::Uuid;

use agoradeals_common::{
    error::Error,
    models::auction::{default_bid_increment, validate_auction_terms},
    models::{Auction, AuctionBid, AuctionStatus, AuctionType},
    traits::ledger_traits::{
        BuyDutchAuctionRequest, CancelAuctionRequest, CreateAuctionRequest, LedgerService,
        PlaceBidRequest, SettleAuctionRequest,
    },
    traits::repository_traits::{
        AuctionClose, AuctionQuery, AuctionRepository, CouponRepository, NewBid,
        PromotionRepository,
    },
};
use crate::utils::locks::KeyedLocks;
use crate::utils::pagination::{Page, Pagination};
use crate::utils::time::{from_epoch, Clock};

#[derive(Debug, Clone)]
pub struct NewAuction {
    pub coupon: String,
    pub wallet_address: String,
    pub auction_type: AuctionType,
    pub starting_price: i64,
    /// Defaults to `starting_price` for english and sealed-bid auctions.
    pub reserve_price: Option<i64>,
    /// Defaults to five percent of `starting_price`.
    pub min_bid_increment: Option<i64>,
    pub duration_secs: i64,
    pub auto_extend: bool,
}

#[derive(Debug, Clone)]
pub struct AuctionOutcome {
    pub auction: Auction,
    pub signature: String,
}

#[derive(Debug, Clone)]
pub struct BidOutcome {
    pub auction: Auction,
    pub bid: AuctionBid,
    pub signature: String,
}

#[derive(Debug, Clone, Default)]
pub struct AuctionFilter {
    pub status: Option<AuctionStatus>,
    pub auction_type: Option<AuctionType>,
    pub category: Option<String>,
    pub seller_address: Option<String>,
}

/// Coupon auctions: english (ascending), dutch (descending price, first
/// buyer wins) and sealed-bid (blind until settlement).
///
/// While an auction is open its coupon stays with the seller but is pinned:
/// it cannot be transferred, listed or redeemed. Closing the auction moves
/// the coupon to the winner or releases it back to the seller.
pub struct AuctionService {
    auctions: Arc<dyn AuctionRepository>,
    coupons: Arc<dyn CouponRepository>,
    promotions: Arc<dyn PromotionRepository>,
    ledger: Arc<dyn LedgerService>,
    clock: Arc<dyn Clock>,
    locks: KeyedLocks,
}

impl AuctionService {
    pub fn new(
        auctions: Arc<dyn AuctionRepository>,
        coupons: Arc<dyn CouponRepository>,
        promotions: Arc<dyn PromotionRepository>,
        ledger: Arc<dyn LedgerService>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            auctions,
            coupons,
            promotions,
            ledger,
            clock,
            locks: KeyedLocks::new(),
        }
    }

    pub async fn create_auction(&self, input: NewAuction) -> Result<AuctionOutcome, Error> {
        let reserve_price = match (input.reserve_price, input.auction_type) {
            (Some(p), _) => p,
            (None, AuctionType::Dutch) => {
                return Err(Error::Validation("Missing required field: reservePrice".into()))
            }
            (None, _) => input.starting_price,
        };
        let min_bid_increment = match input.auction_type {
            AuctionType::Dutch => 0,
            _ => input
                .min_bid_increment
                .unwrap_or_else(|| default_bid_increment(input.starting_price)),
        };
        validate_auction_terms(
            input.auction_type,
            input.starting_price,
            reserve_price,
            min_bid_increment,
            input.duration_secs,
        )?;

        let now = self.clock.now();
        let coupon = self
            .coupons
            .get_coupon(&input.coupon)
            .await?
            .ok_or_else(|| Error::NotFound("Coupon not found".into()))?;
        coupon.ensure_owner(&input.wallet_address)?;
        coupon.ensure_not_redeemed("Cannot auction redeemed coupon")?;
        coupon.ensure_not_in_auction()?;
        if coupon.is_listed {
            return Err(Error::Conflict("Coupon is listed for sale".into()));
        }
        if coupon.expires_at < now + Duration::seconds(input.duration_secs) {
            return Err(Error::Validation("Coupon expires before the auction would end".into()));
        }

        // Auctions are browsed by the category of the coupon's promotion.
        let category = self
            .promotions
            .get_promotion(&coupon.promotion)
            .await?
            .map(|p| p.category)
            .unwrap_or_default();

        let auction_id: i64 = rand::rng().random_range(1..=i64::from(u32::MAX));
        let receipt = self
            .ledger
            .create_auction(&CreateAuctionRequest {
                coupon: coupon.on_chain_address.clone(),
                seller: input.wallet_address.clone(),
                auction_id,
                auction_type: input.auction_type,
                starting_price: input.starting_price,
                reserve_price,
                min_bid_increment,
                duration_secs: input.duration_secs,
                auto_extend: input.auto_extend,
            })
            .await?;

        let auction = Auction {
            id: Uuid::new_v4(),
            on_chain_address: receipt.auction,
            auction_id,
            coupon_address: coupon.on_chain_address.clone(),
            seller_address: input.wallet_address,
            merchant_address: coupon.merchant.clone(),
            category,
            auction_type: input.auction_type,
            starting_price: input.starting_price,
            reserve_price,
            min_bid_increment,
            auto_extend: input.auto_extend,
            start_time: now,
            end_time: from_epoch(receipt.end_time),
            current_bid: match input.auction_type {
                AuctionType::English => input.starting_price,
                _ => 0,
            },
            highest_bidder: None,
            total_bids: 0,
            bids: Vec::new(),
            status: AuctionStatus::Active,
            winner: None,
            final_price: None,
            settled_at: None,
            creation_tx_signature: receipt.signature.clone(),
            settlement_tx_signature: None,
            created_at: now,
            updated_at: now,
        };
        if !self.auctions.create_auction(&auction).await? {
            warn!(
                "Auction {} opened on the ledger but coupon {} could not be pinned locally",
                auction.on_chain_address, auction.coupon_address
            );
            return Err(Error::Conflict("Coupon can no longer be auctioned".into()));
        }

        info!(
            "{} auction {} opened for coupon {} at {} (ends {})",
            auction.auction_type, auction.on_chain_address, auction.coupon_address,
            auction.starting_price, auction.end_time
        );
        Ok(AuctionOutcome { auction, signature: receipt.signature })
    }

    pub async fn place_bid(&self, key: &str, bidder: &str, amount: i64) -> Result<BidOutcome, Error> {
        if amount <= 0 {
            return Err(Error::Validation("amount must be positive".into()));
        }
        let found = self.find(key).await?;
        let _guard = self.locks.lock(&format!("auction:{}", found.id)).await;
        let auction = self.find(&found.id.to_string()).await?;

        let now = self.clock.now();
        ensure_open(&auction, now)?;
        if auction.seller_address == bidder {
            return Err(Error::Validation("Cannot bid on your own auction".into()));
        }
        let minimum = auction
            .minimum_bid()
            .ok_or_else(|| Error::Validation("Dutch auctions are bought, not bid on".into()))?;
        if amount < minimum {
            return Err(Error::Validation(format!("Bid must be at least {}", minimum)));
        }

        let settlement = self
            .ledger
            .place_auction_bid(&PlaceBidRequest {
                auction: auction.on_chain_address.clone(),
                bidder: bidder.to_string(),
                amount,
            })
            .await?;

        let extended_end = auction.extended_end(now);
        let mut bid = self
            .auctions
            .append_bid(
                auction.id,
                auction.total_bids,
                &NewBid {
                    bidder_address: bidder.to_string(),
                    amount,
                    placed_at: now,
                    tx_signature: settlement.signature.clone(),
                    extended_end,
                },
            )
            .await?
            .ok_or_else(|| {
                warn!(
                    "Bid on {} settled on the ledger but was rejected locally",
                    auction.on_chain_address
                );
                Error::Conflict("Auction changed while bidding".into())
            })?;

        // Sealed bidders learn nothing about their standing until settlement.
        if auction.auction_type == AuctionType::SealedBid {
            bid.is_winning = false;
        }
        if let Some(end) = extended_end {
            info!("Auction {} extended to {}", auction.on_chain_address, end);
        }
        info!("{} bid {} on auction {}", bidder, amount, auction.on_chain_address);
        Ok(BidOutcome {
            auction: self.find(&auction.id.to_string()).await?.observed_at(now),
            bid,
            signature: settlement.signature,
        })
    }

    /// Buys a dutch auction outright at its current price.
    pub async fn buy_now(&self, key: &str, buyer: &str) -> Result<AuctionOutcome, Error> {
        let found = self.find(key).await?;
        let _guard = self.locks.lock(&format!("auction:{}", found.id)).await;
        let auction = self.find(&found.id.to_string()).await?;

        let now = self.clock.now();
        if auction.auction_type != AuctionType::Dutch {
            return Err(Error::Validation("Only dutch auctions can be bought outright".into()));
        }
        ensure_open(&auction, now)?;
        if auction.seller_address == buyer {
            return Err(Error::Validation("Cannot buy your own auction".into()));
        }

        let receipt = self
            .ledger
            .buy_dutch_auction(&BuyDutchAuctionRequest {
                auction: auction.on_chain_address.clone(),
                buyer: buyer.to_string(),
                max_price: auction.dutch_price(now),
            })
            .await?;

        self.close(
            &auction,
            AuctionClose {
                winner: Some(buyer.to_string()),
                final_price: Some(receipt.price),
                closed_at: now,
                tx_signature: receipt.signature.clone(),
            },
        )
        .await?;

        info!("Dutch auction {} bought by {} for {}", auction.on_chain_address, buyer, receipt.price);
        Ok(AuctionOutcome {
            auction: self.find(&auction.id.to_string()).await?.observed_at(now),
            signature: receipt.signature,
        })
    }

    /// Closes an auction whose end time has passed. Anyone may call it.
    pub async fn settle_auction(&self, key: &str, caller: &str) -> Result<AuctionOutcome, Error> {
        let found = self.find(key).await?;
        let _guard = self.locks.lock(&format!("auction:{}", found.id)).await;
        let auction = self.find(&found.id.to_string()).await?;

        let now = self.clock.now();
        match auction.status {
            AuctionStatus::Active | AuctionStatus::Ended => {}
            AuctionStatus::Settled => return Err(Error::Conflict("Auction already settled".into())),
            AuctionStatus::Cancelled => return Err(Error::Conflict("Auction is cancelled".into())),
        }
        if !auction.is_past_end(now) {
            return Err(Error::Conflict("Auction has not ended yet".into()));
        }

        let receipt = self
            .ledger
            .settle_auction(&SettleAuctionRequest {
                auction: auction.on_chain_address.clone(),
                caller: caller.to_string(),
            })
            .await?;

        let local = auction.winning_bid().map(|(bidder, _)| bidder.to_string());
        if receipt.winner != local {
            warn!(
                "Auction {} settled for {:?} on the ledger but local bids favour {:?}",
                auction.on_chain_address, receipt.winner, local
            );
        }

        self.close(
            &auction,
            AuctionClose {
                winner: receipt.winner.clone(),
                final_price: receipt.final_price,
                closed_at: now,
                tx_signature: receipt.signature.clone(),
            },
        )
        .await?;

        match &receipt.winner {
            Some(winner) => info!(
                "Auction {} settled: coupon {} to {} for {:?}",
                auction.on_chain_address, auction.coupon_address, winner, receipt.final_price
            ),
            None => info!(
                "Auction {} closed without a winner; coupon {} returned to {}",
                auction.on_chain_address, auction.coupon_address, auction.seller_address
            ),
        }
        Ok(AuctionOutcome {
            auction: self.find(&auction.id.to_string()).await?.observed_at(now),
            signature: receipt.signature,
        })
    }

    pub async fn cancel_auction(&self, key: &str, wallet: &str) -> Result<AuctionOutcome, Error> {
        let found = self.find(key).await?;
        let _guard = self.locks.lock(&format!("auction:{}", found.id)).await;
        let auction = self.find(&found.id.to_string()).await?;

        if auction.seller_address != wallet {
            return Err(Error::Forbidden("Only the seller can cancel this auction".into()));
        }
        if auction.status != AuctionStatus::Active {
            return Err(Error::Conflict("Auction is not active".into()));
        }
        if auction.total_bids > 0 {
            return Err(Error::Conflict("Cannot cancel an auction with bids".into()));
        }

        let settlement = self
            .ledger
            .cancel_auction(&CancelAuctionRequest {
                auction: auction.on_chain_address.clone(),
                seller: wallet.to_string(),
            })
            .await?;

        let now = self.clock.now();
        if !self.auctions.cancel_auction(auction.id, &settlement.signature, now).await? {
            return Err(Error::Conflict("Auction is not active".into()));
        }

        info!("Auction {} cancelled by {}", auction.on_chain_address, wallet);
        Ok(AuctionOutcome {
            auction: self.find(&auction.id.to_string()).await?.observed_at(now),
            signature: settlement.signature,
        })
    }

    pub async fn get_auction(&self, key: &str) -> Result<Auction, Error> {
        let now = self.clock.now();
        Ok(self.find(key).await?.observed_at(now))
    }

    pub async fn list_auctions(&self, filter: AuctionFilter, page: Page) -> Result<(Vec<Auction>, Pagination), Error> {
        let (items, total) = self
            .auctions
            .list_auctions(&AuctionQuery {
                status: filter.status,
                auction_type: filter.auction_type,
                category: filter.category,
                seller_address: filter.seller_address,
                now: self.clock.now(),
                limit: page.limit,
                offset: page.offset,
            })
            .await?;
        Ok((items, Pagination::new(page, total)))
    }

    async fn close(&self, auction: &Auction, close: AuctionClose) -> Result<(), Error> {
        if !self.auctions.close_auction(auction.id, &close).await? {
            warn!(
                "Auction {} closed on the ledger but was already closed locally",
                auction.on_chain_address
            );
            return Err(Error::Conflict("Auction already closed".into()));
        }
        Ok(())
    }

    async fn find(&self, key: &str) -> Result<Auction, Error> {
        self.auctions
            .get_auction(key)
            .await?
            .ok_or_else(|| Error::NotFound("Auction not found".into()))
    }
}

fn ensure_open(auction: &Auction, now: DateTime<Utc>) -> Result<(), Error> {
    match auction.effective_status(now) {
        AuctionStatus::Active => Ok(()),
        AuctionStatus::Ended => Err(Error::Conflict("Auction has ended".into())),
        AuctionStatus::Cancelled | AuctionStatus::Settled => {
            Err(Error::Conflict("Auction is not active".into()))
        }
    }
}
