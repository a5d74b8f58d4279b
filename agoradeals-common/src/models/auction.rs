// File: agoradeals-common/src/models/auction.rs

use std::fmt;
use std::str::FromStr;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Error;

pub const MIN_AUCTION_DURATION_SECS: i64 = 300;
pub const MAX_AUCTION_DURATION_SECS: i64 = 604_800;
/// A bid landing inside this window before the end pushes the end out by
/// the same amount, when the auction has auto-extend on.
pub const AUTO_EXTEND_SECS: i64 = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuctionType {
    /// Ascending open bids.
    English,
    /// Price falls linearly from start to reserve; first buyer wins.
    Dutch,
    /// Blind bids, revealed at settlement.
    SealedBid,
}

impl AuctionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuctionType::English => "english",
            AuctionType::Dutch => "dutch",
            AuctionType::SealedBid => "sealed_bid",
        }
    }
}

impl fmt::Display for AuctionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuctionType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "english" => Ok(AuctionType::English),
            "dutch" => Ok(AuctionType::Dutch),
            "sealed_bid" | "sealedbid" => Ok(AuctionType::SealedBid),
            other => Err(Error::Validation(format!("Unknown auction type '{}'", other))),
        }
    }
}

/// Stored statuses are `Active`, `Cancelled` and `Settled`. `Ended` is how an
/// `Active` auction reads once its end time has passed and it awaits settlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuctionStatus {
    Active,
    Ended,
    Cancelled,
    Settled,
}

impl AuctionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuctionStatus::Active => "active",
            AuctionStatus::Ended => "ended",
            AuctionStatus::Cancelled => "cancelled",
            AuctionStatus::Settled => "settled",
        }
    }
}

impl fmt::Display for AuctionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuctionStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(AuctionStatus::Active),
            "ended" => Ok(AuctionStatus::Ended),
            "cancelled" => Ok(AuctionStatus::Cancelled),
            "settled" => Ok(AuctionStatus::Settled),
            other => Err(Error::Validation(format!("Unknown auction status '{}'", other))),
        }
    }
}

/// Append-only bid log entry; `sequence` is assigned by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuctionBid {
    pub sequence: i64,
    pub bidder_address: String,
    pub amount: i64,
    pub placed_at: DateTime<Utc>,
    pub tx_signature: String,
    pub is_winning: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Auction {
    pub id: Uuid,
    pub on_chain_address: String,
    pub auction_id: i64,
    pub coupon_address: String,
    pub seller_address: String,
    pub merchant_address: String,
    pub category: String,
    pub auction_type: AuctionType,
    pub starting_price: i64,
    pub reserve_price: i64,
    pub min_bid_increment: i64,
    pub auto_extend: bool,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// English: the price to beat, seeded with `starting_price`.
    /// Sealed bid: the highest amount so far, earliest bid winning ties.
    pub current_bid: i64,
    pub highest_bidder: Option<String>,
    pub total_bids: i64,
    pub bids: Vec<AuctionBid>,
    pub status: AuctionStatus,
    pub winner: Option<String>,
    pub final_price: Option<i64>,
    pub settled_at: Option<DateTime<Utc>>,
    pub creation_tx_signature: String,
    pub settlement_tx_signature: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Price and timing rules checked before an auction reaches the ledger.
pub fn validate_auction_terms(
    auction_type: AuctionType,
    starting_price: i64,
    reserve_price: i64,
    min_bid_increment: i64,
    duration_secs: i64,
) -> Result<(), Error> {
    if !(MIN_AUCTION_DURATION_SECS..=MAX_AUCTION_DURATION_SECS).contains(&duration_secs) {
        return Err(Error::Validation(format!(
            "durationSeconds must be between {MIN_AUCTION_DURATION_SECS} and {MAX_AUCTION_DURATION_SECS}"
        )));
    }
    if starting_price <= 0 {
        return Err(Error::Validation("startingPrice must be positive".into()));
    }
    if reserve_price <= 0 {
        return Err(Error::Validation("reservePrice must be positive".into()));
    }
    match auction_type {
        AuctionType::English => {
            if reserve_price > starting_price {
                return Err(Error::Validation(
                    "reservePrice must not exceed startingPrice for an english auction".into(),
                ));
            }
            if min_bid_increment <= 0 {
                return Err(Error::Validation("minBidIncrement must be positive".into()));
            }
        }
        AuctionType::Dutch => {
            if reserve_price >= starting_price {
                return Err(Error::Validation(
                    "reservePrice must be below startingPrice for a dutch auction".into(),
                ));
            }
        }
        AuctionType::SealedBid => {
            if min_bid_increment <= 0 {
                return Err(Error::Validation("minBidIncrement must be positive".into()));
            }
        }
    }
    Ok(())
}

/// Five percent of the starting price, at least one unit.
pub fn default_bid_increment(starting_price: i64) -> i64 {
    (starting_price / 20).max(1)
}

impl Auction {
    pub fn is_past_end(&self, now: DateTime<Utc>) -> bool {
        now > self.end_time
    }

    pub fn effective_status(&self, now: DateTime<Utc>) -> AuctionStatus {
        match self.status {
            AuctionStatus::Active if self.is_past_end(now) => AuctionStatus::Ended,
            other => other,
        }
    }

    /// Smallest acceptable bid, or `None` for a dutch auction, which is
    /// bought rather than bid on.
    pub fn minimum_bid(&self) -> Option<i64> {
        match self.auction_type {
            AuctionType::English => Some(self.current_bid + self.min_bid_increment),
            AuctionType::SealedBid => Some(self.starting_price),
            AuctionType::Dutch => None,
        }
    }

    /// Linear descent from `starting_price` at the start to `reserve_price`
    /// at the end.
    pub fn dutch_price(&self, now: DateTime<Utc>) -> i64 {
        if now <= self.start_time {
            return self.starting_price;
        }
        if now >= self.end_time {
            return self.reserve_price;
        }
        let elapsed = (now - self.start_time).num_seconds() as i128;
        let duration = (self.end_time - self.start_time).num_seconds().max(1) as i128;
        let drop = (self.starting_price - self.reserve_price) as i128;
        self.starting_price - (drop * elapsed / duration) as i64
    }

    /// New end time after a bid at `now`, if auto-extend applies.
    pub fn extended_end(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let window = Duration::seconds(AUTO_EXTEND_SECS);
        if self.auto_extend && self.end_time - now < window {
            Some(self.end_time + window)
        } else {
            None
        }
    }

    /// The leading bidder and amount, if the reserve has been met.
    pub fn winning_bid(&self) -> Option<(&str, i64)> {
        match &self.highest_bidder {
            Some(bidder) if self.current_bid >= self.reserve_price => {
                Some((bidder.as_str(), self.current_bid))
            }
            _ => None,
        }
    }

    /// Auction as callers see it: effective status, and sealed bids kept
    /// blind until settlement.
    pub fn observed_at(mut self, now: DateTime<Utc>) -> Self {
        self.status = self.effective_status(now);
        if self.auction_type == AuctionType::SealedBid && self.status != AuctionStatus::Settled {
            self.current_bid = 0;
            self.highest_bidder = None;
            for bid in &mut self.bids {
                bid.amount = 0;
                bid.is_winning = false;
            }
        }
        self
    }

    /// Marks the leading bid in the log.
    pub fn mark_winning(&mut self) {
        let leader = self
            .bids
            .iter()
            .filter(|b| Some(&b.bidder_address) == self.highest_bidder.as_ref() && b.amount == self.current_bid)
            .map(|b| b.sequence)
            .min();
        for bid in &mut self.bids {
            bid.is_winning = Some(bid.sequence) == leader;
        }
    }
}
