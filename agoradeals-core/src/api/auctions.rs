use axum::extract::{Path, State};
use serde::Deserialize;
use serde_json::{json, Value};

use agoradeals_common::models::{Auction, AuctionStatus, AuctionType};
use super::extract::{ApiJson, ApiQuery, WalletHeader};
use super::{created, ok, paged, ApiResult, ApiState};
use crate::services::auction_service::{AuctionFilter, AuctionOutcome, NewAuction};
use crate::utils::pagination::Page;
use crate::utils::validation::{require, required};

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CreateAuctionBody {
    pub coupon_id: Option<String>,
    pub auction_type: Option<String>,
    pub starting_price: Option<i64>,
    pub reserve_price: Option<i64>,
    pub min_bid_increment: Option<i64>,
    pub duration_secs: Option<i64>,
    pub auto_extend: Option<bool>,
    pub wallet_address: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BidBody {
    pub wallet_address: Option<String>,
    pub amount: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CallerBody {
    pub wallet_address: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AuctionListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub status: Option<String>,
    #[serde(rename = "type")]
    pub auction_type: Option<String>,
    pub category: Option<String>,
    pub seller_address: Option<String>,
}

fn outcome(out: AuctionOutcome) -> Value {
    json!({
        "auctionId": out.auction.id,
        "auctionAddress": out.auction.on_chain_address,
        "status": out.auction.status,
        "winner": out.auction.winner,
        "finalPrice": out.auction.final_price,
        "endTime": out.auction.end_time,
        "signature": out.signature,
    })
}

pub async fn create(
    State(state): State<ApiState>,
    wallet: WalletHeader,
    ApiJson(body): ApiJson<CreateAuctionBody>,
) -> ApiResult<Value> {
    let input = NewAuction {
        coupon: require("couponId", body.coupon_id.as_deref())?,
        wallet_address: wallet.resolve("walletAddress", body.wallet_address.as_deref())?,
        auction_type: require("auctionType", body.auction_type.as_deref())?.parse::<AuctionType>()?,
        starting_price: required("startingPrice", body.starting_price)?,
        reserve_price: body.reserve_price,
        min_bid_increment: body.min_bid_increment,
        duration_secs: required("durationSecs", body.duration_secs)?,
        auto_extend: body.auto_extend.unwrap_or(false),
    };
    let out = state.auctions.create_auction(input).await?;
    created(json!({
        "auctionId": out.auction.id,
        "auctionAddress": out.auction.on_chain_address,
        "auctionType": out.auction.auction_type,
        "startingPrice": out.auction.starting_price,
        "reservePrice": out.auction.reserve_price,
        "minBidIncrement": out.auction.min_bid_increment,
        "startTime": out.auction.start_time,
        "endTime": out.auction.end_time,
        "signature": out.signature,
    }))
}

pub async fn bid(
    State(state): State<ApiState>,
    Path(auction_id): Path<String>,
    wallet: WalletHeader,
    ApiJson(body): ApiJson<BidBody>,
) -> ApiResult<Value> {
    let bidder = wallet.resolve("walletAddress", body.wallet_address.as_deref())?;
    let amount = required("amount", body.amount)?;
    let out = state.auctions.place_bid(&auction_id, &bidder, amount).await?;
    ok(json!({
        "auctionId": out.auction.id,
        "amount": out.bid.amount,
        "isWinning": out.bid.is_winning,
        "totalBids": out.auction.total_bids,
        "endTime": out.auction.end_time,
        "signature": out.signature,
    }))
}

pub async fn buy(
    State(state): State<ApiState>,
    Path(auction_id): Path<String>,
    wallet: WalletHeader,
    ApiJson(body): ApiJson<CallerBody>,
) -> ApiResult<Value> {
    let buyer = wallet.resolve("walletAddress", body.wallet_address.as_deref())?;
    ok(outcome(state.auctions.buy_now(&auction_id, &buyer).await?))
}

pub async fn settle(
    State(state): State<ApiState>,
    Path(auction_id): Path<String>,
    wallet: WalletHeader,
    ApiJson(body): ApiJson<CallerBody>,
) -> ApiResult<Value> {
    let caller = wallet.resolve("walletAddress", body.wallet_address.as_deref())?;
    ok(outcome(state.auctions.settle_auction(&auction_id, &caller).await?))
}

pub async fn cancel(
    State(state): State<ApiState>,
    Path(auction_id): Path<String>,
    wallet: WalletHeader,
    ApiJson(body): ApiJson<CallerBody>,
) -> ApiResult<Value> {
    let seller = wallet.resolve("walletAddress", body.wallet_address.as_deref())?;
    ok(outcome(state.auctions.cancel_auction(&auction_id, &seller).await?))
}

pub async fn list(
    State(state): State<ApiState>,
    ApiQuery(q): ApiQuery<AuctionListQuery>,
) -> ApiResult<Vec<Auction>> {
    let status = match q.status.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(s) => Some(s.parse::<AuctionStatus>()?),
    };
    let auction_type = match q.auction_type.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(s) => Some(s.parse::<AuctionType>()?),
    };
    let filter = AuctionFilter {
        status,
        auction_type,
        category: q.category.filter(|c| !c.trim().is_empty()),
        seller_address: q.seller_address,
    };
    let (items, pagination) = state.auctions.list_auctions(filter, Page::new(q.page, q.limit)).await?;
    paged(items, pagination)
}

pub async fn detail(State(state): State<ApiState>, Path(auction_id): Path<String>) -> ApiResult<Auction> {
    ok(state.auctions.get_auction(&auction_id).await?)
}
