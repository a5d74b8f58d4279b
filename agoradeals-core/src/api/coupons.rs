use axum::extract::{Path, State};
use serde::Deserialize;
use serde_json::{json, Value};

use agoradeals_common::models::Coupon;
use super::extract::{ApiJson, ApiQuery, WalletHeader};
use super::{created, ok, paged, ApiResult, ApiState};
use crate::services::coupon_service::CouponFilter;
use crate::utils::pagination::Page;
use crate::utils::validation::{require, require_wallet, required};

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MintBody {
    pub promotion_id: Option<String>,
    pub recipient_address: Option<String>,
    pub wallet_address: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TransferBody {
    pub coupon_id: Option<String>,
    pub recipient_address: Option<String>,
    pub wallet_address: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ListBody {
    pub coupon_id: Option<String>,
    pub price: Option<i64>,
    pub wallet_address: Option<String>,
}

/// Body for cancelling a listing or buying one.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CouponActionBody {
    pub coupon_id: Option<String>,
    pub wallet_address: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CouponListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub owner: Option<String>,
    pub promotion: Option<String>,
    pub listed: Option<bool>,
}

pub async fn mint(
    State(state): State<ApiState>,
    wallet: WalletHeader,
    ApiJson(body): ApiJson<MintBody>,
) -> ApiResult<Coupon> {
    let promotion = require("promotionId", body.promotion_id.as_deref())?;
    // Minting to someone else is allowed; default to the caller.
    let recipient = match body.recipient_address.as_deref() {
        Some(r) => require_wallet("recipientAddress", Some(r))?,
        None => wallet.resolve("walletAddress", body.wallet_address.as_deref())?,
    };
    created(state.coupons.mint_coupon(&promotion, &recipient).await?)
}

pub async fn list(
    State(state): State<ApiState>,
    ApiQuery(q): ApiQuery<CouponListQuery>,
) -> ApiResult<Vec<Coupon>> {
    let filter = CouponFilter {
        owner: q.owner,
        promotion: q.promotion,
        listed_only: q.listed.unwrap_or(false),
    };
    let (items, pagination) = state.coupons.list_coupons(filter, Page::new(q.page, q.limit)).await?;
    paged(items, pagination)
}

pub async fn detail(State(state): State<ApiState>, Path(coupon_id): Path<String>) -> ApiResult<Coupon> {
    ok(state.coupons.get_coupon(&coupon_id).await?)
}

pub async fn transfer(
    State(state): State<ApiState>,
    wallet: WalletHeader,
    ApiJson(body): ApiJson<TransferBody>,
) -> ApiResult<Coupon> {
    let coupon_id = require("couponId", body.coupon_id.as_deref())?;
    let recipient = require_wallet("recipientAddress", body.recipient_address.as_deref())?;
    let owner = wallet.resolve("walletAddress", body.wallet_address.as_deref())?;
    ok(state.coupons.transfer_coupon(&coupon_id, &recipient, &owner).await?)
}

pub async fn list_for_sale(
    State(state): State<ApiState>,
    wallet: WalletHeader,
    ApiJson(body): ApiJson<ListBody>,
) -> ApiResult<Value> {
    let coupon_id = require("couponId", body.coupon_id.as_deref())?;
    let price = required("price", body.price)?;
    let seller = wallet.resolve("walletAddress", body.wallet_address.as_deref())?;
    let listing = state.coupons.list_for_sale(&coupon_id, price, &seller).await?;
    ok(json!({
        "coupon": listing.coupon,
        "listingAddress": listing.listing_address,
        "signature": listing.signature,
    }))
}

pub async fn cancel_listing(
    State(state): State<ApiState>,
    wallet: WalletHeader,
    ApiJson(body): ApiJson<CouponActionBody>,
) -> ApiResult<Coupon> {
    let coupon_id = require("couponId", body.coupon_id.as_deref())?;
    let seller = wallet.resolve("walletAddress", body.wallet_address.as_deref())?;
    ok(state.coupons.cancel_listing(&coupon_id, &seller).await?)
}

pub async fn buy(
    State(state): State<ApiState>,
    wallet: WalletHeader,
    ApiJson(body): ApiJson<CouponActionBody>,
) -> ApiResult<Coupon> {
    let coupon_id = require("couponId", body.coupon_id.as_deref())?;
    let buyer = wallet.resolve("walletAddress", body.wallet_address.as_deref())?;
    ok(state.coupons.buy_coupon(&coupon_id, &buyer).await?)
}
