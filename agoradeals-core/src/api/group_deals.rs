use axum::extract::{Path, State};
use serde::Deserialize;
use serde_json::{json, Value};

use agoradeals_common::models::{DealStatus, DealTier, GroupDeal};
use super::extract::{ApiJson, ApiQuery, WalletHeader};
use super::{created, ok, paged, ApiResult, ApiState};
use crate::services::group_deal_service::{DealFilter, NewGroupDeal};
use crate::utils::pagination::Page;
use crate::utils::validation::{require, required};

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CreateDealBody {
    pub promotion_id: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub image_url: Option<String>,
    pub terms_and_conditions: Option<Vec<String>>,
    pub tiers: Option<Vec<DealTier>>,
    pub target_participants: Option<i64>,
    pub max_participants: Option<i64>,
    pub duration_days: Option<i64>,
    pub wallet_address: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct JoinBody {
    pub wallet_address: Option<String>,
    pub quantity: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FinalizeBody {
    pub wallet_address: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DealListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub status: Option<String>,
    pub category: Option<String>,
    pub merchant_address: Option<String>,
}

pub async fn create(
    State(state): State<ApiState>,
    wallet: WalletHeader,
    ApiJson(body): ApiJson<CreateDealBody>,
) -> ApiResult<Value> {
    let input = NewGroupDeal {
        promotion: require("promotionId", body.promotion_id.as_deref())?,
        wallet_address: wallet.resolve("walletAddress", body.wallet_address.as_deref())?,
        title: require("title", body.title.as_deref())?,
        description: body.description,
        category: body.category.filter(|c| !c.trim().is_empty()),
        image_url: body.image_url,
        terms_and_conditions: body.terms_and_conditions.unwrap_or_default(),
        tiers: required("tiers", body.tiers)?,
        target_participants: required("targetParticipants", body.target_participants)?,
        max_participants: required("maxParticipants", body.max_participants)?,
        duration_days: required("durationDays", body.duration_days)?,
    };
    let out = state.deals.create_group_deal(input).await?;
    created(json!({
        "dealId": out.deal.id,
        "dealAddress": out.deal.on_chain_address,
        "title": out.deal.title,
        "targetParticipants": out.deal.target_participants,
        "maxParticipants": out.deal.max_participants,
        "currentParticipants": out.deal.current_participants,
        "endTime": out.deal.end_time,
        "signature": out.signature,
    }))
}

pub async fn join(
    State(state): State<ApiState>,
    Path(deal_id): Path<String>,
    wallet: WalletHeader,
    ApiJson(body): ApiJson<JoinBody>,
) -> ApiResult<Value> {
    let wallet_address = wallet.resolve("walletAddress", body.wallet_address.as_deref())?;
    let quantity = body.quantity.unwrap_or(1);
    let out = state.deals.join_group_deal(&deal_id, &wallet_address, quantity).await?;
    ok(json!({
        "signature": out.signature,
        "paidAmount": out.paid_amount,
        "pricePerUnit": out.price_per_unit,
        "tier": out.tier_index,
        "currentParticipants": out.current_participants,
        "status": out.status,
    }))
}

pub async fn finalize(
    State(state): State<ApiState>,
    Path(deal_id): Path<String>,
    wallet: WalletHeader,
    ApiJson(body): ApiJson<FinalizeBody>,
) -> ApiResult<Value> {
    let merchant = wallet.resolve("walletAddress", body.wallet_address.as_deref())?;
    let out = state.deals.finalize_group_deal(&deal_id, &merchant).await?;
    ok(json!({
        "dealId": out.deal.id,
        "status": out.deal.status,
        "isSuccessful": out.deal.is_successful,
        "currentParticipants": out.deal.current_participants,
        "targetParticipants": out.deal.target_participants,
        "signature": out.signature,
    }))
}

pub async fn list(
    State(state): State<ApiState>,
    ApiQuery(q): ApiQuery<DealListQuery>,
) -> ApiResult<Vec<GroupDeal>> {
    let status = match q.status.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(s) => Some(s.parse::<DealStatus>()?),
    };
    let filter = DealFilter {
        status,
        category: q.category,
        merchant_address: q.merchant_address,
    };
    let (items, pagination) = state.deals.list_group_deals(filter, Page::new(q.page, q.limit)).await?;
    paged(items, pagination)
}

pub async fn detail(State(state): State<ApiState>, Path(deal_id): Path<String>) -> ApiResult<GroupDeal> {
    ok(state.deals.get_group_deal(&deal_id).await?)
}
