use axum::extract::{Path, State};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use agoradeals_common::models::Promotion;
use super::extract::{ApiJson, ApiQuery, WalletHeader};
use super::{created, ok, paged, ApiResult, ApiState};
use crate::services::promotion_service::{NewPromotion, PromotionFilter};
use crate::utils::pagination::Page;
use crate::utils::validation::{require, required};

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CreatePromotionBody {
    pub wallet_address: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub discount_percentage: Option<i64>,
    pub max_supply: Option<i64>,
    pub price: Option<i64>,
    pub original_price: Option<i64>,
    pub expires_at: Option<DateTime<Utc>>,
    pub image_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PromotionListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub merchant: Option<String>,
    pub category: Option<String>,
}

pub async fn create(
    State(state): State<ApiState>,
    wallet: WalletHeader,
    ApiJson(body): ApiJson<CreatePromotionBody>,
) -> ApiResult<Promotion> {
    let merchant = wallet.resolve("walletAddress", body.wallet_address.as_deref())?;
    let input = NewPromotion {
        merchant,
        title: require("title", body.title.as_deref())?,
        description: body.description.unwrap_or_default(),
        category: require("category", body.category.as_deref())?,
        discount_percentage: required("discountPercentage", body.discount_percentage)?,
        max_supply: required("maxSupply", body.max_supply)?,
        price: required("price", body.price)?,
        original_price: body.original_price,
        expires_at: required("expiresAt", body.expires_at)?,
        image_url: body.image_url,
    };
    created(state.promotions.create_promotion(input).await?)
}

pub async fn list(
    State(state): State<ApiState>,
    ApiQuery(q): ApiQuery<PromotionListQuery>,
) -> ApiResult<Vec<Promotion>> {
    let filter = PromotionFilter { merchant: q.merchant, category: q.category };
    let (items, pagination) = state
        .promotions
        .list_promotions(filter, Page::new(q.page, q.limit))
        .await?;
    paged(items, pagination)
}

pub async fn detail(
    State(state): State<ApiState>,
    Path(promotion_id): Path<String>,
) -> ApiResult<Promotion> {
    ok(state.promotions.get_promotion(&promotion_id).await?)
}
