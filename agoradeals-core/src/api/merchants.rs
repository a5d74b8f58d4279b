use axum::extract::{Path, State};
use serde::Deserialize;

use agoradeals_common::models::Merchant;
use super::extract::{ApiJson, ApiQuery, WalletHeader};
use super::{created, ok, paged, ApiResult, ApiState};
use crate::services::merchant_service::{MerchantFilter, NewMerchant};
use crate::utils::pagination::Page;
use crate::utils::validation::require;

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RegisterBody {
    pub wallet_address: Option<String>,
    pub name: Option<String>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub address: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MerchantListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub category: Option<String>,
    pub search: Option<String>,
}

pub async fn register(
    State(state): State<ApiState>,
    wallet: WalletHeader,
    ApiJson(body): ApiJson<RegisterBody>,
) -> ApiResult<Merchant> {
    let input = NewMerchant {
        wallet_address: wallet.resolve("walletAddress", body.wallet_address.as_deref())?,
        name: require("name", body.name.as_deref())?,
        category: require("category", body.category.as_deref())?,
        description: body.description.unwrap_or_default(),
        latitude: body.latitude,
        longitude: body.longitude,
        address: body.address.filter(|a| !a.trim().is_empty()),
    };
    created(state.merchants.register(input).await?)
}

pub async fn list(
    State(state): State<ApiState>,
    ApiQuery(q): ApiQuery<MerchantListQuery>,
) -> ApiResult<Vec<Merchant>> {
    let filter = MerchantFilter {
        category: q.category.filter(|c| !c.trim().is_empty()),
        search: q.search,
    };
    let (items, pagination) = state.merchants.list_merchants(filter, Page::new(q.page, q.limit)).await?;
    paged(items, pagination)
}

pub async fn detail(State(state): State<ApiState>, Path(merchant_id): Path<String>) -> ApiResult<Merchant> {
    ok(state.merchants.get_merchant(&merchant_id).await?)
}
