use axum::extract::{Path, State};
use serde::Deserialize;
use serde_json::{json, Value};

use agoradeals_common::models::{RedemptionTicket, TicketStatus};
use super::extract::{ApiJson, ApiQuery, WalletHeader};
use super::{created, ok, ApiResult, ApiState};
use crate::services::redemption_ticket_service::{GenerateTicket, RedeemTicket};
use crate::utils::validation::{require, require_wallet};
use crate::Error;

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GenerateBody {
    pub coupon_id: Option<String>,
    pub wallet_address: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct VerifyBody {
    pub ticket_id: Option<String>,
    pub ticket_hash: Option<String>,
    pub merchant_wallet_address: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CancelBody {
    pub wallet_address: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct StatusQuery {
    pub status: Option<String>,
}

impl StatusQuery {
    fn parse(&self) -> Result<Option<TicketStatus>, Error> {
        match self.status.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(s) => s.parse().map(Some),
        }
    }
}

pub async fn generate(
    State(state): State<ApiState>,
    wallet: WalletHeader,
    ApiJson(body): ApiJson<GenerateBody>,
) -> ApiResult<Value> {
    let coupon = require("couponId", body.coupon_id.as_deref())?;
    let wallet_address = wallet.resolve("walletAddress", body.wallet_address.as_deref())?;
    let ticket = state
        .tickets
        .generate_ticket(GenerateTicket {
            coupon,
            wallet_address,
            latitude: body.latitude,
            longitude: body.longitude,
        })
        .await?;
    created(json!({
        "ticketId": ticket.id,
        "ticketAddress": ticket.on_chain_address,
        "ticketHash": ticket.ticket_hash,
        "expiresAt": ticket.expires_at,
        "qrDataUrl": ticket.qr_data_url,
        "qrData": ticket.qr_code_data,
        "signature": ticket.generation_tx_signature,
    }))
}

pub async fn verify_and_redeem(
    State(state): State<ApiState>,
    wallet: WalletHeader,
    ApiJson(body): ApiJson<VerifyBody>,
) -> ApiResult<Value> {
    let ticket = require("ticketId", body.ticket_id.as_deref())?;
    let ticket_hash = require("ticketHash", body.ticket_hash.as_deref())?;
    let merchant = wallet.resolve("merchantWalletAddress", body.merchant_wallet_address.as_deref())?;
    let redeemed = state
        .tickets
        .verify_and_redeem(RedeemTicket {
            ticket,
            ticket_hash,
            merchant_wallet_address: merchant,
            latitude: body.latitude,
            longitude: body.longitude,
        })
        .await?;
    ok(json!({
        "ticketId": redeemed.id,
        "status": redeemed.status,
        "couponAddress": redeemed.coupon_address,
        "consumedAt": redeemed.consumed_at,
        "signature": redeemed.redemption_tx_signature,
    }))
}

pub async fn cancel(
    State(state): State<ApiState>,
    Path(ticket_id): Path<String>,
    wallet: WalletHeader,
    ApiJson(body): ApiJson<CancelBody>,
) -> ApiResult<Value> {
    let wallet_address = wallet.resolve("walletAddress", body.wallet_address.as_deref())?;
    let ticket = state.tickets.cancel_ticket(&ticket_id, &wallet_address).await?;
    ok(json!({
        "ticketId": ticket.id,
        "status": ticket.status,
        "signature": ticket.cancellation_tx_signature,
    }))
}

pub async fn detail(
    State(state): State<ApiState>,
    Path(ticket_id): Path<String>,
) -> ApiResult<RedemptionTicket> {
    ok(state.tickets.get_ticket(&ticket_id).await?)
}

pub async fn for_user(
    State(state): State<ApiState>,
    Path(user_address): Path<String>,
    ApiQuery(q): ApiQuery<StatusQuery>,
) -> ApiResult<Vec<RedemptionTicket>> {
    let user = require_wallet("userAddress", Some(&user_address))?;
    ok(state.tickets.user_tickets(&user, q.parse()?).await?)
}

pub async fn for_merchant(
    State(state): State<ApiState>,
    Path(merchant_address): Path<String>,
    ApiQuery(q): ApiQuery<StatusQuery>,
) -> ApiResult<Vec<RedemptionTicket>> {
    let merchant = require_wallet("merchantAddress", Some(&merchant_address))?;
    ok(state.tickets.merchant_tickets(&merchant, q.parse()?).await?)
}
