//! REST surface under `/api/v1`.
//!
//! Every response uses the same envelope: `{ "success": true, "data": ... }`
//! on success and `{ "success": false, "error": "..." }` otherwise.

pub mod error;
pub mod extract;
pub mod health;
pub mod promotions;
pub mod coupons;
pub mod redemption_tickets;
pub mod group_deals;
pub mod merchants;
pub mod auctions;

use std::sync::Arc;

use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use agoradeals_common::traits::ledger_traits::LedgerService;
use agoradeals_common::traits::repository_traits::{
    AuctionRepository, CouponRepository, MerchantRepository, PromotionRepository,
};
use crate::db::Database;
use crate::qr::QrRenderer;
use crate::repositories::{
    SqliteAuctionRepository, SqliteCouponRepository, SqliteGroupDealRepository,
    SqliteMerchantRepository, SqlitePromotionRepository, SqliteRedemptionTicketRepository,
};
use crate::services::{
    AuctionService, CouponService, GroupDealService, MerchantService, PromotionService,
    RedemptionTicketService,
};
use crate::utils::pagination::Pagination;
use crate::utils::time::Clock;

pub use error::ApiError;

/// Shared handles for every route.
#[derive(Clone)]
pub struct ApiState {
    pub db: Database,
    pub ledger: Arc<dyn LedgerService>,
    pub promotions: Arc<PromotionService>,
    pub coupons: Arc<CouponService>,
    pub tickets: Arc<RedemptionTicketService>,
    pub deals: Arc<GroupDealService>,
    pub merchants: Arc<MerchantService>,
    pub auctions: Arc<AuctionService>,
}

impl ApiState {
    /// Wires the SQLite repositories and services around one ledger and clock.
    pub fn build(
        db: Database,
        ledger: Arc<dyn LedgerService>,
        renderer: Arc<dyn QrRenderer>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let pool = db.pool().clone();
        let promotion_repo: Arc<dyn PromotionRepository> =
            Arc::new(SqlitePromotionRepository::new(pool.clone()));
        let coupon_repo: Arc<dyn CouponRepository> =
            Arc::new(SqliteCouponRepository::new(pool.clone()));
        let ticket_repo = Arc::new(SqliteRedemptionTicketRepository::new(pool.clone()));
        let deal_repo = Arc::new(SqliteGroupDealRepository::new(pool.clone()));
        let merchant_repo: Arc<dyn MerchantRepository> =
            Arc::new(SqliteMerchantRepository::new(pool.clone()));
        let auction_repo: Arc<dyn AuctionRepository> = Arc::new(SqliteAuctionRepository::new(pool));

        Self {
            merchants: Arc::new(MerchantService::new(
                merchant_repo.clone(),
                ledger.clone(),
                clock.clone(),
            )),
            auctions: Arc::new(AuctionService::new(
                auction_repo,
                coupon_repo.clone(),
                promotion_repo.clone(),
                ledger.clone(),
                clock.clone(),
            )),
            promotions: Arc::new(PromotionService::new(
                promotion_repo.clone(),
                merchant_repo,
                ledger.clone(),
                clock.clone(),
            )),
            coupons: Arc::new(CouponService::new(
                coupon_repo.clone(),
                promotion_repo.clone(),
                ledger.clone(),
                clock.clone(),
            )),
            tickets: Arc::new(RedemptionTicketService::new(
                ticket_repo,
                coupon_repo,
                ledger.clone(),
                renderer,
                clock.clone(),
            )),
            deals: Arc::new(GroupDealService::new(deal_repo, promotion_repo, ledger.clone(), clock)),
            ledger,
            db,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
}

pub type ApiResult<T> = Result<(StatusCode, Json<Envelope<T>>), ApiError>;

pub fn ok<T: Serialize>(data: T) -> ApiResult<T> {
    Ok((StatusCode::OK, Json(Envelope { success: true, data, pagination: None })))
}

pub fn created<T: Serialize>(data: T) -> ApiResult<T> {
    Ok((StatusCode::CREATED, Json(Envelope { success: true, data, pagination: None })))
}

pub fn paged<T: Serialize>(data: T, pagination: Pagination) -> ApiResult<T> {
    Ok((StatusCode::OK, Json(Envelope { success: true, data, pagination: Some(pagination) })))
}

pub fn router(state: ApiState) -> Router {
    let v1 = Router::new()
        .route("/promotions", post(promotions::create).get(promotions::list))
        .route("/promotions/{promotion_id}", get(promotions::detail))
        .route("/coupons", get(coupons::list))
        .route("/coupons/mint", post(coupons::mint))
        .route("/coupons/transfer", post(coupons::transfer))
        .route("/coupons/{coupon_id}", get(coupons::detail))
        .route("/marketplace/list", post(coupons::list_for_sale))
        .route("/marketplace/cancel", post(coupons::cancel_listing))
        .route("/marketplace/buy", post(coupons::buy))
        .route("/redemption-tickets/generate", post(redemption_tickets::generate))
        .route("/redemption-tickets/verify-and-redeem", post(redemption_tickets::verify_and_redeem))
        .route("/redemption-tickets/{ticket_id}", get(redemption_tickets::detail))
        .route("/redemption-tickets/{ticket_id}/cancel", post(redemption_tickets::cancel))
        .route("/redemption-tickets/user/{user_address}", get(redemption_tickets::for_user))
        .route("/redemption-tickets/merchant/{merchant_address}", get(redemption_tickets::for_merchant))
        .route("/group-deals", get(group_deals::list))
        .route("/group-deals/create", post(group_deals::create))
        .route("/group-deals/{deal_id}", get(group_deals::detail))
        .route("/group-deals/{deal_id}/join", post(group_deals::join))
        .route("/group-deals/{deal_id}/finalize", post(group_deals::finalize))
        .route("/merchants", get(merchants::list))
        .route("/merchants/register", post(merchants::register))
        .route("/merchants/{merchant_id}", get(merchants::detail))
        .route("/auctions", get(auctions::list))
        .route("/auctions/create", post(auctions::create))
        .route("/auctions/{auction_id}", get(auctions::detail))
        .route("/auctions/{auction_id}/bid", post(auctions::bid))
        .route("/auctions/{auction_id}/buy", post(auctions::buy))
        .route("/auctions/{auction_id}/settle", post(auctions::settle))
        .route("/auctions/{auction_id}/cancel", post(auctions::cancel));

    Router::new()
        .route("/health", get(health::health))
        .nest("/api/v1", v1)
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
}
