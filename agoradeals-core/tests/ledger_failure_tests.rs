// File: agoradeals-core/tests/ledger_failure_tests.rs
//
// The ledger is authoritative: when it fails, nothing may change locally.

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use mockall::mock;
use serde_json::{json, Value};
use tower::ServiceExt;

use agoradeals_common::models::{AuctionStatus, AuctionType, DealStatus, TicketStatus};
use agoradeals_common::traits::ledger_traits::*;
use agoradeals_core::services::auction_service::NewAuction;
use agoradeals_core::services::group_deal_service::NewGroupDeal;
use agoradeals_core::services::merchant_service::NewMerchant;
use agoradeals_core::services::redemption_ticket_service::{GenerateTicket, RedeemTicket};
use agoradeals_core::test_utils::{three_tier_schedule, TestHarness, ALICE, BOB, MERCHANT, START_EPOCH};
use agoradeals_core::Error;

mock! {
    pub Ledger {}

    #[async_trait]
    impl LedgerService for Ledger {
        async fn version(&self) -> Result<String, Error>;
        async fn register_merchant(&self, req: &RegisterMerchantRequest) -> Result<MerchantReceipt, Error>;
        async fn create_promotion(&self, req: &CreatePromotionRequest) -> Result<PromotionReceipt, Error>;
        async fn mint_coupon(&self, req: &MintCouponRequest) -> Result<MintReceipt, Error>;
        async fn transfer_coupon(&self, req: &TransferCouponRequest) -> Result<Settlement, Error>;
        async fn list_coupon_for_sale(&self, req: &ListCouponRequest) -> Result<ListingReceipt, Error>;
        async fn cancel_listing(&self, req: &CancelListingRequest) -> Result<Settlement, Error>;
        async fn buy_listing(&self, req: &BuyListingRequest) -> Result<Settlement, Error>;
        async fn generate_redemption_ticket(&self, req: &GenerateTicketRequest) -> Result<TicketReceipt, Error>;
        async fn verify_and_redeem_ticket(&self, req: &RedeemTicketRequest) -> Result<Settlement, Error>;
        async fn cancel_redemption_ticket(&self, req: &CancelTicketRequest) -> Result<Settlement, Error>;
        async fn create_group_deal(&self, req: &CreateGroupDealRequest) -> Result<GroupDealReceipt, Error>;
        async fn join_group_deal(&self, req: &JoinGroupDealRequest) -> Result<Settlement, Error>;
        async fn finalize_group_deal(&self, req: &FinalizeGroupDealRequest) -> Result<Settlement, Error>;
        async fn create_auction(&self, req: &CreateAuctionRequest) -> Result<AuctionReceipt, Error>;
        async fn place_auction_bid(&self, req: &PlaceBidRequest) -> Result<Settlement, Error>;
        async fn buy_dutch_auction(&self, req: &BuyDutchAuctionRequest) -> Result<PurchaseReceipt, Error>;
        async fn settle_auction(&self, req: &SettleAuctionRequest) -> Result<AuctionSettlementReceipt, Error>;
        async fn cancel_auction(&self, req: &CancelAuctionRequest) -> Result<Settlement, Error>;
    }
}

const TICKET_HASH: &str = "abababababababababababababababababababababababababababababababab";

fn issuing_ledger() -> MockLedger {
    let mut ledger = MockLedger::new();
    ledger.expect_generate_redemption_ticket().returning(|req| {
        Ok(TicketReceipt {
            signature: "sig-generate".into(),
            ticket: format!("ticket-{}", req.nonce),
            ticket_hash: TICKET_HASH.into(),
            expires_at: START_EPOCH + 300,
        })
    });
    ledger
}

#[tokio::test]
async fn test_failed_generation_stores_nothing() -> Result<(), Error> {
    let mut ledger = MockLedger::new();
    ledger
        .expect_generate_redemption_ticket()
        .times(1)
        .returning(|_| Err(Error::Ledger("rpc unavailable".into())));
    let h = TestHarness::with_ledger(Arc::new(ledger)).await?;
    let (_, coupon) = h.seed_coupon(ALICE).await?;

    let err = h
        .state
        .tickets
        .generate_ticket(GenerateTicket {
            coupon: coupon.on_chain_address.clone(),
            wallet_address: ALICE.to_string(),
            latitude: None,
            longitude: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Ledger(_)));
    assert!(h.state.tickets.user_tickets(ALICE, None).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_failed_redemption_leaves_ticket_and_coupon_untouched() -> Result<(), Error> {
    let mut ledger = issuing_ledger();
    ledger
        .expect_verify_and_redeem_ticket()
        .withf(|req| req.merchant == MERCHANT && req.user == ALICE)
        .times(2)
        .returning(|_| Err(Error::Ledger("Invalid ticket hash".into())));
    let h = TestHarness::with_ledger(Arc::new(ledger)).await?;
    let (_, coupon) = h.seed_coupon(ALICE).await?;

    let ticket = h
        .state
        .tickets
        .generate_ticket(GenerateTicket {
            coupon: coupon.on_chain_address.clone(),
            wallet_address: ALICE.to_string(),
            latitude: None,
            longitude: None,
        })
        .await?;
    assert_eq!(ticket.ticket_hash, TICKET_HASH);

    let err = h
        .state
        .tickets
        .verify_and_redeem(RedeemTicket {
            ticket: ticket.on_chain_address.clone(),
            ticket_hash: TICKET_HASH.into(),
            merchant_wallet_address: MERCHANT.into(),
            latitude: None,
            longitude: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Ledger(_)));

    // same failure over HTTP is a 500 in the error envelope
    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/redemption-tickets/verify-and-redeem")
        .header("content-type", "application/json")
        .body(Body::from(
            json!({
                "ticketId": ticket.id,
                "ticketHash": TICKET_HASH,
                "merchantWalletAddress": MERCHANT,
            })
            .to_string(),
        ))
        .unwrap();
    let response = h.router().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = serde_json::from_slice(&to_bytes(response.into_body(), usize::MAX).await.unwrap()).unwrap();
    assert_eq!(body["success"], false);

    let seen = h.state.tickets.get_ticket(&ticket.id.to_string()).await?;
    assert_eq!(seen.status, TicketStatus::Active);
    assert!(seen.redemption_tx_signature.is_none());
    let coupon = h.state.coupons.get_coupon(&coupon.on_chain_address).await?;
    assert!(!coupon.is_redeemed);
    Ok(())
}

#[tokio::test]
async fn test_failed_join_records_no_participant() -> Result<(), Error> {
    let mut ledger = MockLedger::new();
    ledger.expect_create_group_deal().times(1).returning(|req| {
        assert_eq!(req.base_price, 100);
        Ok(GroupDealReceipt {
            signature: "sig-create".into(),
            group_deal: format!("deal-{}", req.deal_id),
        })
    });
    ledger
        .expect_join_group_deal()
        .withf(|req| req.quantity == 3)
        .times(1)
        .returning(|_| Err(Error::Ledger("Group deal full".into())));
    let h = TestHarness::with_ledger(Arc::new(ledger)).await?;
    let (promo, _) = h.seed_coupon(ALICE).await?;

    let deal = h
        .state
        .deals
        .create_group_deal(NewGroupDeal {
            promotion: promo.on_chain_address.clone(),
            wallet_address: MERCHANT.to_string(),
            title: "Seeded deal".into(),
            description: None,
            category: None,
            image_url: None,
            terms_and_conditions: Vec::new(),
            tiers: three_tier_schedule(),
            target_participants: 10,
            max_participants: 20,
            duration_days: 3,
        })
        .await?
        .deal;

    let err = h
        .state
        .deals
        .join_group_deal(&deal.on_chain_address, ALICE, 3)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Ledger(_)));

    let seen = h.state.deals.get_group_deal(&deal.on_chain_address).await?;
    assert_eq!(seen.current_participants, 0);
    assert!(seen.participants.is_empty());
    assert_eq!(seen.status, DealStatus::Active);
    Ok(())
}

#[tokio::test]
async fn test_failed_registration_records_no_merchant() -> Result<(), Error> {
    let mut ledger = MockLedger::new();
    ledger
        .expect_register_merchant()
        .withf(|req| req.authority == BOB && req.name == "Bakery")
        .times(1)
        .returning(|_| Err(Error::Ledger("insufficient funds".into())));
    let h = TestHarness::with_ledger(Arc::new(ledger)).await?;

    let err = h
        .state
        .merchants
        .register(NewMerchant {
            wallet_address: BOB.to_string(),
            name: "Bakery".into(),
            category: "food".into(),
            description: String::new(),
            latitude: None,
            longitude: None,
            address: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Ledger(_)));
    assert!(matches!(h.state.merchants.get_merchant(BOB).await, Err(Error::NotFound(_))));
    Ok(())
}

#[tokio::test]
async fn test_failed_bid_leaves_auction_untouched() -> Result<(), Error> {
    let mut ledger = MockLedger::new();
    ledger.expect_create_auction().times(1).returning(|req| {
        assert_eq!(req.auction_type, AuctionType::English);
        Ok(AuctionReceipt {
            signature: "sig-auction".into(),
            auction: format!("auction-{}", req.auction_id),
            end_time: START_EPOCH + req.duration_secs,
        })
    });
    ledger
        .expect_place_auction_bid()
        .withf(|req| req.bidder == BOB && req.amount == 150)
        .times(1)
        .returning(|_| Err(Error::Ledger("Bid too low".into())));
    let h = TestHarness::with_ledger(Arc::new(ledger)).await?;
    let (_, coupon) = h.seed_coupon(ALICE).await?;

    let auction = h
        .state
        .auctions
        .create_auction(NewAuction {
            coupon: coupon.on_chain_address.clone(),
            wallet_address: ALICE.to_string(),
            auction_type: AuctionType::English,
            starting_price: 100,
            reserve_price: None,
            min_bid_increment: Some(10),
            duration_secs: 3600,
            auto_extend: false,
        })
        .await?
        .auction;

    let err = h
        .state
        .auctions
        .place_bid(&auction.on_chain_address, BOB, 150)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Ledger(_)));

    let seen = h.state.auctions.get_auction(&auction.on_chain_address).await?;
    assert_eq!(seen.status, AuctionStatus::Active);
    assert_eq!(seen.total_bids, 0);
    assert!(seen.highest_bidder.is_none());
    assert!(seen.bids.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_health_degrades_when_ledger_is_down() -> Result<(), Error> {
    let mut ledger = MockLedger::new();
    ledger
        .expect_version()
        .returning(|| Err(Error::Ledger("connection refused".into())));
    let h = TestHarness::with_ledger(Arc::new(ledger)).await?;

    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let response = h.router().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body: Value = serde_json::from_slice(&to_bytes(response.into_body(), usize::MAX).await.unwrap()).unwrap();
    assert_eq!(body["data"]["status"], "degraded");
    assert_eq!(body["data"]["database"], "ok");
    Ok(())
}
