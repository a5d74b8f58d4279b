// File: agoradeals-core/tests/api_tests.rs

use axum::body::{to_bytes, Body};
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use chrono::Duration;
use serde_json::{json, Value};
use tower::ServiceExt;

use agoradeals_core::test_utils::{three_tier_schedule, TestHarness, ALICE, BOB, CARA, MERCHANT};
use agoradeals_core::Error;

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>, wallet: Option<&str>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(w) = wallet {
        builder = builder.header("x-wallet-address", w);
    }
    let request = match body {
        Some(b) => builder
            .header("content-type", "application/json")
            .body(Body::from(b.to_string())),
        None => builder.body(Body::empty()),
    }
    .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
    (status, value)
}

#[tokio::test]
async fn test_health_reports_store_and_ledger() -> Result<(), Error> {
    let h = TestHarness::new().await?;
    let (status, body) = send(&h.router(), Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["database"], "ok");
    assert!(body["data"]["ledger"].as_str().unwrap().starts_with("local-ledger/"));
    Ok(())
}

#[tokio::test]
async fn test_create_promotion_envelope() -> Result<(), Error> {
    let h = TestHarness::new().await?;
    let app = h.router();
    let expires = (h.now() + Duration::days(7)).to_rfc3339();
    let promotion = json!({
        "walletAddress": MERCHANT,
        "title": "Free refill",
        "category": "food",
        "discountPercentage": 20,
        "maxSupply": 50,
        "price": 0,
        "expiresAt": expires,
    });

    let (status, body) = send(&app, Method::POST, "/api/v1/promotions", Some(promotion.clone()), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Merchant not registered");

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/merchants/register",
        Some(json!({ "name": "Corner Cafe", "category": "food", "latitude": 40.7, "longitude": -74.0 })),
        Some(MERCHANT),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["walletAddress"], MERCHANT);
    assert_eq!(body["data"]["location"]["latitude"], 40.7);

    let (status, body) = send(&app, Method::POST, "/api/v1/promotions", Some(promotion), None).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["merchant"], MERCHANT);
    assert_eq!(body["data"]["maxSupply"], 50);

    let id = body["data"]["id"].as_str().unwrap().to_string();
    let (status, body) = send(&app, Method::GET, &format!("/api/v1/promotions/{}", id), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["title"], "Free refill");

    let (status, body) = send(&app, Method::GET, "/api/v1/promotions?page=1&limit=10", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pagination"]["total"], 1);
    assert_eq!(body["pagination"]["limit"], 10);
    Ok(())
}

#[tokio::test]
async fn test_missing_field_and_bad_wallet_are_400() -> Result<(), Error> {
    let h = TestHarness::new().await?;
    let app = h.router();

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/redemption-tickets/generate",
        Some(json!({ "walletAddress": ALICE })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("couponId"));

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/redemption-tickets/generate",
        Some(json!({ "couponId": "abc", "walletAddress": "not a wallet" })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    let (status, _) = send(&app, Method::POST, "/api/v1/group-deals/create", None, Some(MERCHANT)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, Method::GET, "/api/v1/redemption-tickets/user/0OIl", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn test_unknown_entities_are_404() -> Result<(), Error> {
    let h = TestHarness::new().await?;
    let app = h.router();

    for uri in [
        "/api/v1/redemption-tickets/does-not-exist",
        "/api/v1/group-deals/does-not-exist",
        "/api/v1/coupons/does-not-exist",
        "/api/v1/promotions/does-not-exist",
        "/api/v1/merchants/does-not-exist",
        "/api/v1/auctions/does-not-exist",
    ] {
        let (status, body) = send(&app, Method::GET, uri, None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{}", uri);
        assert_eq!(body["success"], false);
    }
    Ok(())
}

#[tokio::test]
async fn test_ticket_flow_over_http() -> Result<(), Error> {
    let h = TestHarness::new().await?;
    let app = h.router();
    let (_, coupon) = h.coupon_for(ALICE).await?;

    // wallet comes from the header when the body omits it
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/redemption-tickets/generate",
        Some(json!({ "couponId": coupon.on_chain_address, "latitude": 51.5, "longitude": -0.12 })),
        Some(ALICE),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let data = &body["data"];
    let ticket_id = data["ticketId"].as_str().unwrap().to_string();
    let ticket_hash = data["ticketHash"].as_str().unwrap().to_string();
    assert!(data["qrDataUrl"].as_str().unwrap().starts_with("data:application/json;base64,"));
    assert!(data["qrData"].is_string());
    assert!(data["signature"].is_string());

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/v1/redemption-tickets/verify-and-redeem",
        Some(json!({ "ticketId": ticket_id, "ticketHash": ticket_hash, "merchantWalletAddress": BOB })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/redemption-tickets/verify-and-redeem",
        Some(json!({ "ticketId": ticket_id, "ticketHash": ticket_hash, "merchantWalletAddress": MERCHANT })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "consumed");
    assert_eq!(body["data"]["couponAddress"], coupon.on_chain_address.as_str());

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/redemption-tickets/verify-and-redeem",
        Some(json!({ "ticketId": ticket_id, "ticketHash": ticket_hash, "merchantWalletAddress": MERCHANT })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Ticket already consumed");

    let (status, body) = send(
        &app,
        Method::GET,
        &format!("/api/v1/redemption-tickets/merchant/{}?status=consumed", MERCHANT),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let (status, _) = send(
        &app,
        Method::GET,
        &format!("/api/v1/redemption-tickets/user/{}?status=bogus", ALICE),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn test_group_deal_over_http() -> Result<(), Error> {
    let h = TestHarness::new().await?;
    let app = h.router();
    let promo = h.promotion(MERCHANT, 100).await?;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/group-deals/create",
        Some(json!({
            "promotionId": promo.on_chain_address,
            "title": "Office breakfast",
            "tiers": three_tier_schedule(),
            "targetParticipants": 20,
            "maxParticipants": 40,
            "durationDays": 2,
        })),
        Some(MERCHANT),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let deal_address = body["data"]["dealAddress"].as_str().unwrap().to_string();
    assert_eq!(body["data"]["currentParticipants"], 0);

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/api/v1/group-deals/{}/join", deal_address),
        Some(json!({ "walletAddress": ALICE })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["paidAmount"], 100);
    assert_eq!(body["data"]["currentParticipants"], 1);

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/api/v1/group-deals/{}/join", deal_address),
        Some(json!({ "walletAddress": BOB, "quantity": 19 })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "successful");

    let (status, _) = send(
        &app,
        Method::POST,
        &format!("/api/v1/group-deals/{}/finalize", deal_address),
        None,
        Some(ALICE),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/api/v1/group-deals/{}/finalize", deal_address),
        None,
        Some(MERCHANT),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["isSuccessful"], true);

    let (status, body) = send(&app, Method::GET, &format!("/api/v1/group-deals/{}", deal_address), None, None).await;
    assert_eq!(status, StatusCode::OK);
    // both joins priced at the base tier: the count before each join was below 20
    assert_eq!(body["data"]["totalRevenue"], 2000);
    assert_eq!(body["data"]["participants"].as_array().unwrap().len(), 2);

    let (status, body) = send(&app, Method::GET, "/api/v1/group-deals?status=successful&limit=5", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pagination"]["total"], 1);
    Ok(())
}

#[tokio::test]
async fn test_merchant_directory_over_http() -> Result<(), Error> {
    let h = TestHarness::new().await?;
    let app = h.router();

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/v1/merchants/register",
        Some(json!({ "walletAddress": MERCHANT, "name": "Corner Cafe", "category": "food" })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/merchants/register",
        Some(json!({ "walletAddress": MERCHANT, "name": "Corner Cafe", "category": "food" })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Merchant already registered");

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/v1/merchants/register",
        Some(json!({ "walletAddress": BOB, "name": "Book Nook", "category": "books", "latitude": 12.0 })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(&app, Method::GET, &format!("/api/v1/merchants/{}", MERCHANT), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], "Corner Cafe");
    assert_eq!(body["data"]["totalCouponsCreated"], 0);

    let (status, body) = send(&app, Method::GET, "/api/v1/merchants?category=food&search=cafe", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pagination"]["total"], 1);
    Ok(())
}

#[tokio::test]
async fn test_auction_over_http() -> Result<(), Error> {
    let h = TestHarness::new().await?;
    let app = h.router();
    let (_, coupon) = h.coupon_for(ALICE).await?;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/auctions/create",
        Some(json!({
            "couponId": coupon.on_chain_address,
            "auctionType": "english",
            "startingPrice": 100,
            "minBidIncrement": 10,
            "durationSecs": 3600,
        })),
        Some(ALICE),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let auction_id = body["data"]["auctionId"].as_str().unwrap().to_string();
    assert_eq!(body["data"]["reservePrice"], 100);

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/api/v1/auctions/{}/bid", auction_id),
        Some(json!({ "amount": 105 })),
        Some(BOB),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Bid must be at least 110");

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/api/v1/auctions/{}/bid", auction_id),
        Some(json!({ "amount": 120 })),
        Some(BOB),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["isWinning"], true);
    assert_eq!(body["data"]["totalBids"], 1);

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/api/v1/auctions/{}/settle", auction_id),
        Some(json!({})),
        Some(CARA),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Auction has not ended yet");

    h.clock.advance(Duration::hours(2));
    let (status, body) = send(&app, Method::GET, "/api/v1/auctions?status=ended&type=english", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pagination"]["total"], 1);

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/api/v1/auctions/{}/settle", auction_id),
        Some(json!({})),
        Some(CARA),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "settled");
    assert_eq!(body["data"]["winner"], BOB);
    assert_eq!(body["data"]["finalPrice"], 120);

    let (status, body) = send(&app, Method::GET, &format!("/api/v1/coupons/{}", coupon.on_chain_address), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["owner"], BOB);

    let (status, _) = send(&app, Method::GET, "/api/v1/auctions?type=vickrey", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    Ok(())
}
