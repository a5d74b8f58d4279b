// File: agoradeals-core/tests/merchant_tests.rs

use chrono::Duration;

use agoradeals_core::services::merchant_service::{MerchantFilter, NewMerchant};
use agoradeals_core::services::promotion_service::NewPromotion;
use agoradeals_core::services::redemption_ticket_service::{GenerateTicket, RedeemTicket};
use agoradeals_core::test_utils::{TestHarness, ALICE, BOB, MERCHANT, STRANGER};
use agoradeals_core::utils::pagination::Page;
use agoradeals_core::Error;

fn bakery(wallet: &str) -> NewMerchant {
    NewMerchant {
        wallet_address: wallet.to_string(),
        name: "Rye & Crumb".into(),
        category: "bakery".into(),
        description: "Sourdough every morning".into(),
        latitude: None,
        longitude: None,
        address: None,
    }
}

#[tokio::test]
async fn test_register_and_lookup() -> Result<(), Error> {
    let h = TestHarness::new().await?;
    let merchant = h
        .state
        .merchants
        .register(NewMerchant {
            latitude: Some(48.8566),
            longitude: Some(2.3522),
            address: Some("12 Rue de Rivoli".into()),
            ..bakery(BOB)
        })
        .await?;
    assert!(merchant.is_active);
    assert_eq!(merchant.total_coupons_created, 0);
    assert!(!merchant.on_chain_address.is_empty());

    for key in [merchant.id.to_string(), merchant.on_chain_address.clone(), BOB.to_string()] {
        let seen = h.state.merchants.get_merchant(&key).await?;
        assert_eq!(seen.id, merchant.id);
        assert_eq!(seen.location.as_ref().and_then(|l| l.address.as_deref()), Some("12 Rue de Rivoli"));
    }

    let err = h.state.merchants.register(bakery(BOB)).await.unwrap_err();
    assert!(matches!(err, Error::Conflict(ref m) if m == "Merchant already registered"));

    let err = h.state.merchants.get_merchant(STRANGER).await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
    Ok(())
}

#[tokio::test]
async fn test_register_validates_profile() -> Result<(), Error> {
    let h = TestHarness::new().await?;

    let err = h
        .state
        .merchants
        .register(NewMerchant { name: "x".repeat(51), ..bakery(BOB) })
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    let err = h
        .state
        .merchants
        .register(NewMerchant { latitude: Some(10.0), ..bakery(BOB) })
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    // nothing was written by the rejected attempts
    assert!(h.state.merchants.register(bakery(BOB)).await.is_ok());
    Ok(())
}

#[tokio::test]
async fn test_promotion_requires_registration() -> Result<(), Error> {
    let h = TestHarness::new().await?;
    let input = NewPromotion {
        merchant: BOB.to_string(),
        title: "Half-price loaf".into(),
        description: String::new(),
        category: "bakery".into(),
        discount_percentage: 50,
        max_supply: 10,
        price: 0,
        original_price: None,
        expires_at: h.now() + Duration::days(3),
        image_url: None,
    };

    let err = h.state.promotions.create_promotion(input.clone()).await.unwrap_err();
    assert!(matches!(err, Error::Forbidden(ref m) if m == "Merchant not registered"));

    h.state.merchants.register(bakery(BOB)).await?;
    let promo = h.state.promotions.create_promotion(input).await?;
    assert_eq!(promo.merchant, BOB);
    Ok(())
}

#[tokio::test]
async fn test_counters_follow_mint_and_redemption() -> Result<(), Error> {
    let h = TestHarness::new().await?;
    let (_, coupon) = h.coupon_for(ALICE).await?;
    h.state.coupons.mint_coupon(&coupon.promotion, BOB).await?;

    let merchant = h.state.merchants.get_merchant(MERCHANT).await?;
    assert_eq!(merchant.total_coupons_created, 2);
    assert_eq!(merchant.total_coupons_redeemed, 0);

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
    h.state
        .tickets
        .verify_and_redeem(RedeemTicket {
            ticket: ticket.on_chain_address.clone(),
            ticket_hash: ticket.ticket_hash.clone(),
            merchant_wallet_address: MERCHANT.to_string(),
            latitude: None,
            longitude: None,
        })
        .await?;

    let merchant = h.state.merchants.get_merchant(MERCHANT).await?;
    assert_eq!(merchant.total_coupons_redeemed, 1);
    Ok(())
}

#[tokio::test]
async fn test_directory_filters_by_category_and_search() -> Result<(), Error> {
    let h = TestHarness::new().await?;
    h.merchant(MERCHANT).await?;
    h.state.merchants.register(bakery(BOB)).await?;
    h.state
        .merchants
        .register(NewMerchant {
            name: "Night Owl Books".into(),
            category: "books".into(),
            description: "Open late".into(),
            ..bakery(STRANGER)
        })
        .await?;

    let (all, pagination) = h.state.merchants.list_merchants(MerchantFilter::default(), Page::default()).await?;
    assert_eq!(all.len(), 3);
    assert_eq!(pagination.total, 3);

    let (bakeries, _) = h
        .state
        .merchants
        .list_merchants(MerchantFilter { category: Some("bakery".into()), search: None }, Page::default())
        .await?;
    assert_eq!(bakeries.len(), 1);
    assert_eq!(bakeries[0].wallet_address, BOB);

    let (late, _) = h
        .state
        .merchants
        .list_merchants(MerchantFilter { category: None, search: Some("late".into()) }, Page::default())
        .await?;
    assert_eq!(late.len(), 1);
    assert_eq!(late[0].name, "Night Owl Books");
    Ok(())
}
