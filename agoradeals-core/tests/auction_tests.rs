// File: agoradeals-core/tests/auction_tests.rs

use chrono::Duration;

use agoradeals_common::models::{AuctionStatus, AuctionType, TicketStatus};
use agoradeals_core::services::auction_service::{AuctionFilter, NewAuction};
use agoradeals_core::services::redemption_ticket_service::{GenerateTicket, RedeemTicket};
use agoradeals_core::test_utils::{TestHarness, ALICE, BOB, CARA, MERCHANT};
use agoradeals_core::utils::pagination::Page;
use agoradeals_core::Error;

fn english(coupon: &str, seller: &str) -> NewAuction {
    NewAuction {
        coupon: coupon.to_string(),
        wallet_address: seller.to_string(),
        auction_type: AuctionType::English,
        starting_price: 100,
        reserve_price: None,
        min_bid_increment: Some(10),
        duration_secs: 3600,
        auto_extend: false,
    }
}

fn ticket_for(coupon: &str, wallet: &str) -> GenerateTicket {
    GenerateTicket {
        coupon: coupon.to_string(),
        wallet_address: wallet.to_string(),
        latitude: None,
        longitude: None,
    }
}

#[tokio::test]
async fn test_english_auction_moves_coupon_to_winner() -> Result<(), Error> {
    let h = TestHarness::new().await?;
    let (_, coupon) = h.coupon_for(ALICE).await?;
    let stale = h.state.tickets.generate_ticket(ticket_for(&coupon.on_chain_address, ALICE)).await?;

    let opened = h.state.auctions.create_auction(english(&coupon.on_chain_address, ALICE)).await?;
    let auction = opened.auction;
    assert_eq!(auction.status, AuctionStatus::Active);
    assert_eq!(auction.end_time, h.now() + Duration::seconds(3600));
    assert_eq!(auction.category, "food");

    // pinned coupon cannot be redeemed by the seller meanwhile
    let err = h
        .state
        .tickets
        .verify_and_redeem(RedeemTicket {
            ticket: stale.on_chain_address.clone(),
            ticket_hash: stale.ticket_hash.clone(),
            merchant_wallet_address: MERCHANT.to_string(),
            latitude: None,
            longitude: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Conflict(ref m) if m == "Coupon is up for auction"));

    h.clock.advance(Duration::seconds(60));
    let first = h.state.auctions.place_bid(&auction.on_chain_address, BOB, 110).await?;
    assert!(first.bid.is_winning);
    let second = h.state.auctions.place_bid(&auction.id.to_string(), CARA, 130).await?;
    assert!(second.bid.is_winning);
    assert_eq!(second.auction.total_bids, 2);
    assert_eq!(second.auction.highest_bidder.as_deref(), Some(CARA));

    let err = h.state.auctions.place_bid(&auction.on_chain_address, BOB, 135).await.unwrap_err();
    assert!(matches!(err, Error::Validation(ref m) if m == "Bid must be at least 140"));

    h.clock.advance(Duration::hours(1));
    let settled = h.state.auctions.settle_auction(&auction.on_chain_address, BOB).await?;
    assert_eq!(settled.auction.status, AuctionStatus::Settled);
    assert_eq!(settled.auction.winner.as_deref(), Some(CARA));
    assert_eq!(settled.auction.final_price, Some(130));
    assert_eq!(settled.auction.bids.len(), 2);
    assert!(settled.auction.bids.iter().any(|b| b.bidder_address == CARA && b.is_winning));

    let coupon = h.state.coupons.get_coupon(&coupon.on_chain_address).await?;
    assert_eq!(coupon.owner, CARA);
    assert!(coupon.auction.is_none());
    assert_eq!(coupon.transfer_history.last().map(|t| t.from.as_str()), Some(ALICE));

    let seen = h.state.tickets.get_ticket(&stale.on_chain_address).await?;
    assert_eq!(seen.status, TicketStatus::Cancelled);

    let err = h.state.auctions.settle_auction(&auction.on_chain_address, BOB).await.unwrap_err();
    assert!(matches!(err, Error::Conflict(ref m) if m == "Auction already settled"));
    Ok(())
}

#[tokio::test]
async fn test_pinned_coupon_cannot_move() -> Result<(), Error> {
    let h = TestHarness::new().await?;
    let (_, coupon) = h.coupon_for(ALICE).await?;
    h.state.auctions.create_auction(english(&coupon.on_chain_address, ALICE)).await?;

    let err = h
        .state
        .coupons
        .transfer_coupon(&coupon.on_chain_address, BOB, ALICE)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Conflict(ref m) if m == "Coupon is up for auction"));

    let err = h
        .state
        .coupons
        .list_for_sale(&coupon.on_chain_address, 90, ALICE)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));

    let err = h
        .state
        .tickets
        .generate_ticket(ticket_for(&coupon.on_chain_address, ALICE))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Conflict(ref m) if m == "Coupon is up for auction"));

    let err = h
        .state
        .auctions
        .create_auction(english(&coupon.on_chain_address, ALICE))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));
    Ok(())
}

#[tokio::test]
async fn test_create_rejects_bad_terms_and_non_owner() -> Result<(), Error> {
    let h = TestHarness::new().await?;
    let (_, coupon) = h.coupon_for(ALICE).await?;

    let err = h
        .state
        .auctions
        .create_auction(english(&coupon.on_chain_address, BOB))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Forbidden(_)));

    let err = h
        .state
        .auctions
        .create_auction(NewAuction { duration_secs: 60, ..english(&coupon.on_chain_address, ALICE) })
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    let err = h
        .state
        .auctions
        .create_auction(NewAuction {
            auction_type: AuctionType::Dutch,
            ..english(&coupon.on_chain_address, ALICE)
        })
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(ref m) if m.contains("reservePrice")));

    let err = h
        .state
        .auctions
        .create_auction(NewAuction { duration_secs: 604_801, ..english(&coupon.on_chain_address, ALICE) })
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    let longest = h
        .state
        .auctions
        .create_auction(NewAuction { duration_secs: 604_800, ..english(&coupon.on_chain_address, ALICE) })
        .await?;
    assert_eq!(longest.auction.end_time, h.now() + Duration::days(7));
    Ok(())
}

#[tokio::test]
async fn test_bidding_rules() -> Result<(), Error> {
    let h = TestHarness::new().await?;
    let (_, coupon) = h.coupon_for(ALICE).await?;
    let auction = h
        .state
        .auctions
        .create_auction(english(&coupon.on_chain_address, ALICE))
        .await?
        .auction;

    let err = h.state.auctions.place_bid(&auction.on_chain_address, ALICE, 200).await.unwrap_err();
    assert!(matches!(err, Error::Validation(ref m) if m == "Cannot bid on your own auction"));

    let err = h.state.auctions.place_bid(&auction.on_chain_address, BOB, 0).await.unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    let err = h.state.auctions.place_bid(&auction.on_chain_address, BOB, 105).await.unwrap_err();
    assert!(matches!(err, Error::Validation(ref m) if m == "Bid must be at least 110"));

    let err = h.state.auctions.place_bid("no-such-auction", BOB, 500).await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));

    h.clock.advance(Duration::seconds(3601));
    let err = h.state.auctions.place_bid(&auction.on_chain_address, BOB, 500).await.unwrap_err();
    assert!(matches!(err, Error::Conflict(ref m) if m == "Auction has ended"));
    assert_eq!(h.state.auctions.get_auction(&auction.on_chain_address).await?.status, AuctionStatus::Ended);
    Ok(())
}

#[tokio::test]
async fn test_late_bid_extends_end() -> Result<(), Error> {
    let h = TestHarness::new().await?;
    let (_, coupon) = h.coupon_for(ALICE).await?;
    let auction = h
        .state
        .auctions
        .create_auction(NewAuction {
            duration_secs: 600,
            auto_extend: true,
            ..english(&coupon.on_chain_address, ALICE)
        })
        .await?
        .auction;

    h.clock.advance(Duration::seconds(100));
    let early = h.state.auctions.place_bid(&auction.on_chain_address, BOB, 110).await?;
    assert_eq!(early.auction.end_time, auction.end_time);

    h.clock.advance(Duration::seconds(400));
    let late = h.state.auctions.place_bid(&auction.on_chain_address, CARA, 120).await?;
    assert_eq!(late.auction.end_time, auction.end_time + Duration::seconds(300));

    // the original deadline no longer closes it
    h.clock.advance(Duration::seconds(150));
    let err = h.state.auctions.settle_auction(&auction.on_chain_address, BOB).await.unwrap_err();
    assert!(matches!(err, Error::Conflict(ref m) if m == "Auction has not ended yet"));
    Ok(())
}

#[tokio::test]
async fn test_dutch_auction_is_bought_at_current_price() -> Result<(), Error> {
    let h = TestHarness::new().await?;
    let (_, coupon) = h.coupon_for(ALICE).await?;
    let auction = h
        .state
        .auctions
        .create_auction(NewAuction {
            auction_type: AuctionType::Dutch,
            starting_price: 200,
            reserve_price: Some(100),
            min_bid_increment: None,
            duration_secs: 1000,
            ..english(&coupon.on_chain_address, ALICE)
        })
        .await?
        .auction;
    assert_eq!(auction.min_bid_increment, 0);

    let err = h.state.auctions.place_bid(&auction.on_chain_address, BOB, 200).await.unwrap_err();
    assert!(matches!(err, Error::Validation(ref m) if m == "Dutch auctions are bought, not bid on"));

    h.clock.advance(Duration::seconds(500));
    let bought = h.state.auctions.buy_now(&auction.on_chain_address, BOB).await?;
    assert_eq!(bought.auction.status, AuctionStatus::Settled);
    assert_eq!(bought.auction.final_price, Some(150));
    assert_eq!(bought.auction.winner.as_deref(), Some(BOB));

    let coupon = h.state.coupons.get_coupon(&coupon.on_chain_address).await?;
    assert_eq!(coupon.owner, BOB);
    assert!(coupon.auction.is_none());

    let err = h.state.auctions.buy_now(&auction.on_chain_address, CARA).await.unwrap_err();
    assert!(matches!(err, Error::Conflict(ref m) if m == "Auction is not active"));
    Ok(())
}

#[tokio::test]
async fn test_sealed_bids_stay_blind_and_reserve_applies() -> Result<(), Error> {
    let h = TestHarness::new().await?;
    let (_, coupon) = h.coupon_for(ALICE).await?;
    let auction = h
        .state
        .auctions
        .create_auction(NewAuction {
            auction_type: AuctionType::SealedBid,
            starting_price: 50,
            reserve_price: Some(200),
            ..english(&coupon.on_chain_address, ALICE)
        })
        .await?
        .auction;

    let err = h.state.auctions.place_bid(&auction.on_chain_address, BOB, 40).await.unwrap_err();
    assert!(matches!(err, Error::Validation(ref m) if m == "Bid must be at least 50"));

    let bob = h.state.auctions.place_bid(&auction.on_chain_address, BOB, 90).await?;
    assert!(!bob.bid.is_winning);
    h.state.auctions.place_bid(&auction.on_chain_address, CARA, 80).await?;

    let seen = h.state.auctions.get_auction(&auction.on_chain_address).await?;
    assert_eq!(seen.total_bids, 2);
    assert_eq!(seen.current_bid, 0);
    assert!(seen.highest_bidder.is_none());
    assert!(seen.bids.iter().all(|b| b.amount == 0 && !b.is_winning));

    // nobody reached the reserve, so the coupon goes back to the seller
    h.clock.advance(Duration::hours(2));
    let closed = h.state.auctions.settle_auction(&auction.on_chain_address, CARA).await?;
    assert_eq!(closed.auction.status, AuctionStatus::Cancelled);
    assert!(closed.auction.winner.is_none());

    let coupon = h.state.coupons.get_coupon(&coupon.on_chain_address).await?;
    assert_eq!(coupon.owner, ALICE);
    assert!(coupon.auction.is_none());
    h.state.coupons.transfer_coupon(&coupon.on_chain_address, BOB, ALICE).await?;
    Ok(())
}

#[tokio::test]
async fn test_sealed_winner_revealed_on_settlement() -> Result<(), Error> {
    let h = TestHarness::new().await?;
    let (_, coupon) = h.coupon_for(ALICE).await?;
    let auction = h
        .state
        .auctions
        .create_auction(NewAuction {
            auction_type: AuctionType::SealedBid,
            starting_price: 50,
            reserve_price: Some(60),
            ..english(&coupon.on_chain_address, ALICE)
        })
        .await?
        .auction;

    h.state.auctions.place_bid(&auction.on_chain_address, BOB, 90).await?;
    h.state.auctions.place_bid(&auction.on_chain_address, CARA, 90).await?;

    h.clock.advance(Duration::hours(2));
    let settled = h.state.auctions.settle_auction(&auction.on_chain_address, MERCHANT).await?;
    assert_eq!(settled.auction.winner.as_deref(), Some(BOB));
    assert_eq!(settled.auction.final_price, Some(90));
    let winning: Vec<_> = settled.auction.bids.iter().filter(|b| b.is_winning).collect();
    assert_eq!(winning.len(), 1);
    assert_eq!(winning[0].bidder_address, BOB);
    Ok(())
}

#[tokio::test]
async fn test_cancel_only_without_bids() -> Result<(), Error> {
    let h = TestHarness::new().await?;
    let (_, first) = h.coupon_for(ALICE).await?;
    let (_, second) = h.coupon_for(ALICE).await?;

    let quiet = h.state.auctions.create_auction(english(&first.on_chain_address, ALICE)).await?.auction;
    let err = h.state.auctions.cancel_auction(&quiet.on_chain_address, BOB).await.unwrap_err();
    assert!(matches!(err, Error::Forbidden(_)));

    let cancelled = h.state.auctions.cancel_auction(&quiet.on_chain_address, ALICE).await?;
    assert_eq!(cancelled.auction.status, AuctionStatus::Cancelled);
    assert!(h.state.coupons.get_coupon(&first.on_chain_address).await?.auction.is_none());

    let busy = h.state.auctions.create_auction(english(&second.on_chain_address, ALICE)).await?.auction;
    h.state.auctions.place_bid(&busy.on_chain_address, BOB, 110).await?;
    let err = h.state.auctions.cancel_auction(&busy.on_chain_address, ALICE).await.unwrap_err();
    assert!(matches!(err, Error::Conflict(ref m) if m == "Cannot cancel an auction with bids"));

    let (active, _) = h
        .state
        .auctions
        .list_auctions(AuctionFilter { status: Some(AuctionStatus::Active), ..Default::default() }, Page::default())
        .await?;
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, busy.id);

    let (mine, pagination) = h
        .state
        .auctions
        .list_auctions(
            AuctionFilter { seller_address: Some(ALICE.to_string()), ..Default::default() },
            Page::default(),
        )
        .await?;
    assert_eq!(mine.len(), 2);
    assert_eq!(pagination.total, 2);
    Ok(())
}
