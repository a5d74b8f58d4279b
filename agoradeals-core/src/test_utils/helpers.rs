// File: agoradeals-core/src/test_utils/helpers.rs

use std::sync::Arc;
use axum::Router;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use agoradeals_common::models::{Coupon, DealTier, Merchant, Promotion, PromotionStats};
use agoradeals_common::traits::ledger_traits::LedgerService;
use agoradeals_common::traits::repository_traits::{
    CouponRepository, MerchantRepository, PromotionRepository,
};
use crate::api::{self, ApiState};
use crate::db::Database;
use crate::ledger::LocalLedger;
use crate::qr::DataUrlRenderer;
use crate::repositories::{
    SqliteCouponRepository, SqliteMerchantRepository, SqlitePromotionRepository,
};
use crate::services::merchant_service::NewMerchant;
use crate::services::promotion_service::NewPromotion;
use crate::utils::time::{from_epoch, ManualClock};
use crate::Error;

pub const MERCHANT: &str = "BfbvQP92h3HQ7a8h7gCnyRZPfkvUnEH9uW6VshgaFT9A";
pub const ALICE: &str = "3x9az88Dkbxa6tkKByxqEn7jBTJCJCD4dVvou49L24ET";
pub const BOB: &str = "9jLkNAaW9E47LQMHvjohy2uAAyr1331bAxgJKFRU7wF6";
pub const CARA: &str = "HZm2hbhb99WAJgkW7gxckXjRNngqfTh5N1fV2tfYS8PU";
pub const STRANGER: &str = "ALnBmwLeefY8VGXTJfjMnNHd4ypADFbtKxsEUgmVouEA";

/// 2025-06-01T12:00:00Z; every harness clock starts here.
pub const START_EPOCH: i64 = 1_748_779_200;

/// Fresh in-memory database with migrations applied.
pub async fn create_test_db() -> Result<Database, Error> {
    let db = Database::new(":memory:").await?;
    db.migrate().await?;
    Ok(db)
}

/// Three-step schedule: 100 at 0 joins, 84 from 20, 72 from 50.
pub fn three_tier_schedule() -> Vec<DealTier> {
    vec![
        DealTier { min_participants: 0, discount_percentage: 0, price_per_unit: 100 },
        DealTier { min_participants: 20, discount_percentage: 30, price_per_unit: 84 },
        DealTier { min_participants: 50, discount_percentage: 40, price_per_unit: 72 },
    ]
}

/// Everything a test needs: in-memory store, manual clock, a ledger and the
/// wired services.
pub struct TestHarness {
    pub db: Database,
    pub clock: Arc<ManualClock>,
    pub local_ledger: Option<Arc<LocalLedger>>,
    pub state: ApiState,
}

impl TestHarness {
    /// Harness backed by the in-process ledger.
    pub async fn new() -> Result<Self, Error> {
        let clock = Arc::new(ManualClock::new(from_epoch(START_EPOCH)));
        let ledger = Arc::new(LocalLedger::new(clock.clone()));
        let mut harness = Self::build(clock, ledger.clone()).await?;
        harness.local_ledger = Some(ledger);
        Ok(harness)
    }

    /// Harness around any ledger, e.g. a mock.
    pub async fn with_ledger(ledger: Arc<dyn LedgerService>) -> Result<Self, Error> {
        let clock = Arc::new(ManualClock::new(from_epoch(START_EPOCH)));
        Self::build(clock, ledger).await
    }

    async fn build(clock: Arc<ManualClock>, ledger: Arc<dyn LedgerService>) -> Result<Self, Error> {
        let db = create_test_db().await?;
        let state = ApiState::build(db.clone(), ledger, Arc::new(DataUrlRenderer), clock.clone());
        Ok(Self { db, clock, local_ledger: None, state })
    }

    pub fn router(&self) -> Router {
        api::router(self.state.clone())
    }

    pub fn now(&self) -> DateTime<Utc> {
        use crate::utils::time::Clock;
        self.clock.now()
    }

    /// Registers `wallet` as a merchant unless it already is one.
    pub async fn merchant(&self, wallet: &str) -> Result<Merchant, Error> {
        if let Ok(existing) = self.state.merchants.get_merchant(wallet).await {
            return Ok(existing);
        }
        self.state
            .merchants
            .register(NewMerchant {
                wallet_address: wallet.to_string(),
                name: "Corner Cafe".into(),
                category: "food".into(),
                description: "Coffee and pastries".into(),
                latitude: Some(40.7128),
                longitude: Some(-74.006),
                address: None,
            })
            .await
    }

    /// Creates a promotion through the ledger, valid for 30 days. The
    /// merchant is registered first when needed.
    pub async fn promotion(&self, merchant: &str, max_supply: i64) -> Result<Promotion, Error> {
        self.merchant(merchant).await?;
        self.state
            .promotions
            .create_promotion(NewPromotion {
                merchant: merchant.to_string(),
                title: "Two-for-one espresso".into(),
                description: "Any espresso drink".into(),
                category: "food".into(),
                discount_percentage: 50,
                max_supply,
                price: 100,
                original_price: Some(200),
                expires_at: self.now() + Duration::days(30),
                image_url: None,
            })
            .await
    }

    /// Promotion plus one coupon minted to `owner`.
    pub async fn coupon_for(&self, owner: &str) -> Result<(Promotion, Coupon), Error> {
        let promo = self.promotion(MERCHANT, 10).await?;
        let coupon = self.state.coupons.mint_coupon(&promo.on_chain_address, owner).await?;
        Ok((promo, coupon))
    }

    /// Writes a promotion and a coupon straight to the store, skipping the
    /// ledger. For tests whose ledger is a mock.
    pub async fn seed_coupon(&self, owner: &str) -> Result<(Promotion, Coupon), Error> {
        let now = self.now();
        let merchants = SqliteMerchantRepository::new(self.db.pool().clone());
        merchants
            .create_merchant(&Merchant {
                id: Uuid::new_v4(),
                wallet_address: MERCHANT.to_string(),
                on_chain_address: format!("merchant-{}", MERCHANT),
                name: "Seeded".into(),
                category: "food".into(),
                description: String::new(),
                location: None,
                total_coupons_created: 0,
                total_coupons_redeemed: 0,
                is_active: true,
                registration_tx_signature: "seeded".into(),
                created_at: now,
                updated_at: now,
            })
            .await?;

        let promo = Promotion {
            id: Uuid::new_v4(),
            on_chain_address: format!("promo-{}", Uuid::new_v4()),
            merchant: MERCHANT.to_string(),
            title: "Seeded".into(),
            description: String::new(),
            category: "food".into(),
            discount_percentage: 25,
            max_supply: 5,
            current_supply: 0,
            price: 100,
            original_price: None,
            expires_at: now + Duration::days(30),
            is_active: true,
            image_url: String::new(),
            stats: PromotionStats::default(),
            created_at: now,
            updated_at: now,
        };
        let promotions = SqlitePromotionRepository::new(self.db.pool().clone());
        promotions.create_promotion(&promo).await?;

        let coupon = Coupon {
            id: Uuid::new_v4(),
            on_chain_address: format!("coupon-{}", Uuid::new_v4()),
            coupon_id: 1,
            nft_mint: format!("mint-{}", Uuid::new_v4()),
            promotion: promo.on_chain_address.clone(),
            owner: owner.to_string(),
            merchant: MERCHANT.to_string(),
            discount_percentage: promo.discount_percentage,
            expires_at: promo.expires_at,
            is_redeemed: false,
            redeemed_at: None,
            redemption_code: None,
            is_listed: false,
            listing_price: None,
            auction: None,
            transfer_history: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        let coupons = SqliteCouponRepository::new(self.db.pool().clone());
        coupons.insert_minted_coupon(&coupon).await?;
        Ok((promo, coupon))
    }
}
