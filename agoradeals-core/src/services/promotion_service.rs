use std::sync::Arc;
use chrono::{DateTime, Utc};
use tracing::info;
use uuid::Uuid;

use agoradeals_common::{
    error::Error,
    models::{Promotion, PromotionStats},
    traits::ledger_traits::{CreatePromotionRequest, LedgerService},
    traits::repository_traits::{MerchantRepository, PromotionQuery, PromotionRepository},
};
use crate::utils::pagination::{Page, Pagination};
use crate::utils::time::Clock;
use crate::utils::validation::require_range;

#[derive(Debug, Clone)]
pub struct NewPromotion {
    pub merchant: String,
    pub title: String,
    pub description: String,
    pub category: String,
    pub discount_percentage: i64,
    pub max_supply: i64,
    pub price: i64,
    pub original_price: Option<i64>,
    pub expires_at: DateTime<Utc>,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct PromotionFilter {
    pub merchant: Option<String>,
    pub category: Option<String>,
}

pub struct PromotionService {
    promotions: Arc<dyn PromotionRepository>,
    merchants: Arc<dyn MerchantRepository>,
    ledger: Arc<dyn LedgerService>,
    clock: Arc<dyn Clock>,
}

impl PromotionService {
    pub fn new(
        promotions: Arc<dyn PromotionRepository>,
        merchants: Arc<dyn MerchantRepository>,
        ledger: Arc<dyn LedgerService>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { promotions, merchants, ledger, clock }
    }

    pub async fn create_promotion(&self, input: NewPromotion) -> Result<Promotion, Error> {
        let now = self.clock.now();
        require_range("discountPercentage", input.discount_percentage, 1, 100)?;
        require_range("maxSupply", input.max_supply, 1, i64::MAX)?;
        require_range("price", input.price, 0, i64::MAX)?;
        if input.expires_at <= now {
            return Err(Error::Validation("expiresAt must be in the future".into()));
        }
        match self.merchants.get_merchant(&input.merchant).await? {
            Some(m) if m.is_active && m.wallet_address == input.merchant => {}
            _ => return Err(Error::Forbidden("Merchant not registered".into())),
        }

        let receipt = self
            .ledger
            .create_promotion(&CreatePromotionRequest {
                merchant: input.merchant.clone(),
                title: input.title.clone(),
                category: input.category.clone(),
                discount_percentage: input.discount_percentage,
                max_supply: input.max_supply,
                price: input.price,
                expires_at: input.expires_at.timestamp(),
            })
            .await?;

        let promo = Promotion {
            id: Uuid::new_v4(),
            on_chain_address: receipt.promotion,
            merchant: input.merchant,
            title: input.title,
            description: input.description,
            category: input.category,
            discount_percentage: input.discount_percentage,
            max_supply: input.max_supply,
            current_supply: 0,
            price: input.price,
            original_price: input.original_price,
            expires_at: input.expires_at,
            is_active: true,
            image_url: input.image_url.unwrap_or_default(),
            stats: PromotionStats::default(),
            created_at: now,
            updated_at: now,
        };
        self.promotions.create_promotion(&promo).await?;

        info!(
            "Promotion {} created by {} (tx {})",
            promo.on_chain_address, promo.merchant, receipt.signature
        );
        Ok(promo)
    }

    pub async fn get_promotion(&self, key: &str) -> Result<Promotion, Error> {
        self.promotions
            .get_promotion(key)
            .await?
            .ok_or_else(|| Error::NotFound("Promotion not found".into()))
    }

    pub async fn list_promotions(
        &self,
        filter: PromotionFilter,
        page: Page,
    ) -> Result<(Vec<Promotion>, Pagination), Error> {
        let (items, total) = self
            .promotions
            .list_promotions(&PromotionQuery {
                merchant: filter.merchant,
                category: filter.category,
                limit: page.limit,
                offset: page.offset,
            })
            .await?;
        Ok((items, Pagination::new(page, total)))
    }
}
