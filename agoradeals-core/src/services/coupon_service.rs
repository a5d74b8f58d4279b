use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use agoradeals_common::{
    error::Error,
    models::{Coupon, TransferRecord},
    traits::ledger_traits::{
        BuyListingRequest, CancelListingRequest, LedgerService, ListCouponRequest,
        MintCouponRequest, TransferCouponRequest,
    },
    traits::repository_traits::{CouponQuery, CouponRepository, PromotionRepository},
};
use crate::utils::locks::KeyedLocks;
use crate::utils::pagination::{Page, Pagination};
use crate::utils::time::Clock;

#[derive(Debug, Clone, Default)]
pub struct CouponFilter {
    pub owner: Option<String>,
    pub promotion: Option<String>,
    pub listed_only: bool,
}

/// Result of putting a coupon up for sale.
#[derive(Debug, Clone)]
pub struct Listing {
    pub coupon: Coupon,
    pub listing_address: String,
    pub signature: String,
}

/// Minting, ownership transfer and the secondary marketplace.
pub struct CouponService {
    coupons: Arc<dyn CouponRepository>,
    promotions: Arc<dyn PromotionRepository>,
    ledger: Arc<dyn LedgerService>,
    clock: Arc<dyn Clock>,
    locks: KeyedLocks,
}

impl CouponService {
    pub fn new(
        coupons: Arc<dyn CouponRepository>,
        promotions: Arc<dyn PromotionRepository>,
        ledger: Arc<dyn LedgerService>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            coupons,
            promotions,
            ledger,
            clock,
            locks: KeyedLocks::new(),
        }
    }

    pub async fn get_coupon(&self, key: &str) -> Result<Coupon, Error> {
        self.coupons
            .get_coupon(key)
            .await?
            .ok_or_else(|| Error::NotFound("Coupon not found".into()))
    }

    pub async fn list_coupons(&self, filter: CouponFilter, page: Page) -> Result<(Vec<Coupon>, Pagination), Error> {
        let (items, total) = self
            .coupons
            .list_coupons(&CouponQuery {
                owner: filter.owner,
                promotion: filter.promotion,
                listed_only: filter.listed_only,
                limit: page.limit,
                offset: page.offset,
            })
            .await?;
        Ok((items, Pagination::new(page, total)))
    }

    pub async fn mint_coupon(&self, promotion_key: &str, recipient: &str) -> Result<Coupon, Error> {
        let promo = self
            .promotions
            .get_promotion(promotion_key)
            .await?
            .ok_or_else(|| Error::NotFound("Promotion not found".into()))?;

        // coupon ids are allocated from the supply counter
        let _guard = self.locks.lock(&promo.on_chain_address).await;
        let promo = self
            .promotions
            .get_promotion(&promo.on_chain_address)
            .await?
            .ok_or_else(|| Error::NotFound("Promotion not found".into()))?;

        let now = self.clock.now();
        if !promo.is_active {
            return Err(Error::Conflict("Promotion is not active".into()));
        }
        if promo.is_expired(now) {
            return Err(Error::Conflict("Promotion has expired".into()));
        }
        if promo.is_sold_out() {
            return Err(Error::Conflict("Promotion is sold out".into()));
        }

        let coupon_id = promo.current_supply + 1;
        let receipt = self
            .ledger
            .mint_coupon(&MintCouponRequest {
                promotion: promo.on_chain_address.clone(),
                recipient: recipient.to_string(),
                merchant: promo.merchant.clone(),
                coupon_id,
            })
            .await?;

        let coupon = Coupon {
            id: Uuid::new_v4(),
            on_chain_address: receipt.coupon,
            coupon_id,
            nft_mint: receipt.mint,
            promotion: promo.on_chain_address.clone(),
            owner: recipient.to_string(),
            merchant: promo.merchant.clone(),
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
        if !self.coupons.insert_minted_coupon(&coupon).await? {
            warn!(
                "Ledger minted {} but local supply for {} is exhausted",
                coupon.on_chain_address, promo.on_chain_address
            );
            return Err(Error::Conflict("Promotion is sold out".into()));
        }

        info!(
            "Minted coupon #{} of {} to {} (tx {})",
            coupon_id, promo.on_chain_address, recipient, receipt.signature
        );
        Ok(coupon)
    }

    pub async fn transfer_coupon(&self, key: &str, recipient: &str, wallet: &str) -> Result<Coupon, Error> {
        let coupon = self.get_coupon(key).await?;
        coupon.ensure_owner(wallet)?;
        coupon.ensure_not_redeemed("Cannot transfer redeemed coupon")?;
        coupon.ensure_not_in_auction()?;
        if recipient == wallet {
            return Err(Error::Validation("Cannot transfer coupon to yourself".into()));
        }

        let settlement = self
            .ledger
            .transfer_coupon(&TransferCouponRequest {
                coupon: coupon.on_chain_address.clone(),
                from: wallet.to_string(),
                to: recipient.to_string(),
            })
            .await?;

        let record = TransferRecord {
            from: wallet.to_string(),
            to: recipient.to_string(),
            timestamp: self.clock.now(),
            transaction_signature: settlement.signature,
        };
        if !self.coupons.transfer_coupon(coupon.id, &record).await? {
            return Err(Error::Conflict("Coupon changed hands during transfer".into()));
        }

        info!("Coupon {} transferred {} -> {}", coupon.on_chain_address, wallet, recipient);
        self.get_coupon(&coupon.id.to_string()).await
    }

    pub async fn list_for_sale(&self, key: &str, price: i64, wallet: &str) -> Result<Listing, Error> {
        if price < 0 {
            return Err(Error::Validation("price must not be negative".into()));
        }
        let coupon = self.get_coupon(key).await?;
        coupon.ensure_owner(wallet)?;
        coupon.ensure_not_redeemed("Cannot list redeemed coupon")?;
        coupon.ensure_not_in_auction()?;
        if coupon.is_listed {
            return Err(Error::Conflict("Coupon is already listed".into()));
        }

        let receipt = self
            .ledger
            .list_coupon_for_sale(&ListCouponRequest {
                coupon: coupon.on_chain_address.clone(),
                seller: wallet.to_string(),
                price,
            })
            .await?;

        if !self.coupons.set_listing(coupon.id, Some(price), self.clock.now()).await? {
            return Err(Error::Conflict("Coupon can no longer be listed".into()));
        }
        info!("Coupon {} listed by {} for {}", coupon.on_chain_address, wallet, price);

        Ok(Listing {
            coupon: self.get_coupon(&coupon.id.to_string()).await?,
            listing_address: receipt.listing,
            signature: receipt.signature,
        })
    }

    pub async fn cancel_listing(&self, key: &str, wallet: &str) -> Result<Coupon, Error> {
        let coupon = self.get_coupon(key).await?;
        coupon.ensure_owner(wallet)?;
        if !coupon.is_listed {
            return Err(Error::Conflict("Coupon is not listed".into()));
        }

        self.ledger
            .cancel_listing(&CancelListingRequest {
                coupon: coupon.on_chain_address.clone(),
                seller: wallet.to_string(),
            })
            .await?;

        self.coupons.set_listing(coupon.id, None, self.clock.now()).await?;
        info!("Listing for coupon {} cancelled", coupon.on_chain_address);
        self.get_coupon(&coupon.id.to_string()).await
    }

    pub async fn buy_coupon(&self, key: &str, buyer: &str) -> Result<Coupon, Error> {
        let coupon = self.get_coupon(key).await?;
        let price = match (coupon.is_listed, coupon.listing_price) {
            (true, Some(p)) => p,
            _ => return Err(Error::Conflict("Coupon is not listed for sale".into())),
        };
        coupon.ensure_not_redeemed("Cannot buy redeemed coupon")?;
        if coupon.owner == buyer {
            return Err(Error::Validation("Cannot buy your own coupon".into()));
        }

        let settlement = self
            .ledger
            .buy_listing(&BuyListingRequest {
                coupon: coupon.on_chain_address.clone(),
                seller: coupon.owner.clone(),
                buyer: buyer.to_string(),
                price,
            })
            .await?;

        let record = TransferRecord {
            from: coupon.owner.clone(),
            to: buyer.to_string(),
            timestamp: self.clock.now(),
            transaction_signature: settlement.signature,
        };
        if !self.coupons.transfer_coupon(coupon.id, &record).await? {
            return Err(Error::Conflict("Coupon changed hands during purchase".into()));
        }

        info!("Coupon {} bought by {} for {}", coupon.on_chain_address, buyer, price);
        self.get_coupon(&coupon.id.to_string()).await
    }
}
