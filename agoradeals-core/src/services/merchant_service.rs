use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use agoradeals_common::{
    error::Error,
    models::merchant::validate_merchant_profile,
    models::{Merchant, MerchantLocation},
    traits::ledger_traits::{LedgerService, RegisterMerchantRequest},
    traits::repository_traits::{MerchantQuery, MerchantRepository},
};
use crate::utils::locks::KeyedLocks;
use crate::utils::pagination::{Page, Pagination};
use crate::utils::time::Clock;

#[derive(Debug, Clone)]
pub struct NewMerchant {
    pub wallet_address: String,
    pub name: String,
    pub category: String,
    pub description: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub address: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct MerchantFilter {
    pub category: Option<String>,
    pub search: Option<String>,
}

pub struct MerchantService {
    merchants: Arc<dyn MerchantRepository>,
    ledger: Arc<dyn LedgerService>,
    clock: Arc<dyn Clock>,
    locks: KeyedLocks,
}

impl MerchantService {
    pub fn new(
        merchants: Arc<dyn MerchantRepository>,
        ledger: Arc<dyn LedgerService>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { merchants, ledger, clock, locks: KeyedLocks::new() }
    }

    /// One registration per wallet.
    pub async fn register(&self, input: NewMerchant) -> Result<Merchant, Error> {
        validate_merchant_profile(&input.name, &input.category)?;
        let location = MerchantLocation::from_coords(input.latitude, input.longitude, input.address)?;

        let _guard = self.locks.lock(&format!("merchant:{}", input.wallet_address)).await;
        if self.merchants.get_merchant(&input.wallet_address).await?.is_some() {
            return Err(Error::Conflict("Merchant already registered".into()));
        }

        let receipt = self
            .ledger
            .register_merchant(&RegisterMerchantRequest {
                authority: input.wallet_address.clone(),
                name: input.name.clone(),
                category: input.category.clone(),
                latitude: location.as_ref().map(|l| l.latitude),
                longitude: location.as_ref().map(|l| l.longitude),
            })
            .await?;

        let now = self.clock.now();
        let merchant = Merchant {
            id: Uuid::new_v4(),
            wallet_address: input.wallet_address,
            on_chain_address: receipt.merchant,
            name: input.name,
            category: input.category,
            description: input.description,
            location,
            total_coupons_created: 0,
            total_coupons_redeemed: 0,
            is_active: true,
            registration_tx_signature: receipt.signature,
            created_at: now,
            updated_at: now,
        };
        if !self.merchants.create_merchant(&merchant).await? {
            return Err(Error::Conflict("Merchant already registered".into()));
        }

        info!(
            "Merchant {} registered as {} (tx {})",
            merchant.wallet_address, merchant.on_chain_address, merchant.registration_tx_signature
        );
        Ok(merchant)
    }

    /// By local id, ledger address or wallet address.
    pub async fn get_merchant(&self, key: &str) -> Result<Merchant, Error> {
        self.merchants
            .get_merchant(key)
            .await?
            .ok_or_else(|| Error::NotFound("Merchant not found".into()))
    }

    pub async fn list_merchants(
        &self,
        filter: MerchantFilter,
        page: Page,
    ) -> Result<(Vec<Merchant>, Pagination), Error> {
        let (items, total) = self
            .merchants
            .list_merchants(&MerchantQuery {
                category: filter.category,
                search: filter.search,
                limit: page.limit,
                offset: page.offset,
            })
            .await?;
        Ok((items, Pagination::new(page, total)))
    }
}
