use std::sync::Arc;
use chrono::Duration;
use rand::Rng;
use tracing::{info, warn};
use uuid::Uuid;

use agoradeals_common::{
    error::Error,
    models::group_deal::{resolve_tier, validate_tiers},
    models::{DealStatus, DealTier, GroupDeal},
    traits::ledger_traits::{
        CreateGroupDealRequest, FinalizeGroupDealRequest, JoinGroupDealRequest, LedgerService,
    },
    traits::repository_traits::{DealQuery, GroupDealRepository, NewParticipant, PromotionRepository},
};
use crate::ledger::local::MAX_DEAL_TIERS;
use crate::utils::locks::KeyedLocks;
use crate::utils::pagination::{Page, Pagination};
use crate::utils::time::Clock;

const SECONDS_PER_DAY: i64 = 86_400;

#[derive(Debug, Clone)]
pub struct NewGroupDeal {
    pub promotion: String,
    pub wallet_address: String,
    pub title: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub image_url: Option<String>,
    pub terms_and_conditions: Vec<String>,
    pub tiers: Vec<DealTier>,
    pub target_participants: i64,
    pub max_participants: i64,
    pub duration_days: i64,
}

#[derive(Debug, Clone)]
pub struct CreatedDeal {
    pub deal: GroupDeal,
    pub signature: String,
}

#[derive(Debug, Clone)]
pub struct JoinOutcome {
    pub signature: String,
    pub paid_amount: i64,
    pub price_per_unit: i64,
    pub tier_index: usize,
    pub current_participants: i64,
    pub status: DealStatus,
}

#[derive(Debug, Clone)]
pub struct FinalizedDeal {
    pub deal: GroupDeal,
    pub signature: String,
}

#[derive(Debug, Clone, Default)]
pub struct DealFilter {
    pub status: Option<DealStatus>,
    pub category: Option<String>,
    pub merchant_address: Option<String>,
}

/// Tiered group buying.
///
/// Counters are never stored; they are folded from the append-only join log.
/// Joins are serialized per deal and the append itself re-checks capacity,
/// so `current_participants` never exceeds `max_participants`.
pub struct GroupDealService {
    deals: Arc<dyn GroupDealRepository>,
    promotions: Arc<dyn PromotionRepository>,
    ledger: Arc<dyn LedgerService>,
    clock: Arc<dyn Clock>,
    locks: KeyedLocks,
}

impl GroupDealService {
    pub fn new(
        deals: Arc<dyn GroupDealRepository>,
        promotions: Arc<dyn PromotionRepository>,
        ledger: Arc<dyn LedgerService>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            deals,
            promotions,
            ledger,
            clock,
            locks: KeyedLocks::new(),
        }
    }

    pub async fn create_group_deal(&self, input: NewGroupDeal) -> Result<CreatedDeal, Error> {
        validate_tiers(&input.tiers)?;
        if input.tiers.len() > MAX_DEAL_TIERS {
            return Err(Error::Validation(format!("At most {} tiers are allowed", MAX_DEAL_TIERS)));
        }
        if input.target_participants < 1 {
            return Err(Error::Validation("targetParticipants must be at least 1".into()));
        }
        if input.max_participants < input.target_participants {
            return Err(Error::Validation(
                "maxParticipants must not be below targetParticipants".into(),
            ));
        }
        if input.duration_days <= 0 {
            return Err(Error::Validation("durationDays must be positive".into()));
        }

        let promo = self
            .promotions
            .get_promotion(&input.promotion)
            .await?
            .ok_or_else(|| Error::NotFound("Promotion not found".into()))?;
        if promo.merchant != input.wallet_address {
            return Err(Error::Forbidden("Only the promotion's merchant can create a group deal".into()));
        }

        let now = self.clock.now();
        let duration_secs = input.duration_days * SECONDS_PER_DAY;
        let deal_id: i64 = rand::rng().random_range(1..=i64::from(u32::MAX));

        let receipt = self
            .ledger
            .create_group_deal(&CreateGroupDealRequest {
                promotion: promo.on_chain_address.clone(),
                merchant: input.wallet_address.clone(),
                deal_id,
                target_participants: input.target_participants,
                max_participants: input.max_participants,
                base_price: input.tiers[0].price_per_unit,
                tiers: input.tiers.clone(),
                duration_secs,
            })
            .await?;

        let deal = GroupDeal {
            id: Uuid::new_v4(),
            on_chain_address: receipt.group_deal,
            promotion_address: promo.on_chain_address.clone(),
            merchant_address: input.wallet_address,
            title: input.title,
            description: input.description.unwrap_or_default(),
            category: input.category.unwrap_or_else(|| promo.category.clone()),
            tiers: input.tiers,
            target_participants: input.target_participants,
            max_participants: input.max_participants,
            participants: Vec::new(),
            current_participants: 0,
            total_revenue: 0,
            current_tier: 0,
            start_time: now,
            end_time: now + Duration::seconds(duration_secs),
            status: DealStatus::Active,
            is_active: true,
            is_successful: false,
            image_url: input.image_url,
            terms_and_conditions: input.terms_and_conditions,
            created_at: now,
            updated_at: now,
        };
        self.deals.create_group_deal(&deal).await?;

        info!(
            "Group deal {} created for promotion {} (target {}, max {})",
            deal.on_chain_address, deal.promotion_address, deal.target_participants, deal.max_participants
        );
        Ok(CreatedDeal { deal, signature: receipt.signature })
    }

    pub async fn join_group_deal(&self, key: &str, wallet: &str, quantity: i64) -> Result<JoinOutcome, Error> {
        if quantity < 1 {
            return Err(Error::Validation("quantity must be at least 1".into()));
        }
        let found = self.find(key).await?;
        let _guard = self.locks.lock(&found.id.to_string()).await;
        let deal = self.find(&found.id.to_string()).await?;

        let now = self.clock.now();
        if !deal.is_active {
            return Err(Error::Conflict("Group deal is not active".into()));
        }
        if deal.is_past_deadline(now) {
            return Err(Error::Conflict("Group deal has expired".into()));
        }
        if deal.current_participants + quantity > deal.max_participants {
            return Err(Error::Conflict(format!(
                "Not enough spots remaining ({} left)",
                deal.remaining_capacity()
            )));
        }

        let (tier_index, tier) = resolve_tier(&deal.tiers, deal.current_participants)
            .ok_or_else(|| Error::Conflict("Group deal has no price tiers".into()))?;
        let paid_amount = tier
            .price_per_unit
            .checked_mul(quantity)
            .ok_or_else(|| Error::Validation("quantity too large".into()))?;
        let price_per_unit = tier.price_per_unit;

        let settlement = self
            .ledger
            .join_group_deal(&JoinGroupDealRequest {
                group_deal: deal.on_chain_address.clone(),
                user: wallet.to_string(),
                quantity,
            })
            .await?;

        let appended = self
            .deals
            .append_participant(
                deal.id,
                &NewParticipant {
                    user_address: wallet.to_string(),
                    joined_at: now,
                    quantity,
                    paid_amount,
                    tx_signature: settlement.signature.clone(),
                },
            )
            .await?;
        if appended.is_none() {
            warn!(
                "Join on {} settled on the ledger but was rejected locally",
                deal.on_chain_address
            );
            return Err(Error::Conflict("Group deal is full".into()));
        }

        let current_participants = deal.current_participants + quantity;
        if current_participants >= deal.target_participants && deal.status == DealStatus::Active {
            if self.deals.mark_successful(deal.id, now).await? {
                info!("Group deal {} reached its target of {}", deal.on_chain_address, deal.target_participants);
            }
        }

        let updated = self.find(&deal.id.to_string()).await?;
        info!(
            "{} joined group deal {} x{} at {} per unit",
            wallet, deal.on_chain_address, quantity, price_per_unit
        );
        Ok(JoinOutcome {
            signature: settlement.signature,
            paid_amount,
            price_per_unit,
            tier_index,
            current_participants: updated.current_participants,
            status: updated.effective_status(now),
        })
    }

    pub async fn finalize_group_deal(&self, key: &str, wallet: &str) -> Result<FinalizedDeal, Error> {
        let found = self.find(key).await?;
        let _guard = self.locks.lock(&found.id.to_string()).await;
        let deal = self.find(&found.id.to_string()).await?;

        if deal.merchant_address != wallet {
            return Err(Error::Forbidden("Only the deal's merchant can finalize it".into()));
        }
        if !deal.is_active {
            return Err(Error::Conflict("Group deal already finalized".into()));
        }

        let settlement = self
            .ledger
            .finalize_group_deal(&FinalizeGroupDealRequest {
                group_deal: deal.on_chain_address.clone(),
                merchant: wallet.to_string(),
            })
            .await?;

        let outcome = if deal.target_reached() {
            DealStatus::Successful
        } else {
            DealStatus::Failed
        };
        let now = self.clock.now();
        if !self.deals.finalize_group_deal(deal.id, outcome, now).await? {
            return Err(Error::Conflict("Group deal already finalized".into()));
        }

        info!(
            "Group deal {} finalized as {} with {}/{} participants",
            deal.on_chain_address, outcome, deal.current_participants, deal.target_participants
        );
        Ok(FinalizedDeal {
            deal: self.find(&deal.id.to_string()).await?,
            signature: settlement.signature,
        })
    }

    pub async fn get_group_deal(&self, key: &str) -> Result<GroupDeal, Error> {
        let now = self.clock.now();
        Ok(self.find(key).await?.observed_at(now))
    }

    pub async fn list_group_deals(&self, filter: DealFilter, page: Page) -> Result<(Vec<GroupDeal>, Pagination), Error> {
        let (items, total) = self
            .deals
            .list_group_deals(&DealQuery {
                status: filter.status,
                category: filter.category,
                merchant_address: filter.merchant_address,
                now: self.clock.now(),
                limit: page.limit,
                offset: page.offset,
            })
            .await?;
        Ok((items, Pagination::new(page, total)))
    }

    async fn find(&self, key: &str) -> Result<GroupDeal, Error> {
        self.deals
            .get_group_deal(key)
            .await?
            .ok_or_else(|| Error::NotFound("Group deal not found".into()))
    }
}
