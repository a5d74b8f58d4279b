// File: agoradeals-common/src/models/group_deal.rs

use std::fmt;
use std::str::FromStr;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DealStatus {
    Pending,
    Active,
    Successful,
    Failed,
    Expired,
    Cancelled,
}

impl DealStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DealStatus::Pending => "pending",
            DealStatus::Active => "active",
            DealStatus::Successful => "successful",
            DealStatus::Failed => "failed",
            DealStatus::Expired => "expired",
            DealStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for DealStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DealStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(DealStatus::Pending),
            "active" => Ok(DealStatus::Active),
            "successful" => Ok(DealStatus::Successful),
            "failed" => Ok(DealStatus::Failed),
            "expired" => Ok(DealStatus::Expired),
            "cancelled" => Ok(DealStatus::Cancelled),
            other => Err(Error::Validation(format!("Unknown group deal status '{}'", other))),
        }
    }
}

/// One step of a group deal's price schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DealTier {
    pub min_participants: i64,
    pub discount_percentage: i64,
    pub price_per_unit: i64,
}

/// Append-only join log entry. `sequence` is assigned by the store and
/// strictly increases per deal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DealParticipant {
    pub sequence: i64,
    pub user_address: String,
    pub joined_at: DateTime<Utc>,
    pub quantity: i64,
    pub paid_amount: i64,
    pub tx_signature: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupDeal {
    pub id: Uuid,
    pub on_chain_address: String,
    pub promotion_address: String,
    pub merchant_address: String,
    pub title: String,
    pub description: String,
    pub category: String,
    pub tiers: Vec<DealTier>,
    pub target_participants: i64,
    pub max_participants: i64,
    pub participants: Vec<DealParticipant>,
    /// Σ quantity over `participants`.
    pub current_participants: i64,
    /// Σ paid_amount over `participants`.
    pub total_revenue: i64,
    /// Index into `tiers` unlocked by `current_participants`.
    pub current_tier: usize,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: DealStatus,
    pub is_active: bool,
    pub is_successful: bool,
    pub image_url: Option<String>,
    pub terms_and_conditions: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Picks the tier with the largest `min_participants` that is at or below
/// `participant_count`, falling back to the first tier.
///
/// Returns `None` only for an empty schedule.
pub fn resolve_tier(tiers: &[DealTier], participant_count: i64) -> Option<(usize, &DealTier)> {
    let unlocked = tiers
        .iter()
        .enumerate()
        .filter(|(_, t)| t.min_participants <= participant_count)
        .max_by_key(|(_, t)| t.min_participants);
    unlocked.or_else(|| tiers.first().map(|t| (0, t)))
}

/// Checks a tier schedule before it is handed to the ledger.
pub fn validate_tiers(tiers: &[DealTier]) -> Result<(), Error> {
    if tiers.is_empty() {
        return Err(Error::Validation("At least one tier is required".into()));
    }
    for tier in tiers {
        if tier.min_participants < 0 {
            return Err(Error::Validation("Tier minParticipants must not be negative".into()));
        }
        if !(0..=100).contains(&tier.discount_percentage) {
            return Err(Error::Validation("Tier discountPercentage must be between 0 and 100".into()));
        }
        if tier.price_per_unit < 0 {
            return Err(Error::Validation("Tier pricePerUnit must not be negative".into()));
        }
    }
    if tiers.windows(2).any(|w| w[0].min_participants >= w[1].min_participants) {
        return Err(Error::Validation(
            "Tiers must be ordered by strictly increasing minParticipants".into(),
        ));
    }
    Ok(())
}

impl GroupDeal {
    /// Tier a joiner pays right now: unlocked by the count before their join.
    pub fn tier_for_next_join(&self) -> Option<&DealTier> {
        resolve_tier(&self.tiers, self.current_participants).map(|(_, t)| t)
    }

    pub fn remaining_capacity(&self) -> i64 {
        (self.max_participants - self.current_participants).max(0)
    }

    pub fn target_reached(&self) -> bool {
        self.current_participants >= self.target_participants
    }

    pub fn is_past_deadline(&self, now: DateTime<Utc>) -> bool {
        now > self.end_time
    }

    /// An open deal whose window has closed reads as `expired`; every other
    /// status is returned as stored.
    pub fn effective_status(&self, now: DateTime<Utc>) -> DealStatus {
        match self.status {
            DealStatus::Active if self.is_active && self.is_past_deadline(now) => DealStatus::Expired,
            other => other,
        }
    }

    pub fn observed_at(mut self, now: DateTime<Utc>) -> Self {
        self.status = self.effective_status(now);
        self
    }

    /// Recomputes the derived counters from the join log.
    pub fn refold(&mut self) {
        self.current_participants = self.participants.iter().map(|p| p.quantity).sum();
        self.total_revenue = self.participants.iter().map(|p| p.paid_amount).sum();
        self.current_tier = resolve_tier(&self.tiers, self.current_participants)
            .map(|(i, _)| i)
            .unwrap_or(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schedule() -> Vec<DealTier> {
        vec![
            DealTier { min_participants: 0, discount_percentage: 0, price_per_unit: 100 },
            DealTier { min_participants: 20, discount_percentage: 30, price_per_unit: 84 },
            DealTier { min_participants: 50, discount_percentage: 40, price_per_unit: 72 },
        ]
    }

    #[test]
    fn resolves_highest_unlocked_tier() {
        let tiers = schedule();
        assert_eq!(resolve_tier(&tiers, 0).unwrap().1.price_per_unit, 100);
        assert_eq!(resolve_tier(&tiers, 19).unwrap().1.price_per_unit, 100);
        assert_eq!(resolve_tier(&tiers, 20).unwrap().1.price_per_unit, 84);
        assert_eq!(resolve_tier(&tiers, 45).unwrap().1.price_per_unit, 84);
        assert_eq!(resolve_tier(&tiers, 50).unwrap().1.price_per_unit, 72);
        assert_eq!(resolve_tier(&tiers, 500).unwrap().0, 2);
    }

    #[test]
    fn falls_back_to_first_tier_when_nothing_unlocked() {
        let tiers = vec![
            DealTier { min_participants: 5, discount_percentage: 10, price_per_unit: 90 },
            DealTier { min_participants: 10, discount_percentage: 20, price_per_unit: 80 },
        ];
        let (idx, tier) = resolve_tier(&tiers, 2).unwrap();
        assert_eq!(idx, 0);
        assert_eq!(tier.price_per_unit, 90);
        assert!(resolve_tier(&[], 3).is_none());
    }

    #[test]
    fn rejects_unordered_or_empty_schedules() {
        assert!(validate_tiers(&schedule()).is_ok());
        assert!(validate_tiers(&[]).is_err());
        let mut bad = schedule();
        bad.swap(1, 2);
        assert!(validate_tiers(&bad).is_err());
        let mut bad_discount = schedule();
        bad_discount[1].discount_percentage = 120;
        assert!(validate_tiers(&bad_discount).is_err());
    }

    #[test]
    fn status_round_trips_through_str() {
        for s in ["pending", "active", "successful", "failed", "expired", "cancelled"] {
            assert_eq!(s.parse::<DealStatus>().unwrap().as_str(), s);
        }
    }
}
