// File: agoradeals-common/src/models/merchant.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Error;

pub const MAX_MERCHANT_NAME_LEN: usize = 50;
pub const MAX_MERCHANT_CATEGORY_LEN: usize = 30;

/// A business registered on the ledger. Only registered, active merchants
/// may open promotions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Merchant {
    pub id: Uuid,
    pub wallet_address: String,
    pub on_chain_address: String,
    pub name: String,
    pub category: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<MerchantLocation>,
    pub total_coupons_created: i64,
    pub total_coupons_redeemed: i64,
    pub is_active: bool,
    pub registration_tx_signature: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MerchantLocation {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

impl MerchantLocation {
    /// Both coordinates or neither; each within its geographic range.
    pub fn from_coords(
        latitude: Option<f64>,
        longitude: Option<f64>,
        address: Option<String>,
    ) -> Result<Option<Self>, Error> {
        match (latitude, longitude) {
            (None, None) => Ok(None),
            (Some(latitude), Some(longitude)) => {
                if !(-90.0..=90.0).contains(&latitude) {
                    return Err(Error::Validation("Invalid latitude".into()));
                }
                if !(-180.0..=180.0).contains(&longitude) {
                    return Err(Error::Validation("Invalid longitude".into()));
                }
                Ok(Some(Self { latitude, longitude, address }))
            }
            _ => Err(Error::Validation(
                "latitude and longitude must be provided together".into(),
            )),
        }
    }
}

/// Name and category limits enforced at registration.
pub fn validate_merchant_profile(name: &str, category: &str) -> Result<(), Error> {
    if name.chars().count() > MAX_MERCHANT_NAME_LEN {
        return Err(Error::Validation(format!(
            "Merchant name must be at most {MAX_MERCHANT_NAME_LEN} characters"
        )));
    }
    if category.chars().count() > MAX_MERCHANT_CATEGORY_LEN {
        return Err(Error::Validation(format!(
            "Merchant category must be at most {MAX_MERCHANT_CATEGORY_LEN} characters"
        )));
    }
    Ok(())
}
