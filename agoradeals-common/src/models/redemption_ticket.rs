// File: agoradeals-common/src/models/redemption_ticket.rs

use std::fmt;
use std::str::FromStr;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Error;

/// Lifecycle of a redemption ticket.
///
/// Only `Active`, `Consumed` and `Cancelled` are ever written to the store.
/// `Expired` is what an `Active` ticket reads as once `expires_at` has passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TicketStatus {
    Active,
    Consumed,
    Cancelled,
    Expired,
}

impl TicketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Active => "active",
            TicketStatus::Consumed => "consumed",
            TicketStatus::Cancelled => "cancelled",
            TicketStatus::Expired => "expired",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, TicketStatus::Active)
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TicketStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(TicketStatus::Active),
            "consumed" => Ok(TicketStatus::Consumed),
            "cancelled" => Ok(TicketStatus::Cancelled),
            "expired" => Ok(TicketStatus::Expired),
            other => Err(Error::Validation(format!("Unknown ticket status '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationMethod {
    QrScan,
    Manual,
    Nfc,
    Api,
}

impl VerificationMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationMethod::QrScan => "qr_scan",
            VerificationMethod::Manual => "manual",
            VerificationMethod::Nfc => "nfc",
            VerificationMethod::Api => "api",
        }
    }
}

impl Default for VerificationMethod {
    fn default() -> Self {
        VerificationMethod::QrScan
    }
}

impl FromStr for VerificationMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "qr_scan" => Ok(VerificationMethod::QrScan),
            "manual" => Ok(VerificationMethod::Manual),
            "nfc" => Ok(VerificationMethod::Nfc),
            "api" => Ok(VerificationMethod::Api),
            other => Err(Error::Validation(format!("Unknown verification method '{}'", other))),
        }
    }
}

/// Where and when a ticket was generated or redeemed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeoStamp {
    pub latitude: f64,
    pub longitude: f64,
    pub timestamp: DateTime<Utc>,
}

impl GeoStamp {
    /// Builds a stamp only when both coordinates are present.
    pub fn from_coords(
        latitude: Option<f64>,
        longitude: Option<f64>,
        timestamp: DateTime<Utc>,
    ) -> Result<Option<Self>, Error> {
        match (latitude, longitude) {
            (None, None) => Ok(None),
            (Some(lat), Some(lon)) => {
                if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
                    return Err(Error::Validation(
                        "Coordinates out of range: latitude must be within ±90, longitude within ±180".into(),
                    ));
                }
                Ok(Some(GeoStamp { latitude: lat, longitude: lon, timestamp }))
            }
            _ => Err(Error::Validation(
                "latitude and longitude must be supplied together".into(),
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedemptionTicket {
    pub id: Uuid,
    pub on_chain_address: String,
    pub coupon_address: String,
    pub user_address: String,
    pub merchant_address: String,
    pub ticket_hash: String,
    pub nonce: i64,
    pub expires_at: DateTime<Utc>,
    pub status: TicketStatus,
    pub consumed_at: Option<DateTime<Utc>>,
    pub generation_location: Option<GeoStamp>,
    pub redemption_location: Option<GeoStamp>,
    pub qr_code_data: Option<String>,
    pub qr_data_url: Option<String>,
    pub verification_method: VerificationMethod,
    pub generation_tx_signature: String,
    pub redemption_tx_signature: Option<String>,
    pub cancellation_tx_signature: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RedemptionTicket {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// The status callers should see at `now`.
    pub fn effective_status(&self, now: DateTime<Utc>) -> TicketStatus {
        match self.status {
            TicketStatus::Active if self.is_expired(now) => TicketStatus::Expired,
            other => other,
        }
    }

    /// Returns a copy whose `status` field carries the effective status.
    pub fn observed_at(mut self, now: DateTime<Utc>) -> Self {
        self.status = self.effective_status(now);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn ticket(status: TicketStatus, expires_at: DateTime<Utc>) -> RedemptionTicket {
        let now = Utc::now();
        RedemptionTicket {
            id: Uuid::new_v4(),
            on_chain_address: "ticket".into(),
            coupon_address: "coupon".into(),
            user_address: "user".into(),
            merchant_address: "merchant".into(),
            ticket_hash: "00".repeat(32),
            nonce: now.timestamp(),
            expires_at,
            status,
            consumed_at: None,
            generation_location: None,
            redemption_location: None,
            qr_code_data: None,
            qr_data_url: None,
            verification_method: VerificationMethod::default(),
            generation_tx_signature: "sig".into(),
            redemption_tx_signature: None,
            cancellation_tx_signature: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn active_ticket_reads_as_expired_after_deadline() {
        let now = Utc::now();
        let t = ticket(TicketStatus::Active, now - Duration::seconds(1));
        assert_eq!(t.effective_status(now), TicketStatus::Expired);
    }

    #[test]
    fn expiry_boundary_is_inclusive() {
        let now = Utc::now();
        let t = ticket(TicketStatus::Active, now);
        assert_eq!(t.effective_status(now), TicketStatus::Active);
    }

    #[test]
    fn terminal_states_are_not_rewritten_by_expiry() {
        let now = Utc::now();
        let past = now - Duration::minutes(10);
        assert_eq!(ticket(TicketStatus::Consumed, past).effective_status(now), TicketStatus::Consumed);
        assert_eq!(ticket(TicketStatus::Cancelled, past).effective_status(now), TicketStatus::Cancelled);
    }

    #[test]
    fn geostamp_requires_both_coordinates_in_range() {
        let now = Utc::now();
        assert!(GeoStamp::from_coords(None, None, now).unwrap().is_none());
        assert!(GeoStamp::from_coords(Some(10.0), None, now).is_err());
        assert!(GeoStamp::from_coords(Some(91.0), Some(0.0), now).is_err());
        assert!(GeoStamp::from_coords(Some(0.0), Some(-181.0), now).is_err());
        let stamp = GeoStamp::from_coords(Some(-33.86), Some(151.2), now).unwrap().unwrap();
        assert_eq!(stamp.latitude, -33.86);
    }

    #[test]
    fn status_parses_case_insensitively() {
        assert_eq!("Consumed".parse::<TicketStatus>().unwrap(), TicketStatus::Consumed);
        assert!("used".parse::<TicketStatus>().is_err());
    }
}
