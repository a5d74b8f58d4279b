//! Scannable ticket payload.
//!
//! The payload is the JSON a merchant's scanner reads back. Rasterizing it
//! into an actual QR image is left to a `QrRenderer`; the bundled renderer
//! only wraps the JSON into a `data:` URL.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketPayload {
    pub ticket: String,
    pub coupon: String,
    pub user: String,
    pub merchant: String,
    /// Hex of the 32-byte ticket hash.
    pub hash: String,
    /// Decimal string so scanners without 64-bit integers read it intact.
    pub nonce: String,
    /// Unix seconds.
    pub expires_at: i64,
}

impl TicketPayload {
    pub fn new(
        ticket: &str,
        coupon: &str,
        user: &str,
        merchant: &str,
        hash: &str,
        nonce: i64,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            ticket: ticket.to_string(),
            coupon: coupon.to_string(),
            user: user.to_string(),
            merchant: merchant.to_string(),
            hash: hash.to_string(),
            nonce: nonce.to_string(),
            expires_at: expires_at.timestamp(),
        }
    }

    pub fn encode(&self) -> Result<String, Error> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn decode(raw: &str) -> Result<Self, Error> {
        serde_json::from_str(raw)
            .map_err(|e| Error::Validation(format!("Invalid ticket payload: {}", e)))
    }
}

pub trait QrRenderer: Send + Sync {
    fn render(&self, payload: &str) -> Result<String, Error>;
}

/// Returns `data:application/json;base64,...` for the payload.
#[derive(Debug, Default, Clone, Copy)]
pub struct DataUrlRenderer;

impl QrRenderer for DataUrlRenderer {
    fn render(&self, payload: &str) -> Result<String, Error> {
        Ok(format!("data:application/json;base64,{}", BASE64.encode(payload)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn payload() -> TicketPayload {
        let expires = Utc.timestamp_opt(1_700_000_300, 0).unwrap();
        TicketPayload::new("tkt", "cpn", "usr", "mrc", &"ab".repeat(32), 1_700_000_000, expires)
    }

    #[test]
    fn wire_shape_uses_string_nonce() {
        let raw = payload().encode().unwrap();
        let v: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(v["nonce"], "1700000000");
        assert_eq!(v["expiresAt"], 1_700_000_300);
        assert_eq!(v.as_object().unwrap().len(), 7);
        assert_eq!(TicketPayload::decode(&raw).unwrap(), payload());
    }

    #[test]
    fn garbage_is_a_validation_error() {
        assert!(matches!(TicketPayload::decode("{nope"), Err(Error::Validation(_))));
    }

    #[test]
    fn data_url_carries_payload() {
        let raw = payload().encode().unwrap();
        let url = DataUrlRenderer.render(&raw).unwrap();
        let b64 = url.strip_prefix("data:application/json;base64,").unwrap();
        assert_eq!(BASE64.decode(b64).unwrap(), raw.as_bytes());
    }
}
