//! Ledger backends.
//!
//! `LocalLedger` keeps the authoritative state in process and enforces the
//! same rules as the on-chain program; `HttpLedgerClient` forwards every call
//! to a ledger gateway.

pub mod local;
pub mod gateway;

use sha2::{Digest, Sha256};

pub use local::LocalLedger;
pub use gateway::HttpLedgerClient;

/// SHA-256 over coupon address bytes, user address bytes and the nonce as a
/// little-endian u64.
pub fn ticket_hash(coupon: &str, user: &str, nonce: u64) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(coupon.as_bytes());
    hasher.update(user.as_bytes());
    hasher.update(nonce.to_le_bytes());
    hasher.finalize().into()
}

/// Deterministic account address for a set of seeds.
pub fn derive_address(seeds: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for seed in seeds {
        hasher.update(seed.as_bytes());
        hasher.update([0u8]);
    }
    hex::encode(hasher.finalize())
}
