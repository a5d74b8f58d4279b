use agoradeals_common::Error;

/// Base58 text that decodes to a 32-byte public key.
pub fn is_wallet_address(s: &str) -> bool {
    matches!(bs58::decode(s).into_vec(), Ok(bytes) if bytes.len() == 32)
}

pub fn require_wallet(field: &str, value: Option<&str>) -> Result<String, Error> {
    let v = require(field, value)?;
    if !is_wallet_address(&v) {
        return Err(Error::Validation(format!("Invalid {field}")));
    }
    Ok(v)
}

/// Present and non-blank.
pub fn require(field: &str, value: Option<&str>) -> Result<String, Error> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(Error::Validation(format!("Missing required field: {field}"))),
    }
}

/// Present value of any type.
pub fn required<T>(field: &str, value: Option<T>) -> Result<T, Error> {
    value.ok_or_else(|| Error::Validation(format!("Missing required field: {field}")))
}

pub fn require_range(field: &str, value: i64, min: i64, max: i64) -> Result<i64, Error> {
    if value < min || value > max {
        return Err(Error::Validation(format!(
            "{field} must be between {min} and {max}"
        )));
    }
    Ok(value)
}

/// 32-byte hash given as hex.
pub fn parse_hash(value: &str) -> Result<[u8; 32], Error> {
    let bytes = hex::decode(value.trim())?;
    bytes
        .try_into()
        .map_err(|_| Error::Validation("Ticket hash must be 32 bytes".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wallet_must_decode_to_32_bytes() {
        assert!(is_wallet_address("9xQeWvG816bUx9EPjHmaT23yvVM2ZWbrrpZb9PusVFin"));
        assert!(is_wallet_address("11111111111111111111111111111111"));
        assert!(!is_wallet_address("short"));
        assert!(!is_wallet_address(""));
        // 0, O, I and l are outside the base58 alphabet
        assert!(!is_wallet_address("0xQeWvG816bUx9EPjHmaT23yvVM2ZWbrrpZb9PusVFin"));
        // right alphabet and length range, but decodes to 27 bytes
        assert!(!is_wallet_address("Merchant1111111111111111111111111111"));
        // 44 characters that overflow 32 bytes
        assert!(!is_wallet_address("zzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzz"));
    }

    #[test]
    fn require_rejects_blank() {
        assert!(require("title", Some("  ")).is_err());
        assert!(require("title", None).is_err());
        assert_eq!(require("title", Some(" x ")).unwrap(), "x");
    }

    #[test]
    fn hash_must_be_32_bytes() {
        assert!(parse_hash(&"ab".repeat(32)).is_ok());
        assert!(parse_hash("abcd").is_err());
        assert!(parse_hash("zz").is_err());
    }
}
