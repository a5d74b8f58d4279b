use axum::body::Bytes;
use axum::extract::{FromRequest, FromRequestParts, Query, Request};
use axum::http::request::Parts;
use serde::de::DeserializeOwned;

use super::error::ApiError;
use crate::utils::validation::require_wallet;
use crate::Error;

pub const WALLET_HEADER: &str = "x-wallet-address";

/// JSON body extractor that answers malformed input with the API's error
/// envelope. An empty body is read as `{}`.
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|e| ApiError(Error::Validation(e.body_text())))?;
        let raw: &[u8] = if bytes.iter().all(u8::is_ascii_whitespace) { b"{}" } else { &bytes };
        let value = serde_json::from_slice(raw)
            .map_err(|e| ApiError(Error::Validation(format!("Invalid JSON body: {}", e))))?;
        Ok(ApiJson(value))
    }
}

pub struct ApiQuery<T>(pub T);

impl<S, T> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|e| ApiError(Error::Validation(e.body_text())))?;
        Ok(ApiQuery(value))
    }
}

/// Caller wallet from the `X-Wallet-Address` header, if present.
pub struct WalletHeader(pub Option<String>);

impl<S> FromRequestParts<S> for WalletHeader
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(WALLET_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        Ok(WalletHeader(value))
    }
}

impl WalletHeader {
    /// Body field wins over the header.
    pub fn resolve(&self, field: &str, from_body: Option<&str>) -> Result<String, Error> {
        let from_body = from_body.map(str::trim).filter(|s| !s.is_empty());
        require_wallet(field, from_body.or(self.0.as_deref()))
    }
}
