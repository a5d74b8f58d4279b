use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::{error, warn};

use crate::Error;

/// Wraps the crate error so it can be turned into an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub Error);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            Error::Validation(_) | Error::Conflict(_) => StatusCode::BAD_REQUEST,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Forbidden(_) => StatusCode::FORBIDDEN,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.0.to_string();
        if status.is_server_error() {
            error!("{} {}", status.as_u16(), message);
        } else {
            warn!("{} {}", status.as_u16(), message);
        }
        (status, Json(json!({ "success": false, "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_error_kinds_to_status_codes() {
        let cases = [
            (Error::Validation("x".into()), StatusCode::BAD_REQUEST),
            (Error::Conflict("x".into()), StatusCode::BAD_REQUEST),
            (Error::NotFound("x".into()), StatusCode::NOT_FOUND),
            (Error::Forbidden("x".into()), StatusCode::FORBIDDEN),
            (Error::Ledger("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (Error::Config("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, expected) in cases {
            assert_eq!(ApiError(err).status(), expected);
        }
    }
}
