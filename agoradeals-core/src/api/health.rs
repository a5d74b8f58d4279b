use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};
use tracing::warn;

use super::ApiState;

/// Liveness plus reachability of the store and the ledger.
pub async fn health(State(state): State<ApiState>) -> (StatusCode, Json<Value>) {
    let database = match state.db.ping().await {
        Ok(()) => "ok".to_string(),
        Err(e) => {
            warn!("health: database unreachable: {}", e);
            format!("error: {}", e)
        }
    };
    let (ledger_ok, ledger) = match state.ledger.version().await {
        Ok(v) => (true, v),
        Err(e) => {
            warn!("health: ledger unreachable: {}", e);
            (false, format!("error: {}", e))
        }
    };

    let healthy = database == "ok" && ledger_ok;
    let status = if healthy { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (
        status,
        Json(json!({
            "success": healthy,
            "data": {
                "status": if healthy { "ok" } else { "degraded" },
                "version": env!("CARGO_PKG_VERSION"),
                "database": database,
                "ledger": ledger,
            }
        })),
    )
}
