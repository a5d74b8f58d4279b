//! agoradeals-server/src/context.rs
//!
//! Everything the HTTP server needs, built once at startup.

use std::sync::Arc;

use chrono::Duration;
use tracing::{info, warn};

use agoradeals_common::traits::ledger_traits::LedgerService;
use agoradeals_core::api::ApiState;
use agoradeals_core::ledger::{HttpLedgerClient, LocalLedger};
use agoradeals_core::qr::DataUrlRenderer;
use agoradeals_core::utils::time::{Clock, SystemClock};
use agoradeals_core::{AppConfig, Database, Error};

pub struct ServerContext {
    pub db: Database,
    pub state: ApiState,
}

impl ServerContext {
    pub async fn new(config: &AppConfig) -> Result<Self, Error> {
        info!("Using database URL: {}", config.database_url);
        let db = Database::new(&config.database_url).await?;
        db.migrate().await?;

        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let ledger: Arc<dyn LedgerService> = match &config.ledger_url {
            Some(url) => {
                info!("Settling through ledger gateway at {}", url);
                Arc::new(HttpLedgerClient::new(url)?)
            }
            None => {
                info!(
                    "No LEDGER_URL set; using the in-process ledger (ticket TTL {}s)",
                    config.ticket_ttl_secs
                );
                Arc::new(LocalLedger::with_ticket_ttl(
                    clock.clone(),
                    Duration::seconds(config.ticket_ttl_secs),
                ))
            }
        };

        match ledger.version().await {
            Ok(v) => info!("Ledger reachable: {}", v),
            Err(e) => warn!("Ledger not reachable at startup: {}", e),
        }

        let state = ApiState::build(db.clone(), ledger, Arc::new(DataUrlRenderer), clock);
        Ok(Self { db, state })
    }
}
