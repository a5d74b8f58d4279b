//! agoradeals-server/src/server.rs
//!
//! Binds the REST API and runs it until Ctrl-C.

use std::net::SocketAddr;
use std::time::Duration;

use axum_server::{Handle, Server};
use tracing::{error, info};

use agoradeals_core::api;
use agoradeals_core::{AppConfig, Error};

use crate::context::ServerContext;

/// In-flight requests get this long to finish after Ctrl-C.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

pub async fn run_server(config: AppConfig) -> Result<(), Error> {
    let ctx = ServerContext::new(&config).await?;
    let app = api::router(ctx.state.clone());

    let addr: SocketAddr = config.bind_addr.parse()?;
    let handle = Handle::new();
    let handle_clone = handle.clone();

    let _ctrlc_handle = tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {:?}", e);
            return;
        }
        info!("Ctrl-C detected; draining connections...");
        handle_clone.graceful_shutdown(Some(SHUTDOWN_GRACE));
    });

    info!("AgoraDeals API listening on http://{}", addr);
    Server::bind(addr)
        .handle(handle)
        .serve(app.into_make_service())
        .await?;

    ctx.db.pool().close().await;
    info!("Server shutdown complete.");
    Ok(())
}
