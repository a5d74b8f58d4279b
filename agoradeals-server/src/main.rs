use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use agoradeals_core::AppConfig;

mod context;
mod server;

fn init_tracing() {
    let filter = EnvFilter::from_default_env()
        .add_directive("agoradeals=info".parse().unwrap_or_default())
        .add_directive("agoradeals_core=info".parse().unwrap_or_default())
        .add_directive("tower_http=info".parse().unwrap_or_default());
    fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env is optional; real environment variables win
    dotenv::dotenv().ok();
    init_tracing();

    let config = AppConfig::parse();
    config.validate()?;
    info!(
        "AgoraDeals starting. bind={}, db={}, ledger={}",
        config.bind_addr,
        config.database_url,
        config.ledger_url.as_deref().unwrap_or("in-process")
    );

    if let Err(e) = server::run_server(config).await {
        error!("Server error: {:?}", e);
        return Err(e.into());
    }
    info!("Main finished. Goodbye!");
    Ok(())
}
