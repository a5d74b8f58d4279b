use clap::Parser;

/// Runtime configuration. Every flag can also come from the environment
/// (a `.env` file is loaded first by the binary).
#[derive(Parser, Debug, Clone)]
#[command(name = "agoradeals")]
#[command(author, version, about = "AgoraDeals - coupon marketplace, redemption tickets and group deals")]
pub struct AppConfig {
    /// Address the HTTP API binds to
    #[arg(long, env = "AGORA_BIND_ADDR", default_value = "0.0.0.0:3001")]
    pub bind_addr: String,

    /// SQLite URL or file path; `:memory:` keeps everything in RAM
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite://data/agoradeals.db")]
    pub database_url: String,

    /// Base URL of a ledger gateway. Without it the in-process ledger is used.
    #[arg(long, env = "LEDGER_URL")]
    pub ledger_url: Option<String>,

    /// Lifetime of redemption tickets issued by the in-process ledger
    #[arg(long, env = "TICKET_TTL_SECS", default_value_t = 300)]
    pub ticket_ttl_secs: i64,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.ticket_ttl_secs <= 0 {
            return Err(crate::Error::Config("ticket TTL must be positive".into()));
        }
        if let Some(url) = &self.ledger_url {
            url::Url::parse(url)
                .map_err(|e| crate::Error::Config(format!("Invalid LEDGER_URL '{}': {}", url, e)))?;
        }
        Ok(())
    }
}
