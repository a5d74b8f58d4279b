// agoradeals-core/src/db/mod.rs

use std::str::FromStr;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use tracing::info;
use crate::Error;

/// Handle to the local SQLite mirror.
#[derive(Clone)]
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    /// Connects to `database_url`. Accepts `sqlite://path`, a bare file path or
    /// `:memory:`; a file database is created if missing.
    pub async fn new(database_url: &str) -> Result<Self, Error> {
        if is_memory_url(database_url) {
            // Every connection to `:memory:` is a separate database, so pin the
            // pool to one connection that is never recycled.
            let pool = SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect("sqlite::memory:")
                .await?;
            info!("Connected to in-memory SQLite database");
            return Ok(Self { pool });
        }

        let path = database_url
            .strip_prefix("sqlite://")
            .or_else(|| database_url.strip_prefix("sqlite:"))
            .unwrap_or(database_url);
        if let Some(parent) = std::path::Path::new(path).parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let url = format!("sqlite://{}", path);

        let options = SqliteConnectOptions::from_str(&url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        info!("Connected to SQLite at {}", url);
        Ok(Self { pool })
    }

    /// Run migrations in the `migrations/` folder.
    pub async fn migrate(&self) -> Result<(), Error> {
        info!("Applying migrations...");
        sqlx::migrate!("../migrations").run(&self.pool).await?;
        info!("Migrations applied successfully.");
        Ok(())
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub fn from_pool(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    /// Cheap round trip used by the health endpoint.
    pub async fn ping(&self) -> Result<(), Error> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

fn is_memory_url(url: &str) -> bool {
    matches!(url, ":memory:" | "sqlite::memory:" | "sqlite://:memory:")
}
