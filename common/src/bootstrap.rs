// Bootstrap utilities shared by the api and scheduler binaries

use crate::config::Settings;
use crate::db::DbPool;
use anyhow::{Context, Result};
use chrono_tz::Tz;
use tracing::info;

/// Load and validate settings
/// Used by: API server, Scheduler
///
/// # Errors
/// Returns error if configuration cannot be read or fails validation
pub fn load_settings() -> Result<Settings> {
    let settings = Settings::load().context("Failed to load configuration")?;
    settings
        .validate()
        .map_err(|reason| anyhow::anyhow!("Invalid configuration: {}", reason))?;
    Ok(settings)
}

/// Initialize database pool, applying migrations when configured
/// Used by: API server, Scheduler
///
/// # Errors
/// Returns error if database pool initialization or migration fails
#[tracing::instrument(skip(settings))]
pub async fn init_database_pool(settings: &Settings) -> Result<DbPool> {
    info!("Initializing database pool");

    let db_pool = DbPool::new(&settings.database)
        .await
        .context("Failed to initialize database pool")?;

    if settings.database.run_migrations {
        db_pool
            .run_migrations()
            .await
            .context("Failed to apply database migrations")?;
    }

    info!("Database pool initialized");
    Ok(db_pool)
}

/// Reference timezone from settings
///
/// # Errors
/// Returns error if the configured timezone name is unknown
pub fn reference_timezone(settings: &Settings) -> Result<Tz> {
    settings
        .scheduler
        .timezone()
        .map_err(|reason| anyhow::anyhow!(reason))
}
