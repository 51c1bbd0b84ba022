//! Database connection management.

use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

use crate::secrets::DatabaseCredentials;
use crate::{Config, Error, Result};

/// Build the connection URL, letting values in the secret override the config.
pub fn database_url(config: &Config, credentials: &DatabaseCredentials) -> String {
    format!(
        "postgres://{}:{}@{}:{}/{}",
        credentials.username,
        credentials.password,
        credentials.host.as_deref().unwrap_or(&config.db_host),
        credentials.port.unwrap_or(5432),
        credentials.dbname.as_deref().unwrap_or(&config.db_name)
    )
}

/// Create a database connection pool.
pub async fn create_pool(config: &Config, credentials: &DatabaseCredentials) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(3))
        .connect(&database_url(config, credentials))
        .await
        .map_err(Error::Database)?;

    Ok(pool)
}
