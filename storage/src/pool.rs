use std::time::Duration;

use config::PostgresConfig;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::info;

/// Opens a connection pool sized and timed out per `config`.
pub async fn connect(config: &PostgresConfig) -> Result<PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(config.pool_size)
        .acquire_timeout(Duration::from_secs(config.timeout_seconds))
        .connect(&config.connection_url())
        .await?;
    info!(
        host = %config.host,
        port = config.port,
        database = %config.database,
        pool_size = config.pool_size,
        "Connected to PostgreSQL"
    );
    Ok(pool)
}
