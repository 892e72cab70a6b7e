//! PostgreSQL access
//!
//! Owns the connection pool; all SQL lives in the service layer.

use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

use shared::error::{AppError, AppResult};

use crate::config::DatabaseConfig;

/// Connect, then bring the schema up to date.
pub async fn connect(cfg: &DatabaseConfig) -> AppResult<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(cfg.max_connections)
        .acquire_timeout(Duration::from_secs(5))
        .connect(&cfg.url())
        .await
        .map_err(|err| AppError::dependency(format!("failed to connect to postgres: {err}")))?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(|err| AppError::dependency(format!("failed to run migrations: {err}")))?;

    info!("connected to postgres");
    Ok(pool)
}

/// Cheap liveness probe for the readiness endpoint.
pub async fn health(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await.map(|_| ())
}
