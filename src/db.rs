//! Database module
//!
//! Pool construction and startup checks against the hosted database.

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::backend::tables;
use crate::config::Config;

/// Pools for the unprivileged and privileged roles, in that order
pub async fn connect_pools(config: &Config) -> Result<(PgPool, PgPool), sqlx::Error> {
    let client = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await?;

    let admin = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_admin_url)
        .await?;

    Ok((client, admin))
}

/// Verify database connectivity
pub async fn verify_connection(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Tables the application uses that the database lacks
pub async fn missing_tables(pool: &PgPool) -> Result<Vec<&'static str>, sqlx::Error> {
    let mut missing = Vec::new();

    for table in tables::ALL {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM information_schema.tables
                WHERE table_schema = 'public' AND table_name = $1
            )
            "#,
        )
        .bind(*table)
        .fetch_one(pool)
        .await?;

        if !exists {
            missing.push(*table);
        }
    }

    Ok(missing)
}

/// Check if required tables exist
pub async fn check_schema(pool: &PgPool) -> Result<bool, sqlx::Error> {
    let missing = missing_tables(pool).await?;
    for table in &missing {
        tracing::error!("Required table '{}' does not exist", table);
    }
    Ok(missing.is_empty())
}
