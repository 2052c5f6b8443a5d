use redis::aio::MultiplexedConnection;
use sqlx::{postgres::PgPoolOptions, Pool, Postgres};

use crate::{
    config::Config,
    error::{CacheError, QueryError},
};

/// Opens the pool and brings the schema up to date.
pub async fn connect_database(config: &Config) -> Result<Pool<Postgres>, potion::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await
        .map_err(|e| QueryError::from(e).into())?;
    log::info!(
        "Connected to Postgres ({} connections max)",
        config.database_max_connections
    );

    sqlx::migrate!()
        .run(&pool)
        .await
        .map_err(|e| QueryError::from(sqlx::Error::from(e)).into())?;
    log::info!("Migrations applied");

    Ok(pool)
}

pub async fn connect_cache(config: &Config) -> Result<MultiplexedConnection, potion::Error> {
    let client = redis::Client::open(config.redis_url.as_str())
        .map_err(|e| CacheError::from(e).into())?;
    let connection = client
        .get_multiplexed_async_connection()
        .await
        .map_err(|e| CacheError::from(e).into())?;
    log::info!("Connected to redis at {}", config.redis_url);

    Ok(connection)
}
