use crate::config::RedisConfig;
use crate::errors::{AdmissionError, Result};
use deadpool::managed::PoolConfig as DeadpoolPoolConfig;
use deadpool_redis::{Config as DeadpoolRedisConfig, Pool, Runtime};
use tracing::{debug, info};

/// Create a Redis connection pool from configuration
pub async fn create_redis_pool(config: &RedisConfig) -> Result<Pool> {
    info!("Creating Redis connection pool...");

    let mut cfg = DeadpoolRedisConfig::from_url(config.url.clone());

    cfg.pool = Some(DeadpoolPoolConfig::new(config.max_connections));

    let pool = cfg.create_pool(Some(Runtime::Tokio1)).map_err(|e| {
        AdmissionError::StoreUnavailable(format!("Pool creation failed: {}", e))
    })?;

    info!(
        "Redis connection pool created (max_connections: {})",
        config.max_connections
    );

    // Test connection
    debug!("Testing Redis connection...");
    let mut conn = pool.get().await.map_err(|e| {
        AdmissionError::StoreUnavailable(format!("Failed to get connection: {}", e))
    })?;

    let _pong: String = redis::cmd("PING")
        .query_async(&mut *conn)
        .await
        .map_err(AdmissionError::RedisError)?;

    info!("Redis connection test successful");

    Ok(pool)
}
