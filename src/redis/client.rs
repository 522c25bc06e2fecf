use crate::config::Quota;
use crate::errors::{AdmissionError, Result};
use crate::metrics;
use crate::redis::script::{get_script, load_script};
use crate::redis::{BucketState, BucketStore, ScriptResponse};
use async_trait::async_trait;
use deadpool_redis::Pool;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error};

/// Redis-backed bucket store.
///
/// Every command is bounded by `command_timeout`; a command that misses the
/// deadline is reported as `StoreUnavailable`, which the limiter absorbs by
/// failing open. The deadline is therefore the worst-case latency this
/// subsystem adds to a request.
pub struct RedisBucketStore {
    pool: Arc<Pool>,
    command_timeout: Duration,
}

impl RedisBucketStore {
    /// Create a new store and register the admission script with Redis.
    pub async fn new(pool: Pool, command_timeout: Duration) -> Result<Self> {
        let pool = Arc::new(pool);

        let mut conn = pool.get().await.map_err(|e| {
            AdmissionError::StoreUnavailable(format!(
                "Failed to get connection for script loading: {}",
                e
            ))
        })?;
        let _sha = load_script(&mut *conn).await?;

        Ok(Self {
            pool,
            command_timeout,
        })
    }

    async fn bounded<T>(
        &self,
        command: &str,
        fut: impl std::future::Future<Output = Result<T>>,
    ) -> Result<T> {
        let started = Instant::now();
        let result = match tokio::time::timeout(self.command_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(AdmissionError::StoreUnavailable(format!(
                "Redis command '{}' exceeded {}ms deadline",
                command,
                self.command_timeout.as_millis()
            ))),
        };
        metrics::record_store_duration(command, started.elapsed().as_secs_f64());
        if let Err(e) = &result {
            metrics::record_store_error(error_label(e));
        }
        result
    }
}

fn error_label(e: &AdmissionError) -> &'static str {
    match e {
        AdmissionError::StoreUnavailable(_) => "unavailable",
        AdmissionError::RedisError(_) => "redis",
        AdmissionError::ScriptExecutionError(_) => "script",
        _ => "other",
    }
}

#[async_trait]
impl BucketStore for RedisBucketStore {
    async fn execute_admission_script(
        &self,
        key: &str,
        cost: u32,
        quota: &Quota,
        now_ms: u64,
        ttl_secs: u64,
    ) -> Result<ScriptResponse> {
        debug!(
            "Executing admission script: key={}, cost={}, capacity={}, rate={}",
            key, cost, quota.capacity, quota.refill_rate_per_second
        );

        let pool = Arc::clone(&self.pool);
        let script = get_script();
        let response = self
            .bounded("admission_script", async move {
                let mut conn = pool.get().await.map_err(|e| {
                    error!("Failed to get Redis connection: {}", e);
                    AdmissionError::StoreUnavailable(format!("Pool exhausted: {}", e))
                })?;

                // EVALSHA with automatic SCRIPT LOAD fallback on NOSCRIPT
                let result: Vec<redis::Value> = script
                    .key(key)
                    .arg(cost)
                    .arg(quota.capacity)
                    .arg(quota.refill_rate_per_second)
                    .arg(now_ms)
                    .arg(ttl_secs)
                    .invoke_async(&mut *conn)
                    .await
                    .map_err(|e| {
                        error!("Script execution failed: {}", e);
                        AdmissionError::ScriptExecutionError(format!(
                            "Script execution failed: {}",
                            e
                        ))
                    })?;

                parse_script_response(&result)
            })
            .await;

        metrics::record_script_execution(response.is_ok());

        let response = response?;
        debug!(
            "Script result: allowed={}, tokens_remaining={:.2}, retry_after={}s",
            response.allowed, response.tokens_remaining, response.retry_after_secs
        );

        Ok(response)
    }

    async fn bucket_state(&self, key: &str) -> Result<Option<BucketState>> {
        let pool = Arc::clone(&self.pool);
        let key = key.to_string();
        self.bounded("bucket_state", async move {
            let mut conn = pool.get().await.map_err(|e| {
                AdmissionError::StoreUnavailable(format!("Pool exhausted: {}", e))
            })?;

            let fields: Vec<Option<String>> = redis::cmd("HMGET")
                .arg(&key)
                .arg("tokens")
                .arg("refreshed_ms")
                .query_async(&mut *conn)
                .await
                .map_err(AdmissionError::RedisError)?;

            let (tokens, refreshed_ms) = match (fields.first(), fields.get(1)) {
                (Some(Some(tokens)), Some(Some(refreshed_ms))) => (tokens, refreshed_ms),
                _ => return Ok(None),
            };

            let tokens = tokens.parse::<f64>().map_err(|e| {
                AdmissionError::ScriptExecutionError(format!(
                    "Failed to parse bucket tokens: {}",
                    e
                ))
            })?;
            let refreshed_ms = refreshed_ms.parse::<f64>().map_err(|e| {
                AdmissionError::ScriptExecutionError(format!(
                    "Failed to parse bucket timestamp: {}",
                    e
                ))
            })? as u64;

            Ok(Some(BucketState {
                tokens,
                refreshed_ms,
            }))
        })
        .await
    }

    async fn health_check(&self) -> Result<()> {
        let pool = Arc::clone(&self.pool);
        self.bounded("ping", async move {
            let mut conn = pool.get().await.map_err(|e| {
                AdmissionError::StoreUnavailable(format!("Pool exhausted: {}", e))
            })?;

            let response: String = redis::cmd("PING")
                .query_async(&mut *conn)
                .await
                .map_err(AdmissionError::RedisError)?;

            if response != "PONG" {
                return Err(AdmissionError::StoreUnavailable(format!(
                    "Unexpected PING response: {}",
                    response
                )));
            }

            Ok(())
        })
        .await
    }
}

/// Parse the script's `[allowed, tokens, retry_after]` reply
fn parse_script_response(result: &[redis::Value]) -> Result<ScriptResponse> {
    if result.len() != 3 {
        return Err(AdmissionError::ScriptExecutionError(format!(
            "Invalid script response length: {}",
            result.len()
        )));
    }

    let allowed = match &result[0] {
        redis::Value::Int(v) => *v == 1,
        other => {
            return Err(AdmissionError::ScriptExecutionError(format!(
                "Invalid allowed value type: {:?}",
                other
            )))
        }
    };

    let tokens_remaining = match &result[1] {
        redis::Value::BulkString(bytes) => {
            let s = std::str::from_utf8(bytes).map_err(|e| {
                AdmissionError::ScriptExecutionError(format!("Invalid UTF-8 in tokens: {}", e))
            })?;
            s.parse::<f64>().map_err(|e| {
                AdmissionError::ScriptExecutionError(format!("Failed to parse tokens: {}", e))
            })?
        }
        other => {
            return Err(AdmissionError::ScriptExecutionError(format!(
                "Invalid tokens value type: {:?}",
                other
            )))
        }
    };

    let retry_after_secs = match &result[2] {
        redis::Value::Int(v) => *v as u32,
        other => {
            return Err(AdmissionError::ScriptExecutionError(format!(
                "Invalid retry_after value type: {:?}",
                other
            )))
        }
    };

    Ok(ScriptResponse {
        allowed,
        tokens_remaining,
        retry_after_secs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_allowed_response() {
        let reply = vec![
            redis::Value::Int(1),
            redis::Value::BulkString(b"4.5".to_vec()),
            redis::Value::Int(0),
        ];
        let response = parse_script_response(&reply).unwrap();
        assert!(response.allowed);
        assert_eq!(response.tokens_remaining, 4.5);
        assert_eq!(response.retry_after_secs, 0);
    }

    #[test]
    fn test_parse_denied_response() {
        let reply = vec![
            redis::Value::Int(0),
            redis::Value::BulkString(b"0.25".to_vec()),
            redis::Value::Int(1),
        ];
        let response = parse_script_response(&reply).unwrap();
        assert!(!response.allowed);
        assert_eq!(response.tokens_remaining, 0.25);
        assert_eq!(response.retry_after_secs, 1);
    }

    #[test]
    fn test_parse_rejects_short_reply() {
        let reply = vec![redis::Value::Int(1)];
        assert!(parse_script_response(&reply).is_err());
    }

    #[test]
    fn test_parse_rejects_wrong_types() {
        let reply = vec![
            redis::Value::BulkString(b"1".to_vec()),
            redis::Value::BulkString(b"4.5".to_vec()),
            redis::Value::Int(0),
        ];
        assert!(parse_script_response(&reply).is_err());
    }
}
