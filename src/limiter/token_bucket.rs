use crate::config::Quota;
use crate::errors::{AdmissionError, Result};
use crate::limiter::{AdmissionControl, AdmissionDecision};
use crate::metrics;
use crate::redis::{BucketState, BucketStore};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

/// Token bucket limiter over a shared bucket store.
///
/// Holds no bucket state in-process: the whole refill-then-consume runs as
/// one atomic unit inside the store, which serializes concurrent checks on
/// the same key across every service instance. The only suspension point on
/// the request path is the store call itself.
pub struct TokenBucketLimiter<S: BucketStore> {
    store: Arc<S>,
    bucket_ttl_secs: u64,
}

impl<S: BucketStore> TokenBucketLimiter<S> {
    pub fn new(store: Arc<S>, bucket_ttl_secs: u64) -> Self {
        Self {
            store,
            bucket_ttl_secs,
        }
    }

    /// Construct the store key for a caller's bucket
    fn construct_bucket_key(&self, key: &str) -> String {
        format!("bucket:{}", key)
    }

    /// Read bucket state without consuming tokens. An absent bucket reads
    /// back as `None`; its logical content is a full bucket.
    pub async fn peek(&self, key: &str) -> Result<Option<BucketState>> {
        let bucket_key = self.construct_bucket_key(key);
        debug!("Peeking bucket state for: {}", bucket_key);
        self.store.bucket_state(&bucket_key).await
    }
}

fn unix_millis(now: SystemTime) -> u64 {
    now.duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[async_trait]
impl<S: BucketStore + 'static> AdmissionControl for TokenBucketLimiter<S> {
    async fn check_and_consume_at(
        &self,
        key: &str,
        quota: &Quota,
        cost: u32,
        now: SystemTime,
    ) -> Result<AdmissionDecision> {
        // Programming-fault class: these propagate instead of becoming a
        // rate-limit decision. Quotas are validated at load time, so a bad
        // one reaching this point is a bug in the caller.
        if key.is_empty() {
            return Err(AdmissionError::InternalError(
                "admission check called with empty identity key".to_string(),
            ));
        }
        if cost == 0 {
            return Err(AdmissionError::InternalError(
                "admission check called with zero cost".to_string(),
            ));
        }
        if quota.capacity <= 0 || quota.refill_rate_per_second <= 0.0 {
            return Err(AdmissionError::InternalError(format!(
                "unvalidated quota reached the limiter: capacity={}, rate={}",
                quota.capacity, quota.refill_rate_per_second
            )));
        }

        let bucket_key = self.construct_bucket_key(key);

        debug!(
            "Checking admission: key={}, capacity={}, rate={}, cost={}",
            bucket_key, quota.capacity, quota.refill_rate_per_second, cost
        );

        match self
            .store
            .execute_admission_script(
                &bucket_key,
                cost,
                quota,
                unix_millis(now),
                self.bucket_ttl_secs,
            )
            .await
        {
            Ok(response) => {
                let decision = AdmissionDecision {
                    allowed: response.allowed,
                    tokens_remaining: response.tokens_remaining,
                    retry_after_secs: response.retry_after_secs,
                };

                debug!(
                    "Admission decision: allowed={}, remaining={:.2}, retry_after={}s",
                    decision.allowed, decision.tokens_remaining, decision.retry_after_secs
                );

                Ok(decision)
            }
            Err(e) if e.is_store_failure() => {
                // Fail open: availability of the protected service takes
                // priority over strict enforcement during a store outage.
                warn!("Failing open for key '{}': {}", bucket_key, e);
                metrics::record_fail_open();

                Ok(AdmissionDecision::fail_open(quota))
            }
            Err(e) => Err(e),
        }
    }
}
