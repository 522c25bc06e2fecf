pub mod token_bucket;

pub use token_bucket::TokenBucketLimiter;

use crate::config::Quota;
use crate::errors::Result;
use async_trait::async_trait;
use std::time::SystemTime;

/// Outcome of one admission check
#[derive(Debug, Clone)]
pub struct AdmissionDecision {
    /// Whether the request may proceed
    pub allowed: bool,

    /// Tokens left in the bucket after this check
    pub tokens_remaining: f64,

    /// Minimum seconds until the denied cost becomes available, rounded up.
    /// Only meaningful when `allowed` is false.
    pub retry_after_secs: u32,
}

impl AdmissionDecision {
    /// Decision produced when the store is unavailable: admit, report a full
    /// bucket, no wait.
    pub fn fail_open(quota: &Quota) -> Self {
        Self {
            allowed: true,
            tokens_remaining: quota.capacity as f64,
            retry_after_secs: 0,
        }
    }
}

/// Admission-control algorithms.
///
/// `check_and_consume` is not idempotent: every call that reaches the store
/// consumes tokens exactly once, and a debit is never rolled back, even when
/// the request it admitted is later cancelled. Callers that retry a timed-out
/// call accept that the retry is a second, distinct consumption.
#[async_trait]
pub trait AdmissionControl: Send + Sync {
    /// Check whether one request for `key` may proceed under `quota`,
    /// consuming `cost` tokens if it may.
    async fn check_and_consume(
        &self,
        key: &str,
        quota: &Quota,
        cost: u32,
    ) -> Result<AdmissionDecision> {
        self.check_and_consume_at(key, quota, cost, SystemTime::now())
            .await
    }

    /// Same as `check_and_consume` with an explicit clock reading.
    async fn check_and_consume_at(
        &self,
        key: &str,
        quota: &Quota,
        cost: u32,
        now: SystemTime,
    ) -> Result<AdmissionDecision>;
}
