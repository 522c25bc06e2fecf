pub mod client;
pub mod pool;
pub mod script;

use crate::config::Quota;
use crate::errors::Result;
use async_trait::async_trait;

/// Outcome of one atomic script execution against a bucket key
#[derive(Debug, Clone)]
pub struct ScriptResponse {
    /// Whether the request was admitted
    pub allowed: bool,

    /// Tokens left in the bucket after refill (and consumption, if allowed)
    pub tokens_remaining: f64,

    /// Seconds until enough tokens exist for the denied cost (0 when allowed)
    pub retry_after_secs: u32,
}

/// Raw persisted bucket state, for status reads
#[derive(Debug, Clone)]
pub struct BucketState {
    pub tokens: f64,

    /// Unix milliseconds of the last refill
    pub refreshed_ms: u64,
}

/// Abstraction over the shared bucket store.
///
/// The store is the only shared mutable resource in this subsystem; all
/// cross-instance coordination happens through `execute_admission_script`,
/// which must perform the whole refill-then-consume as one atomic unit.
#[async_trait]
pub trait BucketStore: Send + Sync {
    /// Execute the atomic refill-then-consume operation for one bucket key.
    async fn execute_admission_script(
        &self,
        key: &str,
        cost: u32,
        quota: &Quota,
        now_ms: u64,
        ttl_secs: u64,
    ) -> Result<ScriptResponse>;

    /// Read raw bucket state without consuming tokens.
    async fn bucket_state(&self, key: &str) -> Result<Option<BucketState>>;

    /// Check if the store is healthy
    async fn health_check(&self) -> Result<()>;
}
