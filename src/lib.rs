pub mod config;
pub mod errors;
pub mod limiter;
pub mod metrics;
pub mod metrics_server;
pub mod middleware;
pub mod redis;

// Re-export commonly used types
pub use config::{AppConfig, Quota, QuotaConfig, RedisConfig, RoleQuotaTable};
pub use errors::{AdmissionError, Result};
pub use limiter::{AdmissionControl, AdmissionDecision, TokenBucketLimiter};
pub use middleware::{AdmissionState, CallerIdentity};
