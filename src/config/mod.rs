pub mod loader;
pub mod validator;
pub mod watcher;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Role label every unknown or missing role falls back to.
pub const ANONYMOUS_ROLE: &str = "anonymous";

/// Complete application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Redis configuration (loaded from environment variables only)
    pub redis: RedisConfig,

    /// Role quota configuration (loaded from file, supports hot reload)
    pub quotas: QuotaConfig,
}

/// Redis connection configuration (loaded from environment variables)
#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// Redis URL (e.g., "redis://localhost:6379")
    pub url: String,

    /// Use TLS for connection
    pub use_tls: bool,

    /// Redis username (optional)
    pub username: Option<String>,

    /// Redis password (optional)
    pub password: Option<String>,

    /// Maximum number of connections in pool
    pub max_connections: usize,

    /// Connection timeout in seconds
    pub connection_timeout_secs: u64,

    /// Per-command deadline in milliseconds. This bounds the latency the
    /// limiter can add to a request; a command that misses it is treated as
    /// a store failure.
    pub command_timeout_ms: u64,
}

impl RedisConfig {
    /// Load Redis configuration from environment variables
    pub fn from_env() -> Self {
        Self {
            url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),

            use_tls: std::env::var("REDIS_USE_TLS")
                .map(|v| v.to_lowercase() == "true" || v == "1")
                .unwrap_or(false),

            username: std::env::var("REDIS_USERNAME").ok(),

            password: std::env::var("REDIS_PASSWORD").ok(),

            max_connections: std::env::var("REDIS_MAX_CONN")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(50),

            connection_timeout_secs: std::env::var("REDIS_CONNECT_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5),

            command_timeout_ms: std::env::var("REDIS_COMMAND_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(50),
        }
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379".to_string(),
            use_tls: false,
            username: None,
            password: None,
            max_connections: 50,
            connection_timeout_secs: 5,
            command_timeout_ms: 50,
        }
    }
}

/// A role tier's admission budget: maximum burst and sustained rate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quota {
    /// Maximum tokens the bucket may hold (burst size)
    pub capacity: i64,

    /// Tokens added per second (sustainable request rate)
    pub refill_rate_per_second: f64,
}

/// One row of the role quota file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleQuota {
    /// Role label (matched case-insensitively)
    pub role: String,

    pub capacity: i64,

    pub refill_rate_per_second: f64,
}

impl RoleQuota {
    pub fn quota(&self) -> Quota {
        Quota {
            capacity: self.capacity,
            refill_rate_per_second: self.refill_rate_per_second,
        }
    }
}

/// Role quota configuration (loaded from JSON file)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaConfig {
    /// Per-role quota tiers; must include an "anonymous" tier
    #[serde(default)]
    pub roles: Vec<RoleQuota>,

    /// Idle TTL for bucket keys in the store. Housekeeping only: an expired
    /// bucket reads back as full, which is also its initial state.
    #[serde(default = "default_bucket_ttl_secs")]
    pub bucket_ttl_secs: u64,
}

fn default_bucket_ttl_secs() -> u64 {
    3600
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            roles: vec![
                RoleQuota {
                    role: "admin".to_string(),
                    capacity: 1000,
                    refill_rate_per_second: 10.0,
                },
                RoleQuota {
                    role: "editor".to_string(),
                    capacity: 500,
                    refill_rate_per_second: 5.0,
                },
                RoleQuota {
                    role: "user".to_string(),
                    capacity: 100,
                    refill_rate_per_second: 1.0,
                },
                RoleQuota {
                    role: ANONYMOUS_ROLE.to_string(),
                    capacity: 60,
                    refill_rate_per_second: 1.0,
                },
            ],
            bucket_ttl_secs: default_bucket_ttl_secs(),
        }
    }
}

/// Read-only role -> quota lookup built from a validated `QuotaConfig`.
///
/// Unknown and missing roles resolve to the anonymous tier, never to a more
/// permissive one. Hot reload replaces the whole table atomically through an
/// `ArcSwap` (see `config::watcher`); the table itself never mutates.
#[derive(Debug)]
pub struct RoleQuotaTable {
    quotas: HashMap<String, Quota>,
    anonymous: Quota,
    bucket_ttl_secs: u64,
}

impl RoleQuotaTable {
    /// Build a lookup table. The config must already have passed validation;
    /// a missing anonymous tier is still rejected here so an unvalidated
    /// config can never produce a table without a restrictive fallback.
    pub fn new(config: &QuotaConfig) -> crate::errors::Result<Self> {
        let mut quotas = HashMap::new();
        for role_quota in &config.roles {
            quotas.insert(role_quota.role.to_lowercase(), role_quota.quota());
        }

        let anonymous = *quotas.get(ANONYMOUS_ROLE).ok_or_else(|| {
            crate::errors::AdmissionError::ConfigurationError(format!(
                "quota config must define an '{}' tier",
                ANONYMOUS_ROLE
            ))
        })?;

        Ok(Self {
            quotas,
            anonymous,
            bucket_ttl_secs: config.bucket_ttl_secs,
        })
    }

    /// Resolve a role label to its quota. Case-insensitive; `None` and
    /// unrecognized labels get the anonymous tier.
    pub fn resolve(&self, role: Option<&str>) -> Quota {
        match role {
            Some(role) => self
                .quotas
                .get(role.to_lowercase().as_str())
                .copied()
                .unwrap_or(self.anonymous),
            None => self.anonymous,
        }
    }

    pub fn bucket_ttl_secs(&self) -> u64 {
        self.bucket_ttl_secs
    }

    /// Number of configured tiers (for observability)
    pub fn role_count(&self) -> usize {
        self.quotas.len()
    }
}
