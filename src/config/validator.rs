use crate::config::{QuotaConfig, RedisConfig, RoleQuota, ANONYMOUS_ROLE};
use crate::errors::{AdmissionError, Result};
use std::collections::HashSet;
use tracing::{debug, warn};

/// Validate the entire application configuration
pub fn validate_config(config: &crate::config::AppConfig) -> Result<()> {
    debug!("Validating configuration...");

    validate_redis_config(&config.redis)?;
    validate_quota_config(&config.quotas)?;

    debug!("Configuration validation successful");
    Ok(())
}

/// Validate Redis configuration
fn validate_redis_config(config: &RedisConfig) -> Result<()> {
    if config.url.is_empty() {
        return Err(AdmissionError::ConfigurationError(
            "Redis URL cannot be empty".to_string(),
        ));
    }

    if !config.url.starts_with("redis://") && !config.url.starts_with("rediss://") {
        return Err(AdmissionError::ConfigurationError(format!(
            "Invalid Redis URL format: {}. Must start with redis:// or rediss://",
            config.url
        )));
    }

    if config.max_connections == 0 {
        return Err(AdmissionError::ConfigurationError(
            "max_connections must be greater than 0".to_string(),
        ));
    }

    if config.max_connections > 1000 {
        warn!(
            "max_connections is very high ({}). This may consume excessive resources.",
            config.max_connections
        );
    }

    if config.connection_timeout_secs == 0 {
        return Err(AdmissionError::ConfigurationError(
            "connection_timeout_secs must be greater than 0".to_string(),
        ));
    }

    if config.command_timeout_ms == 0 {
        return Err(AdmissionError::ConfigurationError(
            "command_timeout_ms must be greater than 0".to_string(),
        ));
    }

    if config.command_timeout_ms > 1000 {
        warn!(
            "command_timeout_ms is very high ({}ms). Every admission check can add this much latency to a request.",
            config.command_timeout_ms
        );
    }

    debug!("Redis configuration valid");
    Ok(())
}

/// Validate the role quota configuration. Quotas must be known-valid before
/// any request is served; a bad quota is a load-time error, never a
/// request-time one.
pub fn validate_quota_config(config: &QuotaConfig) -> Result<()> {
    if config.roles.is_empty() {
        return Err(AdmissionError::ConfigurationError(
            "quota config must define at least one role tier".to_string(),
        ));
    }

    let mut seen: HashSet<String> = HashSet::new();
    let mut has_anonymous = false;

    for role_quota in &config.roles {
        validate_role_quota(role_quota)?;

        let label = role_quota.role.to_lowercase();
        if !seen.insert(label.clone()) {
            return Err(AdmissionError::ConfigurationError(format!(
                "duplicate role tier '{}' (roles match case-insensitively)",
                role_quota.role
            )));
        }
        if label == ANONYMOUS_ROLE {
            has_anonymous = true;
        }
    }

    if !has_anonymous {
        return Err(AdmissionError::ConfigurationError(format!(
            "quota config must define an '{}' tier; it is the fallback for every unknown role",
            ANONYMOUS_ROLE
        )));
    }

    if config.bucket_ttl_secs == 0 {
        return Err(AdmissionError::ConfigurationError(
            "bucket_ttl_secs must be greater than 0".to_string(),
        ));
    }

    debug!("Quota configuration valid ({} tiers)", config.roles.len());
    Ok(())
}

/// Validate an individual role quota
fn validate_role_quota(role_quota: &RoleQuota) -> Result<()> {
    if role_quota.role.is_empty() {
        return Err(AdmissionError::InvalidQuota(
            "role label cannot be empty".to_string(),
        ));
    }

    if role_quota.capacity <= 0 {
        return Err(AdmissionError::InvalidQuota(format!(
            "capacity must be positive for role '{}' (got {})",
            role_quota.role, role_quota.capacity
        )));
    }

    if role_quota.refill_rate_per_second <= 0.0 {
        return Err(AdmissionError::InvalidQuota(format!(
            "refill_rate_per_second must be positive for role '{}' (got {})",
            role_quota.role, role_quota.refill_rate_per_second
        )));
    }

    if role_quota.capacity > 1_000_000_000 {
        warn!(
            "Very high capacity ({}) for role '{}'",
            role_quota.capacity, role_quota.role
        );
    }

    if role_quota.refill_rate_per_second > 1_000_000.0 {
        warn!(
            "Very high refill_rate_per_second ({}) for role '{}'",
            role_quota.refill_rate_per_second, role_quota.role
        );
    }

    // Flag buckets that refill implausibly slowly relative to their size
    let seconds_to_fill = role_quota.capacity as f64 / role_quota.refill_rate_per_second;
    if seconds_to_fill > 86400.0 {
        warn!(
            "Quota for role '{}' takes {:.2} hours to refill from empty",
            role_quota.role,
            seconds_to_fill / 3600.0
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    #[test]
    fn test_validate_valid_config() {
        let config = AppConfig {
            redis: RedisConfig::default(),
            quotas: QuotaConfig::default(),
        };

        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_invalid_redis_url() {
        let mut config = AppConfig {
            redis: RedisConfig::default(),
            quotas: QuotaConfig::default(),
        };

        config.redis.url = "invalid_url".to_string();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_zero_capacity() {
        let role_quota = RoleQuota {
            role: "test".to_string(),
            capacity: 0,
            refill_rate_per_second: 1.0,
        };

        assert!(validate_role_quota(&role_quota).is_err());
    }

    #[test]
    fn test_validate_negative_refill_rate() {
        let role_quota = RoleQuota {
            role: "test".to_string(),
            capacity: 100,
            refill_rate_per_second: -1.0,
        };

        assert!(validate_role_quota(&role_quota).is_err());
    }

    #[test]
    fn test_validate_rejects_missing_anonymous_tier() {
        let config = QuotaConfig {
            roles: vec![RoleQuota {
                role: "admin".to_string(),
                capacity: 1000,
                refill_rate_per_second: 10.0,
            }],
            bucket_ttl_secs: 3600,
        };

        assert!(validate_quota_config(&config).is_err());
    }

    #[test]
    fn test_validate_rejects_duplicate_roles() {
        let config = QuotaConfig {
            roles: vec![
                RoleQuota {
                    role: "Anonymous".to_string(),
                    capacity: 60,
                    refill_rate_per_second: 1.0,
                },
                RoleQuota {
                    role: "anonymous".to_string(),
                    capacity: 120,
                    refill_rate_per_second: 2.0,
                },
            ],
            bucket_ttl_secs: 3600,
        };

        assert!(validate_quota_config(&config).is_err());
    }
}
