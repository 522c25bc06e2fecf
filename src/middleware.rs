//! Admission middleware for axum services.
//!
//! Translates one inbound request into one admission check: derives the
//! caller's bucket key and quota, invokes the limiter, and either forwards
//! the request with advisory headers or short-circuits with a 429.

use crate::config::RoleQuotaTable;
use crate::limiter::AdmissionControl;
use crate::metrics;
use arc_swap::ArcSwap;
use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header::RETRY_AFTER, HeaderName, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, error};

pub const RATELIMIT_LIMIT_HEADER: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub const RATELIMIT_REMAINING_HEADER: HeaderName = HeaderName::from_static("x-ratelimit-remaining");

/// Per-request caller identity, produced by the identity/session layer and
/// attached as a request extension. When the extension is absent the
/// middleware falls back to the peer address with no principal and no role.
#[derive(Debug, Clone)]
pub struct CallerIdentity {
    pub principal_id: Option<String>,
    pub role: Option<String>,
    pub source_addr: String,
}

impl CallerIdentity {
    pub fn anonymous(source_addr: String) -> Self {
        Self {
            principal_id: None,
            role: None,
            source_addr,
        }
    }

    /// Derive the bucket key. An authenticated principal gets a user-scoped
    /// bucket; everyone else shares per-address buckets. A caller who
    /// authenticates mid-session moves to a fresh user bucket; tokens left
    /// in the address bucket are not transferred.
    pub fn bucket_key(&self) -> String {
        match &self.principal_id {
            Some(principal_id) => format!("user:{}", principal_id),
            None => format!("ip:{}", self.source_addr),
        }
    }

    /// Bucket scope label ("user" or "ip"), for metrics
    pub fn scope(&self) -> &'static str {
        if self.principal_id.is_some() {
            "user"
        } else {
            "ip"
        }
    }
}

/// Shared state for the admission middleware
#[derive(Clone)]
pub struct AdmissionState {
    pub limiter: Arc<dyn AdmissionControl>,
    pub quotas: Arc<ArcSwap<RoleQuotaTable>>,
}

impl AdmissionState {
    pub fn new(
        limiter: Arc<dyn AdmissionControl>,
        quotas: Arc<ArcSwap<RoleQuotaTable>>,
    ) -> Self {
        Self { limiter, quotas }
    }
}

/// Machine-readable rejection body
#[derive(Debug, Serialize)]
pub struct RateLimitRejection {
    pub error: &'static str,

    #[serde(rename = "retryAfterSeconds")]
    pub retry_after_seconds: u32,

    pub message: String,
}

/// Admission middleware entry point, for
/// `axum::middleware::from_fn_with_state`.
pub async fn admit(
    State(state): State<AdmissionState>,
    request: Request,
    next: Next,
) -> Response {
    let identity = caller_identity(&request);
    let key = identity.bucket_key();
    let scope = identity.scope();
    let quota = state.quotas.load().resolve(identity.role.as_deref());

    debug!(
        "Admission check: key={}, role={:?}, capacity={}",
        key, identity.role, quota.capacity
    );

    match state.limiter.check_and_consume(&key, &quota, 1).await {
        Ok(decision) if decision.allowed => {
            metrics::record_decision(scope, true);

            let mut response = next.run(request).await;
            let headers = response.headers_mut();
            headers.insert(RATELIMIT_LIMIT_HEADER, HeaderValue::from(quota.capacity));
            headers.insert(
                RATELIMIT_REMAINING_HEADER,
                HeaderValue::from(decision.tokens_remaining as i64),
            );
            response
        }
        Ok(decision) => {
            metrics::record_decision(scope, false);
            debug!(
                "Request denied: key={}, retry_after={}s",
                key, decision.retry_after_secs
            );

            rejection_response(decision.retry_after_secs)
        }
        Err(e) => {
            // Store failures never reach this point (the limiter fails
            // open); anything that does is a programming fault and must
            // surface as a server error, not as a rate-limit decision.
            error!("Admission check failed for key '{}': {}", key, e);
            (StatusCode::INTERNAL_SERVER_ERROR, "internal server error").into_response()
        }
    }
}

/// Build the 429 response for a denied request
fn rejection_response(retry_after_secs: u32) -> Response {
    let body = RateLimitRejection {
        error: "rate_limit_exceeded",
        retry_after_seconds: retry_after_secs,
        message: format!(
            "Rate limit exceeded. Retry after {} second{}.",
            retry_after_secs,
            if retry_after_secs == 1 { "" } else { "s" }
        ),
    };

    let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
    response
        .headers_mut()
        .insert(RETRY_AFTER, HeaderValue::from(retry_after_secs));
    response
}

/// Resolve the caller identity for a request. Prefers the extension supplied
/// by the identity layer; falls back to the peer address.
fn caller_identity(request: &Request) -> CallerIdentity {
    if let Some(identity) = request.extensions().get::<CallerIdentity>() {
        return identity.clone();
    }

    let source_addr = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    CallerIdentity::anonymous(source_addr)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authenticated_caller_gets_user_bucket() {
        let identity = CallerIdentity {
            principal_id: Some("alice".to_string()),
            role: Some("editor".to_string()),
            source_addr: "10.0.0.7".to_string(),
        };

        assert_eq!(identity.bucket_key(), "user:alice");
        assert_eq!(identity.scope(), "user");
    }

    #[test]
    fn test_unauthenticated_caller_gets_ip_bucket() {
        let identity = CallerIdentity::anonymous("10.0.0.7".to_string());

        assert_eq!(identity.bucket_key(), "ip:10.0.0.7");
        assert_eq!(identity.scope(), "ip");
    }

    #[test]
    fn test_principal_takes_precedence_over_address() {
        // Both are present; the user scope must win.
        let identity = CallerIdentity {
            principal_id: Some("bob".to_string()),
            role: None,
            source_addr: "192.168.1.1".to_string(),
        };

        assert_eq!(identity.bucket_key(), "user:bob");
    }
}
