// crates/omnibus-server/src/auth.rs
// ============================================================================
// Module: Write Authentication
// Description: API-key enforcement and audit for catalog write endpoints.
// Purpose: Provide strict, fail-closed auth for mutating requests.
// Dependencies: omnibus-config, serde, sha2
// ============================================================================

//! ## Overview
//! Read endpoints are public. Write endpoints require an `x-api-key` header
//! matching one of the configured keys. When no keys are configured the
//! server only accepts a loopback bind (enforced at config validation), and
//! writes from loopback peers are treated as local operator access. Every
//! decision emits an audit event carrying a hashed key fingerprint, never
//! the key itself.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::net::IpAddr;
use std::sync::Arc;

use serde::Serialize;
use sha2::Digest;
use sha2::Sha256;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Header carrying the caller's API key.
pub const API_KEY_HEADER: &str = "x-api-key";
/// Maximum accepted header value size.
const MAX_API_KEY_HEADER_BYTES: usize = 8 * 1024;

// ============================================================================
// SECTION: Request Context
// ============================================================================

/// Per-request context used for write-auth decisions.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Peer IP address when available.
    pub peer_ip: Option<IpAddr>,
    /// `x-api-key` header value, when present.
    pub api_key: Option<String>,
}

impl RequestContext {
    /// Returns true when the peer IP is loopback.
    #[must_use]
    pub fn peer_is_loopback(&self) -> bool {
        self.peer_ip.is_some_and(|ip| ip.is_loopback())
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Write authentication errors.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Missing or invalid API key.
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),
}

// ============================================================================
// SECTION: Policy
// ============================================================================

/// Write-auth policy derived from server configuration.
pub struct ApiKeyPolicy {
    /// Accepted API keys.
    keys: BTreeSet<String>,
    /// Audit sink for auth decisions.
    audit: Arc<dyn AuthAuditSink>,
}

impl ApiKeyPolicy {
    /// Builds a policy from the configured keys and audit sink.
    #[must_use]
    pub fn new(keys: &[String], audit: Arc<dyn AuthAuditSink>) -> Self {
        Self {
            keys: keys.iter().map(|key| key.trim().to_string()).collect(),
            audit,
        }
    }

    /// Authorizes one write request, emitting an audit event either way.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Unauthenticated`] when the caller presents no
    /// acceptable credential.
    pub fn authorize_write(&self, ctx: &RequestContext, action: &str) -> Result<(), AuthError> {
        let decision = self.decide(ctx);
        match &decision {
            Ok(method) => {
                self.audit.record(&AuthAuditEvent::allowed(ctx, action, method));
            }
            Err(error) => {
                self.audit.record(&AuthAuditEvent::denied(ctx, action, error));
            }
        }
        decision.map(|_| ())
    }

    /// Applies the fail-closed decision rules.
    fn decide(&self, ctx: &RequestContext) -> Result<AuthMethod, AuthError> {
        if self.keys.is_empty() {
            if ctx.peer_is_loopback() {
                return Ok(AuthMethod::Local);
            }
            return Err(AuthError::Unauthenticated(
                "writes require loopback access when no api keys are configured".to_string(),
            ));
        }
        let presented = ctx
            .api_key
            .as_deref()
            .ok_or_else(|| AuthError::Unauthenticated("missing x-api-key header".to_string()))?;
        if presented.len() > MAX_API_KEY_HEADER_BYTES {
            return Err(AuthError::Unauthenticated("x-api-key header too large".to_string()));
        }
        let trimmed = presented.trim();
        if self.keys.contains(trimmed) {
            Ok(AuthMethod::ApiKey {
                fingerprint: key_fingerprint(trimmed),
            })
        } else {
            Err(AuthError::Unauthenticated("invalid api key".to_string()))
        }
    }
}

/// Authentication method accepted for a write.
#[derive(Debug, Clone)]
pub enum AuthMethod {
    /// Loopback access with no keys configured.
    Local,
    /// Valid API key (fingerprint hashed).
    ApiKey {
        /// Hex sha256 fingerprint of the accepted key.
        fingerprint: String,
    },
}

/// Returns the hex sha256 fingerprint of an API key.
fn key_fingerprint(key: &str) -> String {
    let digest = Sha256::digest(key.as_bytes());
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

// ============================================================================
// SECTION: Audit
// ============================================================================

/// Audit sink for write-auth decisions.
pub trait AuthAuditSink: Send + Sync {
    /// Records one auth audit event.
    fn record(&self, event: &AuthAuditEvent);
}

/// Auth audit event payload.
#[derive(Debug, Serialize)]
pub struct AuthAuditEvent {
    /// Event identifier.
    event: &'static str,
    /// Decision outcome.
    decision: &'static str,
    /// Endpoint action label.
    action: String,
    /// Caller IP address (if available).
    peer_ip: Option<String>,
    /// Auth method label.
    auth_method: Option<&'static str>,
    /// API key fingerprint (sha256), never the key.
    key_fingerprint: Option<String>,
    /// Failure reason (for deny events).
    reason: Option<String>,
}

impl AuthAuditEvent {
    /// Builds an allow event.
    #[must_use]
    fn allowed(ctx: &RequestContext, action: &str, method: &AuthMethod) -> Self {
        let (label, fingerprint) = match method {
            AuthMethod::Local => ("local", None),
            AuthMethod::ApiKey {
                fingerprint,
            } => ("api_key", Some(fingerprint.clone())),
        };
        Self {
            event: "omnibus_write_authz",
            decision: "allow",
            action: action.to_string(),
            peer_ip: ctx.peer_ip.map(|ip| ip.to_string()),
            auth_method: Some(label),
            key_fingerprint: fingerprint,
            reason: None,
        }
    }

    /// Builds a deny event.
    #[must_use]
    fn denied(ctx: &RequestContext, action: &str, error: &AuthError) -> Self {
        Self {
            event: "omnibus_write_authz",
            decision: "deny",
            action: action.to_string(),
            peer_ip: ctx.peer_ip.map(|ip| ip.to_string()),
            auth_method: None,
            key_fingerprint: None,
            reason: Some(error.to_string()),
        }
    }
}

/// Audit sink that logs JSON lines to stderr.
pub struct StderrAuditSink;

impl AuthAuditSink for StderrAuditSink {
    #[allow(clippy::print_stderr, reason = "Stderr is the audit sink's output contract.")]
    fn record(&self, event: &AuthAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            eprintln!("{payload}");
        }
    }
}

/// No-op audit sink for tests and disabled auditing.
pub struct NoopAuditSink;

impl AuthAuditSink for NoopAuditSink {
    fn record(&self, _event: &AuthAuditEvent) {}
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only auth assertions.")]

    use std::net::Ipv4Addr;

    use super::*;

    fn policy(keys: &[&str]) -> ApiKeyPolicy {
        let keys: Vec<String> = keys.iter().map(ToString::to_string).collect();
        ApiKeyPolicy::new(&keys, Arc::new(NoopAuditSink))
    }

    fn ctx(loopback: bool, key: Option<&str>) -> RequestContext {
        let ip = if loopback {
            Ipv4Addr::LOCALHOST
        } else {
            Ipv4Addr::new(203, 0, 113, 9)
        };
        RequestContext {
            peer_ip: Some(IpAddr::V4(ip)),
            api_key: key.map(ToString::to_string),
        }
    }

    #[test]
    fn no_keys_allows_loopback_only() {
        let policy = policy(&[]);
        assert!(policy.authorize_write(&ctx(true, None), "post_species").is_ok());
        assert!(policy.authorize_write(&ctx(false, None), "post_species").is_err());
    }

    #[test]
    fn configured_keys_require_a_match() {
        let policy = policy(&["secret-1"]);
        assert!(policy.authorize_write(&ctx(false, Some("secret-1")), "post_species").is_ok());
        assert!(policy.authorize_write(&ctx(false, Some("wrong")), "post_species").is_err());
        assert!(policy.authorize_write(&ctx(false, None), "post_species").is_err());
    }

    #[test]
    fn loopback_does_not_bypass_configured_keys() {
        let policy = policy(&["secret-1"]);
        assert!(policy.authorize_write(&ctx(true, None), "post_species").is_err());
    }

    #[test]
    fn key_is_trimmed_before_comparison() {
        let policy = policy(&["secret-1"]);
        assert!(policy.authorize_write(&ctx(false, Some("  secret-1  ")), "x").is_ok());
    }

    #[test]
    fn fingerprint_is_hex_sha256() {
        let fp = key_fingerprint("secret-1");
        assert_eq!(fp.len(), 64);
        assert!(fp.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
