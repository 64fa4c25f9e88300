//! The pluggable authentication scheme contract

use axum::extract::Request;
use axum::response::Response;

/// A successful authentication decision.
#[derive(Debug, Clone)]
pub struct Grant {
    /// Name of the authenticated principal
    pub username: String,
    /// Scheme-authored `Authentication-Info` header value, if the scheme
    /// produces one (Digest does, Basic does not)
    pub authentication_info: Option<String>,
}

impl Grant {
    /// Grant without an `Authentication-Info` value.
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            authentication_info: None,
        }
    }
}

/// Outcome of evaluating one request's credentials.
#[derive(Debug)]
pub enum AuthOutcome {
    /// Credentials checked out; the request may proceed
    Granted(Grant),
    /// Credentials were missing, malformed or wrong. The carried response
    /// is the complete rejection the scheme mandates (conventionally a 401
    /// with a `WWW-Authenticate` challenge) and must be sent verbatim.
    Denied(Response),
}

/// An authentication scheme decides whether a request's credentials are
/// valid and builds the scheme-mandated challenge when they are not.
///
/// Implementations hold no per-request state; a single instance is shared
/// across all in-flight requests of the routes it guards.
pub trait AuthScheme: Send + Sync {
    /// Evaluate one request. Every request is evaluated independently;
    /// the scheme never caches a decision across requests.
    fn authenticate(&self, request: &Request) -> AuthOutcome;
}

/// Reject a realm that could not be embedded in a quoted challenge string.
pub(crate) fn validate_realm(realm: &str) -> crate::error::AuthResult<()> {
    let ok = realm
        .chars()
        .all(|c| matches!(c, ' '..='~') && c != '"' && c != '\\');
    if ok {
        Ok(())
    } else {
        Err(crate::error::AuthError::InvalidRealm(realm.to_string()))
    }
}

/// Split an `Authorization` header value into scheme and parameters,
/// matching the scheme name case-insensitively.
pub(crate) fn strip_auth_scheme<'a>(header: &'a str, scheme: &str) -> Option<&'a str> {
    let (name, rest) = header.trim_start().split_once(' ')?;
    if name.eq_ignore_ascii_case(scheme) {
        Some(rest.trim_start())
    } else {
        None
    }
}
