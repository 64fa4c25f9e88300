//! # Portcullis Auth Middleware
//!
//! Adapter between a pluggable [`AuthScheme`] and axum's middleware chain.
//!
//! An [`AuthGate`] wraps the routes behind it: every request is handed to
//! the scheme first. A granted request proceeds to the inner handler with
//! the authenticated username recorded in its extensions; a denied request
//! is answered with the challenge response the scheme built, and the inner
//! handler never runs. The gate itself writes nothing on the denied path
//! and introduces no error type of its own.
//!
//! Downstream code reads the identity without a reference to the gate that
//! set it, either through the [`username`] accessor or the [`AuthUser`]
//! extractor.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use axum::{Router, routing::get, middleware::from_fn};
//! use portcullis_auth_middleware::{AuthGate, AuthUser};
//! use portcullis_httpauth::{BasicAuth, StaticSecrets};
//!
//! # fn main() -> Result<(), portcullis_httpauth::AuthError> {
//! let secrets = StaticSecrets::new().with_user("foo", "bar");
//! let gate = AuthGate::new(BasicAuth::new("api", secrets)?);
//!
//! let app: Router = Router::new()
//!     .route("/", get(|AuthUser(name): AuthUser| async move { format!("hello {name}") }))
//!     .layer(from_fn(move |req, next| {
//!         let gate = gate.clone();
//!         async move { gate.process(req, next).await }
//!     }));
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

use std::sync::Arc;

use axum::extract::{FromRequestParts, Request};
use axum::http::{Extensions, HeaderValue, StatusCode, request::Parts};
use axum::middleware::Next;
use axum::response::Response;
use tracing::debug;

use portcullis_httpauth::{AuthOutcome, AuthScheme};

/// Request header carrying the authenticated username downstream when
/// [`AuthGate::with_forwarded_username`] is enabled.
pub const FORWARDED_USERNAME_HEADER: &str = "x-authenticated-username";

/// The authenticated principal's name, stored in the request's extensions
/// by [`AuthGate::process`] on the granted path.
///
/// This is the one well-known slot the identity travels in; it is typed,
/// so foreign extension values can never shadow it. Also usable directly
/// as an extractor in handlers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser(pub String);

/// Gates the routes behind it behind an authentication scheme.
///
/// Immutable after construction and cheap to clone; a single gate is
/// shared across all in-flight requests of the routes it guards, and every
/// request is evaluated independently.
#[derive(Clone)]
pub struct AuthGate {
    scheme: Arc<dyn AuthScheme>,
    forward_username: bool,
}

impl AuthGate {
    /// Build a gate around the given scheme.
    pub fn new(scheme: impl AuthScheme + 'static) -> Self {
        Self {
            scheme: Arc::new(scheme),
            forward_username: false,
        }
    }

    /// Also set [`FORWARDED_USERNAME_HEADER`] on the request passed
    /// downstream, for handlers or proxied backends that read headers
    /// rather than extensions. Off by default.
    pub fn with_forwarded_username(mut self) -> Self {
        self.forward_username = true;
        self
    }

    /// Evaluate one request and either run `next` with the identity
    /// recorded, or return the scheme's rejection response verbatim.
    pub async fn process(&self, mut request: Request, next: Next) -> Response {
        match self.scheme.authenticate(&request) {
            AuthOutcome::Granted(grant) => {
                request
                    .extensions_mut()
                    .insert(AuthUser(grant.username.clone()));
                if self.forward_username {
                    if let Ok(value) = HeaderValue::from_str(&grant.username) {
                        request.headers_mut().insert(FORWARDED_USERNAME_HEADER, value);
                    }
                }
                let mut response = next.run(request).await;
                // The scheme owns Authentication-Info; the gate is its conduit.
                if let Some(info) = grant.authentication_info {
                    if let Ok(value) = HeaderValue::from_str(&info) {
                        response.headers_mut().insert("authentication-info", value);
                    }
                }
                response
            }
            AuthOutcome::Denied(response) => {
                debug!(status = %response.status(), "request denied by authentication scheme");
                response
            }
        }
    }
}

/// The authenticated username recorded in `extensions`, or `""` if the
/// request never passed a gate.
///
/// Total and idempotent: it never fails, and repeated calls return the
/// same value.
pub fn username(extensions: &Extensions) -> &str {
    extensions
        .get::<AuthUser>()
        .map(|user| user.0.as_str())
        .unwrap_or("")
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<AuthUser>().cloned().ok_or((
            StatusCode::INTERNAL_SERVER_ERROR,
            "authentication layer not installed",
        ))
    }
}
