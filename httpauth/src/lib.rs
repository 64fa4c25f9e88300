//! # Portcullis HTTP Authentication
//!
//! HTTP Basic (RFC 7617) and Digest (RFC 2617/7616) authentication schemes
//! with pluggable secret sources, built on the `axum`/`http` types.
//!
//! A scheme implements [`AuthScheme`]: evaluate one request's credentials
//! and either grant it (yielding the authenticated username) or return the
//! complete scheme-mandated challenge response. Password lookup stays on
//! the caller's side of the [`SecretSource`] boundary; plain closures,
//! in-memory maps and Apache htpasswd/htdigest files are provided.
//!
//! ## Quick Start
//!
//! ```rust
//! use portcullis_httpauth::{BasicAuth, AuthScheme, AuthOutcome, StaticSecrets};
//! use axum::{body::Body, extract::Request};
//!
//! let scheme = BasicAuth::new("api", StaticSecrets::new().with_user("foo", "bar")).unwrap();
//!
//! let request = Request::builder()
//!     .uri("/")
//!     .header("authorization", "Basic Zm9vOmJhcg==") // base64("foo:bar")
//!     .body(Body::empty())
//!     .unwrap();
//!
//! match scheme.authenticate(&request) {
//!     AuthOutcome::Granted(grant) => assert_eq!(grant.username, "foo"),
//!     AuthOutcome::Denied(_) => unreachable!(),
//! }
//! ```
//!
//! Schemes are usually not called directly but mounted behind the
//! `portcullis-auth-middleware` adapter, which gates axum routes and makes
//! the authenticated username available to handlers.

#![warn(missing_docs)]

pub mod basic;
pub mod crypt;
pub mod digest;
pub mod error;
pub mod scheme;
pub mod secrets;

pub use basic::BasicAuth;
pub use crypt::md5_crypt;
pub use digest::{DigestAlgorithm, DigestAuth};
pub use error::{AuthError, AuthResult};
pub use scheme::{AuthOutcome, AuthScheme, Grant};
pub use secrets::{HtdigestFile, HtpasswdFile, SecretSource, StaticSecrets};
