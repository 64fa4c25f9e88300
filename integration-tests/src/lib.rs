//! Integration tests for the Portcullis authentication crates
//!
//! These scenarios exercise the schemes and the middleware adapter working
//! together through a real axum `Router`: full Basic and Digest round
//! trips, file-backed secret sources, and the behavioral contract of the
//! gate itself.

#![allow(unused_imports)] // Allow unused imports in integration tests

pub mod basic_flow;
pub mod digest_flow;
pub mod file_sources;
pub mod gate_properties;

/// Common test utilities for integration tests
pub mod test_utils {
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;

    use axum::Router;
    use axum::extract::Request;
    use axum::middleware::from_fn;
    use axum::response::Response;
    use axum::routing::get;
    use md5::{Digest, Md5};
    use portcullis_auth_middleware::{AuthGate, username};

    /// Install a subscriber once so `RUST_LOG` works in test runs.
    pub fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    }

    /// Router with one gated `/` route answering `hello <username>` and
    /// counting invocations.
    pub fn gated_hello(gate: AuthGate, hits: Arc<AtomicUsize>) -> Router {
        Router::new()
            .route(
                "/",
                get(move |req: Request| {
                    let hits = hits.clone();
                    async move {
                        hits.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                        format!("hello {}", username(req.extensions()))
                    }
                }),
            )
            .layer(from_fn(move |req, next| {
                let gate = gate.clone();
                async move { gate.process(req, next).await }
            }))
    }

    /// Collect the response body into a string.
    pub async fn body_string(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    /// Lowercase hex MD5, the client side of an `algorithm=MD5` exchange.
    pub fn md5_hex(input: &str) -> String {
        hex::encode(Md5::digest(input))
    }

    /// Parse the directives of a `Digest`-scheme header value. Good enough
    /// for the challenges these tests mint: quoted values never contain
    /// commas.
    pub fn digest_params(value: &str) -> HashMap<String, String> {
        let params = value
            .trim_start()
            .split_once(' ')
            .map(|(_, rest)| rest)
            .unwrap_or(value);
        params
            .split(',')
            .filter_map(|part| {
                let (key, raw) = part.trim().split_once('=')?;
                Some((key.to_ascii_lowercase(), raw.trim_matches('"').to_string()))
            })
            .collect()
    }
}
