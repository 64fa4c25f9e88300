//! Demo server: `/basic` and `/digest` each guarded by its own gate
//!
//! Try it:
//!
//! ```text
//! cargo run -p protected-api
//! curl -u foo:bar http://127.0.0.1:8080/basic
//! curl --digest -u foo:bar http://127.0.0.1:8080/digest
//! curl http://127.0.0.1:8080/healthz
//! ```

use anyhow::Result;
use axum::{Router, middleware::from_fn, routing::get};
use portcullis_auth_middleware::{AuthGate, AuthUser};
use portcullis_httpauth::{BasicAuth, DigestAuth, StaticSecrets, md5_crypt};
use tracing_subscriber::EnvFilter;

async fn hello(AuthUser(name): AuthUser) -> String {
    format!("hello {name}")
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    // Basic verifies against an MD5-crypt hash, as htpasswd would store it.
    let basic_secrets = StaticSecrets::new().with_user("foo", md5_crypt("bar", "salt", "$1$"));
    let basic = AuthGate::new(BasicAuth::new("protected", basic_secrets)?);

    // Digest gets the raw password and derives HA1 per request.
    let digest_secrets = StaticSecrets::new().with_user("foo", "bar");
    let digest =
        AuthGate::new(DigestAuth::new("protected", digest_secrets)?.with_plain_text_secrets());

    let app = Router::new()
        .route(
            "/basic",
            get(hello).layer(from_fn(move |req, next| {
                let gate = basic.clone();
                async move { gate.process(req, next).await }
            })),
        )
        .route(
            "/digest",
            get(hello).layer(from_fn(move |req, next| {
                let gate = digest.clone();
                async move { gate.process(req, next).await }
            })),
        )
        .route("/healthz", get(|| async { "ok" }));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:8080").await?;
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
