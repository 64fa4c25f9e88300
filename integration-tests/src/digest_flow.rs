//! Full Digest challenge/response round trip through the middleware

#[cfg(test)]
mod tests {
    use crate::test_utils::*;
    use axum::body::Body;
    use axum::extract::Request;
    use axum::http::{StatusCode, header};
    use portcullis_auth_middleware::AuthGate;
    use portcullis_httpauth::{DigestAuth, StaticSecrets};
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tower::ServiceExt;

    /// Build the Authorization header a conforming MD5 client would send.
    fn authorization(challenge: &HashMap<String, String>, nc: &str) -> String {
        let nonce = &challenge["nonce"];
        let opaque = &challenge["opaque"];
        let ha1 = md5_hex("foo:api:bar");
        let ha2 = md5_hex("GET:/");
        let response = md5_hex(&format!("{ha1}:{nonce}:{nc}:0a4f113b:auth:{ha2}"));
        format!(
            "Digest username=\"foo\", realm=\"api\", nonce=\"{nonce}\", uri=\"/\", \
             cnonce=\"0a4f113b\", nc={nc}, qop=auth, response=\"{response}\", \
             opaque=\"{opaque}\", algorithm=MD5"
        )
    }

    #[tokio::test]
    async fn digest_challenge_then_authenticated_request() {
        init_tracing();
        let secrets = StaticSecrets::new().with_user("foo", "bar");
        let gate = AuthGate::new(
            DigestAuth::new("api", secrets)
                .unwrap()
                .with_plain_text_secrets(),
        );
        let hits = Arc::new(AtomicUsize::new(0));
        let app = gated_hello(gate, hits.clone());

        // First request carries no credentials and is challenged.
        let response = app
            .clone()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let challenge = digest_params(
            response
                .headers()
                .get(header::WWW_AUTHENTICATE)
                .unwrap()
                .to_str()
                .unwrap(),
        );
        assert_eq!(challenge["realm"], "api");
        assert_eq!(challenge["algorithm"], "MD5");
        assert_eq!(challenge["qop"], "auth");
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        // Second request answers the challenge and passes.
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/")
                    .header(header::AUTHORIZATION, authorization(&challenge, "00000001"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        // The scheme's Authentication-Info rides the success response.
        let info = digest_params(
            response
                .headers()
                .get("authentication-info")
                .unwrap()
                .to_str()
                .unwrap(),
        );
        let ha1 = md5_hex("foo:api:bar");
        let resp_ha2 = md5_hex(":/");
        let expected_rspauth = md5_hex(&format!(
            "{ha1}:{}:00000001:0a4f113b:auth:{resp_ha2}",
            challenge["nonce"]
        ));
        assert_eq!(info["rspauth"], expected_rspauth);

        assert_eq!(body_string(response).await, "hello foo");
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        // Replaying the same nonce count is rejected with a new challenge.
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/")
                    .header(header::AUTHORIZATION, authorization(&challenge, "00000001"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stale_nonce_from_another_instance_is_rejected() {
        let secrets = StaticSecrets::new().with_user("foo", "bar");
        let gate_a = AuthGate::new(
            DigestAuth::new("api", secrets.clone())
                .unwrap()
                .with_plain_text_secrets(),
        );
        let gate_b = AuthGate::new(
            DigestAuth::new("api", secrets)
                .unwrap()
                .with_plain_text_secrets(),
        );
        let hits = Arc::new(AtomicUsize::new(0));
        let app_a = gated_hello(gate_a, hits.clone());
        let app_b = gated_hello(gate_b, hits.clone());

        let response = app_a
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let challenge = digest_params(
            response
                .headers()
                .get(header::WWW_AUTHENTICATE)
                .unwrap()
                .to_str()
                .unwrap(),
        );

        // A nonce minted by one instance means nothing to another; the
        // opaque will not match either.
        let response = app_b
            .oneshot(
                Request::builder()
                    .uri("/")
                    .header(header::AUTHORIZATION, authorization(&challenge, "00000001"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }
}
