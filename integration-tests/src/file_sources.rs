//! File-backed secret sources driving the schemes end to end

#[cfg(test)]
mod tests {
    use crate::test_utils::*;
    use axum::body::Body;
    use axum::extract::Request;
    use axum::http::{StatusCode, header};
    use portcullis_auth_middleware::AuthGate;
    use portcullis_httpauth::{BasicAuth, DigestAuth, HtdigestFile, HtpasswdFile, md5_crypt};
    use std::io::Write;
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;
    use tower::ServiceExt;

    #[tokio::test]
    async fn htpasswd_backed_basic_flow() {
        init_tracing();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# staff accounts").unwrap();
        writeln!(file, "foo:{}", md5_crypt("bar", "lmh6xuol", "$apr1$")).unwrap();
        file.flush().unwrap();

        let secrets = HtpasswdFile::open(file.path()).unwrap();
        let gate = AuthGate::new(BasicAuth::new("files", secrets).unwrap());
        let app = gated_hello(gate, Arc::new(AtomicUsize::new(0)));

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/")
                    .header(header::AUTHORIZATION, "Basic Zm9vOmJhcg==")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "hello foo");

        // base64("stranger:bar")
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/")
                    .header(header::AUTHORIZATION, "Basic c3RyYW5nZXI6YmFy")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn htdigest_backed_digest_flow() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        // HA1 = MD5("foo:api:bar"), as htdigest stores it.
        writeln!(file, "foo:api:{}", md5_hex("foo:api:bar")).unwrap();
        file.flush().unwrap();

        let secrets = HtdigestFile::open(file.path()).unwrap();
        let auth = DigestAuth::new("api", secrets).unwrap();
        let gate = AuthGate::new(auth);
        let app = gated_hello(gate, Arc::new(AtomicUsize::new(0)));

        let response = app
            .clone()
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

        let nonce = &challenge["nonce"];
        let ha1 = md5_hex("foo:api:bar");
        let ha2 = md5_hex("GET:/");
        let digest_response = md5_hex(&format!("{ha1}:{nonce}:00000001:cafe:auth:{ha2}"));
        let authorization = format!(
            "Digest username=\"foo\", realm=\"api\", nonce=\"{nonce}\", uri=\"/\", \
             cnonce=\"cafe\", nc=00000001, qop=auth, response=\"{digest_response}\", \
             opaque=\"{}\"",
            challenge["opaque"]
        );

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/")
                    .header(header::AUTHORIZATION, authorization)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "hello foo");
    }

    #[tokio::test]
    async fn malformed_rewrite_keeps_previous_snapshot() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "foo:bar").unwrap();
        file.flush().unwrap();

        let secrets = HtpasswdFile::open(file.path()).unwrap();
        let gate = AuthGate::new(BasicAuth::new("files", secrets).unwrap());
        let app = gated_hello(gate, Arc::new(AtomicUsize::new(0)));

        // Corrupt the file on disk with a fresh mtime; the reload fails and
        // the source keeps serving the snapshot it already has.
        std::fs::write(file.path(), "no-colon-here\n").unwrap();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/")
                    .header(header::AUTHORIZATION, "Basic Zm9vOmJhcg==")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
