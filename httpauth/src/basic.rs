//! HTTP Basic authentication (RFC 7617, server side)

use axum::extract::Request;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use sha1::{Digest, Sha1};
use subtle::ConstantTimeEq;
use tracing::debug;

use crate::crypt::md5_crypt;
use crate::error::{AuthError, AuthResult};
use crate::scheme::{AuthOutcome, AuthScheme, Grant, strip_auth_scheme, validate_realm};
use crate::secrets::SecretSource;

/// Basic authentication scheme over a [`SecretSource`].
///
/// Stored secrets are verified according to their format prefix, matching
/// what an htpasswd file may contain: `{SHA}` (base64 SHA-1), `$apr1$`/`$1$`
/// (MD5-crypt), `$2a$`/`$2x$`/`$2y$` (bcrypt), anything else plaintext.
#[derive(Debug)]
pub struct BasicAuth<S> {
    realm: String,
    challenge_value: HeaderValue,
    secrets: S,
}

impl<S: SecretSource> BasicAuth<S> {
    /// Build a Basic scheme for `realm` over the given secret source.
    pub fn new(realm: impl Into<String>, secrets: S) -> AuthResult<Self> {
        let realm = realm.into();
        validate_realm(&realm)?;
        let challenge_value = HeaderValue::from_str(&format!("Basic realm=\"{realm}\""))
            .map_err(|_| AuthError::InvalidRealm(realm.clone()))?;
        Ok(Self {
            realm,
            challenge_value,
            secrets,
        })
    }

    /// Extract and verify the request's Basic credentials.
    ///
    /// Every malformation (missing header, wrong scheme, bad base64, no
    /// colon, unknown user, wrong password) folds to `None`.
    pub fn check(&self, request: &Request) -> Option<String> {
        let header = request.headers().get(header::AUTHORIZATION)?.to_str().ok()?;
        let encoded = strip_auth_scheme(header, "basic")?;
        let decoded = BASE64.decode(encoded.trim_end()).ok()?;
        let decoded = String::from_utf8(decoded).ok()?;
        let (user, password) = decoded.split_once(':')?;
        let stored = self.secrets.secret(user, &self.realm)?;
        verify_secret(password, &stored).then(|| user.to_string())
    }

    /// The complete rejection response for this realm.
    pub fn challenge(&self) -> Response {
        (
            StatusCode::UNAUTHORIZED,
            [(header::WWW_AUTHENTICATE, self.challenge_value.clone())],
            "401 Unauthorized\n",
        )
            .into_response()
    }
}

impl<S: SecretSource> AuthScheme for BasicAuth<S> {
    fn authenticate(&self, request: &Request) -> AuthOutcome {
        match self.check(request) {
            Some(username) => AuthOutcome::Granted(Grant::new(username)),
            None => {
                debug!(realm = %self.realm, "basic credentials missing or invalid");
                AuthOutcome::Denied(self.challenge())
            }
        }
    }
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

/// Verify a password against a stored secret, dispatching on its format.
pub(crate) fn verify_secret(password: &str, secret: &str) -> bool {
    if let Some(encoded) = secret.strip_prefix("{SHA}") {
        let digest = Sha1::digest(password.as_bytes());
        constant_time_eq(encoded, &BASE64.encode(digest))
    } else if secret.starts_with("$apr1$") || secret.starts_with("$1$") {
        let magic_len = if secret.starts_with("$apr1$") { 6 } else { 3 };
        let (magic, rest) = secret.split_at(magic_len);
        let salt = rest.split('$').next().unwrap_or("");
        constant_time_eq(secret, &md5_crypt(password, salt, magic))
    } else if ["$2a$", "$2x$", "$2y$"].iter().any(|p| secret.starts_with(p)) {
        bcrypt::verify(password, secret).unwrap_or(false)
    } else {
        constant_time_eq(secret, password)
    }
}
