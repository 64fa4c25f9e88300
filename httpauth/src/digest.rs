//! HTTP Digest authentication (RFC 2617 with RFC 7616's SHA-256 option)

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use axum::extract::Request;
use axum::http::{HeaderValue, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use md5::Md5;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use tracing::debug;

use crate::error::AuthResult;
use crate::scheme::{AuthOutcome, AuthScheme, Grant, strip_auth_scheme, validate_realm};
use crate::secrets::SecretSource;

/// Hash algorithm announced in the challenge and used for all digests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DigestAlgorithm {
    /// RFC 2617 default
    #[default]
    Md5,
    /// RFC 7616 `SHA-256`
    Sha256,
}

impl DigestAlgorithm {
    fn token(self) -> &'static str {
        match self {
            Self::Md5 => "MD5",
            Self::Sha256 => "SHA-256",
        }
    }

    fn hash(self, input: &str) -> String {
        match self {
            Self::Md5 => hex::encode(Md5::digest(input)),
            Self::Sha256 => hex::encode(Sha256::digest(input)),
        }
    }
}

/// Per-nonce session state: highest `nc` seen and when the nonce was last
/// used or minted.
#[derive(Debug)]
struct NonceEntry {
    nc: u64,
    last_seen: Instant,
}

/// Digest authentication scheme over a [`SecretSource`].
///
/// The source is expected to store HA1 values (`H(user:realm:password)`,
/// htdigest format); with [`with_plain_text_secrets`](Self::with_plain_text_secrets)
/// it may store raw passwords instead and HA1 is computed per request.
#[derive(Debug)]
pub struct DigestAuth<S> {
    realm: String,
    opaque: String,
    secrets: S,
    algorithm: DigestAlgorithm,
    plain_text_secrets: bool,
    ignore_nonce_count: bool,
    cache_size: usize,
    cache_tolerance: usize,
    nonce_max_age: Duration,
    clients: Mutex<HashMap<String, NonceEntry>>,
}

impl<S: SecretSource> DigestAuth<S> {
    /// Build a Digest scheme for `realm` with a fresh random `opaque`.
    pub fn new(realm: impl Into<String>, secrets: S) -> AuthResult<Self> {
        let realm = realm.into();
        validate_realm(&realm)?;
        Ok(Self {
            realm,
            opaque: random_key(),
            secrets,
            algorithm: DigestAlgorithm::default(),
            plain_text_secrets: false,
            ignore_nonce_count: false,
            cache_size: 1000,
            cache_tolerance: 100,
            nonce_max_age: Duration::from_secs(3600),
            clients: Mutex::new(HashMap::new()),
        })
    }

    /// Select the digest algorithm (default `MD5`).
    pub fn with_algorithm(mut self, algorithm: DigestAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Treat stored secrets as raw passwords instead of HA1 values.
    pub fn with_plain_text_secrets(mut self) -> Self {
        self.plain_text_secrets = true;
        self
    }

    /// Accept replayed or rewound `nc` values, for clients that cannot
    /// maintain a nonce counter.
    pub fn with_ignore_nonce_count(mut self) -> Self {
        self.ignore_nonce_count = true;
        self
    }

    /// Tune the nonce cache: target size and overflow tolerance.
    pub fn with_client_cache(mut self, size: usize, tolerance: usize) -> Self {
        self.cache_size = size;
        self.cache_tolerance = tolerance;
        self
    }

    /// Drop nonces not seen for this long (default one hour).
    pub fn with_nonce_max_age(mut self, max_age: Duration) -> Self {
        self.nonce_max_age = max_age;
        self
    }

    fn hash(&self, input: &str) -> String {
        self.algorithm.hash(input)
    }

    /// Drop expired nonces; when the cache still exceeds size + tolerance,
    /// purge the oldest 2x tolerance entries.
    fn purge(&self, clients: &mut HashMap<String, NonceEntry>) {
        let now = Instant::now();
        clients.retain(|_, entry| now.duration_since(entry.last_seen) < self.nonce_max_age);
        if clients.len() > self.cache_size + self.cache_tolerance {
            let mut by_age: Vec<(String, Instant)> = clients
                .iter()
                .map(|(nonce, entry)| (nonce.clone(), entry.last_seen))
                .collect();
            by_age.sort_by_key(|(_, last_seen)| *last_seen);
            for (nonce, _) in by_age.into_iter().take(self.cache_tolerance * 2) {
                clients.remove(&nonce);
            }
        }
    }

    /// Extract and verify the request's Digest credentials.
    ///
    /// On success returns the username and the `Authentication-Info` value
    /// the client expects on the response. Every malformation or mismatch
    /// folds to `None`.
    pub fn check(&self, request: &Request) -> Option<(String, String)> {
        let header_value = request.headers().get(header::AUTHORIZATION)?.to_str().ok()?;
        let auth = parse_digest_header(header_value)?;

        // RFC 2617 3.2.1: an absent algorithm directive means MD5.
        let algorithm = auth.get("algorithm").map(String::as_str).unwrap_or("MD5");
        if auth.get("opaque").map(String::as_str) != Some(self.opaque.as_str())
            || algorithm != self.algorithm.token()
            || auth.get("qop").map(String::as_str) != Some("auth")
        {
            return None;
        }

        let uri = auth.get("uri")?;
        let target = request
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or_else(|| request.uri().path());
        if uri.as_str() != target {
            // Historical allowance carried over from older deployments: the
            // uri directive may be a path prefix of the request target.
            let claimed: Uri = uri.parse().ok()?;
            let path = request.uri().path();
            if claimed.path().len() > path.len() || !path.starts_with(claimed.path()) {
                return None;
            }
        }

        let username = auth.get("username")?;
        let nonce = auth.get("nonce")?;
        let nc_hex = auth.get("nc")?;
        let cnonce = auth.get("cnonce")?;
        let response = auth.get("response")?;

        let mut ha1 = self.secrets.secret(username, &self.realm)?;
        if self.plain_text_secrets {
            ha1 = self.hash(&format!("{username}:{}:{ha1}", self.realm));
        }
        let ha2 = self.hash(&format!("{}:{uri}", request.method()));
        let kd = self.hash(&format!("{ha1}:{nonce}:{nc_hex}:{cnonce}:auth:{ha2}"));
        if !bool::from(kd.as_bytes().ct_eq(response.as_bytes())) {
            return None;
        }

        // Crypto checks passed; validate the nonce session.
        let nc = u64::from_str_radix(nc_hex, 16).ok()?;
        {
            let mut clients = self.clients.lock().unwrap();
            let last_seen = clients.get(nonce)?.last_seen;
            if Instant::now().duration_since(last_seen) >= self.nonce_max_age {
                debug!(realm = %self.realm, "nonce aged out");
                clients.remove(nonce);
                return None;
            }
            let entry = clients.get_mut(nonce)?;
            if entry.nc != 0 && entry.nc >= nc && !self.ignore_nonce_count {
                debug!(realm = %self.realm, nc, "replayed or rewound nonce count");
                return None;
            }
            entry.nc = nc;
            entry.last_seen = Instant::now();
        }

        let resp_ha2 = self.hash(&format!(":{uri}"));
        let rspauth = self.hash(&format!("{ha1}:{nonce}:{nc_hex}:{cnonce}:auth:{resp_ha2}"));
        let info = format!("qop=\"auth\", rspauth=\"{rspauth}\", cnonce=\"{cnonce}\", nc={nc_hex}");
        Some((username.clone(), info))
    }

    /// Mint and register a fresh nonce, and build the complete rejection
    /// response carrying the challenge.
    pub fn challenge(&self) -> Response {
        let nonce = random_key();
        {
            let mut clients = self.clients.lock().unwrap();
            self.purge(&mut clients);
            clients.insert(
                nonce.clone(),
                NonceEntry {
                    nc: 0,
                    last_seen: Instant::now(),
                },
            );
        }
        let value = format!(
            "Digest realm=\"{}\", nonce=\"{}\", opaque=\"{}\", algorithm={}, qop=\"auth\"",
            self.realm,
            nonce,
            self.opaque,
            self.algorithm.token()
        );
        let value =
            HeaderValue::from_str(&value).unwrap_or_else(|_| HeaderValue::from_static("Digest"));
        (
            StatusCode::UNAUTHORIZED,
            [(header::WWW_AUTHENTICATE, value)],
            "401 Unauthorized\n",
        )
            .into_response()
    }
}

impl<S: SecretSource> AuthScheme for DigestAuth<S> {
    fn authenticate(&self, request: &Request) -> AuthOutcome {
        match self.check(request) {
            Some((username, info)) => AuthOutcome::Granted(Grant {
                username,
                authentication_info: Some(info),
            }),
            None => {
                debug!(realm = %self.realm, "digest credentials missing or invalid");
                AuthOutcome::Denied(self.challenge())
            }
        }
    }
}

fn random_key() -> String {
    use rand::RngCore;
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Parse `Digest k=v, k="quoted, value", ...` into a lowercase-keyed map.
fn parse_digest_header(value: &str) -> Option<HashMap<String, String>> {
    let params = strip_auth_scheme(value, "digest")?;
    let mut pairs = HashMap::new();
    for part in split_quoted_commas(params) {
        let (key, raw) = part.trim().split_once('=')?;
        pairs.insert(key.trim().to_ascii_lowercase(), unquote(raw.trim()));
    }
    Some(pairs)
}

/// Split on commas that are not inside a quoted string.
fn split_quoted_commas(s: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut in_quotes = false;
    let mut escaped = false;
    for (i, c) in s.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                parts.push(&s[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&s[start..]);
    parts.into_iter().filter(|p| !p.trim().is_empty()).collect()
}

/// Strip surrounding quotes and resolve backslash escapes.
fn unquote(raw: &str) -> String {
    if raw.len() >= 2 && raw.starts_with('"') && raw.ends_with('"') {
        let inner = &raw[1..raw.len() - 1];
        let mut out = String::with_capacity(inner.len());
        let mut escaped = false;
        for c in inner.chars() {
            if escaped {
                out.push(c);
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else {
                out.push(c);
            }
        }
        out
    } else {
        raw.to_string()
    }
}
