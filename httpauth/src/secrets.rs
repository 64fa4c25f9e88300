//! Secret sources: the caller-owned "user, realm -> stored secret" boundary
//!
//! Schemes never look at passwords directly; they ask a [`SecretSource`] for
//! the stored secret of a user within a realm and verify against that. What
//! "stored secret" means depends on the scheme: Basic expects an htpasswd
//! style hash (or plaintext), Digest expects an HA1 (or plaintext when the
//! scheme is configured for it).

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::SystemTime;

use tracing::{debug, warn};

use crate::error::{AuthError, AuthResult};

/// Looks up the stored secret for a user within a realm.
///
/// Returning `None` means "unknown user" and folds into a denied request;
/// it is never an error.
pub trait SecretSource: Send + Sync {
    /// Stored secret for `user` in `realm`, or `None` if unknown.
    fn secret(&self, user: &str, realm: &str) -> Option<String>;
}

impl<F> SecretSource for F
where
    F: Fn(&str, &str) -> Option<String> + Send + Sync,
{
    fn secret(&self, user: &str, realm: &str) -> Option<String> {
        self(user, realm)
    }
}

/// In-memory user -> secret map, for tests, demos and small deployments.
///
/// The realm is ignored, matching htpasswd semantics where a file serves
/// exactly one realm.
#[derive(Debug, Clone, Default)]
pub struct StaticSecrets {
    users: HashMap<String, String>,
}

impl StaticSecrets {
    /// Empty source; chain [`with_user`](Self::with_user) to populate it.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a user with its stored secret.
    pub fn with_user(mut self, user: impl Into<String>, secret: impl Into<String>) -> Self {
        self.users.insert(user.into(), secret.into());
        self
    }
}

impl SecretSource for StaticSecrets {
    fn secret(&self, user: &str, _realm: &str) -> Option<String> {
        self.users.get(user).cloned()
    }
}

/// Parsed snapshot of a secret file plus the mtime it was read at.
#[derive(Debug)]
struct FileSnapshot<K> {
    modified: Option<SystemTime>,
    records: HashMap<K, String>,
}

/// Check whether the file changed since the snapshot was taken.
fn file_changed(path: &Path, snapshot_mtime: Option<SystemTime>) -> std::io::Result<bool> {
    let modified = fs::metadata(path)?.modified()?;
    Ok(snapshot_mtime != Some(modified))
}

/// `user:secret` records in Apache htpasswd format, for Basic authentication.
///
/// The file is parsed strictly when opened; afterwards it is transparently
/// reloaded whenever its mtime changes. A failed reload logs a warning and
/// keeps serving the previous snapshot.
#[derive(Debug)]
pub struct HtpasswdFile {
    path: PathBuf,
    state: Mutex<FileSnapshot<String>>,
}

impl HtpasswdFile {
    /// Open and parse an htpasswd file. Any malformed record is an error.
    pub fn open(path: impl Into<PathBuf>) -> AuthResult<Self> {
        let path = path.into();
        let state = Mutex::new(Self::load(&path)?);
        Ok(Self { path, state })
    }

    fn load(path: &Path) -> AuthResult<FileSnapshot<String>> {
        let modified = fs::metadata(path)?.modified().ok();
        let contents = fs::read_to_string(path)?;
        let mut records = HashMap::new();
        for (idx, line) in contents.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (user, secret) = line.split_once(':').ok_or(AuthError::MalformedRecord {
                path: path.display().to_string(),
                line: idx + 1,
                reason: "expected user:secret".to_string(),
            })?;
            records.insert(user.to_string(), secret.to_string());
        }
        debug!(path = %path.display(), users = records.len(), "loaded htpasswd file");
        Ok(FileSnapshot { modified, records })
    }
}

impl SecretSource for HtpasswdFile {
    fn secret(&self, user: &str, _realm: &str) -> Option<String> {
        let mut state = self.state.lock().ok()?;
        match file_changed(&self.path, state.modified) {
            Ok(true) => match Self::load(&self.path) {
                Ok(snapshot) => *state = snapshot,
                Err(e) => {
                    warn!(path = %self.path.display(), error = %e,
                          "htpasswd reload failed, keeping previous snapshot");
                }
            },
            Ok(false) => {}
            Err(e) => {
                warn!(path = %self.path.display(), error = %e,
                      "htpasswd stat failed, keeping previous snapshot");
            }
        }
        state.records.get(user).cloned()
    }
}

/// `user:realm:ha1` records in Apache htdigest format, for Digest
/// authentication. Reload behavior matches [`HtpasswdFile`].
#[derive(Debug)]
pub struct HtdigestFile {
    path: PathBuf,
    state: Mutex<FileSnapshot<(String, String)>>,
}

impl HtdigestFile {
    /// Open and parse an htdigest file. Any malformed record is an error.
    pub fn open(path: impl Into<PathBuf>) -> AuthResult<Self> {
        let path = path.into();
        let state = Mutex::new(Self::load(&path)?);
        Ok(Self { path, state })
    }

    fn load(path: &Path) -> AuthResult<FileSnapshot<(String, String)>> {
        let modified = fs::metadata(path)?.modified().ok();
        let contents = fs::read_to_string(path)?;
        let mut records = HashMap::new();
        for (idx, line) in contents.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let parts: Vec<&str> = line.split(':').collect();
            let [user, realm, ha1] = parts[..] else {
                return Err(AuthError::MalformedRecord {
                    path: path.display().to_string(),
                    line: idx + 1,
                    reason: "expected user:realm:ha1".to_string(),
                });
            };
            records.insert((user.to_string(), realm.to_string()), ha1.to_string());
        }
        debug!(path = %path.display(), users = records.len(), "loaded htdigest file");
        Ok(FileSnapshot { modified, records })
    }
}

impl SecretSource for HtdigestFile {
    fn secret(&self, user: &str, realm: &str) -> Option<String> {
        let mut state = self.state.lock().ok()?;
        match file_changed(&self.path, state.modified) {
            Ok(true) => match Self::load(&self.path) {
                Ok(snapshot) => *state = snapshot,
                Err(e) => {
                    warn!(path = %self.path.display(), error = %e,
                          "htdigest reload failed, keeping previous snapshot");
                }
            },
            Ok(false) => {}
            Err(e) => {
                warn!(path = %self.path.display(), error = %e,
                      "htdigest stat failed, keeping previous snapshot");
            }
        }
        state
            .records
            .get(&(user.to_string(), realm.to_string()))
            .cloned()
    }
}
