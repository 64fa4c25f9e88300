//! Error types for the authentication schemes

use thiserror::Error;

/// Result type for scheme and secret-source construction
pub type AuthResult<T> = Result<T, AuthError>;

/// Errors that can occur while building a scheme or opening a secret source.
///
/// A failed credential check is never an error value; it surfaces as the
/// scheme's challenge response instead.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Realm contains characters that cannot appear in a challenge header
    #[error("invalid realm {0:?}: must be visible ASCII without '\"' or '\\'")]
    InvalidRealm(String),

    /// A secret file contained an unparseable record
    #[error("malformed record in {path} at line {line}: {reason}")]
    MalformedRecord {
        /// Path of the offending file
        path: String,
        /// 1-based line number
        line: usize,
        /// What was wrong with the record
        reason: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
