//! Error types for the mailkeys library.
//!
//! Key-import failures carry user-facing guidance text and are meant to be
//! rendered directly in a dialog. Structural errors and uncategorized
//! engine errors indicate a bug and should additionally go through
//! [`crate::report::report_err`].

use thiserror::Error;

/// The main error type for mailkeys operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Armored block or key body is malformed
    #[error("{0}")]
    Format(String),

    /// A public key was supplied where a private key was expected, or vice versa
    #[error("{0}")]
    TypeMismatch(String),

    /// The engine cannot process this key's scheme; terminal
    #[error("{0}")]
    Unsupported(String),

    /// Encryption capability is missing for a fixable reason; carries the
    /// encrypted private key armor so a repair flow can reuse it
    #[error("{message}")]
    Recoverable { message: String, encrypted: String },

    /// The imported key matches one the user already has
    #[error("{0}")]
    DuplicateKey(String),

    /// The imported key's longid does not match the expected longid
    #[error("{0}")]
    LongidMismatch(String),

    /// A passphrase is required but was empty
    #[error("{0}")]
    PassphraseRequired(String),

    /// The supplied passphrase does not decrypt the key
    #[error("{0}")]
    PassphraseMismatch(String),

    /// Programmer-facing invariant violation (wrong packet count, no
    /// private packets, postcondition failure)
    #[error("{0}")]
    Structural(String),

    /// The database is blocked by another open connection
    #[error("Storage is blocked by another open connection")]
    ConnectionBlocked,

    /// Generic storage engine error
    #[error("Storage error: {0}")]
    Engine(String),

    /// rpgp OpenPGP error passed through uncategorized
    #[error("OpenPGP error: {0}")]
    OpenPgp(#[from] pgp::errors::Error),

    /// Invalid input provided
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// File I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error from anyhow
    #[error("Error: {0}")]
    Generic(#[from] anyhow::Error),
}

/// A specialized Result type for mailkeys operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Whether this error carries guidance text meant for the user.
    ///
    /// User-facing errors are caught at the UI boundary and rendered in a
    /// modal; they are never reported as unexpected failures. Everything
    /// else indicates a bug or an environment problem.
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            Error::Format(_)
                | Error::TypeMismatch(_)
                | Error::Unsupported(_)
                | Error::Recoverable { .. }
                | Error::DuplicateKey(_)
                | Error::LongidMismatch(_)
                | Error::PassphraseRequired(_)
                | Error::PassphraseMismatch(_)
        )
    }
}

impl From<rusqlite::Error> for Error {
    /// Categorize storage failures: a busy/locked database maps to
    /// [`Error::ConnectionBlocked`], everything else to [`Error::Engine`].
    /// Raw rusqlite errors never leak to callers.
    fn from(e: rusqlite::Error) -> Self {
        if let rusqlite::Error::SqliteFailure(ref inner, _) = e {
            if matches!(
                inner.code,
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
            ) {
                return Error::ConnectionBlocked;
            }
        }
        Error::Engine(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_facing_classification() {
        assert!(Error::Format("bad armor".to_string()).is_user_facing());
        assert!(Error::PassphraseMismatch("nope".to_string()).is_user_facing());
        assert!(!Error::Structural("no private packets".to_string()).is_user_facing());
        assert!(!Error::ConnectionBlocked.is_user_facing());
    }
}
