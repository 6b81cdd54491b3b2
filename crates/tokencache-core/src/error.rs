use std::{io, path::Path};

use thiserror::Error;

/// Errors surfaced by token cache stores, protectors and consumers.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenCacheError {
    /// The backing file could not be read, written, renamed or deleted.
    #[error("cache file {path}: {reason}")]
    FileAccess {
        path: String,
        kind: io::ErrorKind,
        reason: String,
    },
    /// Bytes on disk could not be decrypted under the current principal.
    #[error("decryption failed: {reason}")]
    Decryption { reason: String },
    /// The protector failed to encrypt a blob.
    #[error("encryption failed: {reason}")]
    Encryption { reason: String },
    /// Key material could not be loaded or created.
    #[error("key provider: {reason}")]
    KeyProvider { reason: String },
    /// The consumer failed to serialize or deserialize its state.
    #[error("serialization failed: {reason}")]
    Serialization { reason: String },
    /// A thread panicked while holding the store lock.
    #[error("token cache lock poisoned")]
    LockPoisoned,
}

impl TokenCacheError {
    pub fn file_access(path: &Path, err: io::Error) -> Self {
        Self::FileAccess {
            path: path.to_string_lossy().to_string(),
            kind: err.kind(),
            reason: err.to_string(),
        }
    }

    pub fn serialization<E: ToString>(err: E) -> Self {
        Self::Serialization {
            reason: err.to_string(),
        }
    }

    /// True when the error came from decrypting bytes that were present.
    pub fn is_decryption(&self) -> bool {
        matches!(self, Self::Decryption { .. })
    }
}
