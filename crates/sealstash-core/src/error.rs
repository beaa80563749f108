use std::path::Path;

use thiserror::Error;

/// Errors produced by the cipher, the store and its backends.
///
/// A missing data file is deliberately not represented here: it surfaces as
/// `Ok(None)` from the read operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    /// Key or IV does not fit the cipher, detected at construction.
    #[error("invalid configuration: {reason}")]
    Configuration { reason: String },
    /// Stored ciphertext could not be turned back into a map (corruption,
    /// wrong key/IV or tampering).
    #[error("decode failure: {reason}")]
    Decode { reason: String },
    /// A value could not be serialized before encryption.
    #[error("encode failure: {reason}")]
    Encode { reason: String },
    /// Underlying filesystem failure other than "not found".
    #[error("io failure at {path}: {reason}")]
    Io { path: String, reason: String },
}

impl StoreError {
    pub fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }

    pub fn decode<E: ToString>(err: E) -> Self {
        Self::Decode {
            reason: err.to_string(),
        }
    }

    pub fn encode<E: ToString>(err: E) -> Self {
        Self::Encode {
            reason: err.to_string(),
        }
    }

    pub fn io<E: ToString>(path: &Path, err: E) -> Self {
        Self::Io {
            path: path.to_string_lossy().to_string(),
            reason: err.to_string(),
        }
    }

    /// True for failures that mean the blob on disk is unreadable.
    pub fn is_decode(&self) -> bool {
        matches!(self, Self::Decode { .. })
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
