//! Engine error types

use thiserror::Error;

pub type KeyLifecycleResult<T> = Result<T, KeyLifecycleError>;

#[derive(Error, Debug)]
pub enum KeyLifecycleError {
    #[error("incorrect password: derived passphrase failed to decrypt the key")]
    IncorrectPassword,

    #[error("no uploaded key matches fingerprint {0}")]
    NoMatchingKey(String),

    #[error("recovery phrase does not correspond to any key in scope")]
    NoAssociation,

    #[error("key not found: {0}")]
    KeyNotFound(String),

    #[error("key id mismatch: expected {expected}, got {actual}")]
    KeyIdMismatch { expected: String, actual: String },

    #[error("no usable primary key to sign the key list")]
    NoUsablePrimaryKey,

    #[error("server rejected the operation: {0}")]
    ServerRejected(String),

    #[error("key {0} is already decrypted")]
    AlreadyDecrypted(String),

    #[error("key material is not decrypted: {0}")]
    NotDecrypted(String),

    #[error("invalid reactivation state transition from {from} to {to}")]
    InvalidTransition { from: &'static str, to: &'static str },

    #[error("cryptographic operation failed: {0}")]
    Crypto(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Terminal failure reason recorded on a reactivation state entry.
///
/// Kept separate from [`KeyLifecycleError`] so that state entries stay
/// cloneable and comparable, while still distinguishing the causes that
/// imply different corrective user action (wrong password vs. no matching
/// upload vs. server failure).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReactivationFailure {
    #[error("incorrect password")]
    IncorrectPassword,

    #[error("no uploaded key matches the target fingerprint")]
    NoMatchingKey,

    #[error("recovery phrase has no matching keys")]
    NoAssociation,

    #[error("uploaded key resolves to a different key than the target")]
    KeyIdMismatch,

    #[error("no usable primary key to sign the key list")]
    NoUsablePrimaryKey,

    #[error("key is already decrypted")]
    AlreadyDecrypted,

    #[error("server rejected the reactivation: {0}")]
    ServerRejected(String),

    #[error("{0}")]
    Other(String),
}

impl From<&KeyLifecycleError> for ReactivationFailure {
    fn from(err: &KeyLifecycleError) -> Self {
        match err {
            KeyLifecycleError::IncorrectPassword => Self::IncorrectPassword,
            KeyLifecycleError::NoMatchingKey(_) => Self::NoMatchingKey,
            KeyLifecycleError::NoAssociation => Self::NoAssociation,
            KeyLifecycleError::KeyIdMismatch { .. } => Self::KeyIdMismatch,
            KeyLifecycleError::NoUsablePrimaryKey => Self::NoUsablePrimaryKey,
            KeyLifecycleError::AlreadyDecrypted(_) => Self::AlreadyDecrypted,
            KeyLifecycleError::ServerRejected(msg) => Self::ServerRejected(msg.clone()),
            other => Self::Other(other.to_string()),
        }
    }
}
