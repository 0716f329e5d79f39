//! Error type for cryptographic operations.

use thiserror::Error;

/// Result type for cryptographic operations.
pub type CryptoResult<T> = Result<T, CryptoError>;

/// Errors raised by key handling and signing.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Key material could not be parsed or was rejected.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// Certificate could not be parsed.
    #[error("invalid certificate: {0}")]
    InvalidCertificate(String),

    /// PEM armour is malformed.
    #[error("invalid PEM: {0}")]
    Pem(String),

    /// Signing failed.
    #[error("signing failed: {0}")]
    Signing(String),

    /// Algorithm is unknown or does not fit the key.
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),
}
