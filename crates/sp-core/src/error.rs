//! Error handling for configuration and bootstrap.

use thiserror::Error;

/// Result type alias using the core error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while loading or checking configuration.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration is missing, unparseable or inconsistent.
    #[error("configuration error: {0}")]
    Config(String),

    /// Configuration file could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configured key material was rejected.
    #[error("cryptographic error: {0}")]
    Crypto(#[from] sp_crypto::CryptoError),
}

impl Error {
    /// Returns whether the error came from operator-supplied settings rather
    /// than the environment.
    #[must_use]
    pub const fn is_misconfiguration(&self) -> bool {
        matches!(self, Self::Config(_) | Self::Crypto(_))
    }
}
