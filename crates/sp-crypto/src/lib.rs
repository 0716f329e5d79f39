//! # sp-crypto
//!
//! Cryptographic primitives for the SAML service provider engine, backed by
//! aws-lc-rs.
//!
//! - [`algorithm`] - XML-DSig signature and digest algorithm identifiers
//! - [`hash`] - message digests and constant-time comparison
//! - [`keys`] - signing keys, verifying keys and X.509 certificates
//! - [`pem`] - PEM armour decoding
//! - [`random`] - message identifier generation
//!
//! SHA-1 based algorithms are not offered.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod algorithm;
pub mod error;
pub mod hash;
pub mod keys;
pub mod pem;
pub mod random;

pub use algorithm::{DigestAlgorithm, SignatureAlgorithm};
pub use error::{CryptoError, CryptoResult};
pub use keys::{Certificate, KeyKind, SigningKey, VerifyingKey};
