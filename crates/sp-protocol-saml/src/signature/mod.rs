//! XML Signature support for SAML.
//!
//! Two placements are supported:
//!
//! - **Embedded** (HTTP-POST, metadata) - an enveloped `ds:Signature` with
//!   one `Reference` to the signed element's `ID`, transforms
//!   enveloped-signature and exclusive C14N, inserted after `Issuer`
//! - **Detached** (HTTP-Redirect) - a signature over the exact query octets
//!   `SAMLRequest=..&RelayState=..&SigAlg=..`
//!
//! Verification only ever uses keys taken from the remote party's metadata.
//! A certificate inside `KeyInfo` is carried along but never trusted.

mod signer;
mod verifier;

use std::{fmt, sync::Arc};

use sp_crypto::{Certificate, DigestAlgorithm, SignatureAlgorithm, SigningKey};

pub use signer::*;
pub use verifier::*;

/// Why a signature check failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SignatureFailure {
    /// No signature where one is required.
    Missing,
    /// The signed content changed after signing, or the reference does not
    /// point at it.
    DigestMismatch,
    /// The signature value does not verify with any trusted key.
    SignatureMismatch,
}

impl fmt::Display for SignatureFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Missing => "missing",
            Self::DigestMismatch => "digest mismatch",
            Self::SignatureMismatch => "signature mismatch",
        })
    }
}

/// Local signing material: key, algorithm and digest for outbound
/// signatures.
#[derive(Debug, Clone)]
pub struct SigningCredential {
    key: Arc<SigningKey>,
    certificate: Option<Certificate>,
    signature_algorithm: SignatureAlgorithm,
    digest_algorithm: DigestAlgorithm,
}

impl SigningCredential {
    /// Creates a credential using the default algorithms.
    #[must_use]
    pub fn new(key: SigningKey) -> Self {
        Self {
            key: Arc::new(key),
            certificate: None,
            signature_algorithm: SignatureAlgorithm::default(),
            digest_algorithm: DigestAlgorithm::default(),
        }
    }

    /// Publishes `certificate` in `KeyInfo`.
    #[must_use]
    pub fn with_certificate(mut self, certificate: Certificate) -> Self {
        self.certificate = Some(certificate);
        self
    }

    /// Sets the algorithms.
    #[must_use]
    pub const fn with_algorithms(
        mut self,
        signature_algorithm: SignatureAlgorithm,
        digest_algorithm: DigestAlgorithm,
    ) -> Self {
        self.signature_algorithm = signature_algorithm;
        self.digest_algorithm = digest_algorithm;
        self
    }

    /// The private key.
    #[must_use]
    pub fn key(&self) -> &SigningKey {
        &self.key
    }

    /// The published certificate.
    #[must_use]
    pub const fn certificate(&self) -> Option<&Certificate> {
        self.certificate.as_ref()
    }

    /// Signature method.
    #[must_use]
    pub const fn signature_algorithm(&self) -> SignatureAlgorithm {
        self.signature_algorithm
    }

    /// Digest method for references.
    #[must_use]
    pub const fn digest_algorithm(&self) -> DigestAlgorithm {
        self.digest_algorithm
    }
}

/// Detached signature parameters taken from an HTTP-Redirect query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetachedSignature {
    /// `SigAlg`.
    pub algorithm: SignatureAlgorithm,
    /// Decoded `Signature`.
    pub value: Vec<u8>,
    /// Raw query octets the signature covers.
    pub signed_octets: String,
}
