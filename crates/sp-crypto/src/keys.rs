//! Signing keys, verifying keys and X.509 certificates.
//!
//! Private keys are loaded from PKCS#8 (or PKCS#1 for RSA) DER/PEM and never
//! leave this module: [`SigningKey`] has a redacted `Debug` and no accessor
//! for the private bytes.

use std::fmt;

use aws_lc_rs::{
    rand::SystemRandom,
    signature::{
        self, EcdsaKeyPair, RsaKeyPair, UnparsedPublicKey, ECDSA_P256_SHA256_FIXED,
        ECDSA_P256_SHA256_FIXED_SIGNING, ECDSA_P384_SHA384_FIXED,
        ECDSA_P384_SHA384_FIXED_SIGNING, RSA_PKCS1_2048_8192_SHA256,
        RSA_PKCS1_2048_8192_SHA384, RSA_PKCS1_2048_8192_SHA512,
    },
};
use base64::{engine::general_purpose::STANDARD, Engine};
use x509_parser::{
    prelude::{FromDer, X509Certificate},
    public_key::PublicKey,
};

use crate::{
    algorithm::SignatureAlgorithm,
    error::{CryptoError, CryptoResult},
    pem,
};

/// Key family, including the curve for EC keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyKind {
    /// RSA, 2048 to 8192 bits.
    Rsa,
    /// ECDSA on NIST P-256.
    EcP256,
    /// ECDSA on NIST P-384.
    EcP384,
}

enum KeyPair {
    Rsa(RsaKeyPair),
    Ec(KeyKind, EcdsaKeyPair),
}

/// A private key able to produce XML-DSig signature values.
pub struct SigningKey {
    pair: KeyPair,
}

impl SigningKey {
    /// Loads a key from PKCS#8 DER. RSA keys may also be PKCS#1 DER.
    pub fn from_der(der: &[u8]) -> CryptoResult<Self> {
        if let Ok(rsa) = RsaKeyPair::from_pkcs8(der).or_else(|_| RsaKeyPair::from_der(der)) {
            return Ok(Self {
                pair: KeyPair::Rsa(rsa),
            });
        }
        if let Ok(ec) = EcdsaKeyPair::from_pkcs8(&ECDSA_P256_SHA256_FIXED_SIGNING, der) {
            return Ok(Self {
                pair: KeyPair::Ec(KeyKind::EcP256, ec),
            });
        }
        if let Ok(ec) = EcdsaKeyPair::from_pkcs8(&ECDSA_P384_SHA384_FIXED_SIGNING, der) {
            return Ok(Self {
                pair: KeyPair::Ec(KeyKind::EcP384, ec),
            });
        }
        Err(CryptoError::InvalidKey(
            "not an RSA, P-256 or P-384 private key".to_string(),
        ))
    }

    /// Loads a key from a `PRIVATE KEY` or `RSA PRIVATE KEY` PEM block.
    pub fn from_pem(input: &str) -> CryptoResult<Self> {
        let block = pem::decode(input)?;
        match block.label.as_str() {
            "PRIVATE KEY" | "RSA PRIVATE KEY" => Self::from_der(&block.der),
            other => Err(CryptoError::InvalidKey(format!(
                "unexpected PEM label {other}"
            ))),
        }
    }

    /// Returns the key family.
    #[must_use]
    pub fn kind(&self) -> KeyKind {
        match &self.pair {
            KeyPair::Rsa(_) => KeyKind::Rsa,
            KeyPair::Ec(kind, _) => *kind,
        }
    }

    /// Returns true if this key can produce signatures for `algorithm`.
    #[must_use]
    pub fn supports(&self, algorithm: SignatureAlgorithm) -> bool {
        algorithm.key_kind() == self.kind()
    }

    /// Signs `data`, returning the raw signature value.
    ///
    /// ECDSA signatures use the fixed-width `r || s` encoding XML-DSig expects.
    pub fn sign(&self, algorithm: SignatureAlgorithm, data: &[u8]) -> CryptoResult<Vec<u8>> {
        if !self.supports(algorithm) {
            return Err(CryptoError::UnsupportedAlgorithm(format!(
                "{} with {:?} key",
                algorithm.uri(),
                self.kind()
            )));
        }

        let rng = SystemRandom::new();
        match &self.pair {
            KeyPair::Rsa(key_pair) => {
                let padding: &'static dyn signature::RsaEncoding = match algorithm {
                    SignatureAlgorithm::RsaSha384 => &signature::RSA_PKCS1_SHA384,
                    SignatureAlgorithm::RsaSha512 => &signature::RSA_PKCS1_SHA512,
                    _ => &signature::RSA_PKCS1_SHA256,
                };
                let mut sig = vec![0u8; key_pair.public_modulus_len()];
                key_pair
                    .sign(padding, &rng, data, &mut sig)
                    .map_err(|e| CryptoError::Signing(format!("RSA signing failed: {e}")))?;
                Ok(sig)
            }
            KeyPair::Ec(_, key_pair) => key_pair
                .sign(&rng, data)
                .map(|sig| sig.as_ref().to_vec())
                .map_err(|e| CryptoError::Signing(format!("ECDSA signing failed: {e}"))),
        }
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKey")
            .field("kind", &self.kind())
            .finish_non_exhaustive()
    }
}

/// A public key taken from a certificate, used to check signature values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyingKey {
    kind: KeyKind,
    public_key: Vec<u8>,
}

impl VerifyingKey {
    /// Returns the key family.
    #[must_use]
    pub const fn kind(&self) -> KeyKind {
        self.kind
    }

    /// Checks `sig` over `data`. An algorithm that does not fit the key
    /// family simply fails verification.
    #[must_use]
    pub fn verify(&self, algorithm: SignatureAlgorithm, data: &[u8], sig: &[u8]) -> bool {
        if algorithm.key_kind() != self.kind {
            return false;
        }

        let verification: &'static dyn signature::VerificationAlgorithm = match algorithm {
            SignatureAlgorithm::RsaSha256 => &RSA_PKCS1_2048_8192_SHA256,
            SignatureAlgorithm::RsaSha384 => &RSA_PKCS1_2048_8192_SHA384,
            SignatureAlgorithm::RsaSha512 => &RSA_PKCS1_2048_8192_SHA512,
            SignatureAlgorithm::EcdsaSha256 => &ECDSA_P256_SHA256_FIXED,
            SignatureAlgorithm::EcdsaSha384 => &ECDSA_P384_SHA384_FIXED,
        };

        UnparsedPublicKey::new(verification, &self.public_key)
            .verify(data, sig)
            .is_ok()
    }
}

/// An X.509 certificate carrying a signing or encryption public key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Certificate {
    der: Vec<u8>,
    subject: String,
    key: VerifyingKey,
}

impl Certificate {
    /// Parses a DER certificate.
    pub fn from_der(der: &[u8]) -> CryptoResult<Self> {
        let (_, cert) = X509Certificate::from_der(der)
            .map_err(|e| CryptoError::InvalidCertificate(e.to_string()))?;

        let spki = cert.public_key();
        let public_key = spki.subject_public_key.data.to_vec();
        let kind = match spki.parsed() {
            Ok(PublicKey::RSA(_)) => KeyKind::Rsa,
            Ok(PublicKey::EC(_)) => match public_key.len() {
                65 => KeyKind::EcP256,
                97 => KeyKind::EcP384,
                n => {
                    return Err(CryptoError::UnsupportedAlgorithm(format!(
                        "EC point of {n} bytes"
                    )))
                }
            },
            _ => {
                return Err(CryptoError::UnsupportedAlgorithm(
                    spki.algorithm.algorithm.to_id_string(),
                ))
            }
        };

        Ok(Self {
            der: der.to_vec(),
            subject: cert.subject().to_string(),
            key: VerifyingKey { kind, public_key },
        })
    }

    /// Parses a `CERTIFICATE` PEM block.
    pub fn from_pem(input: &str) -> CryptoResult<Self> {
        let block = pem::decode(input)?;
        if block.label != "CERTIFICATE" {
            return Err(CryptoError::InvalidCertificate(format!(
                "unexpected PEM label {}",
                block.label
            )));
        }
        Self::from_der(&block.der)
    }

    /// Parses the base64 body of an `ds:X509Certificate` element.
    /// Embedded whitespace is ignored.
    pub fn from_base64(body: &str) -> CryptoResult<Self> {
        let compact: String = body.chars().filter(|c| !c.is_whitespace()).collect();
        let der = STANDARD
            .decode(compact)
            .map_err(|e| CryptoError::InvalidCertificate(e.to_string()))?;
        Self::from_der(&der)
    }

    /// Returns the DER encoding.
    #[must_use]
    pub fn der(&self) -> &[u8] {
        &self.der
    }

    /// Returns the DER encoding as unwrapped base64, as placed in `KeyInfo`.
    #[must_use]
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.der)
    }

    /// Returns the subject distinguished name.
    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Returns the public key.
    #[must_use]
    pub const fn verifying_key(&self) -> &VerifyingKey {
        &self.key
    }
}
