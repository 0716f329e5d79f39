//! PEM armour decoding.

use base64::{engine::general_purpose::STANDARD, Engine};

use crate::error::{CryptoError, CryptoResult};

/// A single decoded PEM block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PemBlock {
    /// Label between `BEGIN` and the trailing dashes, e.g. `PRIVATE KEY`.
    pub label: String,
    /// Decoded DER contents.
    pub der: Vec<u8>,
}

/// Decodes the first PEM block in `input`.
pub fn decode(input: &str) -> CryptoResult<PemBlock> {
    let mut lines = input.lines().map(str::trim).skip_while(|l| !l.starts_with("-----BEGIN "));

    let label = lines
        .next()
        .and_then(|l| l.strip_prefix("-----BEGIN "))
        .and_then(|l| l.strip_suffix("-----"))
        .ok_or_else(|| CryptoError::Pem("missing BEGIN line".to_string()))?
        .to_string();

    let end = format!("-----END {label}-----");
    let mut body = String::new();
    let mut terminated = false;
    for line in lines {
        if line == end {
            terminated = true;
            break;
        }
        body.push_str(line);
    }
    if !terminated {
        return Err(CryptoError::Pem(format!("missing END line for {label}")));
    }

    let der = STANDARD
        .decode(body)
        .map_err(|e| CryptoError::Pem(e.to_string()))?;

    Ok(PemBlock { label, der })
}

/// Wraps DER bytes in PEM armour with 64-column lines.
#[must_use]
pub fn encode(label: &str, der: &[u8]) -> String {
    let body = STANDARD.encode(der);
    let mut out = format!("-----BEGIN {label}-----\n");
    for chunk in body.as_bytes().chunks(64) {
        out.push_str(&String::from_utf8_lossy(chunk));
        out.push('\n');
    }
    out.push_str(&format!("-----END {label}-----\n"));
    out
}
