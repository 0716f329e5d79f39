//! Message identifier generation.

use rand::RngCore;

/// Generates a message id: `prefix` followed by 32 lowercase hex characters.
///
/// The prefix must start with a letter or underscore so the id is a valid
/// `xs:ID`.
#[must_use]
pub fn message_id(prefix: &str) -> String {
    let mut bytes = [0u8; 16];
    rand::rng().fill_bytes(&mut bytes);
    format!("{prefix}{}", hex::encode(bytes))
}
