use std::fmt;

use rand::Rng;
use sha2::{Digest, Sha256};

/// SHA-256 digest of a secret (passcode, session token) as stored at rest.
///
/// Raw secrets only ever travel to the client; the store keeps the digest.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SecretDigest([u8; 32]);

impl SecretDigest {
    /// Hash the given secret.
    pub fn compute(secret: &str) -> Self {
        Self(Sha256::digest(secret.as_bytes()).into())
    }

    /// Lower-case hex encoding, as persisted.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Compare against a stored hex digest without short-circuiting on the first difference.
    pub fn matches_hex(&self, stored: &str) -> bool {
        let Ok(bytes) = hex::decode(stored) else {
            return false;
        };
        if bytes.len() != self.0.len() {
            return false;
        }
        bytes
            .iter()
            .zip(self.0.iter())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
    }
}

impl fmt::Debug for SecretDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretDigest({})", self.to_hex())
    }
}

/// Generate a numeric passcode of the given length.
pub fn generate_numeric_code(length: usize) -> String {
    let mut rng = rand::rng();
    (0..length)
        .map(|_| char::from(b'0' + rng.random_range(0..10u8)))
        .collect()
}

/// Generate a 256-bit random token, hex encoded.
pub fn generate_token() -> String {
    hex::encode(rand::random::<[u8; 32]>())
}

/// Characters used for human-facing identifiers. No 0/O or 1/I.
const READABLE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Generate a human-facing opaque identifier such as `HX-7KQ2M9PA`.
pub fn generate_readable_id(prefix: &str, length: usize) -> String {
    let mut rng = rand::rng();
    let body: String = (0..length)
        .map(|_| char::from(READABLE_ALPHABET[rng.random_range(0..READABLE_ALPHABET.len())]))
        .collect();
    format!("{prefix}-{body}")
}
