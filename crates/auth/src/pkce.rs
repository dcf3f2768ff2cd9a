//! PKCE verifier/challenge generation (RFC 7636).

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::{RngCore, rngs::OsRng};
use sha2::{Digest, Sha256};

/// Challenge method sent to the authorization endpoint.
pub const CHALLENGE_METHOD: &str = "S256";

/// An ephemeral verifier/challenge pair bound to one login attempt.
///
/// Held in memory for the duration of the flow only; never persisted.
#[derive(Clone)]
pub struct PkcePair {
    pub verifier: String,
    pub challenge: String,
}

impl PkcePair {
    /// Generate a fresh pair from the OS entropy source.
    ///
    /// The verifier is the URL-safe base64 (no padding) of 32 random bytes,
    /// which lands at 43 characters, the RFC minimum.
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        OsRng.fill_bytes(&mut bytes);
        let verifier = URL_SAFE_NO_PAD.encode(bytes);
        let challenge = challenge_s256(&verifier);
        Self {
            verifier,
            challenge,
        }
    }
}

/// `BASE64URL-NOPAD(SHA256(verifier))` per RFC 7636 §4.2.
fn challenge_s256(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}
