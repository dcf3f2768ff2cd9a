//! Authenticated encryption for the file-backed credential store.

use crate::error::AuthError;
use atomicwrites::{AtomicFile, OverwriteBehavior::AllowOverwrite};
use chacha20poly1305::{
    ChaCha20Poly1305, Key, Nonce,
    aead::{Aead, KeyInit, OsRng},
};
use rand::RngCore;
use std::{fs, io::Write, os::unix::fs::PermissionsExt, path::Path};

const NONCE_LEN: usize = 12;
const KEY_LEN: usize = 32;
const KEY_FILE: &str = "store.key";

/// Symmetric AEAD (ChaCha20-Poly1305) keyed from a per-user key file.
///
/// The key file is generated on first use under the store directory with
/// owner-only permissions. Ciphertext blobs carry their random nonce as a
/// 12-byte prefix.
pub struct SecretCipher {
    key: Key,
}

impl SecretCipher {
    /// Load the key file under `dir`, creating directory and key on first use.
    pub fn load_or_create(dir: &Path) -> Result<Self, AuthError> {
        let path = dir.join(KEY_FILE);
        if path.exists() {
            let bytes = fs::read(&path)?;
            if bytes.len() != KEY_LEN {
                return Err(AuthError::Decryption);
            }
            return Ok(Self {
                key: *Key::from_slice(&bytes),
            });
        }

        fs::create_dir_all(dir)?;
        fs::set_permissions(dir, fs::Permissions::from_mode(0o700))?;
        let mut bytes = [0u8; KEY_LEN];
        OsRng.fill_bytes(&mut bytes);
        AtomicFile::new(&path, AllowOverwrite)
            .write(|f| f.write_all(&bytes))
            .map_err(|e| AuthError::Storage(format!("failed to write key file: {e}")))?;
        fs::set_permissions(&path, fs::Permissions::from_mode(0o600))?;
        Ok(Self { key: bytes.into() })
    }

    /// Construct directly from key material (tests, custom provisioning).
    pub fn from_key(key: [u8; KEY_LEN]) -> Self {
        Self { key: key.into() }
    }

    /// Encrypt with a fresh random nonce, nonce prepended to the output.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, AuthError> {
        let cipher = ChaCha20Poly1305::new(&self.key);
        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext)
            .map_err(|_| AuthError::Storage("encryption failed".into()))?;

        let mut blob = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        blob.extend_from_slice(&nonce);
        blob.extend_from_slice(&ciphertext);
        Ok(blob)
    }

    /// Decrypt a nonce-prefixed blob.
    ///
    /// A tag mismatch or malformed blob yields [`AuthError::Decryption`];
    /// the caller must leave the stored file untouched rather than try to
    /// repair it.
    pub fn decrypt(&self, blob: &[u8]) -> Result<Vec<u8>, AuthError> {
        if blob.len() < NONCE_LEN {
            return Err(AuthError::Decryption);
        }
        let (nonce, ciphertext) = blob.split_at(NONCE_LEN);
        let cipher = ChaCha20Poly1305::new(&self.key);
        cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| AuthError::Decryption)
    }
}
