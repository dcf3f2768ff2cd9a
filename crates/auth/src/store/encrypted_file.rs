//! Encrypted-file backend used when the OS keyring is unavailable.

use super::SecretBackend;
use crate::{cipher::SecretCipher, error::AuthError};
use atomicwrites::{AtomicFile, OverwriteBehavior::AllowOverwrite};
use std::{
    fs,
    io::Write,
    os::unix::fs::PermissionsExt,
    path::{Path, PathBuf},
};

/// One `<key>.enc` blob per logical key under an owner-only directory.
pub struct EncryptedFileBackend {
    dir: PathBuf,
    cipher: SecretCipher,
}

impl EncryptedFileBackend {
    /// Open the store under `dir`, creating directory and key material on
    /// first use.
    pub fn open(dir: &Path) -> Result<Self, AuthError> {
        fs::create_dir_all(dir)?;
        fs::set_permissions(dir, fs::Permissions::from_mode(0o700))?;
        let cipher = SecretCipher::load_or_create(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
            cipher,
        })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.enc"))
    }
}

impl SecretBackend for EncryptedFileBackend {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, AuthError> {
        match fs::read(self.path_for(key)) {
            // A decryption failure surfaces as-is; the blob stays on disk
            // untouched so the user can inspect or remove it.
            Ok(blob) => self.cipher.decrypt(&blob).map(Some),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), AuthError> {
        let blob = self.cipher.encrypt(value)?;
        let path = self.path_for(key);
        // Write-temp-then-rename keeps a crash mid-write from ever leaving a
        // half-written blob, and serializes racing writers (last one wins).
        AtomicFile::new(&path, AllowOverwrite)
            .write(|f| f.write_all(&blob))
            .map_err(|e| AuthError::Storage(format!("failed to write {}: {e}", path.display())))?;
        fs::set_permissions(&path, fs::Permissions::from_mode(0o600))?;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), AuthError> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn name(&self) -> &'static str {
        "encrypted-file"
    }
}
