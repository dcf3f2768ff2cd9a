//! Client configuration, persisted as JSON under the user config dir.

use crate::error::ClientError;
use atomicwrites::{AtomicFile, OverwriteBehavior::AllowOverwrite};
use serde::{Deserialize, Serialize};
use std::io::Write as _;
use std::path::{Path, PathBuf};

pub const DEFAULT_BASE_URL: &str = "https://api.bitbucket.org/2.0";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Root of the REST API all request paths are joined to.
    pub base_url: String,
    /// Per-request timeout for API calls.
    pub timeout_secs: u64,
    /// Default loopback port for the OAuth callback listener.
    pub callback_port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            timeout_secs: 30,
            callback_port: bb_auth::callback::DEFAULT_PORT,
        }
    }
}

impl Config {
    fn default_path() -> Result<PathBuf, ClientError> {
        let dir = dirs::config_dir().ok_or_else(|| ClientError::Config {
            message: "could not determine the user configuration directory".into(),
        })?;
        Ok(dir.join("bb").join("config.json"))
    }

    /// Load from the default location; a missing file yields defaults.
    pub fn load() -> Result<Self, ClientError> {
        Self::load_from(&Self::default_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self, ClientError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path).map_err(|e| ClientError::Config {
            message: format!("failed to read {}: {e}", path.display()),
        })?;
        serde_json::from_str(&raw).map_err(|e| ClientError::Config {
            message: format!("invalid config at {}: {e}", path.display()),
        })
    }

    pub fn save(&self) -> Result<(), ClientError> {
        self.save_to(&Self::default_path()?)
    }

    /// Atomic write (temp file + rename) so a crash never leaves a torn file.
    pub fn save_to(&self, path: &Path) -> Result<(), ClientError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ClientError::Config {
                message: format!("failed to create {}: {e}", parent.display()),
            })?;
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                let _ = std::fs::set_permissions(parent, std::fs::Permissions::from_mode(0o700));
            }
        }
        let body = serde_json::to_string_pretty(self).map_err(|e| ClientError::Config {
            message: format!("failed to serialize config: {e}"),
        })?;
        AtomicFile::new(path, AllowOverwrite)
            .write(|f| f.write_all(body.as_bytes()))
            .map_err(|e| ClientError::Config {
                message: format!("failed to write {}: {e}", path.display()),
            })?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let _ = std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.timeout_secs, 30);
        assert_eq!(config.callback_port, 8080);
    }

    #[test]
    fn save_and_reload_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = Config {
            base_url: "https://bb.internal/2.0".into(),
            timeout_secs: 5,
            callback_port: 9191,
        };
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.base_url, "https://bb.internal/2.0");
        assert_eq!(loaded.callback_port, 9191);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"timeout_secs": 99}"#).unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.timeout_secs, 99);
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn invalid_json_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "not json").unwrap();

        let result = Config::load_from(&path);
        assert!(matches!(result, Err(ClientError::Config { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn saved_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        Config::default().save_to(&path).unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
    }
}
