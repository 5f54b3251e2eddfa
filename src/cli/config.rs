//! Credential profiles
//!
//! Stored as TOML:
//!
//! ```toml
//! [profiles.default]
//! url = "https://api.example.com"
//! username = "alice@example.com"
//! password = "..."
//! max_token_lifetime = 3600
//! ```
//!
//! `DOCSCHEMA_URL`, `DOCSCHEMA_USERNAME` and `DOCSCHEMA_PASSWORD` override
//! the stored values of whichever profile is active.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::error::CliError;
use crate::api::ClientConfig;
use crate::export::write_atomically;

pub const DEFAULT_PROFILE: &str = "default";
pub const CONFIG_ENV: &str = "DOCSCHEMA_CONFIG";
pub const URL_ENV: &str = "DOCSCHEMA_URL";
pub const USERNAME_ENV: &str = "DOCSCHEMA_USERNAME";
pub const PASSWORD_ENV: &str = "DOCSCHEMA_PASSWORD";

#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub url: String,
    pub username: String,
    pub password: String,
    /// Token lifetime in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_token_lifetime: Option<u64>,
}

impl Profile {
    pub fn client_config(&self) -> ClientConfig {
        let config = ClientConfig::new(&self.url, &self.username, &self.password);
        match self.max_token_lifetime {
            Some(seconds) => config.with_max_token_lifetime(Duration::from_secs(seconds)),
            None => config,
        }
    }
}

impl fmt::Debug for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Profile")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("max_token_lifetime", &self.max_token_lifetime)
            .finish()
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ProfileFile {
    #[serde(default)]
    profiles: BTreeMap<String, Profile>,
}

/// Profiles loaded from one TOML file
#[derive(Debug)]
pub struct ProfileStore {
    path: PathBuf,
    file: ProfileFile,
}

impl ProfileStore {
    /// `$DOCSCHEMA_CONFIG`, else `<config dir>/docschema/profiles.toml`
    pub fn default_path() -> Result<PathBuf, CliError> {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return Ok(PathBuf::from(path));
        }
        dirs::config_dir()
            .map(|dir| dir.join("docschema").join("profiles.toml"))
            .ok_or_else(|| CliError::Config("cannot determine the config directory".to_string()))
    }

    /// Load the file at `path`; a missing file yields an empty store
    pub fn load(path: &Path) -> Result<Self, CliError> {
        let file = if path.exists() {
            let content = std::fs::read_to_string(path)
                .map_err(|e| CliError::FileReadError(path.to_path_buf(), e.to_string()))?;
            toml::from_str(&content)
                .map_err(|e| CliError::Config(format!("{}: {}", path.display(), e)))?
        } else {
            ProfileFile::default()
        };
        tracing::debug!("Loaded {} profiles from {}", file.profiles.len(), path.display());
        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.file.profiles.keys().map(String::as_str)
    }

    pub fn get(&self, name: &str) -> Option<&Profile> {
        self.file.profiles.get(name)
    }

    pub fn set(&mut self, name: impl Into<String>, profile: Profile) {
        self.file.profiles.insert(name.into(), profile);
    }

    /// The named profile with environment overrides applied
    pub fn resolve(&self, name: &str) -> Result<Profile, CliError> {
        self.resolve_with(name, |key| std::env::var(key).ok())
    }

    pub fn resolve_with(
        &self,
        name: &str,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Profile, CliError> {
        let stored = self.get(name);
        let pick = |key: &str, stored: Option<&String>| -> Option<String> {
            env(key)
                .filter(|value| !value.is_empty())
                .or_else(|| stored.cloned())
        };

        let url = pick(URL_ENV, stored.map(|p| &p.url));
        let username = pick(USERNAME_ENV, stored.map(|p| &p.username));
        let password = pick(PASSWORD_ENV, stored.map(|p| &p.password));

        match (url, username, password) {
            (Some(url), Some(username), Some(password)) => Ok(Profile {
                url,
                username,
                password,
                max_token_lifetime: stored.and_then(|p| p.max_token_lifetime),
            }),
            _ => Err(CliError::Config(format!(
                "profile '{}' not found in {}",
                name,
                self.path.display()
            ))),
        }
    }

    /// Write the file, replacing it atomically
    pub fn save(&self) -> Result<(), CliError> {
        let content = toml::to_string_pretty(&self.file)
            .map_err(|e| CliError::Config(format!("cannot serialize profiles: {}", e)))?;
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .map_err(|e| CliError::FileWriteError(parent.to_path_buf(), e.to_string()))?;
        }
        write_atomically(&self.path, content.as_bytes())
            .map_err(|e| CliError::FileWriteError(self.path.clone(), e.to_string()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600))
                .map_err(|e| CliError::FileWriteError(self.path.clone(), e.to_string()))?;
        }
        Ok(())
    }
}
