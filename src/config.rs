//! Sync configuration
//!
//! Loaded from an optional TOML file, then overridden by CLI flags:
//!
//! ```toml
//! [harvest]
//! domain = "https://acme.harvestapp.com"
//! user = "ops@acme.com"
//! # password falls back to the credentials file
//! credentials_file = "/home/ops/.harvest"
//!
//! [database]
//! path = "harvest.db"
//!
//! [sync]
//! from = "2024-01-01"
//! ```

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::SyncError;
use crate::sync::DateWindow;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub harvest: HarvestConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub sync: SyncConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HarvestConfig {
    /// Account URI, e.g. `https://acme.harvestapp.com`
    #[serde(default)]
    pub domain: Option<String>,

    #[serde(default)]
    pub user: Option<String>,

    /// Takes precedence over the credentials file
    #[serde(default)]
    pub password: Option<String>,

    /// `username=` / `password=` file, defaults to `~/.harvest`
    #[serde(default)]
    pub credentials_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite file holding the mirror
    #[serde(default = "default_database_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncConfig {
    /// First day of the time entry window (default 1970-01-01)
    #[serde(default)]
    pub from: Option<NaiveDate>,

    /// Last day of the time entry window (default today)
    #[serde(default)]
    pub to: Option<NaiveDate>,
}

fn default_database_path() -> PathBuf {
    PathBuf::from("harvest.db")
}

fn default_credentials_file() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".harvest"))
}

fn epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or(NaiveDate::MIN)
}

/// Resolved account access.
#[derive(Clone)]
pub struct Credentials {
    pub domain: String,
    pub user: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("domain", &self.domain)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Values read from a credentials file.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct CredentialsFile {
    pub username: Option<String>,
    pub password: Option<String>,
}

impl CredentialsFile {
    /// Parse `key=value` lines. Blank lines and `#` comments are skipped,
    /// unknown keys ignored.
    pub fn parse(contents: &str) -> Self {
        let mut file = Self::default();
        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let value = value.trim().to_string();
            match key.trim() {
                "username" => file.username = Some(value),
                "password" => file.password = Some(value),
                _ => {}
            }
        }
        file
    }

    pub fn read(path: &Path) -> Result<Self, SyncError> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            SyncError::Config(format!("cannot read credentials file {}: {}", path.display(), e))
        })?;
        Ok(Self::parse(&contents))
    }
}

impl Config {
    /// Read a TOML file, or defaults when it does not exist.
    pub fn load(path: &Path) -> Result<Self, SyncError> {
        if !path.exists() {
            info!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| SyncError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, SyncError> {
        toml::from_str(content).map_err(|e| SyncError::Config(format!("invalid config: {}", e)))
    }

    /// The time entry window, defaulting to everything up to `today`.
    pub fn window(&self, today: NaiveDate) -> Result<DateWindow, SyncError> {
        DateWindow::new(self.sync.from.unwrap_or_else(epoch), self.sync.to.unwrap_or(today))
    }

    /// Resolve domain, user and password, consulting the credentials file
    /// for whatever the config leaves out.
    pub fn credentials(&self) -> Result<Credentials, SyncError> {
        let domain = self
            .harvest
            .domain
            .clone()
            .filter(|d| !d.trim().is_empty())
            .ok_or_else(|| SyncError::Config("no account domain configured".to_string()))?;

        let mut user = self.harvest.user.clone();
        let mut password = self.harvest.password.clone();

        if user.is_none() || password.is_none() {
            let path = self
                .harvest
                .credentials_file
                .clone()
                .or_else(default_credentials_file)
                .ok_or_else(|| SyncError::Config("no password and no home directory".to_string()))?;
            debug!(path = %path.display(), "Reading credentials file");
            let file = CredentialsFile::read(&path)?;
            user = user.or(file.username);
            password = password.or(file.password);
        }

        match (user, password) {
            (Some(user), Some(password)) => Ok(Credentials {
                domain,
                user,
                password,
            }),
            (None, _) => Err(SyncError::Config("no username configured".to_string())),
            (_, None) => Err(SyncError::Config("no password configured".to_string())),
        }
    }
}
