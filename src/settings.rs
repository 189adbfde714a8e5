//! Backend connection settings.
//!
//! Loaded once at startup from a YAML file (default
//! `/etc/salt/modify_keys.yml`), then overridden by environment variables:
//!
//!   SALT_API_URL         api_url
//!   SALT_API_TOKEN       token
//!   SALT_API_VERIFY_TLS  verify_tls (true/false/1/0/yes/no)
//!
//! Blank environment values are ignored.
//!
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/salt/modify_keys.yml";

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("failed to read config {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("invalid api_url '{0}' (expected http or https)")]
    InvalidUrl(String),
    #[error("no eauth token configured (set `token` or SALT_API_TOKEN)")]
    MissingToken,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Settings {
    /// salt-api base URL. Default "https://localhost:8000"
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// Pre-issued eauth token sent with every lowstate chunk
    #[serde(default)]
    pub token: Option<String>,
    /// Verify the salt-api TLS certificate. Default true
    #[serde(default = "default_verify_tls")]
    pub verify_tls: bool,
    /// Per-request timeout (secs). Default 30
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_api_url() -> String {
    "https://localhost:8000".to_string()
}

fn default_verify_tls() -> bool {
    true
}

fn default_timeout() -> u64 {
    30
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            token: None,
            verify_tls: default_verify_tls(),
            timeout_secs: default_timeout(),
        }
    }
}

impl Settings {
    /// Load settings from `path`, or from the default location when `None`.
    ///
    /// A missing default file yields defaults; a missing explicit file is an
    /// error.
    pub fn load(path: Option<&Path>) -> Result<Self, SettingsError> {
        let (path, required) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (PathBuf::from(DEFAULT_CONFIG_PATH), false),
        };
        let mut settings = match std::fs::read_to_string(&path) {
            Ok(text) => Self::from_yaml(&text, &path)?,
            Err(e) if !required && e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config file; using defaults");
                Self::default()
            }
            Err(source) => return Err(SettingsError::Io { path, source }),
        };
        settings.apply_env(|key| std::env::var(key).ok());
        Ok(settings)
    }

    fn from_yaml(text: &str, path: &Path) -> Result<Self, SettingsError> {
        // An empty file parses as YAML null.
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Overlay environment overrides using `lookup` (injectable for tests).
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(url) = get("SALT_API_URL") {
            self.api_url = url.trim().to_string();
        }
        if let Some(token) = get("SALT_API_TOKEN") {
            self.token = Some(token.trim().to_string());
        }
        if let Some(raw) = get("SALT_API_VERIFY_TLS") {
            match raw.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" | "y" => self.verify_tls = true,
                "false" | "0" | "no" | "n" => self.verify_tls = false,
                other => tracing::warn!(value = other, "ignoring invalid SALT_API_VERIFY_TLS"),
            }
        }
    }

    pub fn api_url(&self) -> Result<Url, SettingsError> {
        match Url::parse(self.api_url.trim()) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(url),
            _ => Err(SettingsError::InvalidUrl(self.api_url.clone())),
        }
    }

    pub fn token(&self) -> Result<&str, SettingsError> {
        self.token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(SettingsError::MissingToken)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
