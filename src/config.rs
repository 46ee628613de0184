//! Run configuration: credentials from the environment, tuning from a TOML file

use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::auth::AuthScheme;
use crate::error::ConfigError;

pub const DEFAULT_API_BASE: &str = "https://api360.yandex.net/directory/v1";

/// Tunables read from `config.toml`. Every key is optional.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub api_base: String,
    pub auth_scheme: AuthScheme,
    /// Parent assigned to departments without `parent_external_id`
    pub root_department_id: u64,
    pub page_size: u32,
    pub request_timeout_secs: u64,
    /// Pause after every create/update
    pub throttle_ms: u64,
    pub retry: RetrySettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            auth_scheme: AuthScheme::default(),
            root_department_id: 1,
            page_size: 100,
            request_timeout_secs: 30,
            throttle_ms: 500,
            retry: RetrySettings::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetrySettings {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub multiplier: u32,
    pub max_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: 6,
            base_delay_ms: 1_000,
            multiplier: 2,
            max_delay_ms: 60_000,
        }
    }
}

impl Settings {
    /// Load settings from `path`, or from the default location when `None`.
    ///
    /// An explicitly named file must exist; a missing default file just
    /// means defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let settings = match path {
            Some(path) => Self::read(path)?,
            None => match Self::config_path() {
                Some(path) if path.exists() => Self::read(&path)?,
                _ => Self::default(),
            },
        };
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_toml(content: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    fn read(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content, path)
    }

    /// `<config dir>/orgsync/config.toml`
    pub fn config_path() -> Option<PathBuf> {
        let mut path = dirs::config_dir()?;
        path.push("orgsync");
        path.push("config.toml");
        Some(path)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |key, reason: &str| {
            Err(ConfigError::InvalidSetting {
                key,
                reason: reason.to_string(),
            })
        };
        if !(self.api_base.starts_with("http://") || self.api_base.starts_with("https://")) {
            return invalid("api_base", "must be an http(s) URL");
        }
        if !(1..=1000).contains(&self.page_size) {
            return invalid("page_size", "must be between 1 and 1000");
        }
        if self.request_timeout_secs == 0 {
            return invalid("request_timeout_secs", "must be positive");
        }
        if self.retry.multiplier == 0 {
            return invalid("retry.multiplier", "must be at least 1");
        }
        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            return invalid("retry.base_delay_ms", "must not exceed retry.max_delay_ms");
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn throttle(&self) -> Duration {
        Duration::from_millis(self.throttle_ms)
    }
}

/// Everything a run needs to talk to the directory, resolved once at startup.
#[derive(Clone, PartialEq, Eq)]
pub struct Config {
    pub org_id: u64,
    pub token: String,
    pub settings: Settings,
}

impl Config {
    /// Validate raw `ORG_ID` / `API_TOKEN` values against loaded settings.
    ///
    /// `fallback_token` (the `TOKEN` variable) is used only when `token` is
    /// unset or blank.
    pub fn resolve(
        org_id: Option<String>,
        token: Option<String>,
        fallback_token: Option<String>,
        settings: Settings,
    ) -> Result<Self, ConfigError> {
        let org_id = org_id
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .ok_or(ConfigError::MissingOrgId)?;
        let org_id = match org_id.parse::<u64>() {
            Ok(id) if id > 0 => id,
            _ => return Err(ConfigError::InvalidOrgId(org_id)),
        };

        let non_blank = |v: Option<String>| {
            v.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
        };
        let token = non_blank(token)
            .or_else(|| non_blank(fallback_token))
            .ok_or(ConfigError::MissingToken)?;

        Ok(Self {
            org_id,
            token,
            settings,
        })
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("org_id", &self.org_id)
            .field("token", &"<redacted>")
            .field("settings", &self.settings)
            .finish()
    }
}
