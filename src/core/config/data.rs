use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::api::InvocationMode;
use crate::core::backend::http::{
    HttpTimeouts, DEFAULT_CONNECT_TIMEOUT_SECONDS, DEFAULT_REQUEST_TIMEOUT_SECONDS,
};
use crate::core::constants::DEFAULT_TIMEOUT_MS;

/// Environment variable that overrides `backend_url` from the config file.
pub const BACKEND_URL_ENV: &str = "MCP_INSPECTOR_BACKEND_URL";

#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq)]
pub struct Config {
    /// Base URL of the proxy that serves the inspector endpoints
    pub backend_url: Option<String>,
    /// Execution timeout hint sent with each call
    pub default_timeout_ms: Option<u64>,
    pub default_mode: Option<InvocationMode>,
    pub connect_timeout_secs: Option<u64>,
    pub request_timeout_secs: Option<u64>,
}

/// Keys accepted by `config set` and `config unset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKey {
    BackendUrl,
    DefaultTimeoutMs,
    DefaultMode,
    ConnectTimeoutSecs,
    RequestTimeoutSecs,
}

impl ConfigKey {
    pub const ALL: [ConfigKey; 5] = [
        ConfigKey::BackendUrl,
        ConfigKey::DefaultTimeoutMs,
        ConfigKey::DefaultMode,
        ConfigKey::ConnectTimeoutSecs,
        ConfigKey::RequestTimeoutSecs,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ConfigKey::BackendUrl => "backend-url",
            ConfigKey::DefaultTimeoutMs => "default-timeout-ms",
            ConfigKey::DefaultMode => "default-mode",
            ConfigKey::ConnectTimeoutSecs => "connect-timeout-secs",
            ConfigKey::RequestTimeoutSecs => "request-timeout-secs",
        }
    }

    /// Accepts both the dashed CLI spelling and the underscored file key.
    pub fn parse(input: &str) -> Option<Self> {
        let normalized = input.trim().to_ascii_lowercase().replace('_', "-");
        Self::ALL.into_iter().find(|key| key.name() == normalized)
    }
}

impl Config {
    pub fn timeout_ms(&self) -> u64 {
        self.default_timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS)
    }

    pub fn mode(&self) -> InvocationMode {
        self.default_mode.unwrap_or_default()
    }

    pub fn http_timeouts(&self) -> HttpTimeouts {
        HttpTimeouts {
            connect: Duration::from_secs(
                self.connect_timeout_secs
                    .unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECONDS),
            ),
            request: Duration::from_secs(
                self.request_timeout_secs
                    .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECONDS),
            ),
        }
    }

    /// Picks the backend URL: command line first, then the environment, then
    /// the config file.
    pub fn resolve_backend_url(&self, cli: Option<&str>, env: Option<&str>) -> Option<String> {
        [cli, env, self.backend_url.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|url| !url.is_empty())
            .map(str::to_string)
    }

    pub fn set_value(&mut self, key: ConfigKey, value: &str) -> Result<(), String> {
        let value = value.trim();
        match key {
            ConfigKey::BackendUrl => {
                if !(value.starts_with("http://") || value.starts_with("https://")) {
                    return Err(format!("Backend URL must start with http:// or https://: {value}"));
                }
                self.backend_url = Some(value.to_string());
            }
            ConfigKey::DefaultTimeoutMs => {
                self.default_timeout_ms = Some(parse_positive(key, value)?);
            }
            ConfigKey::DefaultMode => {
                self.default_mode = Some(value.parse::<InvocationMode>()?);
            }
            ConfigKey::ConnectTimeoutSecs => {
                self.connect_timeout_secs = Some(parse_positive(key, value)?);
            }
            ConfigKey::RequestTimeoutSecs => {
                self.request_timeout_secs = Some(parse_positive(key, value)?);
            }
        }
        Ok(())
    }

    pub fn unset_value(&mut self, key: ConfigKey) {
        match key {
            ConfigKey::BackendUrl => self.backend_url = None,
            ConfigKey::DefaultTimeoutMs => self.default_timeout_ms = None,
            ConfigKey::DefaultMode => self.default_mode = None,
            ConfigKey::ConnectTimeoutSecs => self.connect_timeout_secs = None,
            ConfigKey::RequestTimeoutSecs => self.request_timeout_secs = None,
        }
    }

    pub fn display_value(&self, key: ConfigKey) -> Option<String> {
        match key {
            ConfigKey::BackendUrl => self.backend_url.clone(),
            ConfigKey::DefaultTimeoutMs => self.default_timeout_ms.map(|v| v.to_string()),
            ConfigKey::DefaultMode => self.default_mode.map(|mode| mode.as_str().to_string()),
            ConfigKey::ConnectTimeoutSecs => self.connect_timeout_secs.map(|v| v.to_string()),
            ConfigKey::RequestTimeoutSecs => self.request_timeout_secs.map(|v| v.to_string()),
        }
    }
}

fn parse_positive(key: ConfigKey, value: &str) -> Result<u64, String> {
    match value.parse::<u64>() {
        Ok(parsed) if parsed > 0 => Ok(parsed),
        _ => Err(format!("{} expects a positive integer, got '{value}'", key.name())),
    }
}

pub fn path_display<P: AsRef<Path>>(path: P) -> String {
    let path = path.as_ref();

    #[cfg(unix)]
    {
        if let Some(home) = std::env::var_os("HOME") {
            let home_path = PathBuf::from(home);
            if let Ok(relative) = path.strip_prefix(&home_path) {
                return format!("~/{}", relative.display());
            }
        }
    }

    path.display().to_string()
}
