use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::aprs_client::{AprsClientConfig, AprsClientConfigBuilder};
use crate::aprs_filters::FilterExpr;

/// Default file looked up in the working directory
const DEFAULT_CONFIG_FILE: &str = "aprsis.toml";

/// Environment variable naming the config file
pub const CONFIG_ENV_VAR: &str = "APRSIS_CONFIG";

/// Configuration file. Every field is optional; missing values keep the client defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfigFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callsign: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relogin_interval_seconds: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_timeout_seconds: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_delay_seconds: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_retry_delay_seconds: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics_port: Option<u16>,
}

impl ClientConfigFile {
    /// Load config from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let contents =
            std::fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;
        let config: ClientConfigFile =
            toml::from_str(&contents).with_context(|| format!("Failed to parse {:?}", path))?;
        Ok(config)
    }

    /// Save config to a TOML file (atomic: write to .tmp then rename)
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents =
            toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;
        let tmp_path = path.with_extension("toml.tmp");
        std::fs::write(&tmp_path, &contents)
            .with_context(|| format!("Failed to write {:?}", tmp_path))?;
        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("Failed to rename {:?} to {:?}", tmp_path, path))?;
        Ok(())
    }

    /// Snapshot of a resolved client configuration. Product and version are not stored.
    pub fn from_config(config: &AprsClientConfig, metrics_port: Option<u16>) -> Self {
        Self {
            server: Some(config.server.clone()),
            port: Some(config.port),
            callsign: Some(config.callsign.clone()),
            password: config.password.clone(),
            filter: config.filter.clone(),
            relogin_interval_seconds: Some(config.relogin_interval.as_secs()),
            read_timeout_seconds: Some(config.read_timeout.as_secs()),
            retry_delay_seconds: Some(config.retry_delay_seconds),
            max_retry_delay_seconds: Some(config.max_retry_delay_seconds),
            metrics_port,
        }
    }

    /// Layer the values present in this file over `builder`. A configured filter must parse.
    pub fn apply(&self, mut builder: AprsClientConfigBuilder) -> Result<AprsClientConfigBuilder> {
        if let Some(server) = &self.server {
            builder = builder.server(server.clone());
        }
        if let Some(port) = self.port {
            builder = builder.port(port);
        }
        if let Some(callsign) = &self.callsign {
            builder = builder.callsign(callsign.clone());
        }
        if let Some(password) = &self.password {
            builder = builder.password(Some(password.clone()));
        }
        if let Some(filter) = &self.filter {
            FilterExpr::parse_strict(filter)
                .with_context(|| format!("Invalid filter in config file: {:?}", filter))?;
            builder = builder.filter(Some(filter.clone()));
        }
        if let Some(seconds) = self.relogin_interval_seconds {
            builder = builder.relogin_interval(Duration::from_secs(seconds));
        }
        if let Some(seconds) = self.read_timeout_seconds {
            builder = builder.read_timeout(Duration::from_secs(seconds));
        }
        if let Some(seconds) = self.retry_delay_seconds {
            builder = builder.retry_delay_seconds(seconds);
        }
        if let Some(seconds) = self.max_retry_delay_seconds {
            builder = builder.max_retry_delay_seconds(seconds);
        }
        Ok(builder)
    }
}

/// Resolve the config file path.
///
/// Priority:
/// 1. an explicit `--config` path
/// 2. `APRSIS_CONFIG` env var
/// 3. `./aprsis.toml` if it exists
pub fn client_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        return Some(PathBuf::from(path));
    }

    let local = PathBuf::from(DEFAULT_CONFIG_FILE);
    local.exists().then_some(local)
}
