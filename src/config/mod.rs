//! Configuration management.
//!
//! Settings come from a YAML file (`schema_sources` plus server knobs) and
//! can be overridden through `API_BRIDGE_*` environment variables.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::BridgeError;
use crate::models::ConnectMode;

/// Environment variable naming the config file path.
pub const CONFIG_FILE_ENV_VAR: &str = "API_BRIDGE_CONFIG_FILE";

/// Default config file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "api-bridge.yaml";

/// One configured schema source.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct SchemaSource {
    /// The source identifier: URL, `grpc://host:port`, `github://owner/repo/path` or a
    /// local path.
    pub url: String,

    /// Headers injected into schema-fetch HTTP requests only.
    #[serde(default)]
    pub headers: HashMap<String, String>,

    /// For `.proto` and Connect entries: the upstream endpoint.
    #[serde(default)]
    pub server: Option<String>,

    /// Classification override; `connect` is the only accepted value.
    #[serde(rename = "type", default)]
    pub source_type: Option<String>,

    /// For Connect sources: `http` (default) or `grpc`.
    #[serde(default)]
    pub mode: Option<String>,
}

impl SchemaSource {
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn is_connect(&self) -> bool {
        self.source_type.as_deref() == Some("connect")
    }

    pub fn connect_mode(&self) -> ConnectMode {
        match self.mode.as_deref() {
            Some("grpc") => ConnectMode::Grpc,
            _ => ConnectMode::Http,
        }
    }
}

/// A schema source entry as written in YAML: either a bare string or a
/// full object.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SourceEntry {
    Url(String),
    Full(SchemaSource),
}

/// Raw shape of the configuration file.
#[derive(Debug, Deserialize, Default)]
struct FileConfig {
    #[serde(default)]
    schema_sources: Vec<SourceEntry>,
    #[serde(default)]
    admin_listen_addr: Option<String>,
    #[serde(default)]
    http_client_timeout_secs: Option<u64>,
    #[serde(default)]
    rate_limit_rps: Option<u32>,
}

/// Final application configuration, merged from file and environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub schema_sources: Vec<SchemaSource>,

    /// Address of the admin HTTP listener.
    pub admin_listen_addr: String,

    /// Timeout applied to upstream HTTP calls and schema fetches.
    pub http_client_timeout_secs: u64,

    /// Requests per second against upstreams; 0 disables rate limiting.
    pub rate_limit_rps: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            schema_sources: Vec::new(),
            admin_listen_addr: "0.0.0.0:8081".to_string(),
            http_client_timeout_secs: 30,
            rate_limit_rps: 0,
        }
    }
}

impl Config {
    /// Load configuration from an explicit path, or from the default
    /// locations when none is given. Environment variables override file
    /// values either way.
    pub fn load(path: Option<&Path>) -> Result<Self, BridgeError> {
        let file_cfg = match path {
            Some(p) => Self::read_file(p)?,
            None => match find_config_file() {
                Some(p) => Self::read_file(&p)?,
                None => {
                    tracing::info!("No config file found, using defaults and environment only");
                    FileConfig::default()
                }
            },
        };

        let mut cfg = Config::default();
        cfg.schema_sources = normalize_sources(file_cfg.schema_sources);
        if let Some(v) = file_cfg.admin_listen_addr {
            cfg.admin_listen_addr = v;
        }
        if let Some(v) = file_cfg.http_client_timeout_secs {
            cfg.http_client_timeout_secs = v;
        }
        if let Some(v) = file_cfg.rate_limit_rps {
            cfg.rate_limit_rps = v;
        }

        cfg.apply_env_overrides();
        Ok(cfg)
    }

    fn read_file(path: &Path) -> Result<FileConfig, BridgeError> {
        let bytes = std::fs::read(path).map_err(|e| {
            BridgeError::Config(format!("failed to read config file '{}': {}", path.display(), e))
        })?;
        let cfg = serde_yaml::from_slice(&bytes).map_err(|e| {
            BridgeError::Config(format!(
                "failed to parse config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        tracing::info!(path = %path.display(), "Loaded configuration file");
        Ok(cfg)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("API_BRIDGE_ADMIN_LISTEN_ADDR") {
            self.admin_listen_addr = v;
        }
        if let Ok(v) = std::env::var("API_BRIDGE_HTTP_CLIENT_TIMEOUT_SECS") {
            if let Ok(secs) = v.parse() {
                self.http_client_timeout_secs = secs;
            }
        }
        if let Ok(v) = std::env::var("API_BRIDGE_RATE_LIMIT_RPS") {
            if let Ok(rps) = v.parse() {
                self.rate_limit_rps = rps;
            }
        }
    }
}

/// Drop invalid entries: a `.proto` or Connect entry without a `server` can
/// never produce tools, so it is skipped here with a warning instead of
/// failing every sync pass.
fn normalize_sources(entries: Vec<SourceEntry>) -> Vec<SchemaSource> {
    let mut sources = Vec::with_capacity(entries.len());
    for entry in entries {
        let source = match entry {
            SourceEntry::Url(url) => SchemaSource::from_url(url),
            SourceEntry::Full(source) => source,
        };
        if source.url.is_empty() {
            tracing::warn!("Ignoring schema source with empty url");
            continue;
        }
        let without_ref = source.url.split('@').next().unwrap_or(&source.url);
        if (without_ref.ends_with(".proto") || source.is_connect()) && source.server.is_none() {
            tracing::warn!(url = %source.url, "Schema source missing 'server' field, skipping");
            continue;
        }
        sources.push(source);
    }
    sources
}

/// Search for a configuration file in default locations:
///
/// 1. `$API_BRIDGE_CONFIG_FILE`
/// 2. `./api-bridge.yaml`
/// 3. `$XDG_CONFIG_HOME/api-bridge/config.yaml`
/// 4. `~/.config/api-bridge/config.yaml`
pub fn find_config_file() -> Option<PathBuf> {
    if let Ok(explicit) = std::env::var(CONFIG_FILE_ENV_VAR) {
        let path = PathBuf::from(explicit);
        if path.exists() {
            return Some(path);
        }
    }

    let path = PathBuf::from(DEFAULT_CONFIG_FILE);
    if path.exists() {
        return Some(path);
    }

    if let Ok(xdg_home) = std::env::var("XDG_CONFIG_HOME") {
        let path = PathBuf::from(xdg_home).join("api-bridge").join("config.yaml");
        if path.exists() {
            return Some(path);
        }
    }

    if let Ok(home) = std::env::var("HOME") {
        let path = PathBuf::from(home)
            .join(".config")
            .join("api-bridge")
            .join("config.yaml");
        if path.exists() {
            return Some(path);
        }
    }

    None
}
