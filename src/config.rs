//! Configuration loading.
//!
//! Configuration is read from a TOML file (default
//! `~/.config/boxbridge/config.toml`), then the `AGENTBAY_API_KEY` and
//! `AGENTBAY_BASE_URL` environment variables override the file. Unknown keys
//! are reported as warnings rather than rejected.
//!
//! ```toml
//! [agentbay]
//! base_url = "https://agentbay.aliyuncs.com"
//! request_timeout_secs = 120
//!
//! [session]
//! user_id = "alice"
//!
//! [sandbox]
//! enabled_kinds = ["linux", "browser", "code"]
//! images = { browser = "browser_chrome_126" }
//! labels = { team = "research" }
//! ```

use crate::error::ConfigurationError;
use crate::sandbox::agentbay::AGENTBAY_API_BASE;
use crate::sandbox::SandboxKind;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

const API_KEY_ENV: &str = "AGENTBAY_API_KEY";
const BASE_URL_ENV: &str = "AGENTBAY_BASE_URL";

/// Errors from reading or parsing the config file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error(transparent)]
    Invalid(#[from] ConfigurationError),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct Config {
    pub agentbay: AgentBayConfig,
    pub session: SessionConfig,
    pub sandbox: SandboxConfig,
}

/// Vendor API connection settings.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct AgentBayConfig {
    /// API key. Prefer the `AGENTBAY_API_KEY` environment variable.
    pub api_key: Option<String>,
    pub base_url: String,
    /// Per-request HTTP timeout.
    pub request_timeout_secs: u64,
}

impl Default for AgentBayConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: AGENTBAY_API_BASE.to_string(),
            request_timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct SessionConfig {
    /// Fixed session id. A random `session-<uuid>` is generated when unset.
    pub session_id: Option<String>,
    pub user_id: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_id: None,
            user_id: "default_user".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct SandboxConfig {
    /// Sandbox kinds exposed to the agent.
    pub enabled_kinds: Vec<String>,
    /// Image overrides keyed by kind name.
    pub images: BTreeMap<String, String>,
    /// Extra labels attached to every vendor session.
    pub labels: BTreeMap<String, String>,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            enabled_kinds: SandboxKind::ALL
                .iter()
                .map(|kind| kind.as_str().to_string())
                .collect(),
            images: BTreeMap::new(),
            labels: BTreeMap::new(),
        }
    }
}

impl Config {
    /// `~/.config/boxbridge/config.toml` (platform equivalent elsewhere).
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "boxbridge")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Load from `path`, or from the default path when it exists. Environment
    /// overrides are applied last.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => {
                let expanded = PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).as_ref());
                Self::from_file(&expanded)?
            }
            None => match Self::default_path().filter(|p| p.exists()) {
                Some(path) => Self::from_file(&path)?,
                None => {
                    tracing::debug!("no config file found, using defaults");
                    Self::default()
                }
            },
        };
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let (config, ignored) = Self::parse_toml(&content)?;
        for key in ignored {
            tracing::warn!(path = %path.display(), "ignoring unknown config key '{key}'");
        }
        Ok(config)
    }

    /// Parse TOML, returning the config and every key serde did not use.
    pub fn parse_toml(content: &str) -> Result<(Self, Vec<String>), ConfigError> {
        let table: toml::Table = toml::from_str(content)?;
        let mut ignored = Vec::new();
        let config = serde_ignored::deserialize(toml::Value::Table(table), |path| {
            ignored.push(path.to_string());
        })?;
        Ok((config, ignored))
    }

    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup(API_KEY_ENV).filter(|k| !k.trim().is_empty()) {
            self.agentbay.api_key = Some(key);
        }
        if let Some(url) = lookup(BASE_URL_ENV).filter(|u| !u.trim().is_empty()) {
            self.agentbay.base_url = url;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        self.enabled_kinds()?;
        for name in self.sandbox.images.keys() {
            name.parse::<SandboxKind>()?;
        }
        if self.agentbay.request_timeout_secs == 0 {
            return Err(ConfigurationError::Invalid(
                "agentbay.request_timeout_secs must be greater than zero".into(),
            ));
        }
        if self.agentbay.base_url.trim().is_empty() {
            return Err(ConfigurationError::Invalid(
                "agentbay.base_url cannot be empty".into(),
            ));
        }
        Ok(())
    }

    /// Enabled kinds in configured order, duplicates removed.
    pub fn enabled_kinds(&self) -> Result<Vec<SandboxKind>, ConfigurationError> {
        let mut kinds = Vec::new();
        for name in &self.sandbox.enabled_kinds {
            let kind: SandboxKind = name.parse()?;
            if !kinds.contains(&kind) {
                kinds.push(kind);
            }
        }
        if kinds.is_empty() {
            return Err(ConfigurationError::Invalid(
                "sandbox.enabled_kinds cannot be empty".into(),
            ));
        }
        Ok(kinds)
    }

    /// Image used for `kind`: the configured override or the kind's default.
    pub fn image_for(&self, kind: SandboxKind) -> String {
        self.sandbox
            .images
            .iter()
            .find(|(name, _)| name.parse::<SandboxKind>().ok() == Some(kind))
            .map(|(_, image)| image.clone())
            .unwrap_or_else(|| kind.default_image().to_string())
    }

    /// Copy safe to print: the API key is masked.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if copy.agentbay.api_key.is_some() {
            copy.agentbay.api_key = Some("***".to_string());
        }
        copy
    }

    pub fn json_schema() -> serde_json::Value {
        serde_json::to_value(schemars::schema_for!(Config)).unwrap_or_default()
    }
}
