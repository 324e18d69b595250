//! Service configuration.
//!
//! Values are layered, later sources winning:
//!   1. Built-in defaults.
//!   2. An optional TOML file (`--config` / `INNERVOICE_CONFIG`).
//!   3. Environment variables prefixed with `INNERVOICE_`; nested keys are
//!      separated by `__`, e.g. `INNERVOICE_MODEL__DEVICE=cpu`.
//!
//! Example:
//! ```toml
//! port = 8080
//!
//! [cors]
//! allowed_origins = ["http://localhost:5173", "https://*.vercel.app"]
//!
//! [model]
//! device = "cuda:0"
//! preload = true
//!
//! [model.label_aliases]
//! joy = "happy"
//! sadness = "sad"
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::core::ConfigError;
use crate::models::DEFAULT_EMOTION_REPO;
use crate::pipelines::utils::DeviceRequest;
use crate::server::cors::OriginPattern;

/// Prefix of every environment variable read into [`ServiceConfig`].
pub const ENV_PREFIX: &str = "INNERVOICE_";

/// Origins allowed by default: local dev servers and the deployment hosts.
pub const DEFAULT_ALLOWED_ORIGINS: [&str; 5] = [
    "http://localhost:5173",
    "http://localhost:3000",
    "https://*.vercel.app",
    "https://innervoice.vercel.app",
    "https://*.onrender.com",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub host: String,
    pub port: u16,
    /// Largest accepted request body in bytes. Unset means unlimited.
    pub max_body_bytes: Option<usize>,
    pub cors: CorsConfig,
    pub model: ModelConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            max_body_bytes: None,
            cors: CorsConfig::default(),
            model: ModelConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorsConfig {
    /// Exact origins or `scheme://*.domain` wildcards.
    pub allowed_origins: Vec<String>,
    pub allow_credentials: bool,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: DEFAULT_ALLOWED_ORIGINS.iter().map(|o| o.to_string()).collect(),
            allow_credentials: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Hugging Face repo of a DistilBERT sequence-classification checkpoint.
    pub repo: String,
    pub device: DeviceSetting,
    /// Load the model at startup instead of on the first request.
    pub preload: bool,
    /// Renames model labels, e.g. `joy` -> `happy`.
    pub label_aliases: BTreeMap<String, String>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            repo: DEFAULT_EMOTION_REPO.to_string(),
            device: DeviceSetting::Auto,
            preload: false,
            label_aliases: BTreeMap::new(),
        }
    }
}

/// Device selection as written in configuration: `auto`, `cpu`, `cuda` or `cuda:N`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DeviceSetting {
    #[default]
    Auto,
    Cpu,
    Cuda(usize),
}

impl FromStr for DeviceSetting {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "cpu" => Ok(Self::Cpu),
            "cuda" => Ok(Self::Cuda(0)),
            other => other
                .strip_prefix("cuda:")
                .and_then(|index| index.parse().ok())
                .map(Self::Cuda)
                .ok_or_else(|| ConfigError::Device(s.to_string())),
        }
    }
}

impl TryFrom<String> for DeviceSetting {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for DeviceSetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Cpu => write!(f, "cpu"),
            Self::Cuda(index) => write!(f, "cuda:{index}"),
        }
    }
}

impl From<DeviceSetting> for String {
    fn from(setting: DeviceSetting) -> Self {
        setting.to_string()
    }
}

impl From<DeviceSetting> for DeviceRequest {
    fn from(setting: DeviceSetting) -> Self {
        match setting {
            DeviceSetting::Auto => DeviceRequest::Default,
            DeviceSetting::Cpu => DeviceRequest::Cpu,
            DeviceSetting::Cuda(index) => DeviceRequest::Cuda(index),
        }
    }
}

impl ServiceConfig {
    /// The layered configuration sources, without extracting them.
    ///
    /// `path` is read as given, never searched for in parent directories.
    pub fn figment(path: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(ServiceConfig::default()));
        if let Some(path) = path {
            figment = figment.merge(Toml::file_exact(path));
        }
        figment.merge(
            Env::prefixed(ENV_PREFIX)
                .ignore(&["config", "log", "log_jsonl"])
                .split("__"),
        )
    }

    /// Load and validate the configuration.
    ///
    /// A file passed explicitly must exist.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = path.filter(|path| !path.is_file()) {
            return Err(ConfigError::MissingFile(path.to_path_buf()));
        }
        Self::from_figment(Self::figment(path))
    }

    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        let config: ServiceConfig = figment.extract().map_err(Box::new)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks values serde cannot: every CORS origin must be a valid pattern.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for origin in &self.cors.allowed_origins {
            origin.parse::<OriginPattern>()?;
        }
        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
