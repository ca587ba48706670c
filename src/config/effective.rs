//! Effective configuration with provenance
//!
//! Layers, lowest first:
//! 1. built-in defaults
//! 2. `~/.qmetry_config.yaml`
//! 3. nearest `.qmetry_config.yaml` walking up from the working directory,
//!    or the file given with `--config`
//! 4. environment variables with the same names as the YAML keys

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::debug;

use super::defaults::BuiltinDefaults;
use super::merge::merge_layers;

/// Config file name looked up in the home and project directories
pub const CONFIG_FILE_NAME: &str = ".qmetry_config.yaml";

/// Environment variables read as the top layer
pub const ENV_KEYS: [&str; 5] = [
    "QMETRY_API_KEY",
    "QMETRY_PROJECT",
    "QMETRY_DEFAULT_FOLDER",
    "QMETRY_SSL_VERIFY",
    "QMETRY_BASE_URL",
];

/// Keys whose values never appear in `config --show`
const SECRET_KEYS: &[&str] = &["api_key", "token", "secret", "password"];

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConfigOrigin {
    Builtin,
    Home,
    Project,
    Explicit,
    Env,
}

/// A contributing layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigSource {
    pub origin: ConfigOrigin,

    /// File path (None for builtin/env)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// SHA-256 of the raw file bytes (None for builtin/env)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
}

impl ConfigSource {
    fn unfiled(origin: ConfigOrigin) -> Self {
        Self {
            origin,
            path: None,
            digest: None,
        }
    }
}

/// Typed settings after all layers are merged
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QmetryConfig {
    #[serde(rename = "QMETRY_API_KEY", default, deserialize_with = "de_text")]
    pub api_key: String,

    /// Numeric project ID, kept as text until an API call needs it
    #[serde(rename = "QMETRY_PROJECT", default, deserialize_with = "de_text")]
    pub project: String,

    #[serde(rename = "QMETRY_DEFAULT_FOLDER", deserialize_with = "de_text")]
    pub default_folder: String,

    #[serde(rename = "QMETRY_SSL_VERIFY", deserialize_with = "de_flag")]
    pub ssl_verify: bool,

    #[serde(rename = "QMETRY_BASE_URL", deserialize_with = "de_text")]
    pub base_url: String,

    /// Custom field name -> field ID
    #[serde(rename = "CUSTOM_FIELDS", default, deserialize_with = "de_text_map")]
    pub custom_fields: BTreeMap<String, String>,
}

impl QmetryConfig {
    /// Project ID as sent to the API
    pub fn project_id(&self) -> Result<u64, ConfigError> {
        let project = self.project.trim();
        if project.is_empty() {
            return Err(ConfigError::MissingField {
                field: "QMETRY_PROJECT",
            });
        }
        project.parse().map_err(|_| ConfigError::InvalidValue {
            field: "QMETRY_PROJECT".to_string(),
            reason: format!("expected a numeric project ID, got '{}'", project),
        })
    }

    /// Check the settings every API call needs
    pub fn require_api(&self) -> Result<(), ConfigError> {
        if self.api_key.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "QMETRY_API_KEY",
            });
        }
        self.project_id()?;
        if self.base_url.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "QMETRY_BASE_URL",
            });
        }
        Ok(())
    }
}

/// YAML scalars that may stand in for a string setting
#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Flag(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Scalar {
    fn into_text(self) -> String {
        match self {
            Scalar::Flag(b) => b.to_string(),
            Scalar::Int(i) => i.to_string(),
            Scalar::Float(f) => f.to_string(),
            Scalar::Text(s) => s,
        }
    }
}

fn de_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<Scalar>::deserialize(deserializer)?
        .map(Scalar::into_text)
        .unwrap_or_default())
}

fn de_text_map<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<BTreeMap<String, String>, D::Error> {
    let map = Option::<BTreeMap<String, Scalar>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(map.into_iter().map(|(k, v)| (k, v.into_text())).collect())
}

fn de_flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    match Scalar::deserialize(deserializer)? {
        Scalar::Flag(b) => Ok(b),
        Scalar::Int(i) => Ok(i != 0),
        Scalar::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Ok(true),
            "false" | "no" | "off" | "0" => Ok(false),
            other => Err(D::Error::custom(format!("expected true or false, got '{}'", other))),
        },
        Scalar::Float(f) => Err(D::Error::custom(format!("expected true or false, got {}", f))),
    }
}

/// Merged configuration plus where it came from
#[derive(Debug, Clone, Serialize)]
pub struct EffectiveConfig {
    #[serde(skip)]
    pub settings: QmetryConfig,

    /// Merged layers with secrets redacted
    pub config: Value,

    /// Contributing sources in precedence order
    pub sources: Vec<ConfigSource>,

    /// Redacted keys
    pub redactions: Vec<String>,

    /// Directory of the project (or explicit) config file
    #[serde(skip)]
    pub config_dir: Option<PathBuf>,
}

impl EffectiveConfig {
    /// True when any YAML file contributed
    pub fn has_file_source(&self) -> bool {
        self.sources.iter().any(|s| s.path.is_some())
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Finds and merges the configuration layers
#[derive(Debug, Clone, Default)]
pub struct ConfigLoader {
    explicit: Option<PathBuf>,
    start_dir: Option<PathBuf>,
    home_dir: Option<PathBuf>,
    env: BTreeMap<String, String>,
}

impl ConfigLoader {
    /// A loader with no home, project or environment layers
    pub fn new() -> Self {
        Self::default()
    }

    /// A loader reading the real home directory, working directory and
    /// process environment
    pub fn from_environment() -> Self {
        let env = ENV_KEYS
            .iter()
            .filter_map(|key| std::env::var(key).ok().map(|v| (key.to_string(), v)))
            .collect();

        Self {
            explicit: None,
            start_dir: std::env::current_dir().ok(),
            home_dir: dirs::home_dir(),
            env,
        }
    }

    pub fn with_explicit(mut self, path: impl Into<PathBuf>) -> Self {
        self.explicit = Some(path.into());
        self
    }

    pub fn with_start_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.start_dir = Some(dir.into());
        self
    }

    pub fn with_home_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.home_dir = Some(dir.into());
        self
    }

    pub fn with_env(mut self, key: &str, value: &str) -> Self {
        self.env.insert(key.to_string(), value.to_string());
        self
    }

    fn home_file(&self) -> Option<PathBuf> {
        self.home_dir
            .as_ref()
            .map(|home| home.join(CONFIG_FILE_NAME))
            .filter(|path| path.is_file())
    }

    /// Nearest config file at or above the start directory, other than the
    /// home file
    fn discover_project_file(&self, home_file: Option<&Path>) -> Option<PathBuf> {
        let start = self.start_dir.as_ref()?;
        start
            .ancestors()
            .map(|dir| dir.join(CONFIG_FILE_NAME))
            .filter(|path| path.is_file())
            .find(|path| Some(path.as_path()) != home_file)
    }

    pub fn load(&self) -> Result<EffectiveConfig, ConfigError> {
        let mut layers = vec![BuiltinDefaults::default().to_value()];
        let mut sources = vec![ConfigSource::unfiled(ConfigOrigin::Builtin)];
        let mut config_dir = None;

        let home_file = self.home_file();
        if let Some(ref path) = home_file {
            let (value, source) = load_yaml_file(path, ConfigOrigin::Home)?;
            layers.push(value);
            sources.push(source);
        }

        let project = match self.explicit {
            Some(ref path) if !path.is_file() => return Err(ConfigError::NotFound(path.clone())),
            Some(ref path) => Some((path.clone(), ConfigOrigin::Explicit)),
            None => self
                .discover_project_file(home_file.as_deref())
                .map(|path| (path, ConfigOrigin::Project)),
        };
        if let Some((path, origin)) = project {
            let (value, source) = load_yaml_file(&path, origin)?;
            layers.push(value);
            sources.push(source);
            config_dir = path.parent().map(Path::to_path_buf);
        }

        if !self.env.is_empty() {
            let env: serde_json::Map<String, Value> = self
                .env
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect();
            layers.push(Value::Object(env));
            sources.push(ConfigSource::unfiled(ConfigOrigin::Env));
        }

        let merged = merge_layers(layers);
        let settings: QmetryConfig =
            serde_json::from_value(merged.clone()).map_err(|e| ConfigError::InvalidValue {
                field: "config".to_string(),
                reason: e.to_string(),
            })?;

        let mut config = merged;
        let redactions = redact_secrets(&mut config);

        debug!(
            sources = sources.len(),
            config_dir = ?config_dir,
            "loaded configuration"
        );

        Ok(EffectiveConfig {
            settings,
            config,
            sources,
            redactions,
            config_dir,
        })
    }
}

/// Read one YAML layer; an empty file is an empty layer
fn load_yaml_file(path: &Path, origin: ConfigOrigin) -> Result<(Value, ConfigSource), ConfigError> {
    let bytes = fs::read(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let digest = hex::encode(Sha256::digest(&bytes));

    let contents = String::from_utf8(bytes).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        message: format!("invalid UTF-8: {}", e),
    })?;

    let value = parse_yaml(&contents).map_err(|message| ConfigError::Parse {
        path: path.to_path_buf(),
        message,
    })?;

    Ok((
        value,
        ConfigSource {
            origin,
            path: Some(path.to_string_lossy().to_string()),
            digest: Some(digest),
        },
    ))
}

fn parse_yaml(contents: &str) -> Result<Value, String> {
    if contents.trim().is_empty() {
        return Ok(Value::Object(serde_json::Map::new()));
    }

    let options = serde_saphyr::Options {
        strict_booleans: true,
        ..serde_saphyr::Options::default()
    };
    let value: Value =
        serde_saphyr::from_str_with_options(contents, options).map_err(|e| e.to_string())?;

    match value {
        Value::Null => Ok(Value::Object(serde_json::Map::new())),
        Value::Object(_) => Ok(value),
        _ => Err("expected a mapping of settings at the top level".to_string()),
    }
}

fn redact_secrets(value: &mut Value) -> Vec<String> {
    let mut redactions = Vec::new();
    if let Value::Object(map) = value {
        for (key, val) in map.iter_mut() {
            let key_lower = key.to_lowercase();
            let is_secret = SECRET_KEYS.iter().any(|s| key_lower.contains(s));
            let is_set = val.as_str().map_or(!val.is_null(), |s| !s.is_empty());
            if is_secret && is_set {
                *val = Value::String("[REDACTED]".to_string());
                redactions.push(key.clone());
            }
        }
    }
    redactions
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid YAML in {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("{field} is not set (run `qmetry config` to create a template)")]
    MissingField { field: &'static str },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}
