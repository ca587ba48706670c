//! Layered configuration
//!
//! Built-in defaults, then `~/.qmetry_config.yaml`, then the project's
//! `.qmetry_config.yaml` (or `--config PATH`), then environment variables.
//! Each contributing layer is recorded with its origin.

mod defaults;
mod effective;
mod merge;
mod template;

pub use defaults::{BuiltinDefaults, DEFAULT_BASE_URL, DEFAULT_FOLDER};
pub use effective::{
    ConfigError, ConfigLoader, ConfigOrigin, ConfigSource, EffectiveConfig, QmetryConfig,
    CONFIG_FILE_NAME, ENV_KEYS,
};
pub use merge::{deep_merge, merge_layers};
pub use template::{write_template, CONFIG_TEMPLATE, TEMPLATE_FILE_NAME};
