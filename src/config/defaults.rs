//! Built-in defaults (lowest layer)

use serde::{Deserialize, Serialize};

/// Folder used when neither the CLI nor the feature file names one
pub const DEFAULT_FOLDER: &str = "/Uncategorized";

/// QTM4J Cloud REST root
pub const DEFAULT_BASE_URL: &str = "https://qtmcloud.qmetry.com/rest/api/latest";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltinDefaults {
    pub default_folder: String,
    pub ssl_verify: bool,
    pub base_url: String,
}

impl Default for BuiltinDefaults {
    fn default() -> Self {
        Self {
            default_folder: DEFAULT_FOLDER.to_string(),
            ssl_verify: true,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }
}

impl BuiltinDefaults {
    /// As a merge layer, keyed like the YAML file
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::json!({
            "QMETRY_DEFAULT_FOLDER": self.default_folder,
            "QMETRY_SSL_VERIFY": self.ssl_verify,
            "QMETRY_BASE_URL": self.base_url,
        })
    }
}
