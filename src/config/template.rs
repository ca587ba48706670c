//! `qmetry config` template writer

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use super::effective::ConfigError;

/// Written next to the working directory when no `--output` is given
pub const TEMPLATE_FILE_NAME: &str = ".qmetry_config.yaml.template";

pub const CONFIG_TEMPLATE: &str = r#"# QMetry settings for the qmetry tool.
# Copy to .qmetry_config.yaml (project directory or home directory).
# Keep it out of version control: it holds a personal API key.
# Every key can also be set through an environment variable of the same name.

# A key left without a value keeps the value from ~/.qmetry_config.yaml.

# Open API key from QMetry > Configuration > Open API
QMETRY_API_KEY:

# Numeric QMetry project ID
QMETRY_PROJECT:

# Folder used when neither --folder nor @Folder names one
# QMETRY_DEFAULT_FOLDER: "/Uncategorized"

# Set to false only for proxies with self-signed certificates
# QMETRY_SSL_VERIFY: true

# QMETRY_BASE_URL: "https://qtmcloud.qmetry.com/rest/api/latest"

# Custom field IDs. Optional: fields not listed here are discovered on the
# first upload and kept in .qmetry_cache.json.
# CUSTOM_FIELDS:
#   Apps: "qcf_12345"
#   Platform: "qcf_12346"
"#;

/// Write the template, replacing any previous template file
pub fn write_template(output: Option<&Path>) -> Result<PathBuf, ConfigError> {
    let path = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(TEMPLATE_FILE_NAME));

    fs::write(&path, CONFIG_TEMPLATE).map_err(|source| ConfigError::Io {
        path: path.clone(),
        source,
    })?;

    info!(path = %path.display(), "wrote config template");
    Ok(path)
}
