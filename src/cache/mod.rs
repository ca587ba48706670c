//! Lookup cache
//!
//! Remembers custom-field IDs, option IDs and folder IDs between runs so an
//! upload does not rediscover them. The cache is advisory: deleting the file
//! only costs a few extra lookups.
//!
//! ```json
//! {
//!   "field_ids": { "Apps": "qcf_1" },
//!   "field_options": { "Apps": { "ProductA": "11" } },
//!   "folders": { "/Mobile/Login": "221" }
//! }
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Cache file name, kept next to the active config file
pub const CACHE_FILE_NAME: &str = ".qmetry_cache.json";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupCache {
    /// Custom field name -> field ID
    #[serde(default)]
    pub field_ids: BTreeMap<String, String>,

    /// Custom field name -> option value -> option ID
    #[serde(default)]
    pub field_options: BTreeMap<String, BTreeMap<String, String>>,

    /// Folder path -> folder ID
    #[serde(default)]
    pub folders: BTreeMap<String, String>,
}

impl LookupCache {
    pub fn field_id(&self, name: &str) -> Option<&str> {
        self.field_ids.get(name).map(String::as_str)
    }

    pub fn option_id(&self, field: &str, value: &str) -> Option<&str> {
        self.field_options
            .get(field)
            .and_then(|options| options.get(value))
            .map(String::as_str)
    }

    pub fn folder_id(&self, path: &str) -> Option<&str> {
        self.folders.get(path).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.field_ids.is_empty() && self.field_options.is_empty() && self.folders.is_empty()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Failed to access cache {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid cache {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Where the lookup cache lives between runs
pub trait CacheStore {
    /// Read the cache; a missing store yields an empty cache
    fn load(&self) -> Result<LookupCache, CacheError>;

    /// Replace the stored cache
    fn save(&self, cache: &LookupCache) -> Result<(), CacheError>;
}

/// JSON file store
#[derive(Debug, Clone)]
pub struct FileCacheStore {
    path: PathBuf,
}

impl FileCacheStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<dir>/.qmetry_cache.json`
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(CACHE_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CacheStore for FileCacheStore {
    fn load(&self) -> Result<LookupCache, CacheError> {
        let json = match fs::read_to_string(&self.path) {
            Ok(json) => json,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no lookup cache yet");
                return Ok(LookupCache::default());
            }
            Err(source) => {
                return Err(CacheError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        LookupCache::from_json(&json).map_err(|source| CacheError::Parse {
            path: self.path.clone(),
            source,
        })
    }

    fn save(&self, cache: &LookupCache) -> Result<(), CacheError> {
        let json = cache.to_json().map_err(|source| CacheError::Parse {
            path: self.path.clone(),
            source,
        })?;
        fs::write(&self.path, json).map_err(|source| CacheError::Io {
            path: self.path.clone(),
            source,
        })?;
        debug!(path = %self.path.display(), "saved lookup cache");
        Ok(())
    }
}

/// In-process store for tests and dry runs
#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    inner: Mutex<LookupCache>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cache(cache: LookupCache) -> Self {
        Self {
            inner: Mutex::new(cache),
        }
    }

    /// Current contents; data behind a poisoned lock is used as is
    pub fn snapshot(&self) -> LookupCache {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl CacheStore for MemoryCacheStore {
    fn load(&self) -> Result<LookupCache, CacheError> {
        Ok(self.snapshot())
    }

    fn save(&self, cache: &LookupCache) -> Result<(), CacheError> {
        *self.inner.lock().unwrap_or_else(PoisonError::into_inner) = cache.clone();
        Ok(())
    }
}

/// Load from `store`, falling back to an empty cache with a warning
pub fn load_or_default(store: &dyn CacheStore) -> LookupCache {
    match store.load() {
        Ok(cache) => cache,
        Err(e) => {
            warn!(error = %e, "ignoring unreadable lookup cache");
            LookupCache::default()
        }
    }
}
