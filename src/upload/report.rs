//! Upload report

use std::fmt;
use std::fs;
use std::io;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What happened to one record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UploadOutcome {
    Created { key: String },
    Updated { key: String },
    WouldCreate,
    WouldUpdate { key: String },
    Failed { reason: String },
}

impl UploadOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, UploadOutcome::Failed { .. })
    }

    /// Remote key after a real create or update
    pub fn issue_key(&self) -> Option<&str> {
        match self {
            UploadOutcome::Created { key } | UploadOutcome::Updated { key } => Some(key),
            _ => None,
        }
    }
}

impl fmt::Display for UploadOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UploadOutcome::Created { key } => write!(f, "created {}", key),
            UploadOutcome::Updated { key } => write!(f, "updated {}", key),
            UploadOutcome::WouldCreate => write!(f, "would create"),
            UploadOutcome::WouldUpdate { key } => write!(f, "would update {}", key),
            UploadOutcome::Failed { reason } => write!(f, "failed: {}", reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordResult {
    pub summary: String,
    pub folder: String,
    pub outcome: UploadOutcome,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadReport {
    pub created_at: DateTime<Utc>,
    pub dry_run: bool,
    pub total: usize,
    pub created: usize,
    pub updated: usize,
    pub would_create: usize,
    pub would_update: usize,
    pub failed: usize,
    pub results: Vec<RecordResult>,
    pub human_summary: String,
}

impl UploadReport {
    pub fn from_results(results: Vec<RecordResult>, dry_run: bool) -> Self {
        let count = |pred: fn(&UploadOutcome) -> bool| {
            results.iter().filter(|r| pred(&r.outcome)).count()
        };

        let created = count(|o| matches!(o, UploadOutcome::Created { .. }));
        let updated = count(|o| matches!(o, UploadOutcome::Updated { .. }));
        let would_create = count(|o| matches!(o, UploadOutcome::WouldCreate));
        let would_update = count(|o| matches!(o, UploadOutcome::WouldUpdate { .. }));
        let failed = count(UploadOutcome::is_failure);
        let total = results.len();

        let human_summary = if dry_run {
            format!(
                "Dry run: {} would be created, {} would be updated, {} failed",
                would_create, would_update, failed
            )
        } else {
            format!(
                "Uploaded {} of {}: {} created, {} updated, {} failed",
                created + updated,
                total,
                created,
                updated,
                failed
            )
        };

        Self {
            created_at: Utc::now(),
            dry_run,
            total,
            created,
            updated,
            would_create,
            would_update,
            failed,
            results,
            human_summary,
        }
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }

    /// Process exit code: 1 if any record failed
    pub fn exit_code(&self) -> i32 {
        if self.has_failures() {
            1
        } else {
            0
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn write_to_file(&self, path: &Path) -> io::Result<()> {
        let json = self.to_json().map_err(|e| {
            io::Error::new(io::ErrorKind::InvalidData, format!("JSON error: {}", e))
        })?;
        fs::write(path, json)
    }
}
