//! QMetry lane - Gherkin feature files to QMetry test cases
//!
//! Parses tag-annotated feature files, resolves file-level defaults against
//! per-scenario overrides into 32-column QMetry records, and writes them as
//! an import CSV or pushes them to QMetry Cloud with idempotent
//! create-or-update by summary.

pub mod cache;
pub mod config;
pub mod export;
pub mod gherkin;
pub mod mock;
pub mod qmetry;
pub mod record;
pub mod resolve;
pub mod upload;

pub use config::{ConfigError, ConfigLoader, EffectiveConfig, QmetryConfig};
pub use gherkin::{parse_feature, parse_feature_file, FeatureDocument, ParseError};
pub use qmetry::{ApiError, QmetryClient, TestCaseRepository};
pub use record::{build_records, Column, ResolvedRecord};
pub use upload::{upload_records, UploadOptions, UploadOutcome, UploadReport};
