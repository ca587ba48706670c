//! QMetry test case repository
//!
//! The upload sink talks to QMetry only through `TestCaseRepository`.
//! `QmetryClient` implements it over the QTM4J Cloud REST API and
//! `crate::mock::MockRepository` implements it in memory.

mod client;
mod fields;
mod types;

pub use client::{QmetryClient, REQUEST_TIMEOUT};
pub use fields::FieldResolver;
pub use types::{
    folder_segments, normalize_folder_path, render_folder_tree, CustomFieldDef, CustomFieldValue,
    FieldOption, FolderId, FolderNode, RemoteTestCase, TestCasePayload, TestStep,
};

/// Failures talking to QMetry; isolated per record during upload
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    #[error("Authentication failed (HTTP {status}); check QMETRY_API_KEY")]
    Auth { status: u16 },

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Network error: {0}")]
    Transport(String),

    #[error("Invalid response: {0}")]
    Decode(String),

    #[error("Invalid folder path '{0}'")]
    InvalidFolderPath(String),

    #[error("Folder '{path}' could not be created: {reason}")]
    FolderCreate { path: String, reason: String },

    #[error("steps not replaced: {0}")]
    StepsNotReplaced(String),
}

/// Folder and test case operations the upload sink needs
pub trait TestCaseRepository {
    /// ID of the folder at `path`, or None if any segment is missing
    fn find_folder(&self, path: &str) -> Result<Option<FolderId>, ApiError>;

    /// Create every missing segment of `path` and return the leaf ID
    fn create_folder(&self, path: &str) -> Result<FolderId, ApiError>;

    /// Full folder tree of the project
    fn list_folders(&self) -> Result<Vec<FolderNode>, ApiError>;

    /// Custom field schema of the project
    fn custom_fields(&self) -> Result<Vec<CustomFieldDef>, ApiError>;

    /// Test cases in `folder` whose summary equals `summary` exactly
    fn find_by_name(&self, folder: &FolderId, summary: &str)
        -> Result<Vec<RemoteTestCase>, ApiError>;

    fn create(&self, folder: &FolderId, payload: &TestCasePayload)
        -> Result<RemoteTestCase, ApiError>;

    /// Update metadata on the existing version, then replace its steps
    fn update(&self, existing: &RemoteTestCase, payload: &TestCasePayload) -> Result<(), ApiError>;
}
