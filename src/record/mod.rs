//! Resolved test case records
//!
//! A `ResolvedRecord` is one test case in the fixed 32-column layout. It is
//! built per scenario and exists only long enough to become a CSV row or an
//! API payload.

mod builder;
mod columns;
mod warnings;

pub use builder::{
    build_record, build_records, precondition, render_tag_text, render_value, BuildOutput,
    DEFAULT_PRIORITY, DEFAULT_STATUS, FOLDER_FIELD, REQUIRED_FIELDS,
};
pub use columns::{header_row, Column, COLUMN_COUNT};
pub use warnings::{ValidationWarning, WarningKind};

/// One test case in template column order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRecord {
    values: [String; COLUMN_COUNT],
    folder: Option<String>,
}

impl Default for ResolvedRecord {
    fn default() -> Self {
        Self {
            values: std::array::from_fn(|_| String::new()),
            folder: None,
        }
    }
}

impl ResolvedRecord {
    /// A record with every column empty
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, column: Column) -> &str {
        &self.values[column.index()]
    }

    pub fn set(&mut self, column: Column, value: impl Into<String>) {
        self.values[column.index()] = value.into();
    }

    /// All 32 values in column order
    pub fn values(&self) -> &[String; COLUMN_COUNT] {
        &self.values
    }

    pub fn summary(&self) -> &str {
        self.get(Column::Summary)
    }

    /// Rendered `Folder` field, if any default or override set one
    pub fn folder(&self) -> Option<&str> {
        self.folder.as_deref()
    }

    pub fn set_folder(&mut self, folder: Option<String>) {
        self.folder = folder;
    }

    /// Non-empty custom field columns
    pub fn custom_fields(&self) -> impl Iterator<Item = (Column, &str)> {
        Column::CUSTOM_FIELDS
            .into_iter()
            .map(move |column| (column, self.get(column)))
            .filter(|(_, value)| !value.is_empty())
    }
}
