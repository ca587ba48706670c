//! CSV export
//!
//! Serializes records in the QMetry import layout:
//! - header row of the 32 fixed column names
//! - a field is quoted iff it contains a comma, a double quote, CR or LF
//! - embedded double quotes are doubled
//! - rows end with CRLF
//!
//! Output depends only on the records, so exporting an unchanged file twice
//! is byte-identical.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info};
use walkdir::WalkDir;

use crate::record::{header_row, ResolvedRecord};

/// Row terminator used by QMetry's importer
pub const LINE_TERMINATOR: &str = "\r\n";

/// Output file name for `export all`
pub const COMBINED_EXPORT_NAME: &str = "All_Features_Export.csv";

/// Feature file extension searched by `export all` and `validate`
pub const FEATURE_EXTENSION: &str = "feature";

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to scan {path}: {source}")]
    Scan {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
}

/// Quote a field only when it needs it
pub fn quote_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Writes QMetry CSV rows to any `Write`
pub struct CsvWriter<W: Write> {
    inner: W,
}

impl<W: Write> CsvWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    fn write_row<'a>(&mut self, fields: impl IntoIterator<Item = &'a str>) -> io::Result<()> {
        let line = fields
            .into_iter()
            .map(quote_field)
            .collect::<Vec<_>>()
            .join(",");
        self.inner.write_all(line.as_bytes())?;
        self.inner.write_all(LINE_TERMINATOR.as_bytes())
    }

    pub fn write_header(&mut self) -> io::Result<()> {
        self.write_row(header_row())
    }

    pub fn write_record(&mut self, record: &ResolvedRecord) -> io::Result<()> {
        self.write_row(record.values().iter().map(String::as_str))
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

/// Header plus one row per record
pub fn write_csv<W: Write>(out: W, records: &[ResolvedRecord]) -> io::Result<W> {
    let mut writer = CsvWriter::new(out);
    writer.write_header()?;
    for record in records {
        writer.write_record(record)?;
    }
    writer.flush()?;
    Ok(writer.into_inner())
}

/// Render records to an in-memory CSV string
pub fn to_csv_string(records: &[ResolvedRecord]) -> String {
    let bytes = write_csv(Vec::new(), records).unwrap_or_default();
    String::from_utf8(bytes).unwrap_or_default()
}

/// Write records to a CSV file, replacing it if present
pub fn export_to_path(path: &Path, records: &[ResolvedRecord]) -> Result<(), ExportError> {
    let file = fs::File::create(path).map_err(|source| ExportError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    write_csv(io::BufWriter::new(file), records).map_err(|source| ExportError::Write {
        path: path.to_path_buf(),
        source,
    })?;

    info!(path = %path.display(), rows = records.len(), "wrote CSV export");
    Ok(())
}

/// `<dir>/<stem>_Export.csv` next to the feature file
pub fn default_output_path(feature_path: &Path) -> PathBuf {
    let stem = feature_path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "feature".to_string());
    let dir = feature_path.parent().unwrap_or_else(|| Path::new(""));
    dir.join(format!("{}_Export.csv", stem))
}

/// Every `*.feature` file under `root`, sorted by path
pub fn find_feature_files(root: &Path) -> Result<Vec<PathBuf>, ExportError> {
    let mut files = Vec::new();

    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|source| ExportError::Scan {
            path: root.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if entry.file_type().is_file()
            && path.extension().and_then(|e| e.to_str()) == Some(FEATURE_EXTENSION)
        {
            files.push(path.to_path_buf());
        }
    }

    debug!(root = %root.display(), count = files.len(), "found feature files");
    Ok(files)
}
