//! Upload sink
//!
//! For each record, in source order:
//! 1. target folder: `--folder`, then the record's `@Folder`, then the
//!    configured default
//! 2. custom field values resolved to IDs
//! 3. folder looked up (and created unless dry run)
//! 4. existing test cases with the same summary in that folder:
//!    none -> create, one -> update, more -> failed (ambiguous)
//!
//! A failure is reported against its record and the next record proceeds.
//! Dry runs make the same lookups but no mutating call.

mod report;

use std::collections::{BTreeMap, HashSet};

use tracing::{debug, info, warn};

use crate::cache::{load_or_default, CacheError, CacheStore, LookupCache};
use crate::qmetry::{
    folder_segments, normalize_folder_path, ApiError, FieldResolver, FolderId, TestCasePayload,
    TestCaseRepository,
};
use crate::record::{Column, ResolvedRecord};

pub use report::{RecordResult, UploadOutcome, UploadReport};

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error("Failed to write report: {0}")]
    Report(#[from] std::io::Error),
}

#[derive(Debug, Clone, Default)]
pub struct UploadOptions {
    /// `--folder PATH` / `upload FILE to PATH`
    pub folder_override: Option<String>,
    /// `QMETRY_DEFAULT_FOLDER`
    pub default_folder: String,
    pub dry_run: bool,
    /// `CUSTOM_FIELDS` from config
    pub custom_fields: BTreeMap<String, String>,
}

pub struct Uploader<'a> {
    repo: &'a dyn TestCaseRepository,
    options: UploadOptions,
    cache: LookupCache,
    loaded: LookupCache,
    fields: FieldResolver,
    /// (folder path, summary) pairs already handled this run
    seen: HashSet<(String, String)>,
}

impl<'a> Uploader<'a> {
    pub fn new(repo: &'a dyn TestCaseRepository, options: UploadOptions, cache: LookupCache) -> Self {
        let fields = FieldResolver::new(options.custom_fields.clone());
        Self {
            repo,
            options,
            loaded: cache.clone(),
            cache,
            fields,
            seen: HashSet::new(),
        }
    }

    /// Folder path by precedence, normalized
    pub fn target_folder(&self, record: &ResolvedRecord) -> String {
        let raw = self
            .options
            .folder_override
            .as_deref()
            .filter(|f| !f.trim().is_empty())
            .or_else(|| record.folder().filter(|f| !f.trim().is_empty()))
            .unwrap_or(&self.options.default_folder);
        normalize_folder_path(raw)
    }

    fn find_folder(&mut self, path: &str) -> Result<Option<FolderId>, ApiError> {
        if let Some(id) = self.cache.folder_id(path) {
            return Ok(Some(id.to_string()));
        }
        let found = self.repo.find_folder(path)?;
        if let Some(ref id) = found {
            self.cache.folders.insert(path.to_string(), id.clone());
        }
        Ok(found)
    }

    fn create_folder(&mut self, path: &str) -> Result<FolderId, ApiError> {
        let id = self.repo.create_folder(path)?;
        info!(folder = path, %id, "created folder");
        self.cache.folders.insert(path.to_string(), id.clone());
        Ok(id)
    }

    fn try_upload(&mut self, record: &ResolvedRecord, path: &str) -> Result<UploadOutcome, ApiError> {
        if folder_segments(path).is_empty() {
            return Err(ApiError::InvalidFolderPath(path.to_string()));
        }

        let summary = record.summary();
        if !self.seen.insert((path.to_string(), summary.to_string())) {
            return Ok(UploadOutcome::Failed {
                reason: format!(
                    "ambiguous: '{}' appears more than once for folder {} in this upload",
                    summary, path
                ),
            });
        }

        let custom_fields = self.fields.resolve_record(self.repo, &mut self.cache, record)?;
        let payload = TestCasePayload::from_record(record, custom_fields);

        let folder = match self.find_folder(path)? {
            Some(id) => id,
            None if self.options.dry_run => {
                debug!(folder = path, "folder missing; would be created");
                return Ok(UploadOutcome::WouldCreate);
            }
            None => self.create_folder(path)?,
        };

        let mut existing = self.repo.find_by_name(&folder, summary)?;
        let outcome = match (existing.len(), self.options.dry_run) {
            (0, true) => UploadOutcome::WouldCreate,
            (0, false) => {
                let created = self.repo.create(&folder, &payload)?;
                UploadOutcome::Created { key: created.key }
            }
            (1, dry_run) => {
                let target = existing.remove(0);
                if dry_run {
                    UploadOutcome::WouldUpdate { key: target.key }
                } else {
                    self.repo.update(&target, &payload)?;
                    UploadOutcome::Updated { key: target.key }
                }
            }
            (n, _) => {
                let keys: Vec<_> = existing.iter().map(|tc| tc.key.as_str()).collect();
                UploadOutcome::Failed {
                    reason: format!(
                        "ambiguous: {} test cases named '{}' in {} ({})",
                        n,
                        summary,
                        path,
                        keys.join(", ")
                    ),
                }
            }
        };

        Ok(outcome)
    }

    /// Upload one record; errors become a `Failed` outcome
    pub fn upload_record(&mut self, record: &ResolvedRecord) -> RecordResult {
        let folder = self.target_folder(record);
        let outcome = self
            .try_upload(record, &folder)
            .unwrap_or_else(|e| UploadOutcome::Failed {
                reason: e.to_string(),
            });

        if outcome.is_failure() {
            warn!(summary = record.summary(), %outcome, "record not uploaded");
        } else {
            info!(summary = record.summary(), %outcome, "record uploaded");
        }

        RecordResult {
            summary: record.summary().to_string(),
            folder,
            outcome,
        }
    }

    /// Upload every record in order, filling Issue Key on success
    pub fn upload_all(&mut self, records: &mut [ResolvedRecord]) -> UploadReport {
        let mut results = Vec::with_capacity(records.len());
        for record in records.iter_mut() {
            let result = self.upload_record(record);
            if let Some(key) = result.outcome.issue_key() {
                record.set(Column::IssueKey, key);
            }
            results.push(result);
        }
        UploadReport::from_results(results, self.options.dry_run)
    }

    pub fn cache(&self) -> &LookupCache {
        &self.cache
    }

    /// Number of custom field schema lookups this run
    pub fn field_discoveries(&self) -> usize {
        self.fields.discovery_calls()
    }

    /// Persist the cache if this run learned anything; returns whether it wrote
    pub fn save_cache(&self, store: &dyn CacheStore) -> Result<bool, UploadError> {
        if self.cache == self.loaded {
            return Ok(false);
        }
        store.save(&self.cache)?;
        Ok(true)
    }
}

/// Load the cache, upload `records`, then save the cache.
///
/// A cache that cannot be read or written only costs extra lookups, so both
/// cases are logged and the upload goes ahead.
pub fn upload_records(
    repo: &dyn TestCaseRepository,
    store: &dyn CacheStore,
    options: UploadOptions,
    records: &mut [ResolvedRecord],
) -> UploadReport {
    let mut uploader = Uploader::new(repo, options, load_or_default(store));
    let report = uploader.upload_all(records);

    if let Err(e) = uploader.save_cache(store) {
        warn!(error = %e, "lookup cache not saved");
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCacheStore;
    use crate::mock::{FailureConfig, MockRepository, Operation};
    use crate::qmetry::{CustomFieldDef, FieldOption};

    fn record(summary: &str, folder: Option<&str>) -> ResolvedRecord {
        let mut record = ResolvedRecord::new();
        record.set(Column::Summary, summary);
        record.set(Column::StepSummary, "Given a\nThen b");
        record.set(Column::Apps, "ProductA");
        record.set_folder(folder.map(str::to_string));
        record
    }

    fn options(dry_run: bool) -> UploadOptions {
        UploadOptions {
            folder_override: None,
            default_folder: "/Uncategorized".to_string(),
            dry_run,
            custom_fields: BTreeMap::new(),
        }
    }

    fn repo() -> MockRepository {
        let repo = MockRepository::new();
        repo.add_custom_field(CustomFieldDef {
            id: "qcf_apps".to_string(),
            name: "Apps".to_string(),
            options: vec![FieldOption {
                id: "11".to_string(),
                value: "ProductA".to_string(),
            }],
        });
        repo
    }

    #[test]
    fn test_folder_precedence() {
        let repo = repo();
        let mut opts = options(true);
        let uploader = Uploader::new(&repo, opts.clone(), LookupCache::default());

        assert_eq!(uploader.target_folder(&record("S", None)), "/Uncategorized");
        assert_eq!(uploader.target_folder(&record("S", Some("Mobile/Login"))), "/Mobile/Login");

        opts.folder_override = Some("/Override".to_string());
        let uploader = Uploader::new(&repo, opts, LookupCache::default());
        assert_eq!(uploader.target_folder(&record("S", Some("/Mobile"))), "/Override");
    }

    #[test]
    fn test_create_then_update() {
        let repo = repo();
        let mut records = vec![record("Login works", Some("/Mobile"))];

        let mut uploader = Uploader::new(&repo, options(false), LookupCache::default());
        let first = uploader.upload_all(&mut records);
        assert_eq!(first.created, 1);
        assert!(records[0].get(Column::IssueKey).starts_with("MOCK-TC-"));

        let stored = &repo.test_cases()[0];
        let payload = stored.payload.as_ref().unwrap();
        assert_eq!(payload.custom_fields[0].id, "qcf_apps");
        assert_eq!(payload.custom_fields[0].value, "11");

        let mut records = vec![record("Login works", Some("/Mobile"))];
        let mut uploader = Uploader::new(&repo, options(false), uploader.cache().clone());
        let second = uploader.upload_all(&mut records);
        assert_eq!(second.updated, 1);
        assert_eq!(second.created, 0);
        assert_eq!(repo.test_cases().len(), 1);
        assert_eq!(uploader.field_discoveries(), 0);
    }

    #[test]
    fn test_dry_run_makes_no_mutations() {
        let repo = repo();
        repo.add_test_case("/Existing", "Known");
        let mut records = vec![
            record("Fresh", Some("/Missing/Folder")),
            record("Known", Some("/Existing")),
            record("Also fresh", Some("/Existing")),
        ];

        let mut uploader = Uploader::new(&repo, options(true), LookupCache::default());
        let report = uploader.upload_all(&mut records);

        let outcomes: Vec<_> = report.results.iter().map(|r| r.outcome.clone()).collect();
        assert_eq!(outcomes[0], UploadOutcome::WouldCreate);
        assert!(matches!(outcomes[1], UploadOutcome::WouldUpdate { .. }));
        assert_eq!(outcomes[2], UploadOutcome::WouldCreate);
        assert_eq!(repo.mutation_calls(), 0);
        assert!(records.iter().all(|r| r.get(Column::IssueKey).is_empty()));
    }

    #[test]
    fn test_remote_ambiguity_is_failed() {
        let repo = repo();
        repo.add_test_case("/Mobile", "Twice");
        repo.add_test_case("/Mobile", "Twice");

        let mut uploader = Uploader::new(&repo, options(false), LookupCache::default());
        let result = uploader.upload_record(&record("Twice", Some("/Mobile")));

        match result.outcome {
            UploadOutcome::Failed { reason } => assert!(reason.starts_with("ambiguous")),
            other => panic!("expected failure, got {:?}", other),
        }
        assert_eq!(repo.calls(Operation::Update), 0);
    }

    #[test]
    fn test_repeat_in_same_run_is_ambiguous() {
        let repo = repo();
        let mut records = vec![record("Same", Some("/Mobile")), record("Same", Some("/Mobile"))];

        let mut uploader = Uploader::new(&repo, options(false), LookupCache::default());
        let report = uploader.upload_all(&mut records);

        assert_eq!(report.created, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(repo.test_cases().len(), 1);
    }

    #[test]
    fn test_failure_isolated_to_record() {
        let repo = repo();
        repo.inject(
            Operation::Create,
            FailureConfig::error(ApiError::Status {
                status: 400,
                body: "summary too long".to_string(),
            })
            .for_summary("Broken"),
        );
        let mut records = vec![record("Broken", Some("/Mobile")), record("Fine", Some("/Mobile"))];

        let mut uploader = Uploader::new(&repo, options(false), LookupCache::default());
        let report = uploader.upload_all(&mut records);

        assert_eq!(
            report.results[0].outcome,
            UploadOutcome::Failed {
                reason: "HTTP 400: summary too long".to_string()
            }
        );
        assert_eq!(report.created, 1);
        assert_eq!(report.exit_code(), 1);
    }

    #[test]
    fn test_folder_ids_cached() {
        let repo = repo();
        let mut records = vec![record("A", Some("/Mobile")), record("B", Some("/Mobile"))];

        let mut uploader = Uploader::new(&repo, options(false), LookupCache::default());
        uploader.upload_all(&mut records);

        assert_eq!(repo.calls(Operation::FindFolder), 1);
        assert_eq!(repo.calls(Operation::CreateFolder), 1);
        assert_eq!(
            uploader.cache().folder_id("/Mobile").map(str::to_string),
            repo.folder_id("/Mobile")
        );
    }

    #[test]
    fn test_upload_records_saves_cache() {
        let repo = repo();
        let store = MemoryCacheStore::new();
        let mut records = vec![record("A", None)];

        let report = upload_records(&repo, &store, options(false), &mut records);

        assert_eq!(report.created, 1);
        let saved = store.snapshot();
        assert_eq!(saved.field_id("Apps"), Some("qcf_apps"));
        assert!(saved.folder_id("/Uncategorized").is_some());
    }

    #[test]
    fn test_steps_failure_reason() {
        let repo = repo();
        repo.add_test_case("/Mobile", "S");
        repo.fail(
            Operation::Update,
            ApiError::StepsNotReplaced("HTTP 500: oops".to_string()),
        );

        let mut uploader = Uploader::new(&repo, options(false), LookupCache::default());
        let result = uploader.upload_record(&record("S", Some("/Mobile")));

        assert_eq!(
            result.outcome,
            UploadOutcome::Failed {
                reason: "steps not replaced: HTTP 500: oops".to_string()
            }
        );
    }
}
