//! Custom field name -> ID resolution
//!
//! Lookup order for a field ID: `CUSTOM_FIELDS` in config, then the lookup
//! cache, then a single discovery call per run that refills the cache with
//! field IDs and option IDs.

use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use crate::cache::LookupCache;
use crate::record::ResolvedRecord;

use super::types::CustomFieldValue;
use super::{ApiError, TestCaseRepository};

#[derive(Debug, Clone, Default)]
enum Discovery {
    #[default]
    Pending,
    Done,
    Failed(ApiError),
}

#[derive(Debug, Clone, Default)]
pub struct FieldResolver {
    configured: BTreeMap<String, String>,
    discovery: Discovery,
    discovery_calls: usize,
}

impl FieldResolver {
    /// `configured` is the `CUSTOM_FIELDS` map from config
    pub fn new(configured: BTreeMap<String, String>) -> Self {
        Self {
            configured,
            ..Self::default()
        }
    }

    /// Number of schema lookups made so far
    pub fn discovery_calls(&self) -> usize {
        self.discovery_calls
    }

    /// Fetch the field schema once; a failure is remembered for the run
    fn discover(
        &mut self,
        repo: &dyn TestCaseRepository,
        cache: &mut LookupCache,
    ) -> Result<(), ApiError> {
        match self.discovery {
            Discovery::Done => return Ok(()),
            Discovery::Failed(ref e) => return Err(e.clone()),
            Discovery::Pending => {}
        }

        self.discovery_calls += 1;
        let fields = match repo.custom_fields() {
            Ok(fields) => fields,
            Err(e) => {
                self.discovery = Discovery::Failed(e.clone());
                return Err(e);
            }
        };

        for field in &fields {
            cache.field_ids.insert(field.name.clone(), field.id.clone());
            let options: BTreeMap<String, String> = field
                .options
                .iter()
                .filter(|o| !o.value.is_empty() && !o.id.is_empty())
                .map(|o| (o.value.clone(), o.id.clone()))
                .collect();
            if !options.is_empty() {
                cache.field_options.insert(field.name.clone(), options);
            }
        }

        info!(fields = fields.len(), "discovered custom fields");
        self.discovery = Discovery::Done;
        Ok(())
    }

    /// ID for a field name, or None if QMetry has no such field
    pub fn field_id(
        &mut self,
        repo: &dyn TestCaseRepository,
        cache: &mut LookupCache,
        name: &str,
    ) -> Result<Option<String>, ApiError> {
        if let Some(id) = self.configured.get(name) {
            return Ok(Some(id.clone()));
        }
        if let Some(id) = cache.field_id(name) {
            return Ok(Some(id.to_string()));
        }

        self.discover(repo, cache)?;
        Ok(cache.field_id(name).map(str::to_string))
    }

    /// Translate comma-separated option values to option IDs.
    ///
    /// Text fields (no options known) pass through unchanged. An option with
    /// no known ID keeps its literal value.
    pub fn option_value(
        &mut self,
        repo: &dyn TestCaseRepository,
        cache: &mut LookupCache,
        name: &str,
        raw: &str,
    ) -> Result<String, ApiError> {
        if !cache.field_options.contains_key(name) && !cache.field_ids.contains_key(name) {
            self.discover(repo, cache)?;
        }

        let Some(options) = cache.field_options.get(name) else {
            return Ok(raw.to_string());
        };

        let values: Vec<String> = raw
            .split(',')
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|v| match options.get(v) {
                Some(id) => id.clone(),
                None => {
                    warn!(field = name, option = v, "option not found in QMetry; sending as text");
                    v.to_string()
                }
            })
            .collect();

        Ok(values.join(","))
    }

    /// Custom field values of a record, by ID. Fields QMetry does not know
    /// are left out with a warning.
    pub fn resolve_record(
        &mut self,
        repo: &dyn TestCaseRepository,
        cache: &mut LookupCache,
        record: &ResolvedRecord,
    ) -> Result<Vec<CustomFieldValue>, ApiError> {
        let mut values = Vec::new();

        for (column, value) in record.custom_fields() {
            let name = column.header();
            let Some(id) = self.field_id(repo, cache, name)? else {
                warn!(field = name, "no QMetry custom field with this name; skipped");
                continue;
            };
            let value = self.option_value(repo, cache, name, value)?;
            debug!(field = name, %id, %value, "resolved custom field");
            values.push(CustomFieldValue { id, value });
        }

        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockRepository, Operation};
    use crate::qmetry::{CustomFieldDef, FieldOption};
    use crate::record::Column;

    fn repo() -> MockRepository {
        let repo = MockRepository::new();
        repo.add_custom_field(CustomFieldDef {
            id: "qcf_apps".to_string(),
            name: "Apps".to_string(),
            options: vec![
                FieldOption {
                    id: "11".to_string(),
                    value: "ProductA".to_string(),
                },
                FieldOption {
                    id: "12".to_string(),
                    value: "ProductB".to_string(),
                },
            ],
        });
        repo.add_custom_field(CustomFieldDef {
            id: "qcf_notes".to_string(),
            name: "NBA Feature".to_string(),
            options: Vec::new(),
        });
        repo
    }

    #[test]
    fn test_configured_id_wins_without_lookup() {
        let repo = repo();
        let mut cache = LookupCache::default();
        let mut configured = BTreeMap::new();
        configured.insert("Apps".to_string(), "qcf_manual".to_string());
        let mut resolver = FieldResolver::new(configured);

        let id = resolver.field_id(&repo, &mut cache, "Apps").unwrap();
        assert_eq!(id.as_deref(), Some("qcf_manual"));
        assert_eq!(resolver.discovery_calls(), 0);
    }

    #[test]
    fn test_discovery_once_then_cached() {
        let repo = repo();
        let mut cache = LookupCache::default();
        let mut resolver = FieldResolver::default();

        assert_eq!(
            resolver.field_id(&repo, &mut cache, "Apps").unwrap().as_deref(),
            Some("qcf_apps")
        );
        assert_eq!(resolver.field_id(&repo, &mut cache, "Unknown").unwrap(), None);
        assert_eq!(resolver.discovery_calls(), 1);
        assert_eq!(repo.calls(Operation::CustomFields), 1);
        assert_eq!(cache.option_id("Apps", "ProductB"), Some("12"));

        // A new run with the saved cache needs no lookup
        let mut next = FieldResolver::default();
        next.field_id(&repo, &mut cache, "Apps").unwrap();
        assert_eq!(next.discovery_calls(), 0);
    }

    #[test]
    fn test_option_values_to_ids() {
        let repo = repo();
        let mut cache = LookupCache::default();
        let mut resolver = FieldResolver::default();

        let value = resolver
            .option_value(&repo, &mut cache, "Apps", "ProductA,ProductC, ProductB")
            .unwrap();
        assert_eq!(value, "11,ProductC,12");

        let text = resolver
            .option_value(&repo, &mut cache, "NBA Feature", "free text")
            .unwrap();
        assert_eq!(text, "free text");
    }

    #[test]
    fn test_resolve_record_skips_unknown_fields() {
        let repo = repo();
        let mut cache = LookupCache::default();
        let mut resolver = FieldResolver::default();
        let mut record = ResolvedRecord::new();
        record.set(Column::Apps, "ProductB");
        record.set(Column::Platform, "iOS");

        let values = resolver.resolve_record(&repo, &mut cache, &record).unwrap();
        assert_eq!(
            values,
            vec![CustomFieldValue {
                id: "qcf_apps".to_string(),
                value: "12".to_string(),
            }]
        );
    }

    #[test]
    fn test_discovery_failure_is_sticky() {
        let repo = repo();
        repo.fail(Operation::CustomFields, ApiError::Transport("offline".to_string()));
        let mut cache = LookupCache::default();
        let mut resolver = FieldResolver::default();

        assert!(resolver.field_id(&repo, &mut cache, "Apps").is_err());
        assert!(resolver.field_id(&repo, &mut cache, "Apps").is_err());
        assert_eq!(repo.calls(Operation::CustomFields), 1);
    }
}
