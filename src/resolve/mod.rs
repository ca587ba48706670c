//! Default/override resolution
//!
//! Merge semantics per scenario:
//! - Start from the file's `@Feature_Defaults:`
//! - An override tag replaces the default value entirely (multi-value lists are
//!   not unioned)
//! - Tags are scanned left to right, top to bottom; the last occurrence of a
//!   field wins
//! - Fields set by neither resolve to the empty string
//!
//! Labels are collected separately and never take part in the merge.

use std::collections::BTreeMap;

use crate::gherkin::{FeatureDefaults, FieldKey, Scenario};

/// Where a resolved value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldSource {
    Default,
    Override,
}

impl FieldSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldSource::Default => "default",
            FieldSource::Override => "override",
        }
    }
}

/// One resolved field, still in raw (unrendered) form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedField {
    /// Field name as written by the winning tag
    pub name: String,
    /// Value as written by the winning tag
    pub value: String,
    pub source: FieldSource,
}

/// Resolved field mapping for one scenario
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedFields {
    fields: BTreeMap<FieldKey, ResolvedField>,
    labels: Vec<String>,
}

impl ResolvedFields {
    /// Look up a field (underscore/space insensitive)
    pub fn get(&self, name: &str) -> Option<&ResolvedField> {
        self.fields.get(&FieldKey::new(name))
    }

    /// Raw value of a field, or `""` when neither defaulted nor overridden
    pub fn value(&self, name: &str) -> &str {
        self.get(name).map(|f| f.value.as_str()).unwrap_or("")
    }

    /// Label tags in source order
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Labels joined with single spaces
    pub fn labels_joined(&self) -> String {
        self.labels.join(" ")
    }

    pub fn iter(&self) -> impl Iterator<Item = (&FieldKey, &ResolvedField)> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Resolve one scenario's fields against the file defaults
pub fn resolve(defaults: &FeatureDefaults, scenario: &Scenario) -> ResolvedFields {
    let mut fields: BTreeMap<FieldKey, ResolvedField> = defaults
        .iter()
        .map(|(key, entry)| {
            (
                key.clone(),
                ResolvedField {
                    name: entry.name.clone(),
                    value: entry.value.clone(),
                    source: FieldSource::Default,
                },
            )
        })
        .collect();

    for (name, value) in scenario.overrides() {
        fields.insert(
            FieldKey::new(name),
            ResolvedField {
                name: name.to_string(),
                value: value.to_string(),
                source: FieldSource::Override,
            },
        );
    }

    ResolvedFields {
        fields,
        labels: scenario.labels().map(str::to_string).collect(),
    }
}
