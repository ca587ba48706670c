//! Record builder
//!
//! Turns a scenario and its resolved fields into a `ResolvedRecord`. This is
//! the only place values are rendered:
//! - underscores in tag-derived names and values become spaces
//! - comma-separated values are trimmed item by item
//! - free-text Test Data / Expected Result blocks pass through verbatim

use std::collections::HashMap;

use tracing::debug;

use crate::gherkin::{FeatureDocument, FieldKey, Scenario, Step, StepKeyword};
use crate::resolve::{resolve, ResolvedFields};

use super::columns::Column;
use super::warnings::{ValidationWarning, WarningKind};
use super::ResolvedRecord;

/// Status when no default or override sets one
pub const DEFAULT_STATUS: &str = "TO DO";

/// Priority when no default or override sets one
pub const DEFAULT_PRIORITY: &str = "Medium";

/// Field naming the target QMetry folder; not a CSV column
pub const FOLDER_FIELD: &str = "Folder";

/// Fields every test case is expected to carry
pub const REQUIRED_FIELDS: &[&str] = &["Apps", "Platform", "Component/Feature"];

/// Records and warnings for one feature file
#[derive(Debug, Clone, Default)]
pub struct BuildOutput {
    pub records: Vec<ResolvedRecord>,
    pub warnings: Vec<ValidationWarning>,
}

/// Render tag text: `New_Features` -> `New Features`
pub fn render_tag_text(raw: &str) -> String {
    raw.replace('_', " ")
}

/// Render a tag value, trimming each comma-separated item
pub fn render_value(raw: &str) -> String {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(render_tag_text)
        .collect::<Vec<_>>()
        .join(",")
}

/// Background Given-lines, newline-joined.
///
/// `And`/`But` continue whichever keyword they follow, so an `And` after a
/// `Given` is kept and an `And` after a `When` is not.
pub fn precondition(background: &[Step]) -> String {
    let mut primary: Option<StepKeyword> = None;
    let mut lines = Vec::new();

    for step in background {
        if !step.keyword.is_conjunction() {
            primary = Some(step.keyword);
        }
        if primary == Some(StepKeyword::Given) {
            lines.push(step.render());
        }
    }

    lines.join("\n")
}

fn step_summary(steps: &[Step]) -> String {
    steps.iter().map(Step::render).collect::<Vec<_>>().join("\n")
}

fn description(doc: &FeatureDocument) -> String {
    doc.narrative
        .iter()
        .map(|line| line.trim())
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn rendered_or(resolved: &ResolvedFields, name: &str, fallback: &str) -> String {
    let value = render_value(resolved.value(name));
    if value.is_empty() {
        fallback.to_string()
    } else {
        value
    }
}

/// Build the record for one scenario
pub fn build_record(
    doc: &FeatureDocument,
    scenario: &Scenario,
    resolved: &ResolvedFields,
) -> ResolvedRecord {
    let mut record = ResolvedRecord::new();

    record.set(Column::Summary, scenario.name.as_str());
    record.set(Column::Description, description(doc));
    record.set(Column::Precondition, precondition(&doc.background));
    record.set(Column::Status, rendered_or(resolved, "Status", DEFAULT_STATUS));
    record.set(Column::Priority, rendered_or(resolved, "Priority", DEFAULT_PRIORITY));
    record.set(Column::Labels, resolved.labels_joined());
    record.set(Column::StepSummary, step_summary(&scenario.steps));
    record.set(Column::TestData, scenario.test_data.clone().unwrap_or_default());
    record.set(
        Column::ExpectedResult,
        scenario.expected_result.clone().unwrap_or_default(),
    );

    for column in Column::CUSTOM_FIELDS {
        record.set(column, render_value(resolved.value(column.header())));
    }

    let folder = render_tag_text(resolved.value(FOLDER_FIELD).trim());
    record.set_folder((!folder.is_empty()).then_some(folder));

    record
}

fn is_known_field(key: &FieldKey) -> bool {
    [FOLDER_FIELD, "Status", "Priority"]
        .iter()
        .copied()
        .chain(Column::CUSTOM_FIELDS.iter().map(|c| c.header()))
        .any(|name| FieldKey::new(name) == *key)
}

/// Build every record of a feature file, in scenario order
pub fn build_records(doc: &FeatureDocument) -> BuildOutput {
    let mut output = BuildOutput::default();

    for (key, entry) in doc.defaults.iter() {
        if !is_known_field(key) {
            output
                .warnings
                .push(ValidationWarning::file(WarningKind::UnknownField(entry.name.clone())));
        }
    }

    let mut first_seen: HashMap<&str, usize> = HashMap::new();

    for scenario in &doc.scenarios {
        let resolved = resolve(&doc.defaults, scenario);

        for (field, _) in scenario.overrides() {
            if !is_known_field(&FieldKey::new(field)) {
                output.warnings.push(ValidationWarning::scenario(
                    &scenario.name,
                    WarningKind::UnknownField(field.to_string()),
                ));
            }
        }

        for field in REQUIRED_FIELDS {
            if resolved.value(field).trim().is_empty() {
                output.warnings.push(ValidationWarning::scenario(
                    &scenario.name,
                    WarningKind::MissingRequiredField(field.to_string()),
                ));
            }
        }

        if scenario.steps.is_empty() {
            output
                .warnings
                .push(ValidationWarning::scenario(&scenario.name, WarningKind::NoSteps));
        }

        if let Some(&first_line) = first_seen.get(scenario.name.as_str()) {
            output.warnings.push(ValidationWarning::scenario(
                &scenario.name,
                WarningKind::DuplicateScenarioName { first_line },
            ));
        } else {
            first_seen.insert(scenario.name.as_str(), scenario.line);
        }

        output.records.push(build_record(doc, scenario, &resolved));
    }

    debug!(
        feature = %doc.display_name(),
        records = output.records.len(),
        warnings = output.warnings.len(),
        "built records"
    );

    output
}
