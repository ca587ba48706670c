//! Parsed feature file model
//!
//! A `FeatureDocument` is built once per file read and is immutable after
//! parsing. Tag names and values are kept exactly as written; rendering
//! (underscore to space) happens in the record builder.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Normalized identity of a field name.
///
/// `Regression_Type`, `Regression Type` and ` Regression_Type ` all name the
/// same field. Only used for lookup; the raw spelling is kept alongside.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FieldKey(String);

impl FieldKey {
    /// Build the key for a raw field name
    pub fn new(name: &str) -> Self {
        Self(name.trim().replace('_', " "))
    }

    /// The normalized name (underscores replaced by spaces)
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A raw `name -> value` pair as written in the feature file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldEntry {
    /// Field name as written (e.g. `Regression_Type`)
    pub name: String,
    /// Value as written (e.g. `New_Features`)
    pub value: String,
}

/// File-scoped field values from the `@Feature_Defaults:` block
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeatureDefaults {
    entries: BTreeMap<FieldKey, FieldEntry>,
}

impl FeatureDefaults {
    /// Create an empty defaults table
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a default; a later entry for the same field replaces the earlier one
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let key = FieldKey::new(&name);
        self.entries.insert(
            key,
            FieldEntry {
                name,
                value: value.into(),
            },
        );
    }

    /// Look up a default by field name (underscore/space insensitive)
    pub fn get(&self, name: &str) -> Option<&FieldEntry> {
        self.entries.get(&FieldKey::new(name))
    }

    /// Iterate entries in key order
    pub fn iter(&self) -> impl Iterator<Item = (&FieldKey, &FieldEntry)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A tag attached to a scenario
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tag {
    /// Bare `@name` tag
    Label(String),
    /// `@Field:Value` override
    Override { field: String, value: String },
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tag::Label(name) => write!(f, "@{}", name),
            Tag::Override { field, value } => write!(f, "@{}:{}", field, value),
        }
    }
}

/// Gherkin step keyword
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKeyword {
    Given,
    When,
    Then,
    And,
    But,
    Star,
}

impl StepKeyword {
    /// Keyword text as it appears at the start of a line
    pub fn as_str(&self) -> &'static str {
        match self {
            StepKeyword::Given => "Given",
            StepKeyword::When => "When",
            StepKeyword::Then => "Then",
            StepKeyword::And => "And",
            StepKeyword::But => "But",
            StepKeyword::Star => "*",
        }
    }

    /// Whether this keyword continues the previous primary keyword
    pub fn is_conjunction(&self) -> bool {
        matches!(self, StepKeyword::And | StepKeyword::But | StepKeyword::Star)
    }

    pub(crate) fn from_line(line: &str) -> Option<(Self, &str)> {
        const KEYWORDS: &[(&str, StepKeyword)] = &[
            ("Given ", StepKeyword::Given),
            ("When ", StepKeyword::When),
            ("Then ", StepKeyword::Then),
            ("And ", StepKeyword::And),
            ("But ", StepKeyword::But),
            ("* ", StepKeyword::Star),
        ];

        KEYWORDS.iter().find_map(|(prefix, keyword)| {
            line.strip_prefix(prefix)
                .map(|rest| (*keyword, rest.trim()))
        })
    }
}

/// One step line, with any `|` table rows that follow it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub keyword: StepKeyword,
    pub text: String,
    pub table_rows: Vec<String>,
}

impl Step {
    pub fn new(keyword: StepKeyword, text: impl Into<String>) -> Self {
        Self {
            keyword,
            text: text.into(),
            table_rows: Vec::new(),
        }
    }

    /// The step as written: `Given the app is installed`, table rows on following lines
    pub fn render(&self) -> String {
        let mut out = format!("{} {}", self.keyword.as_str(), self.text);
        for row in &self.table_rows {
            out.push('\n');
            out.push_str(row);
        }
        out
    }
}

/// A single `Scenario:` block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scenario {
    /// Scenario name (becomes the test case Summary)
    pub name: String,
    /// 1-based line of the `Scenario:` header
    pub line: usize,
    /// Tags preceding the header, in source order
    pub tags: Vec<Tag>,
    pub steps: Vec<Step>,
    /// `@Test_Data:` block content, newline-joined, verbatim
    pub test_data: Option<String>,
    /// `@Expected_Result:` block content, newline-joined, verbatim
    pub expected_result: Option<String>,
}

impl Scenario {
    pub fn new(name: impl Into<String>, line: usize) -> Self {
        Self {
            name: name.into(),
            line,
            tags: Vec::new(),
            steps: Vec::new(),
            test_data: None,
            expected_result: None,
        }
    }

    /// Bare label tags in source order
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.tags.iter().filter_map(|tag| match tag {
            Tag::Label(name) => Some(name.as_str()),
            Tag::Override { .. } => None,
        })
    }

    /// `(field, value)` override tags in source order
    pub fn overrides(&self) -> impl Iterator<Item = (&str, &str)> {
        self.tags.iter().filter_map(|tag| match tag {
            Tag::Override { field, value } => Some((field.as_str(), value.as_str())),
            Tag::Label(_) => None,
        })
    }
}

/// A parsed `.feature` file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeatureDocument {
    /// Source path when parsed from disk
    pub source: Option<PathBuf>,
    /// Text after `Feature:`
    pub name: String,
    /// Narrative lines after the Feature header ("As a ...", "I want ...")
    pub narrative: Vec<String>,
    /// Label tags attached to the Feature itself
    pub labels: Vec<String>,
    pub background: Vec<Step>,
    pub defaults: FeatureDefaults,
    pub scenarios: Vec<Scenario>,
}

impl FeatureDocument {
    /// Display name for messages: the source path, else the feature name
    pub fn display_name(&self) -> String {
        match &self.source {
            Some(path) => path.display().to_string(),
            None => self.name.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_key_normalizes_underscores() {
        assert_eq!(FieldKey::new("Regression_Type"), FieldKey::new("Regression Type"));
        assert_eq!(FieldKey::new(" TC_requires_use_of_proxy ").as_str(), "TC requires use of proxy");
    }

    #[test]
    fn test_defaults_last_entry_wins() {
        let mut defaults = FeatureDefaults::new();
        defaults.insert("Platform", "iOS");
        defaults.insert("Platform", "iOS,Android");

        assert_eq!(defaults.len(), 1);
        assert_eq!(defaults.get("Platform").unwrap().value, "iOS,Android");
    }

    #[test]
    fn test_defaults_keep_raw_spelling() {
        let mut defaults = FeatureDefaults::new();
        defaults.insert("Regression_Type", "New_Features");

        let entry = defaults.get("Regression Type").unwrap();
        assert_eq!(entry.name, "Regression_Type");
        assert_eq!(entry.value, "New_Features");
    }

    #[test]
    fn test_step_keyword_from_line() {
        let (keyword, rest) = StepKeyword::from_line("And the user is logged in").unwrap();
        assert_eq!(keyword, StepKeyword::And);
        assert_eq!(rest, "the user is logged in");

        assert!(StepKeyword::from_line("Andrew logs in").is_none());
    }

    #[test]
    fn test_step_render_with_table() {
        let mut step = Step::new(StepKeyword::Given, "the users");
        step.table_rows.push("| name | role |".to_string());

        assert_eq!(step.render(), "Given the users\n| name | role |");
    }

    #[test]
    fn test_scenario_tag_partitions() {
        let mut scenario = Scenario::new("Login", 3);
        scenario.tags = vec![
            Tag::Label("smoke".to_string()),
            Tag::Override {
                field: "Platform".to_string(),
                value: "Android".to_string(),
            },
            Tag::Label("login".to_string()),
        ];

        assert_eq!(scenario.labels().collect::<Vec<_>>(), vec!["smoke", "login"]);
        assert_eq!(scenario.overrides().collect::<Vec<_>>(), vec![("Platform", "Android")]);
    }
}
