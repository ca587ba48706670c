//! Non-fatal validation findings
//!
//! Warnings are reported next to the output; the record is still produced
//! with defaults applied.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WarningKind {
    /// A field QMetry needs is empty after resolution
    MissingRequiredField(String),
    /// A default or override names no known column
    UnknownField(String),
    /// Scenario has no Given/When/Then lines
    NoSteps,
    /// Scenario name already used earlier in the same file
    DuplicateScenarioName { first_line: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationWarning {
    /// Scenario the warning applies to; `None` for file-level findings
    pub scenario: Option<String>,
    pub kind: WarningKind,
}

impl ValidationWarning {
    pub fn file(kind: WarningKind) -> Self {
        Self {
            scenario: None,
            kind,
        }
    }

    pub fn scenario(name: &str, kind: WarningKind) -> Self {
        Self {
            scenario: Some(name.to_string()),
            kind,
        }
    }
}

impl fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref name) = self.scenario {
            write!(f, "Scenario '{}': ", name)?;
        }
        match &self.kind {
            WarningKind::MissingRequiredField(field) => {
                write!(f, "missing required field '{}'", field)
            }
            WarningKind::UnknownField(field) => {
                write!(f, "field '{}' does not match any QMetry column and is ignored", field)
            }
            WarningKind::NoSteps => write!(f, "no steps"),
            WarningKind::DuplicateScenarioName { first_line } => {
                write!(f, "name already used by the scenario at line {}", first_line)
            }
        }
    }
}
