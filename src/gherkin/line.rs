//! Line classification
//!
//! Every input line is classified once, by prefix, before the parser state
//! machine decides what it means in the current state.

use super::document::StepKeyword;
use super::tags::{EXPECTED_RESULT_MARKER, FEATURE_DEFAULTS_MARKER, TEST_DATA_MARKER};

/// What a single (trimmed) line looks like
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind<'a> {
    Blank,
    Comment,
    /// `Feature: <name>`
    FeatureHeader(&'a str),
    /// `Background:`
    BackgroundHeader,
    /// `Scenario: <name>`
    ScenarioHeader(&'a str),
    /// `@Feature_Defaults:` followed by optional tags on the same line
    DefaultsMarker(&'a str),
    /// `@Test_Data:` followed by optional inline text
    TestDataMarker(&'a str),
    /// `@Expected_Result:` followed by optional inline text
    ExpectedResultMarker(&'a str),
    /// Any other line starting with `@`
    TagLine(&'a str),
    Step(StepKeyword, &'a str),
    /// `| a | b |`
    TableRow(&'a str),
    Text(&'a str),
}

impl LineKind<'_> {
    /// Structural headers end any open block
    pub fn is_header(&self) -> bool {
        matches!(
            self,
            LineKind::FeatureHeader(_) | LineKind::BackgroundHeader | LineKind::ScenarioHeader(_)
        )
    }

    /// Lines starting with `@` (markers and tag lines)
    pub fn is_at_line(&self) -> bool {
        matches!(
            self,
            LineKind::DefaultsMarker(_)
                | LineKind::TestDataMarker(_)
                | LineKind::ExpectedResultMarker(_)
                | LineKind::TagLine(_)
        )
    }
}

/// Classify one raw line
pub fn classify(raw: &str) -> LineKind<'_> {
    let line = raw.trim();

    if line.is_empty() {
        return LineKind::Blank;
    }

    if let Some(comment) = line.strip_prefix('#') {
        // `# @Feature_Defaults:` keeps the file valid for stock Gherkin tooling
        let inner = comment.trim_start_matches('#').trim();
        return match inner.strip_prefix(FEATURE_DEFAULTS_MARKER) {
            Some(rest) => LineKind::DefaultsMarker(rest.trim()),
            None => LineKind::Comment,
        };
    }

    if let Some(name) = line.strip_prefix("Feature:") {
        return LineKind::FeatureHeader(name.trim());
    }
    if line.starts_with("Background:") {
        return LineKind::BackgroundHeader;
    }
    if let Some(name) = line.strip_prefix("Scenario:") {
        return LineKind::ScenarioHeader(name.trim());
    }

    if let Some(rest) = line.strip_prefix(FEATURE_DEFAULTS_MARKER) {
        return LineKind::DefaultsMarker(rest.trim());
    }
    if let Some(rest) = line.strip_prefix(TEST_DATA_MARKER) {
        return LineKind::TestDataMarker(rest.trim());
    }
    if let Some(rest) = line.strip_prefix(EXPECTED_RESULT_MARKER) {
        return LineKind::ExpectedResultMarker(rest.trim());
    }
    if line.starts_with('@') {
        return LineKind::TagLine(line);
    }

    if let Some((keyword, text)) = StepKeyword::from_line(line) {
        return LineKind::Step(keyword, text);
    }
    if line.starts_with('|') {
        return LineKind::TableRow(line);
    }

    LineKind::Text(line)
}
