//! Feature file parser
//!
//! An explicit state machine over classified lines. Each state defines what
//! every kind of line means; a line that ends the current block is handed
//! back to the machine (`Flow::Reprocess`) after the state changes, so no line
//! is ever interpreted by fallthrough.
//!
//! States:
//! - `Outside`: between structural elements, collecting pending tags
//! - `Defaults`: inside `@Feature_Defaults:`
//! - `Narrative`: free text after `Feature:`
//! - `Background`: steps of the Background
//! - `Scenario`: steps of the current Scenario
//! - `TestData` / `ExpectedResult`: free-text blocks of the current Scenario

use std::io;
use std::mem;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::document::{FeatureDocument, Scenario, Step, Tag};
use super::line::{classify, LineKind};
use super::tags::{parse_tag_line, EXPECTED_RESULT_MARKER, FEATURE_DEFAULTS_MARKER, TEST_DATA_MARKER};

/// Malformed feature file. Aborts the whole file.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("No 'Scenario:' found in feature file")]
    MissingScenario,

    #[error("Line {line}: {block} block is not closed before end of file")]
    UnterminatedBlock { line: usize, block: &'static str },

    #[error("Line {line}: malformed tag '{token}': {reason}")]
    MalformedTag {
        line: usize,
        token: String,
        reason: String,
    },

    #[error("Line {line}: tags are not followed by a 'Feature:' or 'Scenario:' header")]
    DanglingTags { line: usize },

    #[error("Line {line}: unexpected line {context}: '{content}'")]
    UnexpectedLine {
        line: usize,
        context: &'static str,
        content: String,
    },

    #[error("Line {line}: scenario '{scenario}' already has a {block} block")]
    DuplicateBlock {
        line: usize,
        scenario: String,
        block: &'static str,
    },

    #[error("Line {line}: 'Scenario:' header has no name")]
    EmptyScenarioName { line: usize },

    #[error("Line {line}: @Feature_Defaults: must appear before the first 'Scenario:'")]
    DefaultsAfterScenario { line: usize },

    #[error("Line {line}: second 'Feature:' header (first at line {first})")]
    DuplicateFeature { line: usize, first: usize },
}

/// Errors reading a feature file from disk
#[derive(Debug, thiserror::Error)]
pub enum FeatureFileError {
    #[error("Feature file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: ParseError,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Outside,
    Defaults,
    Narrative,
    Background,
    Scenario,
    TestData,
    ExpectedResult,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    /// Line consumed
    Next,
    /// State changed; hand the same line to the new state
    Reprocess,
}

struct Parser {
    state: State,
    doc: FeatureDocument,
    current: Option<Scenario>,
    pending: Vec<Tag>,
    pending_line: usize,
    defaults_line: usize,
    defaults_has_entries: bool,
    feature_line: Option<usize>,
    background_seen: bool,
}

impl Parser {
    fn new() -> Self {
        Self {
            state: State::Outside,
            doc: FeatureDocument::default(),
            current: None,
            pending: Vec::new(),
            pending_line: 0,
            defaults_line: 0,
            defaults_has_entries: false,
            feature_line: None,
            background_seen: false,
        }
    }

    fn feed(&mut self, line: usize, raw: &str) -> Result<(), ParseError> {
        let kind = classify(raw);
        loop {
            let flow = match self.state {
                State::Outside => self.on_outside(line, kind)?,
                State::Defaults => self.on_defaults(line, kind)?,
                State::Narrative => self.on_narrative(kind),
                State::Background => self.on_background(line, kind)?,
                State::Scenario => self.on_scenario(line, kind)?,
                State::TestData | State::ExpectedResult => self.on_block(kind, raw.trim()),
            };
            if flow == Flow::Next {
                return Ok(());
            }
        }
    }

    fn on_outside(&mut self, line: usize, kind: LineKind<'_>) -> Result<Flow, ParseError> {
        match kind {
            LineKind::Blank | LineKind::Comment => {}
            LineKind::DefaultsMarker(rest) => {
                if !self.doc.scenarios.is_empty() {
                    return Err(ParseError::DefaultsAfterScenario { line });
                }
                self.defaults_line = line;
                self.defaults_has_entries = false;
                self.absorb_defaults(rest, line)?;
                self.state = State::Defaults;
            }
            LineKind::TagLine(text) => {
                if self.pending.is_empty() {
                    self.pending_line = line;
                }
                self.pending.extend(parse_tag_line(text, line)?);
            }
            LineKind::FeatureHeader(name) => {
                if let Some(first) = self.feature_line {
                    return Err(ParseError::DuplicateFeature { line, first });
                }
                self.feature_line = Some(line);
                self.doc.name = name.to_string();
                // Tags on the Feature itself are file-scoped
                for tag in mem::take(&mut self.pending) {
                    self.apply_file_tag(tag);
                }
                self.state = State::Narrative;
            }
            LineKind::BackgroundHeader => {
                if self.background_seen {
                    return Err(unexpected(line, "after an earlier 'Background:'", "Background:"));
                }
                if !self.doc.scenarios.is_empty() {
                    return Err(unexpected(line, "after the first 'Scenario:'", "Background:"));
                }
                if !self.pending.is_empty() {
                    return Err(ParseError::DanglingTags {
                        line: self.pending_line,
                    });
                }
                self.background_seen = true;
                self.state = State::Background;
            }
            LineKind::ScenarioHeader(name) => {
                if name.is_empty() {
                    return Err(ParseError::EmptyScenarioName { line });
                }
                let mut scenario = Scenario::new(name, line);
                scenario.tags = mem::take(&mut self.pending);
                self.current = Some(scenario);
                self.state = State::Scenario;
            }
            LineKind::TestDataMarker(_) => {
                return Err(unexpected(line, "outside a Scenario", TEST_DATA_MARKER));
            }
            LineKind::ExpectedResultMarker(_) => {
                return Err(unexpected(line, "outside a Scenario", EXPECTED_RESULT_MARKER));
            }
            LineKind::Step(keyword, text) => {
                return Err(unexpected(
                    line,
                    "outside a Scenario or Background",
                    &format!("{} {}", keyword.as_str(), text),
                ));
            }
            LineKind::TableRow(text) | LineKind::Text(text) => {
                return Err(unexpected(line, "outside a Scenario or Background", text));
            }
        }
        Ok(Flow::Next)
    }

    fn on_defaults(&mut self, line: usize, kind: LineKind<'_>) -> Result<Flow, ParseError> {
        match kind {
            LineKind::Comment => {}
            LineKind::Blank => {
                // A blank line closes a block that already holds entries
                if self.defaults_has_entries {
                    self.state = State::Outside;
                }
            }
            LineKind::DefaultsMarker(text) | LineKind::TagLine(text) => {
                self.absorb_defaults(text, line)?;
            }
            LineKind::Text(text) => match text.split_once(':') {
                Some((name, value)) if !name.trim().is_empty() => {
                    self.doc.defaults.insert(name.trim(), value.trim());
                    self.defaults_has_entries = true;
                }
                _ => return Err(unexpected(line, "in the defaults block", text)),
            },
            kind if kind.is_header() => {
                self.state = State::Outside;
                return Ok(Flow::Reprocess);
            }
            _ => {
                return Err(unexpected(line, "in the defaults block", &describe(kind)));
            }
        }
        Ok(Flow::Next)
    }

    fn on_narrative(&mut self, kind: LineKind<'_>) -> Flow {
        match kind {
            LineKind::Blank | LineKind::Comment => Flow::Next,
            LineKind::Text(text) => {
                self.doc.narrative.push(text.to_string());
                Flow::Next
            }
            _ => {
                self.state = State::Outside;
                Flow::Reprocess
            }
        }
    }

    fn on_background(&mut self, line: usize, kind: LineKind<'_>) -> Result<Flow, ParseError> {
        match kind {
            LineKind::Blank | LineKind::Comment => {}
            LineKind::Step(keyword, text) => {
                self.doc.background.push(Step::new(keyword, text));
            }
            LineKind::TableRow(row) => match self.doc.background.last_mut() {
                Some(step) => step.table_rows.push(row.to_string()),
                None => return Err(unexpected(line, "before any Background step", row)),
            },
            LineKind::Text(text) => return Err(unexpected(line, "in Background", text)),
            LineKind::TestDataMarker(_) | LineKind::ExpectedResultMarker(_) => {
                return Err(unexpected(line, "in Background", &describe(kind)));
            }
            _ => {
                self.state = State::Outside;
                return Ok(Flow::Reprocess);
            }
        }
        Ok(Flow::Next)
    }

    fn on_scenario(&mut self, line: usize, kind: LineKind<'_>) -> Result<Flow, ParseError> {
        let Some(scenario) = self.current.as_mut() else {
            self.state = State::Outside;
            return Ok(Flow::Reprocess);
        };

        match kind {
            LineKind::Blank | LineKind::Comment => {}
            LineKind::Step(keyword, text) => scenario.steps.push(Step::new(keyword, text)),
            LineKind::TableRow(row) => match scenario.steps.last_mut() {
                Some(step) => step.table_rows.push(row.to_string()),
                None => return Err(unexpected(line, "before any Scenario step", row)),
            },
            LineKind::TestDataMarker(inline) => {
                open_block(&mut scenario.test_data, inline, line, &scenario.name, TEST_DATA_MARKER)?;
                self.state = State::TestData;
            }
            LineKind::ExpectedResultMarker(inline) => {
                open_block(
                    &mut scenario.expected_result,
                    inline,
                    line,
                    &scenario.name,
                    EXPECTED_RESULT_MARKER,
                )?;
                self.state = State::ExpectedResult;
            }
            LineKind::Text(text) => return Err(unexpected(line, "in Scenario", text)),
            _ => {
                self.finish_scenario();
                self.state = State::Outside;
                return Ok(Flow::Reprocess);
            }
        }
        Ok(Flow::Next)
    }

    fn on_block(&mut self, kind: LineKind<'_>, trimmed: &str) -> Flow {
        if kind.is_header() || kind.is_at_line() {
            self.state = State::Scenario;
            return Flow::Reprocess;
        }
        if matches!(kind, LineKind::Blank | LineKind::Comment) {
            return Flow::Next;
        }

        if let Some(scenario) = self.current.as_mut() {
            let slot = if self.state == State::TestData {
                &mut scenario.test_data
            } else {
                &mut scenario.expected_result
            };
            append_block_line(slot, trimmed);
        }
        Flow::Next
    }

    fn absorb_defaults(&mut self, text: &str, line: usize) -> Result<(), ParseError> {
        for tag in parse_tag_line(text, line)? {
            if matches!(tag, Tag::Override { .. }) {
                self.defaults_has_entries = true;
            }
            self.apply_file_tag(tag);
        }
        Ok(())
    }

    fn apply_file_tag(&mut self, tag: Tag) {
        match tag {
            Tag::Label(name) => self.doc.labels.push(name),
            Tag::Override { field, value } => self.doc.defaults.insert(field, value),
        }
    }

    fn finish_scenario(&mut self) {
        if let Some(mut scenario) = self.current.take() {
            // An opened but empty block is the same as no block
            if scenario.test_data.as_deref() == Some("") {
                scenario.test_data = None;
            }
            if scenario.expected_result.as_deref() == Some("") {
                scenario.expected_result = None;
            }
            debug!(
                scenario = %scenario.name,
                steps = scenario.steps.len(),
                tags = scenario.tags.len(),
                "parsed scenario"
            );
            self.doc.scenarios.push(scenario);
        }
    }

    fn finish(mut self) -> Result<FeatureDocument, ParseError> {
        if self.state == State::Defaults {
            return Err(ParseError::UnterminatedBlock {
                line: self.defaults_line,
                block: FEATURE_DEFAULTS_MARKER,
            });
        }
        self.finish_scenario();

        if !self.pending.is_empty() {
            return Err(ParseError::DanglingTags {
                line: self.pending_line,
            });
        }
        if self.doc.scenarios.is_empty() {
            return Err(ParseError::MissingScenario);
        }
        Ok(self.doc)
    }
}

fn unexpected(line: usize, context: &'static str, content: &str) -> ParseError {
    ParseError::UnexpectedLine {
        line,
        context,
        content: content.to_string(),
    }
}

fn describe(kind: LineKind<'_>) -> String {
    match kind {
        LineKind::Step(keyword, text) => format!("{} {}", keyword.as_str(), text),
        LineKind::TestDataMarker(_) => TEST_DATA_MARKER.to_string(),
        LineKind::ExpectedResultMarker(_) => EXPECTED_RESULT_MARKER.to_string(),
        LineKind::TableRow(text) | LineKind::Text(text) | LineKind::TagLine(text) => text.to_string(),
        other => format!("{:?}", other),
    }
}

fn open_block(
    slot: &mut Option<String>,
    inline: &str,
    line: usize,
    scenario: &str,
    block: &'static str,
) -> Result<(), ParseError> {
    if slot.is_some() {
        return Err(ParseError::DuplicateBlock {
            line,
            scenario: scenario.to_string(),
            block,
        });
    }
    *slot = Some(String::new());
    if !inline.is_empty() {
        append_block_line(slot, inline);
    }
    Ok(())
}

/// Append one content line to a free-text block; a leading `- ` bullet is dropped
fn append_block_line(slot: &mut Option<String>, text: &str) {
    let text = text.strip_prefix("- ").unwrap_or(text);
    match slot {
        Some(existing) if !existing.is_empty() => {
            existing.push('\n');
            existing.push_str(text);
        }
        _ => *slot = Some(text.to_string()),
    }
}

/// Parse feature file text; a leading UTF-8 byte order mark is skipped
pub fn parse_feature(text: &str) -> Result<FeatureDocument, ParseError> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut parser = Parser::new();
    for (index, raw) in text.lines().enumerate() {
        parser.feed(index + 1, raw)?;
    }
    parser.finish()
}

/// Read and parse a `.feature` file
pub fn parse_feature_file(path: &Path) -> Result<FeatureDocument, FeatureFileError> {
    if !path.exists() {
        return Err(FeatureFileError::NotFound(path.to_path_buf()));
    }

    let text = std::fs::read_to_string(path).map_err(|source| FeatureFileError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let mut doc = parse_feature(&text).map_err(|source| FeatureFileError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    doc.source = Some(path.to_path_buf());
    Ok(doc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gherkin::document::StepKeyword;

    const SAMPLE: &str = "\
@Feature_Defaults:
@Apps:ProductA
@Platform:iOS,Android
@Regression_Type:New_Features

Feature: User Login
  As a registered user
  I want to log in

  Background:
    Given the app is installed
    When the user opens the app

  @smoke @Platform:Android
  Scenario: Valid login
    Given valid credentials
    When the user taps login
    Then the home screen is shown

    @Test_Data:
      - user: test_user
      - pass: Secret_1

    @Expected_Result:
      - Home screen is displayed

  Scenario: Logout
    Given a logged in user
    Then the user can log out
";

    #[test]
    fn test_parse_sample_structure() {
        let doc = parse_feature(SAMPLE).unwrap();

        assert_eq!(doc.name, "User Login");
        assert_eq!(doc.narrative, vec!["As a registered user", "I want to log in"]);
        assert_eq!(doc.background.len(), 2);
        assert_eq!(doc.scenarios.len(), 2);
        assert_eq!(doc.defaults.len(), 3);
    }

    #[test]
    fn test_defaults_keep_underscores() {
        let doc = parse_feature(SAMPLE).unwrap();
        let entry = doc.defaults.get("Regression Type").unwrap();
        assert_eq!(entry.name, "Regression_Type");
        assert_eq!(entry.value, "New_Features");
    }

    #[test]
    fn test_scenario_tags_and_blocks() {
        let doc = parse_feature(SAMPLE).unwrap();
        let first = &doc.scenarios[0];

        assert_eq!(first.name, "Valid login");
        assert_eq!(first.labels().collect::<Vec<_>>(), vec!["smoke"]);
        assert_eq!(first.overrides().collect::<Vec<_>>(), vec![("Platform", "Android")]);
        assert_eq!(first.steps.len(), 3);
        assert_eq!(first.test_data.as_deref(), Some("user: test_user\npass: Secret_1"));
        assert_eq!(first.expected_result.as_deref(), Some("Home screen is displayed"));

        let second = &doc.scenarios[1];
        assert!(second.tags.is_empty());
        assert!(second.test_data.is_none());
        assert_eq!(second.steps[1].keyword, StepKeyword::Then);
    }

    #[test]
    fn test_leading_byte_order_mark() {
        let text = "\u{feff}@Feature_Defaults:\n@Apps:A\n\nFeature: F\nScenario: S\n  Given a\n";
        let doc = parse_feature(text).unwrap();

        assert_eq!(doc.defaults.get("Apps").unwrap().value, "A");
        assert_eq!(doc.scenarios.len(), 1);
    }

    #[test]
    fn test_plain_key_value_defaults() {
        let text = "\
# @Feature_Defaults:
Priority: High
Regression_Type: Smoke_Tests

Feature: F
Scenario: S
  Given something
";
        let doc = parse_feature(text).unwrap();
        assert_eq!(doc.defaults.get("Priority").unwrap().value, "High");
        assert_eq!(doc.defaults.get("Regression_Type").unwrap().value, "Smoke_Tests");
    }

    #[test]
    fn test_feature_level_tags() {
        let text = "\
@mobile @Apps:ProductA
Feature: F
Scenario: S
  Given something
";
        let doc = parse_feature(text).unwrap();
        assert_eq!(doc.labels, vec!["mobile"]);
        assert_eq!(doc.defaults.get("Apps").unwrap().value, "ProductA");
    }

    #[test]
    fn test_table_rows_attach_to_step() {
        let text = "\
Feature: F
Scenario: S
  Given the users
    | name  | role  |
    | alice | admin |
  Then they exist
";
        let doc = parse_feature(text).unwrap();
        let step = &doc.scenarios[0].steps[0];
        assert_eq!(step.table_rows.len(), 2);
        assert_eq!(step.render(), "Given the users\n| name  | role  |\n| alice | admin |");
    }

    #[test]
    fn test_tags_end_free_text_block() {
        let text = "\
Feature: F
Scenario: First
  Given a
  @Test_Data:
    value_one
  @regression
Scenario: Second
  Given b
";
        let doc = parse_feature(text).unwrap();
        assert_eq!(doc.scenarios[0].test_data.as_deref(), Some("value_one"));
        assert_eq!(doc.scenarios[1].labels().collect::<Vec<_>>(), vec!["regression"]);
    }

    #[test]
    fn test_inline_block_text() {
        let text = "\
Feature: F
Scenario: S
  Given a
  @Expected_Result: It works
";
        let doc = parse_feature(text).unwrap();
        assert_eq!(doc.scenarios[0].expected_result.as_deref(), Some("It works"));
    }

    #[test]
    fn test_missing_scenario() {
        let text = "Feature: F\n  As a user\n";
        assert_eq!(parse_feature(text), Err(ParseError::MissingScenario));
    }

    #[test]
    fn test_unterminated_defaults_block() {
        let text = "@Feature_Defaults:\n";
        assert_eq!(
            parse_feature(text),
            Err(ParseError::UnterminatedBlock {
                line: 1,
                block: FEATURE_DEFAULTS_MARKER
            })
        );
    }

    #[test]
    fn test_dangling_tags() {
        let text = "\
Feature: F
Scenario: S
  Given a
@orphan
";
        assert_eq!(parse_feature(text), Err(ParseError::DanglingTags { line: 4 }));
    }

    #[test]
    fn test_malformed_tag_line() {
        let text = "\
Feature: F
@Platform: iOS
Scenario: S
  Given a
";
        assert!(matches!(
            parse_feature(text),
            Err(ParseError::MalformedTag { line: 2, .. })
        ));
    }

    #[test]
    fn test_unexpected_text_in_scenario() {
        let text = "\
Feature: F
Scenario: S
  Given a
  some stray words
";
        assert!(matches!(
            parse_feature(text),
            Err(ParseError::UnexpectedLine { line: 4, .. })
        ));
    }

    #[test]
    fn test_duplicate_block() {
        let text = "\
Feature: F
Scenario: S
  Given a
  @Test_Data:
    one
  @Test_Data:
    two
";
        assert!(matches!(
            parse_feature(text),
            Err(ParseError::DuplicateBlock { line: 6, .. })
        ));
    }

    #[test]
    fn test_defaults_after_scenario() {
        let text = "\
Feature: F
Scenario: S
  Given a
@Feature_Defaults:
@Apps:X
";
        assert_eq!(
            parse_feature(text),
            Err(ParseError::DefaultsAfterScenario { line: 4 })
        );
    }

    #[test]
    fn test_empty_scenario_name() {
        let text = "Feature: F\nScenario:\n  Given a\n";
        assert_eq!(parse_feature(text), Err(ParseError::EmptyScenarioName { line: 2 }));
    }

    #[test]
    fn test_parse_file_sets_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("login.feature");
        std::fs::write(&path, SAMPLE).unwrap();

        let doc = parse_feature_file(&path).unwrap();
        assert_eq!(doc.source.as_deref(), Some(path.as_path()));
    }

    #[test]
    fn test_parse_file_not_found() {
        let err = parse_feature_file(Path::new("/nonexistent/login.feature")).unwrap_err();
        assert!(matches!(err, FeatureFileError::NotFound(_)));
    }
}
