//! Feature file parsing
//!
//! Reads the fixed Gherkin subset used for QMetry test cases:
//! - `@Feature_Defaults:` block of file-scoped field values
//! - `Feature:` header with narrative lines
//! - `Background:` steps
//! - `Scenario:` blocks with tag overrides, `@Test_Data:` and `@Expected_Result:`

mod document;
mod line;
mod parser;
mod tags;

pub use document::{
    FeatureDefaults, FeatureDocument, FieldEntry, FieldKey, Scenario, Step, StepKeyword, Tag,
};
pub use line::{classify, LineKind};
pub use parser::{parse_feature, parse_feature_file, FeatureFileError, ParseError};
pub use tags::{
    parse_tag_line, parse_tag_token, EXPECTED_RESULT_MARKER, FEATURE_DEFAULTS_MARKER,
    TEST_DATA_MARKER,
};
