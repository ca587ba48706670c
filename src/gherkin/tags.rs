//! Tag line grammar
//!
//! A tag line is a whitespace-separated list of tokens, each `@name` (a label)
//! or `@name:value` (an override). There is no space after the colon; a value
//! never contains whitespace. A token starting with `#` begins a trailing
//! comment.

use std::sync::OnceLock;

use regex_lite::Regex;

use super::document::Tag;
use super::parser::ParseError;

/// Marker opening the file-level defaults block
pub const FEATURE_DEFAULTS_MARKER: &str = "@Feature_Defaults:";
/// Marker opening a scenario's test data block
pub const TEST_DATA_MARKER: &str = "@Test_Data:";
/// Marker opening a scenario's expected result block
pub const EXPECTED_RESULT_MARKER: &str = "@Expected_Result:";

fn tag_regex() -> &'static Regex {
    static TAG: OnceLock<Regex> = OnceLock::new();
    TAG.get_or_init(|| {
        Regex::new(r"^@([A-Za-z0-9_/?&.-]+)(?::(.*))?$").expect("tag pattern compiles")
    })
}

/// Parse a single `@...` token
pub fn parse_tag_token(token: &str, line: usize) -> Result<Tag, ParseError> {
    if !token.starts_with('@') {
        return Err(ParseError::MalformedTag {
            line,
            token: token.to_string(),
            reason: "expected a token starting with '@' (no space is allowed after ':')"
                .to_string(),
        });
    }

    let caps = tag_regex()
        .captures(token)
        .ok_or_else(|| ParseError::MalformedTag {
            line,
            token: token.to_string(),
            reason: "invalid tag name".to_string(),
        })?;

    let name = caps.get(1).map(|m| m.as_str()).unwrap_or_default();

    match caps.get(2) {
        None => Ok(Tag::Label(name.to_string())),
        Some(value) if value.as_str().is_empty() => Err(ParseError::MalformedTag {
            line,
            token: token.to_string(),
            reason: format!("missing value after '@{}:'", name),
        }),
        Some(value) => Ok(Tag::Override {
            field: name.to_string(),
            value: value.as_str().to_string(),
        }),
    }
}

/// Parse every tag on a tag line, left to right
pub fn parse_tag_line(text: &str, line: usize) -> Result<Vec<Tag>, ParseError> {
    text.split_whitespace()
        .take_while(|token| !token.starts_with('#'))
        .map(|token| parse_tag_token(token, line))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn label(name: &str) -> Tag {
        Tag::Label(name.to_string())
    }

    fn over(field: &str, value: &str) -> Tag {
        Tag::Override {
            field: field.to_string(),
            value: value.to_string(),
        }
    }

    #[test]
    fn test_labels_and_overrides() {
        let tags = parse_tag_line("@smoke @Platform:Android @login", 1).unwrap();
        assert_eq!(tags, vec![label("smoke"), over("Platform", "Android"), label("login")]);
    }

    #[test]
    fn test_multi_value_and_special_names() {
        let tags = parse_tag_line("@Platform:iOS,Android @Component/Feature:Login @Automatable?:Yes", 4)
            .unwrap();
        assert_eq!(
            tags,
            vec![
                over("Platform", "iOS,Android"),
                over("Component/Feature", "Login"),
                over("Automatable?", "Yes"),
            ]
        );
    }

    #[test]
    fn test_underscores_preserved() {
        let tags = parse_tag_line("@Regression_Type:New_Features", 1).unwrap();
        assert_eq!(tags, vec![over("Regression_Type", "New_Features")]);
    }

    #[test]
    fn test_value_split_at_first_colon() {
        let tags = parse_tag_line("@Folder:/Mobile/PTR @Window:10:30", 1).unwrap();
        assert_eq!(tags, vec![over("Folder", "/Mobile/PTR"), over("Window", "10:30")]);
    }

    #[test]
    fn test_trailing_comment_ignored() {
        let tags = parse_tag_line("@smoke # flaky on CI", 1).unwrap();
        assert_eq!(tags, vec![label("smoke")]);
    }

    #[test]
    fn test_space_after_colon_rejected() {
        let err = parse_tag_line("@Platform: iOS", 7).unwrap_err();
        match err {
            ParseError::MalformedTag { line, token, .. } => {
                assert_eq!(line, 7);
                assert_eq!(token, "@Platform:");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_bare_at_rejected() {
        assert!(matches!(
            parse_tag_line("@smoke @", 2),
            Err(ParseError::MalformedTag { .. })
        ));
    }

    #[test]
    fn test_word_without_at_rejected() {
        assert!(matches!(
            parse_tag_line("@smoke regression", 2),
            Err(ParseError::MalformedTag { .. })
        ));
    }
}
