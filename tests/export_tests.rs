//! Feature file to CSV, end to end

mod fixtures;

use std::fs;

use fixtures::{fixture_path, user_login_path, user_login_records};
use qmetry_lane::export::{export_to_path, to_csv_string, LINE_TERMINATOR};
use qmetry_lane::record::{header_row, Column, COLUMN_COUNT};
use qmetry_lane::{parse_feature_file, build_records};

fn row(fields: &[&str]) -> String {
    assert_eq!(fields.len(), COLUMN_COUNT);
    fields.join(",")
}

#[test]
fn test_user_login_rows() {
    let csv = to_csv_string(&user_login_records());
    let lines: Vec<&str> = csv.split(LINE_TERMINATOR).collect();

    assert_eq!(lines[0], header_row().join(","));

    let first = row(&[
        "",
        "Successful login with valid credentials",
        "As a registered user I want to log in to the app",
        "Given the app is installed",
        "TO DO",
        "Medium",
        "",
        "",
        "",
        "smoke",
        "",
        "",
        "",
        "\"Given the user is on the login screen\nWhen the user enters valid credentials\nThen the home screen is displayed\"",
        "\"username: test_user\npassword: Secret_1\"",
        "User lands on the home screen",
        "",
        "",
        "ProductA",
        "Login",
        "",
        "",
        "",
        "iOS",
        "New Features",
        "",
        "",
        "",
        "",
        "",
        "",
        "",
    ]);
    let second = row(&[
        "",
        "Login fails with wrong password",
        "As a registered user I want to log in to the app",
        "Given the app is installed",
        "TO DO",
        "Medium",
        "",
        "",
        "",
        "",
        "",
        "",
        "",
        "\"Given the user is on the login screen\nWhen the user enters a wrong password\nThen an error message is shown\"",
        "",
        "",
        "",
        "",
        "ProductB",
        "Login",
        "",
        "",
        "",
        "\"Android,iOS\"",
        "New Features",
        "",
        "",
        "",
        "",
        "",
        "",
        "",
    ]);

    assert_eq!(lines[1], first);
    assert_eq!(lines[2], second);
    // Trailing CRLF after the last row
    assert_eq!(lines.len(), 4);
    assert_eq!(lines[3], "");
}

#[test]
fn test_folder_tag_stays_out_of_csv() {
    let records = user_login_records();
    assert_eq!(records[0].folder(), Some("/Mobile/Login"));
    assert_eq!(records[0].get(Column::Folders), "");
}

#[test]
fn test_export_twice_is_byte_identical() {
    let dir = tempfile::tempdir().unwrap();
    let a = dir.path().join("a.csv");
    let b = dir.path().join("b.csv");

    export_to_path(&a, &user_login_records()).unwrap();
    export_to_path(&b, &user_login_records()).unwrap();

    assert_eq!(fs::read(&a).unwrap(), fs::read(&b).unwrap());
}

#[test]
fn test_parse_error_names_file_and_line() {
    let err = parse_feature_file(&fixture_path("broken.feature")).unwrap_err();
    let message = err.to_string();
    assert!(message.contains("broken.feature"), "{}", message);
    assert!(message.contains("Line 2"), "{}", message);
}

#[test]
fn test_fixture_has_no_warnings() {
    let doc = parse_feature_file(&user_login_path()).unwrap();
    let output = build_records(&doc);
    assert!(output.warnings.is_empty(), "{:?}", output.warnings);
}
