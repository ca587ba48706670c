//! Shared fixtures for integration tests

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use qmetry_lane::mock::MockRepository;
use qmetry_lane::qmetry::{CustomFieldDef, FieldOption};
use qmetry_lane::record::{build_records, ResolvedRecord};
use qmetry_lane::parse_feature_file;

pub fn fixture_path(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

/// The two-scenario login feature
pub fn user_login_path() -> PathBuf {
    fixture_path("user_login.feature")
}

pub fn user_login_records() -> Vec<ResolvedRecord> {
    let doc = parse_feature_file(&user_login_path()).unwrap();
    build_records(&doc).records
}

fn options(values: &[(&str, &str)]) -> Vec<FieldOption> {
    values
        .iter()
        .map(|(id, value)| FieldOption {
            id: id.to_string(),
            value: value.to_string(),
        })
        .collect()
}

/// Mock project with every custom field the login feature uses
pub fn qmetry_project() -> MockRepository {
    let repo = MockRepository::new();
    repo.add_custom_field(CustomFieldDef {
        id: "qcf_apps".to_string(),
        name: "Apps".to_string(),
        options: options(&[("101", "ProductA"), ("102", "ProductB")]),
    });
    repo.add_custom_field(CustomFieldDef {
        id: "qcf_platform".to_string(),
        name: "Platform".to_string(),
        options: options(&[("201", "iOS"), ("202", "Android")]),
    });
    repo.add_custom_field(CustomFieldDef {
        id: "qcf_component".to_string(),
        name: "Component/Feature".to_string(),
        options: Vec::new(),
    });
    repo.add_custom_field(CustomFieldDef {
        id: "qcf_regression".to_string(),
        name: "Regression Type".to_string(),
        options: options(&[("301", "New Features"), ("302", "Smoke Tests")]),
    });
    repo
}
