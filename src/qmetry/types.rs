//! QMetry API types

use serde::{Deserialize, Deserializer, Serialize};

use crate::record::{Column, ResolvedRecord};

/// QMetry returns numeric and string IDs interchangeably; they are kept as text
pub type FolderId = String;

/// Accepts a string, a number or null as an ID
pub(crate) fn de_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Int(i64),
        Text(String),
    }

    Ok(match Option::<Id>::deserialize(deserializer)? {
        Some(Id::Int(i)) => i.to_string(),
        Some(Id::Text(s)) => s,
        None => String::new(),
    })
}

/// Parent ID, with the root markers QMetry uses (`0`, `-1`, empty) mapped to None
fn de_parent<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    let id = de_id(deserializer)?;
    Ok(match id.as_str() {
        "" | "0" | "-1" => None,
        _ => Some(id),
    })
}

/// Path segments: `/Mobile//Login/` -> `["Mobile", "Login"]`
pub fn folder_segments(path: &str) -> Vec<&str> {
    path.split('/')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

/// Canonical form used for cache keys: `/Mobile/Login`
pub fn normalize_folder_path(path: &str) -> String {
    format!("/{}", folder_segments(path).join("/"))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderNode {
    #[serde(deserialize_with = "de_id")]
    pub id: FolderId,

    #[serde(default, alias = "folderName")]
    pub name: String,

    #[serde(
        default,
        rename = "parentId",
        alias = "parentFolderId",
        deserialize_with = "de_parent"
    )]
    pub parent_id: Option<FolderId>,

    #[serde(default)]
    pub children: Vec<FolderNode>,
}

impl FolderNode {
    pub fn new(id: impl Into<String>, name: impl Into<String>, parent_id: Option<&str>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            parent_id: parent_id.map(str::to_string),
            children: Vec::new(),
        }
    }

    /// Nest a flat folder list by parent ID. Lists that already carry
    /// children are returned unchanged.
    pub fn into_tree(nodes: Vec<FolderNode>) -> Vec<FolderNode> {
        if nodes.iter().any(|n| !n.children.is_empty()) {
            return nodes;
        }

        fn attach(parent: Option<&str>, pool: &mut Vec<FolderNode>) -> Vec<FolderNode> {
            let (mut level, rest): (Vec<_>, Vec<_>) = std::mem::take(pool)
                .into_iter()
                .partition(|n| n.parent_id.as_deref() == parent);
            *pool = rest;
            for node in &mut level {
                node.children = attach(Some(node.id.as_str()), pool);
            }
            level
        }

        let ids: Vec<String> = nodes.iter().map(|n| n.id.clone()).collect();
        let mut pool = nodes;
        // Orphans (parent not in the list) are shown at the top level
        for node in &mut pool {
            if node.parent_id.as_ref().is_some_and(|p| !ids.contains(p)) {
                node.parent_id = None;
            }
        }
        attach(None, &mut pool)
    }
}

/// Indented tree, one folder per line
pub fn render_folder_tree(nodes: &[FolderNode]) -> String {
    fn walk(nodes: &[FolderNode], depth: usize, out: &mut String) {
        for node in nodes {
            out.push_str(&format!("{}{} ({})\n", "  ".repeat(depth), node.name, node.id));
            walk(&node.children, depth + 1, out);
        }
    }

    let mut out = String::new();
    walk(nodes, 0, &mut out);
    out
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldOption {
    #[serde(default, deserialize_with = "de_id")]
    pub id: String,

    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomFieldDef {
    #[serde(default, deserialize_with = "de_id")]
    pub id: String,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub options: Vec<FieldOption>,
}

/// An existing test case version
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemoteTestCase {
    pub id: String,
    pub key: String,
    pub version_no: u32,
}

impl<'de> Deserialize<'de> for RemoteTestCase {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Version {
            #[serde(rename = "versionNo", default = "first_version")]
            version_no: u32,
        }

        #[derive(Deserialize)]
        struct Raw {
            #[serde(deserialize_with = "de_id")]
            id: String,
            #[serde(default)]
            key: String,
            #[serde(default)]
            version: Option<Version>,
        }

        let raw = Raw::deserialize(deserializer)?;
        Ok(RemoteTestCase {
            id: raw.id,
            key: raw.key,
            version_no: raw.version.map_or(1, |v| v.version_no),
        })
    }
}

fn first_version() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestStep {
    pub step_details: String,
    pub test_data: String,
    pub expected_result: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CustomFieldValue {
    pub id: String,
    pub value: String,
}

/// Test case content sent on create and update.
///
/// Status, priority and labels are not sent: QMetry needs their internal IDs
/// and the project defaults apply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCasePayload {
    pub summary: String,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub precondition: String,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<TestStep>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub custom_fields: Vec<CustomFieldValue>,
}

impl TestCasePayload {
    /// Payload for a record whose custom fields are already resolved to IDs
    pub fn from_record(record: &ResolvedRecord, custom_fields: Vec<CustomFieldValue>) -> Self {
        let step = TestStep {
            step_details: record.get(Column::StepSummary).to_string(),
            test_data: record.get(Column::TestData).to_string(),
            expected_result: record.get(Column::ExpectedResult).to_string(),
        };
        let has_step = !(step.step_details.is_empty()
            && step.test_data.is_empty()
            && step.expected_result.is_empty());

        Self {
            summary: record.summary().to_string(),
            description: record.get(Column::Description).to_string(),
            precondition: record.get(Column::Precondition).to_string(),
            steps: if has_step { vec![step] } else { Vec::new() },
            custom_fields,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_folder_paths() {
        assert_eq!(folder_segments("/Mobile//Login/"), vec!["Mobile", "Login"]);
        assert_eq!(normalize_folder_path("Mobile/Login/"), "/Mobile/Login");
        assert!(folder_segments("/").is_empty());
    }

    #[test]
    fn test_folder_node_accepts_numeric_ids() {
        let node: FolderNode =
            serde_json::from_value(json!({"id": 12, "name": "Login", "parentId": 7})).unwrap();
        assert_eq!(node.id, "12");
        assert_eq!(node.parent_id.as_deref(), Some("7"));

        let root: FolderNode =
            serde_json::from_value(json!({"id": "3", "folderName": "Mobile", "parentId": -1}))
                .unwrap();
        assert_eq!(root.name, "Mobile");
        assert!(root.parent_id.is_none());
    }

    #[test]
    fn test_into_tree_and_render() {
        let flat = vec![
            FolderNode::new("2", "Login", Some("1")),
            FolderNode::new("1", "Mobile", None),
            FolderNode::new("3", "Web", None),
        ];
        let tree = FolderNode::into_tree(flat);

        assert_eq!(tree.len(), 2);
        assert_eq!(tree[0].children[0].name, "Login");
        assert_eq!(
            render_folder_tree(&tree),
            "Mobile (1)\n  Login (2)\nWeb (3)\n"
        );
    }

    #[test]
    fn test_remote_test_case_version() {
        let tc: RemoteTestCase = serde_json::from_value(
            json!({"id": "abc", "key": "MOB-TC-9", "version": {"versionNo": 3}}),
        )
        .unwrap();
        assert_eq!(tc.version_no, 3);

        let tc: RemoteTestCase = serde_json::from_value(json!({"id": 5})).unwrap();
        assert_eq!(tc.id, "5");
        assert_eq!(tc.version_no, 1);
    }

    #[test]
    fn test_payload_skips_empty_parts() {
        let mut record = ResolvedRecord::new();
        record.set(Column::Summary, "Login works");

        let payload = TestCasePayload::from_record(&record, Vec::new());
        let body = serde_json::to_value(&payload).unwrap();

        assert_eq!(body, json!({"summary": "Login works"}));
    }

    #[test]
    fn test_payload_step_fields() {
        let mut record = ResolvedRecord::new();
        record.set(Column::Summary, "S");
        record.set(Column::StepSummary, "Given a\nThen b");
        record.set(Column::TestData, "user: x");

        let payload = TestCasePayload::from_record(
            &record,
            vec![CustomFieldValue {
                id: "qcf_1".to_string(),
                value: "11".to_string(),
            }],
        );
        let body = serde_json::to_value(&payload).unwrap();

        assert_eq!(body["steps"][0]["stepDetails"], "Given a\nThen b");
        assert_eq!(body["steps"][0]["testData"], "user: x");
        assert_eq!(body["steps"][0]["expectedResult"], "");
        assert_eq!(body["customFields"][0]["id"], "qcf_1");
    }
}
