//! QTM4J Cloud REST client
//!
//! Blocking, one request at a time. Every request carries the `apiKey`
//! header; list responses may be a bare array or wrapped in `{"data": [...]}`.

use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use super::types::{
    folder_segments, CustomFieldDef, CustomFieldValue, FolderId, FolderNode, RemoteTestCase, TestCasePayload,
};
use super::{ApiError, TestCaseRepository};

/// Per-request timeout
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Longest error body kept in an `ApiError`
const MAX_ERROR_BODY: usize = 500;

pub struct QmetryClient {
    http: Client,
    base_url: String,
    api_key: String,
    project: u64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateBody<'a> {
    project_id: u64,
    folder_id: Value,
    #[serde(flatten)]
    payload: &'a TestCasePayload,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UpdateBody<'a> {
    summary: &'a str,
    #[serde(skip_serializing_if = "is_blank")]
    description: &'a str,
    #[serde(skip_serializing_if = "is_blank")]
    precondition: &'a str,
    #[serde(skip_serializing_if = "no_values")]
    custom_fields: &'a [CustomFieldValue],
}

fn is_blank(text: &&str) -> bool {
    text.is_empty()
}

fn no_values(values: &&[CustomFieldValue]) -> bool {
    values.is_empty()
}

/// Numeric IDs go over the wire as numbers
fn id_value(id: &str) -> Value {
    id.parse::<i64>().map(Value::from).unwrap_or_else(|_| Value::from(id))
}

/// Items of a list response
fn items(value: Option<Value>) -> Vec<Value> {
    match value {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(list)) => list,
        Some(Value::Object(mut map)) => match map.remove("data") {
            Some(Value::Array(list)) => list,
            Some(other) => vec![other],
            None => vec![Value::Object(map)],
        },
        Some(other) => vec![other],
    }
}

/// Single object of a create response, unwrapping `data` if present
fn object(value: Option<Value>) -> Value {
    match value {
        Some(Value::Object(mut map)) if map.get("data").is_some_and(Value::is_object) => {
            map.remove("data").unwrap_or(Value::Null)
        }
        Some(other) => other,
        None => Value::Null,
    }
}

fn decode<T: DeserializeOwned>(value: Value) -> Result<T, ApiError> {
    serde_json::from_value(value).map_err(|e| ApiError::Decode(e.to_string()))
}

/// Search hits whose summary equals `summary`. The search is a contains
/// match, and a hit without a summary never counts.
fn exact_matches(found: Vec<Value>, summary: &str) -> Result<Vec<RemoteTestCase>, ApiError> {
    found
        .into_iter()
        .filter(|tc| tc.get("summary").and_then(Value::as_str) == Some(summary))
        .map(decode)
        .collect()
}

fn decode_list<T: DeserializeOwned>(value: Option<Value>) -> Result<Vec<T>, ApiError> {
    items(value).into_iter().map(decode).collect()
}

impl QmetryClient {
    pub fn new(
        base_url: &str,
        api_key: &str,
        project: u64,
        ssl_verify: bool,
    ) -> Result<Self, ApiError> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .danger_accept_invalid_certs(!ssl_verify)
            .build()
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            project,
        })
    }

    fn send(
        &self,
        method: Method,
        endpoint: &str,
        query: &[(&str, &str)],
        body: Option<&Value>,
    ) -> Result<Option<Value>, ApiError> {
        let url = format!("{}{}", self.base_url, endpoint);
        debug!(%method, %url, "QMetry request");

        let mut request = self
            .http
            .request(method, &url)
            .header("apiKey", &self.api_key)
            .header(ACCEPT, "application/json");
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.header(CONTENT_TYPE, "application/json").json(body);
        }

        let response = request
            .send()
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        let status = response.status();
        let text = response
            .text()
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(ApiError::Auth {
                status: status.as_u16(),
            });
        }
        if !status.is_success() {
            let mut body = text.trim().to_string();
            if body.len() > MAX_ERROR_BODY {
                let mut cut = MAX_ERROR_BODY;
                while !body.is_char_boundary(cut) {
                    cut -= 1;
                }
                body.truncate(cut);
            }
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }
        if status == StatusCode::NO_CONTENT || text.trim().is_empty() {
            return Ok(None);
        }

        serde_json::from_str(&text)
            .map(Some)
            .map_err(|e| ApiError::Decode(e.to_string()))
    }

    fn folders_endpoint(&self) -> String {
        format!("/projects/{}/testcase-folders", self.project)
    }

    /// Folders named `name` directly under `parent`
    fn search_folder(&self, name: &str, parent: Option<&str>) -> Result<Option<FolderId>, ApiError> {
        let endpoint = format!("{}/search", self.folders_endpoint());
        let found: Vec<FolderNode> =
            decode_list(self.send(Method::GET, &endpoint, &[("folderName", name)], None)?)?;

        Ok(found
            .into_iter()
            .find(|f| f.parent_id.as_deref() == parent && (f.name.is_empty() || f.name == name))
            .map(|f| f.id))
    }

    fn post_folder(&self, name: &str, parent: Option<&str>) -> Result<FolderId, ApiError> {
        let mut body = json!({ "name": name });
        if let Some(parent) = parent {
            body["parentFolderId"] = id_value(parent);
        }

        let created: FolderNode =
            decode(object(self.send(Method::POST, &self.folders_endpoint(), &[], Some(&body))?))?;
        info!(folder = name, id = %created.id, "created folder");
        Ok(created.id)
    }

    /// Walk `path` segment by segment, optionally creating missing ones
    fn walk_path(&self, path: &str, create: bool) -> Result<Option<FolderId>, ApiError> {
        let segments = folder_segments(path);
        if segments.is_empty() {
            return Err(ApiError::InvalidFolderPath(path.to_string()));
        }

        let mut parent: Option<FolderId> = None;
        for segment in segments {
            let id = match self.search_folder(segment, parent.as_deref())? {
                Some(id) => id,
                None if create => self
                    .post_folder(segment, parent.as_deref())
                    .map_err(|e| ApiError::FolderCreate {
                        path: path.to_string(),
                        reason: e.to_string(),
                    })?,
                None => return Ok(None),
            };
            parent = Some(id);
        }
        Ok(parent)
    }

    fn steps_endpoint(existing: &RemoteTestCase) -> String {
        format!(
            "/testcases/{}/versions/{}/teststeps",
            existing.id, existing.version_no
        )
    }

    fn to_value<T: Serialize>(body: &T) -> Result<Value, ApiError> {
        serde_json::to_value(body).map_err(|e| ApiError::Decode(e.to_string()))
    }
}

impl TestCaseRepository for QmetryClient {
    fn find_folder(&self, path: &str) -> Result<Option<FolderId>, ApiError> {
        self.walk_path(path, false)
    }

    fn create_folder(&self, path: &str) -> Result<FolderId, ApiError> {
        self.walk_path(path, true)?
            .ok_or_else(|| ApiError::InvalidFolderPath(path.to_string()))
    }

    fn list_folders(&self) -> Result<Vec<FolderNode>, ApiError> {
        let folders = decode_list(self.send(Method::GET, &self.folders_endpoint(), &[], None)?)?;
        Ok(FolderNode::into_tree(folders))
    }

    fn custom_fields(&self) -> Result<Vec<CustomFieldDef>, ApiError> {
        let endpoint = format!("/projects/{}/testcase-custom-fields", self.project);
        let fields: Vec<CustomFieldDef> = decode_list(self.send(Method::GET, &endpoint, &[], None)?)?;
        Ok(fields
            .into_iter()
            .filter(|f| !f.id.is_empty() && !f.name.is_empty())
            .collect())
    }

    fn find_by_name(
        &self,
        folder: &FolderId,
        summary: &str,
    ) -> Result<Vec<RemoteTestCase>, ApiError> {
        let body = json!({
            "filter": {
                "projectId": self.project.to_string(),
                "summary": summary,
                "folderId": folder,
            }
        });
        let found = items(self.send(Method::POST, "/testcases/search", &[], Some(&body))?);
        exact_matches(found, summary)
    }

    fn create(
        &self,
        folder: &FolderId,
        payload: &TestCasePayload,
    ) -> Result<RemoteTestCase, ApiError> {
        let body = Self::to_value(&CreateBody {
            project_id: self.project,
            folder_id: id_value(folder),
            payload,
        })?;
        let created: RemoteTestCase =
            decode(object(self.send(Method::POST, "/testcases", &[], Some(&body))?))?;
        info!(key = %created.key, summary = %payload.summary, "created test case");
        Ok(created)
    }

    fn update(&self, existing: &RemoteTestCase, payload: &TestCasePayload) -> Result<(), ApiError> {
        let endpoint = format!("/testcases/{}/versions/{}", existing.id, existing.version_no);
        let body = Self::to_value(&UpdateBody {
            summary: &payload.summary,
            description: &payload.description,
            precondition: &payload.precondition,
            custom_fields: &payload.custom_fields,
        })?;
        self.send(Method::PUT, &endpoint, &[], Some(&body))?;

        if !payload.steps.is_empty() {
            let steps_endpoint = Self::steps_endpoint(existing);
            let replace = || -> Result<(), ApiError> {
                self.send(
                    Method::DELETE,
                    &steps_endpoint,
                    &[],
                    Some(&json!({ "deleteAll": true })),
                )?;
                let steps = Self::to_value(&payload.steps)?;
                self.send(Method::POST, &steps_endpoint, &[], Some(&steps))?;
                Ok(())
            };
            replace().map_err(|e| ApiError::StepsNotReplaced(e.to_string()))?;
        }

        info!(key = %existing.key, summary = %payload.summary, "updated test case");
        Ok(())
    }
}
