//! In-memory QMetry project state

use std::collections::HashMap;

use crate::qmetry::{
    folder_segments, CustomFieldDef, FolderId, FolderNode, RemoteTestCase, TestCasePayload,
};

use super::failure::Operation;

/// A test case held by the mock
#[derive(Debug, Clone)]
pub struct StoredTestCase {
    pub remote: RemoteTestCase,
    pub folder: FolderId,
    pub summary: String,
    /// Last payload written (None for seeded cases)
    pub payload: Option<TestCasePayload>,
    pub update_count: u32,
}

#[derive(Debug, Default)]
pub struct MockState {
    /// Flat folder list
    pub folders: Vec<FolderNode>,
    pub test_cases: Vec<StoredTestCase>,
    pub custom_fields: Vec<CustomFieldDef>,
    /// Calls seen per operation
    pub calls: HashMap<Operation, u32>,
    id_counter: u64,
}

impl MockState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&mut self) -> u64 {
        self.id_counter += 1;
        self.id_counter
    }

    pub fn record_call(&mut self, op: Operation) {
        *self.calls.entry(op).or_insert(0) += 1;
    }

    fn child(&self, parent: Option<&str>, name: &str) -> Option<&FolderNode> {
        self.folders
            .iter()
            .find(|f| f.parent_id.as_deref() == parent && f.name == name)
    }

    /// Folder ID at `path`, if every segment exists
    pub fn folder_at(&self, path: &str) -> Option<FolderId> {
        let mut parent: Option<FolderId> = None;
        for segment in folder_segments(path) {
            parent = Some(self.child(parent.as_deref(), segment)?.id.clone());
        }
        parent
    }

    /// Create missing segments and return the leaf ID
    pub fn ensure_folder(&mut self, path: &str) -> Option<FolderId> {
        let mut parent: Option<FolderId> = None;
        for segment in folder_segments(path) {
            let id = match self.child(parent.as_deref(), segment) {
                Some(existing) => existing.id.clone(),
                None => {
                    let id = self.next_id().to_string();
                    self.folders
                        .push(FolderNode::new(id.clone(), segment, parent.as_deref()));
                    id
                }
            };
            parent = Some(id);
        }
        parent
    }

    /// Store a new test case and return its remote handle
    pub fn insert_test_case(
        &mut self,
        folder: &str,
        summary: &str,
        payload: Option<TestCasePayload>,
    ) -> RemoteTestCase {
        let n = self.next_id();
        let remote = RemoteTestCase {
            id: format!("tc-{}", n),
            key: format!("MOCK-TC-{}", n),
            version_no: 1,
        };
        self.test_cases.push(StoredTestCase {
            remote: remote.clone(),
            folder: folder.to_string(),
            summary: summary.to_string(),
            payload,
            update_count: 0,
        });
        remote
    }
}
