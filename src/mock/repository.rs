//! In-memory `TestCaseRepository`

use std::sync::{Arc, Mutex};

use crate::qmetry::{
    ApiError, CustomFieldDef, FolderId, FolderNode, RemoteTestCase, TestCasePayload,
    TestCaseRepository,
};

use super::failure::{FailureConfig, FailureInjector, Operation};
use super::state::{MockState, StoredTestCase};

/// Fake QMetry project for tests and demos
#[derive(Debug, Clone, Default)]
pub struct MockRepository {
    state: Arc<Mutex<MockState>>,
    failures: Arc<Mutex<FailureInjector>>,
}

impl MockRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count the call and apply any injected failure
    fn enter(&self, op: Operation, summary: Option<&str>) -> Result<(), ApiError> {
        self.state.lock().unwrap().record_call(op);
        match self.failures.lock().unwrap().check(op, summary) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    // --- setup ---

    pub fn add_folder(&self, path: &str) -> FolderId {
        self.state
            .lock()
            .unwrap()
            .ensure_folder(path)
            .unwrap_or_default()
    }

    pub fn add_custom_field(&self, field: CustomFieldDef) {
        self.state.lock().unwrap().custom_fields.push(field);
    }

    /// Seed an existing test case in the folder at `path`
    pub fn add_test_case(&self, path: &str, summary: &str) -> RemoteTestCase {
        let mut state = self.state.lock().unwrap();
        let folder = state.ensure_folder(path).unwrap_or_default();
        state.insert_test_case(&folder, summary, None)
    }

    pub fn inject(&self, op: Operation, config: FailureConfig) {
        self.failures.lock().unwrap().inject(op, config);
    }

    /// Fail every call of `op`
    pub fn fail(&self, op: Operation, error: ApiError) {
        self.inject(op, FailureConfig::error(error));
    }

    pub fn clear_failures(&self) {
        self.failures.lock().unwrap().clear();
    }

    // --- inspection ---

    pub fn calls(&self, op: Operation) -> u32 {
        self.state
            .lock()
            .unwrap()
            .calls
            .get(&op)
            .copied()
            .unwrap_or(0)
    }

    /// Calls that changed remote state
    pub fn mutation_calls(&self) -> u32 {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|(op, _)| op.is_mutation())
            .map(|(_, n)| n)
            .sum()
    }

    pub fn test_cases(&self) -> Vec<StoredTestCase> {
        self.state.lock().unwrap().test_cases.clone()
    }

    pub fn folder_id(&self, path: &str) -> Option<FolderId> {
        self.state.lock().unwrap().folder_at(path)
    }
}

impl TestCaseRepository for MockRepository {
    fn find_folder(&self, path: &str) -> Result<Option<FolderId>, ApiError> {
        self.enter(Operation::FindFolder, None)?;
        Ok(self.state.lock().unwrap().folder_at(path))
    }

    fn create_folder(&self, path: &str) -> Result<FolderId, ApiError> {
        self.enter(Operation::CreateFolder, None)?;
        self.state
            .lock()
            .unwrap()
            .ensure_folder(path)
            .ok_or_else(|| ApiError::InvalidFolderPath(path.to_string()))
    }

    fn list_folders(&self) -> Result<Vec<FolderNode>, ApiError> {
        self.enter(Operation::ListFolders, None)?;
        Ok(FolderNode::into_tree(self.state.lock().unwrap().folders.clone()))
    }

    fn custom_fields(&self) -> Result<Vec<CustomFieldDef>, ApiError> {
        self.enter(Operation::CustomFields, None)?;
        Ok(self.state.lock().unwrap().custom_fields.clone())
    }

    fn find_by_name(
        &self,
        folder: &FolderId,
        summary: &str,
    ) -> Result<Vec<RemoteTestCase>, ApiError> {
        self.enter(Operation::FindByName, Some(summary))?;
        Ok(self
            .state
            .lock()
            .unwrap()
            .test_cases
            .iter()
            .filter(|tc| &tc.folder == folder && tc.summary == summary)
            .map(|tc| tc.remote.clone())
            .collect())
    }

    fn create(
        &self,
        folder: &FolderId,
        payload: &TestCasePayload,
    ) -> Result<RemoteTestCase, ApiError> {
        self.enter(Operation::Create, Some(&payload.summary))?;
        Ok(self.state.lock().unwrap().insert_test_case(
            folder,
            &payload.summary,
            Some(payload.clone()),
        ))
    }

    fn update(&self, existing: &RemoteTestCase, payload: &TestCasePayload) -> Result<(), ApiError> {
        self.enter(Operation::Update, Some(&payload.summary))?;
        let mut state = self.state.lock().unwrap();
        let stored = state
            .test_cases
            .iter_mut()
            .find(|tc| tc.remote.id == existing.id)
            .ok_or_else(|| ApiError::Status {
                status: 404,
                body: format!("test case {} not found", existing.id),
            })?;
        stored.summary = payload.summary.clone();
        stored.payload = Some(payload.clone());
        stored.update_count += 1;
        Ok(())
    }
}
