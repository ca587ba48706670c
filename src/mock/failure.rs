//! Failure injection for the mock repository

use std::collections::HashMap;

use crate::qmetry::ApiError;

/// Repository operation, for call counting and failure injection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    FindFolder,
    CreateFolder,
    ListFolders,
    CustomFields,
    FindByName,
    Create,
    Update,
}

impl Operation {
    /// Operations that change remote state
    pub fn is_mutation(self) -> bool {
        matches!(
            self,
            Operation::CreateFolder | Operation::Create | Operation::Update
        )
    }
}

#[derive(Debug, Clone)]
pub struct FailureConfig {
    pub error: ApiError,
    /// Number of matching calls to fail before succeeding (None = always fail)
    pub fail_count: Option<u32>,
    /// Only fail calls for this test case summary
    pub summary: Option<String>,
}

impl FailureConfig {
    pub fn error(error: ApiError) -> Self {
        Self {
            error,
            fail_count: None,
            summary: None,
        }
    }

    pub fn with_fail_count(mut self, count: u32) -> Self {
        self.fail_count = Some(count);
        self
    }

    pub fn for_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }
}

#[derive(Debug, Default)]
pub struct FailureInjector {
    configs: HashMap<Operation, FailureConfig>,
    /// Matching calls seen per operation (for fail_count)
    hits: HashMap<Operation, u32>,
}

impl FailureInjector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inject(&mut self, op: Operation, config: FailureConfig) {
        self.configs.insert(op, config);
        self.hits.insert(op, 0);
    }

    pub fn clear(&mut self) {
        self.configs.clear();
        self.hits.clear();
    }

    /// Error to return for this call, if any
    pub fn check(&mut self, op: Operation, summary: Option<&str>) -> Option<ApiError> {
        let config = self.configs.get(&op)?;
        if let Some(ref only) = config.summary {
            if summary != Some(only.as_str()) {
                return None;
            }
        }

        let hits = self.hits.entry(op).or_insert(0);
        *hits += 1;
        if config.fail_count.is_some_and(|limit| *hits > limit) {
            return None;
        }
        Some(config.error.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offline() -> ApiError {
        ApiError::Transport("offline".to_string())
    }

    #[test]
    fn test_no_failure_configured() {
        let mut injector = FailureInjector::new();
        assert!(injector.check(Operation::Create, Some("S")).is_none());
    }

    #[test]
    fn test_fail_count() {
        let mut injector = FailureInjector::new();
        injector.inject(
            Operation::FindByName,
            FailureConfig::error(offline()).with_fail_count(2),
        );

        assert!(injector.check(Operation::FindByName, None).is_some());
        assert!(injector.check(Operation::FindByName, None).is_some());
        assert!(injector.check(Operation::FindByName, None).is_none());
    }

    #[test]
    fn test_summary_filter() {
        let mut injector = FailureInjector::new();
        injector.inject(
            Operation::Create,
            FailureConfig::error(offline()).for_summary("Broken"),
        );

        assert!(injector.check(Operation::Create, Some("Fine")).is_none());
        assert_eq!(injector.check(Operation::Create, Some("Broken")), Some(offline()));

        injector.clear();
        assert!(injector.check(Operation::Create, Some("Broken")).is_none());
    }

    #[test]
    fn test_mutations() {
        assert!(Operation::Create.is_mutation());
        assert!(Operation::CreateFolder.is_mutation());
        assert!(!Operation::FindByName.is_mutation());
        assert!(!Operation::CustomFields.is_mutation());
    }
}
