//! Mock QMetry repository
//!
//! In-process implementation of `TestCaseRepository` for tests. Keeps
//! folders, test cases and custom fields in memory, counts calls per
//! operation and supports per-operation failure injection.

mod failure;
mod repository;
mod state;

pub use failure::{FailureConfig, FailureInjector, Operation};
pub use repository::MockRepository;
pub use state::{MockState, StoredTestCase};
