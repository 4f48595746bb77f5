//! Build outcomes passed from the fan-out step to the fan-in step.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::ChangeRequest;
use crate::executor::{ExecutorError, TIMEOUT_CODE};

/// Why a build ended without a normal exit code.
///
/// Kept for logs only. Success and failure are decided by the code alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BuildFailure {
    Launch(String),
    Signal(i32),
    TimedOut(Duration),
}

impl From<ExecutorError> for BuildFailure {
    fn from(err: ExecutorError) -> Self {
        match err {
            ExecutorError::Launch(message) => BuildFailure::Launch(message),
            ExecutorError::Signal(signal) => BuildFailure::Signal(signal),
        }
    }
}

/// A change request paired with the termination code of its build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildOutcome {
    pub request: ChangeRequest,
    pub code: i32,
    pub failure: Option<BuildFailure>,
}

impl BuildOutcome {
    /// Map an executor result onto an outcome.
    pub fn from_result(request: ChangeRequest, result: Result<i32, ExecutorError>) -> Self {
        match result {
            Ok(code) => Self {
                request,
                code,
                failure: None,
            },
            Err(err) => Self {
                request,
                code: err.termination_code(),
                failure: Some(err.into()),
            },
        }
    }

    /// Outcome of a build that ran past its deadline.
    pub fn timed_out(request: ChangeRequest, after: Duration) -> Self {
        Self {
            request,
            code: TIMEOUT_CODE,
            failure: Some(BuildFailure::TimedOut(after)),
        }
    }

    pub fn is_success(&self) -> bool {
        self.code == 0
    }
}
