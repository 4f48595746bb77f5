//! Build executor trait and parameters.
//!
//! Executors run one build in an isolated environment (container or process)
//! and yield the build's termination code.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use crate::{ChangeRequest, RepositoryRef};

/// Environment variable carrying the repository reference.
pub const ENV_GIT_REPO: &str = "GIT_REPO";
/// Environment variable carrying the source branch.
pub const ENV_SOURCE_BRANCH: &str = "SOURCE_BRANCH";
/// Environment variable carrying the target branch.
pub const ENV_TARGET_BRANCH: &str = "TARGET_BRANCH";

/// Termination code used when the build could not be started.
pub const LAUNCH_FAILURE_CODE: i32 = 1;
/// Termination code used when the build exceeded its deadline.
pub const TIMEOUT_CODE: i32 = 124;
/// Offset added to a signal number, following the shell convention.
pub const SIGNAL_CODE_BASE: i32 = 128;

/// The three named parameters every build receives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildParams {
    pub repository: RepositoryRef,
    pub source_branch: String,
    pub target_branch: String,
}

impl BuildParams {
    pub fn for_request(repository: &RepositoryRef, request: &ChangeRequest) -> Self {
        Self {
            repository: repository.clone(),
            source_branch: request.head.name.clone(),
            target_branch: request.base.name.clone(),
        }
    }

    /// The parameters as environment variables.
    pub fn env(&self) -> HashMap<String, String> {
        HashMap::from([
            (ENV_GIT_REPO.to_string(), self.repository.to_string()),
            (ENV_SOURCE_BRANCH.to_string(), self.source_branch.clone()),
            (ENV_TARGET_BRANCH.to_string(), self.target_branch.clone()),
        ])
    }
}

/// Why a build did not produce a normal exit code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecutorError {
    #[error("build could not be started: {0}")]
    Launch(String),

    #[error("build was terminated by signal {0}")]
    Signal(i32),
}

impl ExecutorError {
    /// Synthetic termination code for this failure. Always non-zero.
    pub fn termination_code(&self) -> i32 {
        match self {
            ExecutorError::Launch(_) => LAUNCH_FAILURE_CODE,
            ExecutorError::Signal(signal) => match SIGNAL_CODE_BASE.saturating_add(*signal) {
                0 => LAUNCH_FAILURE_CODE,
                code => code,
            },
        }
    }
}

/// Trait for build executors.
///
/// Dropping the future returned by [`BuildExecutor::run`] must stop the build,
/// so that a deadline can reclaim the slot it occupies.
#[async_trait]
pub trait BuildExecutor: Send + Sync {
    /// Name of this executor.
    fn name(&self) -> &'static str;

    /// Run a build to completion and return its exit code.
    async fn run(&self, params: &BuildParams) -> Result<i32, ExecutorError>;
}
