//! Build execution backends for prbuild.
//!
//! Provides executor implementations for running pull request builds:
//! - Docker containers through the Docker API
//! - Local processes (by default a `docker run` invocation)

pub mod docker;
pub mod process;

pub use docker::DockerExecutor;
pub use process::ProcessExecutor;
pub use prbuild_core::executor::{BuildExecutor, BuildParams, ExecutorError};
