//! Core domain types and traits for the prbuild pull request CI trigger.
//!
//! This crate contains:
//! - Change requests and the branch references they carry
//! - Build parameters, outcomes and synthetic termination codes
//! - The three collaborator traits the scheduler drives:
//!   [`ChangeRequestSource`], [`BuildExecutor`] and [`StatusReporter`]

pub mod change;
pub mod error;
pub mod executor;
pub mod id;
pub mod outcome;
pub mod reporter;
pub mod source;

pub use change::{BranchRef, ChangeRequest, RepositoryRef};
pub use error::{Error, Result};
pub use executor::{BuildExecutor, BuildParams, ExecutorError};
pub use id::TickId;
pub use outcome::{BuildFailure, BuildOutcome};
pub use reporter::StatusReporter;
pub use source::{ChangeRequestSource, SourceError};
