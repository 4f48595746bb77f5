//! Error types for prbuild.

use thiserror::Error;

use crate::source::SourceError;

#[derive(Debug, Error)]
pub enum Error {
    #[error("fetch step failed: {0}")]
    Source(#[from] SourceError),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;
