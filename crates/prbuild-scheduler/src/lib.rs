//! Polling and build orchestration for prbuild.
//!
//! Each tick fetches the open change requests, fans out one build task per
//! request and fans their outcomes back in to report a final status. The
//! [`PeriodicDriver`] runs ticks on a fixed cadence.

pub mod barrier;
pub mod driver;
pub mod pipeline;

pub use barrier::{BarrierGuard, CompletionBarrier};
pub use driver::{DriverConfig, DriverHandle, DriverStats, PeriodicDriver};
pub use pipeline::{Pipeline, PipelineSettings, TickReport};
pub use prbuild_config::OverlapPolicy;
