//! Status reporting back to the hosting service.

use async_trait::async_trait;

use crate::ChangeRequest;

/// Posts build state for a change request.
///
/// Every call is fire-and-forget: implementations log their own failures
/// and never surface them to the caller.
#[async_trait]
pub trait StatusReporter: Send + Sync {
    async fn report_pending(&self, request: &ChangeRequest);

    async fn report_success(&self, request: &ChangeRequest);

    async fn report_failure(&self, request: &ChangeRequest);
}
