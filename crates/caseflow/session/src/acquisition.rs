//! Platform handle acquisition

use async_trait::async_trait;
use caseflow_config::ConnectionParams;
use caseflow_types::{PlatformResult, WorkflowPlatform};
use std::sync::Arc;

/// One way of obtaining a live platform handle.
///
/// The session manager tries its strategies in order and keeps the first
/// handle returned.
#[async_trait]
pub trait AcquisitionStrategy: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    async fn acquire(&self, params: &ConnectionParams) -> PlatformResult<Arc<dyn WorkflowPlatform>>;
}
