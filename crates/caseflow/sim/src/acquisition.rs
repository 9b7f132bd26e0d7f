//! Acquisition strategies backed by the simulator

use crate::SimulatedPlatform;
use async_trait::async_trait;
use caseflow_config::ConnectionParams;
use caseflow_session::AcquisitionStrategy;
use caseflow_types::{PlatformError, PlatformResult, WorkflowPlatform};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Hands out a shared simulated platform
pub struct SimulatedAcquisition {
    platform: Arc<SimulatedPlatform>,
}

impl SimulatedAcquisition {
    pub fn new(platform: Arc<SimulatedPlatform>) -> Self {
        Self { platform }
    }
}

#[async_trait]
impl AcquisitionStrategy for SimulatedAcquisition {
    fn name(&self) -> &str {
        "simulated"
    }

    async fn acquire(&self, params: &ConnectionParams) -> PlatformResult<Arc<dyn WorkflowPlatform>> {
        tracing::debug!(username = %params.username, "Connecting to simulated platform");
        Ok(Arc::clone(&self.platform) as Arc<dyn WorkflowPlatform>)
    }
}

/// Always fails; counts how often it was tried
pub struct FailingAcquisition {
    name: String,
    attempts: AtomicU32,
}

impl FailingAcquisition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attempts: AtomicU32::new(0),
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AcquisitionStrategy for FailingAcquisition {
    fn name(&self) -> &str {
        &self.name
    }

    async fn acquire(&self, _params: &ConnectionParams) -> PlatformResult<Arc<dyn WorkflowPlatform>> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(PlatformError::Unavailable(format!(
            "{} cannot reach the platform",
            self.name
        )))
    }
}
