//! Simulated workflow platform
//!
//! An in-memory [`WorkflowPlatform`](caseflow_types::WorkflowPlatform) that
//! runs scripted workflows. Each script is an ordered list of form and
//! approval steps; a case emits one work item per step and advances the
//! way the real engine does:
//!
//! - a finished form item only advances its case after an explicit resume
//! - a finished approval item is picked up on the next read
//! - writes are staged until commit and discarded on rollback
//!
//! Scripts can also model the engine's rough edges: a delay before the
//! next level's item becomes visible, and a case identifier that is only
//! populated after a number of reads.
//!
//! Used by the test suites and by the demo binary.

#![deny(unsafe_code)]

mod acquisition;
mod platform;
mod script;

pub use acquisition::{FailingAcquisition, SimulatedAcquisition};
pub use platform::{SimulatedPlatform, TxEvent};
pub use script::{ScriptStep, WorkflowScript};
