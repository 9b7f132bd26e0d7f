//! Caseflow domain types
//!
//! Caseflow drives an external identity-governance platform's workflow
//! engine from the outside. It never interprets workflows itself: it
//! launches them, observes the state the engine exposes, and completes the
//! human work the engine hands out.
//!
//! # Key Concepts
//!
//! - **WorkflowCase**: one running or completed workflow instance owned by
//!   the external engine. Its completion status is absent while running.
//! - **WorkItem**: a unit of human work (a form or an approval) generated
//!   by a running case. Pending until finished, never revisited after.
//! - **ApprovalSet**: the line entries of an approval item, each approved
//!   or rejected individually.
//! - **WorkflowPlatform**: the interface to the external engine. Everything
//!   caseflow knows about a case comes through this trait.
//!
//! # Design Principles
//!
//! 1. The external engine owns all persisted state. Caseflow only reads it
//!    and submits mutations inside transactions.
//! 2. Completion status is monotonic: once a case is terminal it stays
//!    terminal.
//! 3. A finished work item is immutable.

#![deny(unsafe_code)]

mod case;
mod errors;
mod platform;
mod work_item;

pub use case::*;
pub use errors::*;
pub use platform::*;
pub use work_item::*;
