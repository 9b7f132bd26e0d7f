//! Session manager for caseflow
//!
//! Owns the single live handle to the external workflow platform and is the
//! only way the rest of caseflow talks to it:
//!
//! - **Exclusive access**: every operation takes the session lock, so no two
//!   transactions ever run against the handle concurrently. The lock blocks
//!   without a timeout; a stuck operation stalls later callers.
//! - **Transactions**: [`SessionManager::execute`] brackets an operation in
//!   begin/commit or begin/rollback depending on [`TxMode`] and the
//!   environment's rollback policy.
//! - **Caching**: [`SessionManager::resolve_cached`] memoizes named object
//!   lookups through an [`ObjectCache`]. Outside development profiles the
//!   cache is a no-op.
//! - **Statistics**: per-operation counters, used for diagnostics only.
//!
//! Handles are obtained at setup through an ordered list of
//! [`AcquisitionStrategy`] values; the first one that succeeds wins.

#![deny(unsafe_code)]

mod acquisition;
mod cache;
mod error;
mod manager;
mod stats;

pub use acquisition::AcquisitionStrategy;
pub use cache::{DisabledCache, InMemoryCache, ObjectCache};
pub use error::{SessionError, SessionResult};
pub use manager::{SessionManager, TxMode, ValidationReport};
pub use stats::SessionStats;
