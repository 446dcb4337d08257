//! Roster sync orchestration.
//!
//! Ties the diff engine and the feed connector together: enumerates
//! eligible groups, slices them into batches, fetches each OU's roster,
//! reconciles, applies the delta through the membership store, and
//! records enroll/unenroll decisions in the audit log. Also supports
//! one-shot reconciliation from a caller-supplied roster dump.

pub mod config;
pub mod error;
pub mod orchestrator;
pub mod report;
pub mod snapshot;

pub use config::SyncConfig;
pub use error::{SyncError, SyncResult};
pub use orchestrator::{CancelFlag, SyncOrchestrator};
pub use report::SyncReport;
pub use snapshot::parse_snapshot;
