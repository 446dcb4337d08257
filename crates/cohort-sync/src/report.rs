//! Run statistics.

use serde::Serialize;

/// Summary of one sync run.
///
/// A run that returns `Ok` succeeded even if individual OUs were skipped
/// or entries failed to apply; those show up in the counters and the log,
/// not as errors.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncReport {
    /// Groups the run reconciled.
    pub groups_processed: usize,
    /// New memberships created.
    pub enrolled: usize,
    /// Memberships removed.
    pub unenrolled: usize,
    /// Role corrections applied to existing members.
    pub role_updates: usize,
    /// OUs skipped because their roster fetch failed.
    pub ous_skipped: usize,
    /// Whether the run stopped early on a cancellation request. Groups
    /// processed before the stop keep their counters.
    pub cancelled: bool,
    /// Wall-clock duration of the run.
    pub duration_ms: u64,
}

impl SyncReport {
    /// Whether the run changed any membership state.
    #[must_use]
    pub fn changed_anything(&self) -> bool {
        self.enrolled > 0 || self.unenrolled > 0 || self.role_updates > 0
    }
}
