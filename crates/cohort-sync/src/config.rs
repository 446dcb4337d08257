//! Sync run configuration.

use serde::{Deserialize, Serialize};

use crate::error::{SyncError, SyncResult};

fn default_endpoint_secret() -> String {
    "lms_api_endpoint".to_string()
}

fn default_batch_limit() -> usize {
    5
}

fn default_true() -> bool {
    true
}

/// Configuration for the sync orchestrator.
///
/// Loaded once at construction and immutable for the orchestrator's
/// lifetime; a run never observes a config change made mid-run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Logical name of the secret holding the LMS API endpoint. Resolved
    /// once per run, before any group is touched.
    #[serde(default = "default_endpoint_secret")]
    pub endpoint_secret: String,

    /// Maximum number of groups processed per run when the caller does
    /// not pass an explicit limit.
    #[serde(default = "default_batch_limit")]
    pub batch_limit: usize,

    /// Whether role drift detected by reconciliation is written back.
    /// When `false`, role updates are computed and logged but not applied.
    #[serde(default = "default_true")]
    pub apply_role_updates: bool,

    /// Whether a member who surfaces under a different OU gets the
    /// recorded provenance OU updated to the new one.
    #[serde(default = "default_true")]
    pub update_org_unit: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            endpoint_secret: default_endpoint_secret(),
            batch_limit: default_batch_limit(),
            apply_role_updates: true,
            update_org_unit: true,
        }
    }
}

impl SyncConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> SyncResult<()> {
        if self.endpoint_secret.trim().is_empty() {
            return Err(SyncError::configuration(
                "endpoint_secret must not be empty",
            ));
        }
        if self.batch_limit == 0 {
            return Err(SyncError::configuration(
                "batch_limit must be at least 1",
            ));
        }
        Ok(())
    }
}
