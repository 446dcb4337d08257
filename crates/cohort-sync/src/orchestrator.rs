//! Sync orchestrator.
//!
//! Drives a run end to end: resolve the endpoint secret (fail-fast),
//! enumerate eligible groups, slice the batch, and for each group fetch
//! and reconcile every OU. Failure scope narrows as the run progresses:
//! a configuration or store-enumeration failure aborts the run, a feed
//! failure skips one OU, an apply failure skips one entry. Enroll and
//! unenroll decisions are written to the audit sink; role and OU
//! corrections are not.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};

use cohort_connector::RosterSource;
use cohort_core::{
    new_membership, reconcile, AuditEntry, AuditSink, Group, Membership, MembershipDelta,
    MembershipStore, OrgUnitId, RoleMap, RosterEntry, SecretProvider, StoreError, StoreResult,
    User, UserDirectory,
};

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::report::SyncReport;
use crate::snapshot::parse_snapshot;

/// Cooperative cancellation handle for a running batch.
///
/// Checked between groups, never mid-OU, so cancellation cannot leave a
/// group half-reconciled. The flag is cleared when a new run starts, so
/// a cancellation affects at most the run in flight and the next
/// scheduled run proceeds normally.
#[derive(Clone, Debug, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// Create an unraised flag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request that the current run stop at the next group boundary.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Orchestrates roster reconciliation across groups.
pub struct SyncOrchestrator {
    source: Arc<dyn RosterSource>,
    store: Arc<dyn MembershipStore>,
    directory: Arc<dyn UserDirectory>,
    audit: Arc<dyn AuditSink>,
    secrets: Arc<dyn SecretProvider>,
    config: SyncConfig,
    roles: RoleMap,
    cancel: CancelFlag,
    // Held for the duration of a run; try_lock makes overlap an error
    // instead of a queue.
    running: Mutex<()>,
}

impl SyncOrchestrator {
    /// Create an orchestrator over the given collaborators.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        source: Arc<dyn RosterSource>,
        store: Arc<dyn MembershipStore>,
        directory: Arc<dyn UserDirectory>,
        audit: Arc<dyn AuditSink>,
        secrets: Arc<dyn SecretProvider>,
        config: SyncConfig,
        roles: RoleMap,
    ) -> SyncResult<Self> {
        config.validate()?;
        Ok(Self {
            source,
            store,
            directory,
            audit,
            secrets,
            config,
            roles,
            cancel: CancelFlag::new(),
            running: Mutex::new(()),
        })
    }

    /// Handle for cancelling the current or next run.
    #[must_use]
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Run one sync batch.
    ///
    /// `offset` and `limit` slice the eligible-group list (sorted
    /// most-recently-changed first); `limit` defaults to the configured
    /// batch limit. An offset past the end of the list processes zero
    /// groups and succeeds.
    #[instrument(skip(self))]
    pub async fn run_sync(
        &self,
        offset: Option<usize>,
        limit: Option<usize>,
    ) -> SyncResult<SyncReport> {
        let _guard = self
            .running
            .try_lock()
            .map_err(|_| SyncError::AlreadyRunning)?;
        self.cancel.reset();
        let started = Instant::now();

        // Resolve the endpoint secret before touching any group, so a
        // misconfigured deployment fails without side effects.
        self.resolve_endpoint().await?;

        let groups = self.store.list_eligible_groups().await?;
        let offset = offset.unwrap_or(0);
        let limit = limit.unwrap_or(self.config.batch_limit);
        let batch: Vec<Group> = groups.into_iter().skip(offset).take(limit).collect();

        info!(
            batch = batch.len(),
            offset, limit, "Starting roster sync run"
        );

        let mut report = SyncReport::default();
        for group in &batch {
            if self.cancel.is_cancelled() {
                warn!(
                    groups_processed = report.groups_processed,
                    "Sync run cancelled between groups"
                );
                report.cancelled = true;
                break;
            }
            self.sync_group(group, &mut report).await?;
            report.groups_processed += 1;
        }

        report.duration_ms = duration_ms(started);
        info!(
            groups = report.groups_processed,
            enrolled = report.enrolled,
            unenrolled = report.unenrolled,
            role_updates = report.role_updates,
            ous_skipped = report.ous_skipped,
            duration_ms = report.duration_ms,
            "Roster sync run finished"
        );
        Ok(report)
    }

    /// Apply a caller-supplied roster dump across every eligible group.
    ///
    /// Entries are bucketed by their `OrgDefinedId`; each eligible group
    /// whose OU list contains a bucketed OU is reconciled against that
    /// bucket, with no batch slicing. No feed traffic is generated, so
    /// the endpoint secret is not resolved.
    #[instrument(skip(self, roster_json))]
    pub async fn sync_from_snapshot(&self, roster_json: &str) -> SyncResult<SyncReport> {
        let _guard = self
            .running
            .try_lock()
            .map_err(|_| SyncError::AlreadyRunning)?;
        let started = Instant::now();

        let buckets = parse_snapshot(roster_json)?;
        let groups = self.store.list_eligible_groups().await?;

        info!(
            ous = buckets.len(),
            groups = groups.len(),
            "Starting snapshot sync"
        );

        let mut report = SyncReport::default();
        for group in &groups {
            let mut members = self.store.members(group.id).await?;
            let mut touched = false;
            for ou in &group.org_units {
                let Some(roster) = buckets.get(ou) else {
                    continue;
                };
                touched = true;
                let delta = reconcile(ou, &members, roster, &self.roles);
                self.apply_delta(group, ou, delta, &mut members, &mut report)
                    .await;
            }
            if touched {
                report.groups_processed += 1;
            }
        }

        report.duration_ms = duration_ms(started);
        info!(
            groups = report.groups_processed,
            enrolled = report.enrolled,
            unenrolled = report.unenrolled,
            "Snapshot sync finished"
        );
        Ok(report)
    }

    async fn resolve_endpoint(&self) -> SyncResult<()> {
        let secret = self
            .secrets
            .get_secret(&self.config.endpoint_secret)
            .await
            .map_err(|e| {
                SyncError::configuration(format!(
                    "endpoint secret '{}' unavailable: {e}",
                    self.config.endpoint_secret
                ))
            })?;
        let value = secret.as_str().map_err(|e| {
            SyncError::configuration(format!(
                "endpoint secret '{}' unusable: {e}",
                self.config.endpoint_secret
            ))
        })?;
        if value.trim().is_empty() {
            return Err(SyncError::configuration(format!(
                "endpoint secret '{}' is empty",
                self.config.endpoint_secret
            )));
        }
        debug!(provider = self.secrets.provider_type(), "Endpoint resolved");
        Ok(())
    }

    /// Reconcile one group across all of its OUs.
    async fn sync_group(&self, group: &Group, report: &mut SyncReport) -> SyncResult<()> {
        let members = self.store.members(group.id).await?;

        // Memberships recorded under an OU the group no longer lists are
        // removed before any fetch, so an edited OU list cleans up even
        // while the feed is down.
        let (mut members, stale): (Vec<Membership>, Vec<Membership>) = members
            .into_iter()
            .partition(|m| group.org_units.contains(&m.org_unit));
        for member in stale {
            match self.store.remove_member(group.id, member.user_id).await {
                Ok(()) => {
                    report.unenrolled += 1;
                    self.record_audit(group, &member.org_unit, &member.username, false)
                        .await;
                }
                Err(e) => warn!(
                    group_id = %group.id,
                    user = %member.username,
                    error = %e,
                    "Failed to remove membership for dropped OU"
                ),
            }
        }

        for ou in &group.org_units {
            let roster = match self.source.fetch_roster(ou).await {
                Ok(roster) => roster,
                Err(e) => {
                    // Permanent failures (bad credentials, missing OU)
                    // need operator attention; transient ones resolve on
                    // a later run.
                    if e.is_permanent() {
                        error!(
                            group_id = %group.id,
                            ou = %ou,
                            error = %e,
                            "Roster fetch failed; skipping OU"
                        );
                    } else {
                        warn!(
                            group_id = %group.id,
                            ou = %ou,
                            error = %e,
                            "Roster fetch failed; skipping OU"
                        );
                    }
                    report.ous_skipped += 1;
                    continue;
                }
            };

            let delta = reconcile(ou, &members, &roster, &self.roles);
            if delta.is_empty() {
                debug!(group_id = %group.id, ou = %ou, "No membership drift");
                continue;
            }
            self.apply_delta(group, ou, delta, &mut members, report)
                .await;
        }

        Ok(())
    }

    /// Apply one delta against the store, keeping the in-memory member
    /// mirror consistent so later OUs of the same group see the result.
    /// Per-entry failures are logged and skipped.
    async fn apply_delta(
        &self,
        group: &Group,
        ou: &OrgUnitId,
        delta: MembershipDelta,
        members: &mut Vec<Membership>,
        report: &mut SyncReport,
    ) {
        for member in delta.to_unenroll {
            match self.store.remove_member(group.id, member.user_id).await {
                Ok(()) => {
                    members.retain(|m| m.user_id != member.user_id);
                    report.unenrolled += 1;
                    self.record_audit(group, ou, &member.username, false).await;
                }
                Err(e) => warn!(
                    group_id = %group.id,
                    user = %member.username,
                    error = %e,
                    "Failed to unenroll member"
                ),
            }
        }

        for update in delta.to_update {
            if let Some(role) = update.role {
                if self.config.apply_role_updates {
                    match self
                        .store
                        .set_member_role(group.id, update.user_id, role)
                        .await
                    {
                        Ok(()) => {
                            if let Some(m) =
                                members.iter_mut().find(|m| m.user_id == update.user_id)
                            {
                                m.role = role;
                            }
                            report.role_updates += 1;
                        }
                        Err(e) => warn!(
                            group_id = %group.id,
                            user = %update.username,
                            error = %e,
                            "Failed to update member role"
                        ),
                    }
                } else {
                    debug!(
                        group_id = %group.id,
                        user = %update.username,
                        role = %role,
                        "Role drift detected; updates disabled"
                    );
                }
            }

            if let Some(new_ou) = update.org_unit {
                if self.config.update_org_unit {
                    match self
                        .store
                        .set_member_org_unit(group.id, update.user_id, new_ou.clone())
                        .await
                    {
                        Ok(()) => {
                            if let Some(m) =
                                members.iter_mut().find(|m| m.user_id == update.user_id)
                            {
                                m.org_unit = new_ou;
                            }
                        }
                        Err(e) => warn!(
                            group_id = %group.id,
                            user = %update.username,
                            error = %e,
                            "Failed to update member org unit"
                        ),
                    }
                }
            }
        }

        for enrollment in delta.to_enroll {
            let user = match self.resolve_user(&enrollment.entry).await {
                Ok(user) => user,
                Err(e) => {
                    warn!(
                        group_id = %group.id,
                        user = %enrollment.entry.username,
                        error = %e,
                        "Failed to resolve user for enrollment"
                    );
                    continue;
                }
            };

            // Two roster usernames can resolve to one account via email.
            if members.iter().any(|m| m.user_id == user.id) {
                debug!(
                    group_id = %group.id,
                    user = %enrollment.entry.username,
                    "Account already a member under another roster entry"
                );
                continue;
            }

            let row = new_membership(
                group.id,
                user.id,
                &enrollment.entry.username,
                enrollment.org_unit.clone(),
                enrollment.role,
            );
            match self.store.add_member(row.clone()).await {
                Ok(()) => {
                    members.push(row);
                    report.enrolled += 1;
                    self.record_audit(group, ou, &enrollment.entry.username, true)
                        .await;
                }
                Err(StoreError::Conflict { message }) => {
                    debug!(
                        group_id = %group.id,
                        user = %enrollment.entry.username,
                        %message,
                        "Enrollment skipped"
                    );
                }
                Err(e) => warn!(
                    group_id = %group.id,
                    user = %enrollment.entry.username,
                    error = %e,
                    "Failed to enroll member"
                ),
            }
        }
    }

    /// Resolve a roster entry to a local account: username first, email
    /// second, provision on miss.
    async fn resolve_user(&self, entry: &RosterEntry) -> StoreResult<User> {
        if let Some(user) = self.directory.find_by_username(&entry.username).await? {
            return Ok(user);
        }
        if let Some(email) = entry.email.as_deref() {
            if let Some(user) = self.directory.find_by_email(email).await? {
                return Ok(user);
            }
        }
        let email = entry.email.as_deref().unwrap_or_default();
        info!(user = %entry.username, "Provisioning account for roster entry");
        self.directory.create_user(&entry.username, email).await
    }

    /// Record an enroll/unenroll decision. Sink failures are logged and
    /// never roll back the mutation that triggered them.
    async fn record_audit(&self, group: &Group, ou: &OrgUnitId, username: &str, enrolled: bool) {
        let entry = AuditEntry::new(group.name.clone(), ou.clone(), username, enrolled);
        if let Err(e) = self.audit.record(entry).await {
            error!(
                group = %group.name,
                user = username,
                error = %e,
                "Failed to record audit entry"
            );
        }
    }
}

#[allow(clippy::cast_possible_truncation)]
fn duration_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}
