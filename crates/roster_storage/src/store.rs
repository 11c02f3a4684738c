#![forbid(unsafe_code)]

use std::collections::BTreeMap;

use roster_kernel_contracts::audit::{
    AssignmentAuditEvent, AssignmentAuditEventId, AssignmentAuditEventInput, AuditAction,
    WorkerAssignmentChange,
};
use roster_kernel_contracts::org::{
    ActorId, CorrelationId, SiteId, SupervisorId, TenantId, WorkerId,
};
use roster_kernel_contracts::{
    ContractViolation, MonotonicTimeNs, ReasonCodeId, RecordStatus, SchemaVersion, Validate,
};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, PartialEq)]
pub enum StorageError {
    ForeignKeyViolation { table: &'static str, key: String },
    DuplicateKey { table: &'static str, key: String },
    AppendOnlyViolation { table: &'static str },
    TenantScopeViolation { table: &'static str, key: String },
    /// A commit's read-set no longer matches the store (the storage engine's
    /// consistency check standing in for transaction isolation).
    StaleState { table: &'static str, key: String },
    ContractViolation(ContractViolation),
}

impl From<ContractViolation> for StorageError {
    fn from(v: ContractViolation) -> Self {
        StorageError::ContractViolation(v)
    }
}

/// Deterministic evidence digest over an ordered change list. Recorded on
/// every audit event; not a security mechanism.
pub fn assignment_state_digest_hex(changes: &[WorkerAssignmentChange]) -> String {
    let mut h = Sha256::new();
    for c in changes {
        h.update(c.worker_id.as_str().as_bytes());
        h.update([0u8]);
        if let Some(s) = &c.supervisor_before {
            h.update(s.as_str().as_bytes());
        }
        h.update([0u8]);
        if let Some(s) = &c.supervisor_after {
            h.update(s.as_str().as_bytes());
        }
        h.update([0u8]);
    }
    h.finalize().iter().map(|b| format!("{b:02x}")).collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteRecord {
    pub schema_version: SchemaVersion,
    pub site_id: SiteId,
    pub tenant_id: TenantId,
    pub status: RecordStatus,
    pub created_at: MonotonicTimeNs,
}

impl SiteRecord {
    pub fn v1(
        site_id: SiteId,
        tenant_id: TenantId,
        status: RecordStatus,
        created_at: MonotonicTimeNs,
    ) -> Result<Self, ContractViolation> {
        let r = Self {
            schema_version: SchemaVersion(1),
            site_id,
            tenant_id,
            status,
            created_at,
        };
        r.validate()?;
        Ok(r)
    }
}

impl Validate for SiteRecord {
    fn validate(&self) -> Result<(), ContractViolation> {
        self.site_id.validate()?;
        self.tenant_id.validate()?;
        if self.created_at.0 == 0 {
            return Err(ContractViolation::InvalidValue {
                field: "site_record.created_at",
                reason: "must be > 0",
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisorRecord {
    pub schema_version: SchemaVersion,
    pub supervisor_id: SupervisorId,
    pub tenant_id: TenantId,
    pub status: RecordStatus,
    pub created_at: MonotonicTimeNs,
}

impl SupervisorRecord {
    pub fn v1(
        supervisor_id: SupervisorId,
        tenant_id: TenantId,
        status: RecordStatus,
        created_at: MonotonicTimeNs,
    ) -> Result<Self, ContractViolation> {
        let r = Self {
            schema_version: SchemaVersion(1),
            supervisor_id,
            tenant_id,
            status,
            created_at,
        };
        r.validate()?;
        Ok(r)
    }
}

impl Validate for SupervisorRecord {
    fn validate(&self) -> Result<(), ContractViolation> {
        self.supervisor_id.validate()?;
        self.tenant_id.validate()?;
        if self.created_at.0 == 0 {
            return Err(ContractViolation::InvalidValue {
                field: "supervisor_record.created_at",
                reason: "must be > 0",
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerRecord {
    pub schema_version: SchemaVersion,
    pub worker_id: WorkerId,
    pub tenant_id: TenantId,
    pub site_id: SiteId,
    pub supervisor_id: Option<SupervisorId>,
    pub status: RecordStatus,
    pub created_at: MonotonicTimeNs,
    pub updated_at: MonotonicTimeNs,
}

impl WorkerRecord {
    pub fn v1(
        worker_id: WorkerId,
        tenant_id: TenantId,
        site_id: SiteId,
        supervisor_id: Option<SupervisorId>,
        status: RecordStatus,
        created_at: MonotonicTimeNs,
    ) -> Result<Self, ContractViolation> {
        let r = Self {
            schema_version: SchemaVersion(1),
            worker_id,
            tenant_id,
            site_id,
            supervisor_id,
            status,
            created_at,
            updated_at: created_at,
        };
        r.validate()?;
        Ok(r)
    }
}

impl Validate for WorkerRecord {
    fn validate(&self) -> Result<(), ContractViolation> {
        self.worker_id.validate()?;
        self.tenant_id.validate()?;
        self.site_id.validate()?;
        if let Some(s) = &self.supervisor_id {
            s.validate()?;
        }
        if self.created_at.0 == 0 {
            return Err(ContractViolation::InvalidValue {
                field: "worker_record.created_at",
                reason: "must be > 0",
            });
        }
        if self.updated_at.0 < self.created_at.0 {
            return Err(ContractViolation::InvalidValue {
                field: "worker_record.updated_at",
                reason: "must be >= created_at",
            });
        }
        Ok(())
    }
}

/// Join row: one supervisor assigned to one site. Unique per pair. Deleted
/// (not soft-flagged) on removal; history lives in the audit ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisorSiteAssignmentRecord {
    pub schema_version: SchemaVersion,
    pub site_id: SiteId,
    pub supervisor_id: SupervisorId,
    pub tenant_id: TenantId,
    pub created_at: MonotonicTimeNs,
}

impl SupervisorSiteAssignmentRecord {
    pub fn v1(
        site_id: SiteId,
        supervisor_id: SupervisorId,
        tenant_id: TenantId,
        created_at: MonotonicTimeNs,
    ) -> Result<Self, ContractViolation> {
        let r = Self {
            schema_version: SchemaVersion(1),
            site_id,
            supervisor_id,
            tenant_id,
            created_at,
        };
        r.validate()?;
        Ok(r)
    }
}

impl Validate for SupervisorSiteAssignmentRecord {
    fn validate(&self) -> Result<(), ContractViolation> {
        self.site_id.validate()?;
        self.supervisor_id.validate()?;
        self.tenant_id.validate()?;
        if self.created_at.0 == 0 {
            return Err(ContractViolation::InvalidValue {
                field: "supervisor_site_assignment_record.created_at",
                reason: "must be > 0",
            });
        }
        Ok(())
    }
}

/// In-memory relational store for the assignment consistency core.
///
/// Commit methods are all-or-nothing: every input and precondition is
/// validated and the full write set staged before the first table mutation.
#[derive(Debug, Clone)]
pub struct RosterStore {
    sites: BTreeMap<SiteId, SiteRecord>,
    supervisors: BTreeMap<SupervisorId, SupervisorRecord>,
    workers: BTreeMap<WorkerId, WorkerRecord>,
    assignments: BTreeMap<(SiteId, SupervisorId), SupervisorSiteAssignmentRecord>,

    audit_events: Vec<AssignmentAuditEvent>,
    next_audit_event_id: u64,
    // (tenant_id, site_id, idempotency_key) -> deterministic no-op on retry.
    audit_idempotency_index: BTreeMap<(TenantId, SiteId, String), AssignmentAuditEventId>,

    // Replay indexes for bulk commits whose retry would otherwise observe an
    // already-converged store and report a different result.
    autoassign_replay_index: BTreeMap<(SiteId, String), (u32, Option<AssignmentAuditEventId>)>,
    assign_site_replay_index:
        BTreeMap<(SiteId, SupervisorId, String), (bool, u32, Option<AssignmentAuditEventId>)>,
    repair_replay_index: BTreeMap<(SiteId, String), (u32, Option<AssignmentAuditEventId>)>,
}

impl RosterStore {
    pub fn new_in_memory() -> Self {
        Self {
            sites: BTreeMap::new(),
            supervisors: BTreeMap::new(),
            workers: BTreeMap::new(),
            assignments: BTreeMap::new(),
            audit_events: Vec::new(),
            next_audit_event_id: 1,
            audit_idempotency_index: BTreeMap::new(),
            autoassign_replay_index: BTreeMap::new(),
            assign_site_replay_index: BTreeMap::new(),
            repair_replay_index: BTreeMap::new(),
        }
    }

    // ------------------------
    // Directory rows (sites, supervisors, workers).
    // ------------------------

    pub fn insert_site_row(&mut self, record: SiteRecord) -> Result<(), StorageError> {
        record.validate()?;
        if self.sites.contains_key(&record.site_id) {
            return Err(StorageError::DuplicateKey {
                table: "sites",
                key: record.site_id.as_str().to_string(),
            });
        }
        self.sites.insert(record.site_id.clone(), record);
        Ok(())
    }

    pub fn insert_supervisor_row(&mut self, record: SupervisorRecord) -> Result<(), StorageError> {
        record.validate()?;
        if self.supervisors.contains_key(&record.supervisor_id) {
            return Err(StorageError::DuplicateKey {
                table: "supervisors",
                key: record.supervisor_id.as_str().to_string(),
            });
        }
        self.supervisors.insert(record.supervisor_id.clone(), record);
        Ok(())
    }

    pub fn insert_worker_row(&mut self, record: WorkerRecord) -> Result<(), StorageError> {
        record.validate()?;
        if self.workers.contains_key(&record.worker_id) {
            return Err(StorageError::DuplicateKey {
                table: "workers",
                key: record.worker_id.as_str().to_string(),
            });
        }
        let site = self
            .sites
            .get(&record.site_id)
            .ok_or_else(|| StorageError::ForeignKeyViolation {
                table: "sites",
                key: record.site_id.as_str().to_string(),
            })?;
        if site.tenant_id != record.tenant_id {
            return Err(StorageError::TenantScopeViolation {
                table: "workers",
                key: record.worker_id.as_str().to_string(),
            });
        }
        if let Some(sup_id) = &record.supervisor_id {
            let sup = self.supervisors.get(sup_id).ok_or_else(|| {
                StorageError::ForeignKeyViolation {
                    table: "supervisors",
                    key: sup_id.as_str().to_string(),
                }
            })?;
            if sup.tenant_id != record.tenant_id {
                return Err(StorageError::TenantScopeViolation {
                    table: "workers",
                    key: record.worker_id.as_str().to_string(),
                });
            }
        }
        self.workers.insert(record.worker_id.clone(), record);
        Ok(())
    }

    pub fn site_row(&self, site_id: &SiteId) -> Option<&SiteRecord> {
        self.sites.get(site_id)
    }

    pub fn supervisor_row(&self, supervisor_id: &SupervisorId) -> Option<&SupervisorRecord> {
        self.supervisors.get(supervisor_id)
    }

    pub fn worker_row(&self, worker_id: &WorkerId) -> Option<&WorkerRecord> {
        self.workers.get(worker_id)
    }

    pub fn supervisor_set_status(
        &mut self,
        supervisor_id: &SupervisorId,
        status: RecordStatus,
    ) -> Result<(), StorageError> {
        let sup = self.supervisors.get_mut(supervisor_id).ok_or_else(|| {
            StorageError::ForeignKeyViolation {
                table: "supervisors",
                key: supervisor_id.as_str().to_string(),
            }
        })?;
        sup.status = status;
        Ok(())
    }

    // ------------------------
    // Supervisor-site assignment rows.
    // ------------------------

    pub fn insert_assignment_row(
        &mut self,
        record: SupervisorSiteAssignmentRecord,
    ) -> Result<(), StorageError> {
        record.validate()?;
        let key = (record.site_id.clone(), record.supervisor_id.clone());
        if self.assignments.contains_key(&key) {
            return Err(StorageError::DuplicateKey {
                table: "supervisor_site_assignments",
                key: format!(
                    "{}:{}",
                    record.site_id.as_str(),
                    record.supervisor_id.as_str()
                ),
            });
        }
        let site = self
            .sites
            .get(&record.site_id)
            .ok_or_else(|| StorageError::ForeignKeyViolation {
                table: "sites",
                key: record.site_id.as_str().to_string(),
            })?;
        let sup = self.supervisors.get(&record.supervisor_id).ok_or_else(|| {
            StorageError::ForeignKeyViolation {
                table: "supervisors",
                key: record.supervisor_id.as_str().to_string(),
            }
        })?;
        if site.tenant_id != record.tenant_id || sup.tenant_id != record.tenant_id {
            return Err(StorageError::TenantScopeViolation {
                table: "supervisor_site_assignments",
                key: format!(
                    "{}:{}",
                    record.site_id.as_str(),
                    record.supervisor_id.as_str()
                ),
            });
        }
        self.assignments.insert(key, record);
        Ok(())
    }

    pub fn delete_assignment_row(
        &mut self,
        site_id: &SiteId,
        supervisor_id: &SupervisorId,
    ) -> Result<(), StorageError> {
        let key = (site_id.clone(), supervisor_id.clone());
        if self.assignments.remove(&key).is_none() {
            return Err(StorageError::ForeignKeyViolation {
                table: "supervisor_site_assignments",
                key: format!("{}:{}", site_id.as_str(), supervisor_id.as_str()),
            });
        }
        Ok(())
    }

    pub fn assignment_row(
        &self,
        site_id: &SiteId,
        supervisor_id: &SupervisorId,
    ) -> Option<&SupervisorSiteAssignmentRecord> {
        self.assignments
            .get(&(site_id.clone(), supervisor_id.clone()))
    }

    /// Count of assignment rows for the site whose supervisor is active.
    /// This is the count every invariant in the core is phrased against.
    pub fn active_assignment_count(&self, site_id: &SiteId) -> u32 {
        self.active_supervisors_for_site(site_id).len() as u32
    }

    /// Active supervisors assigned to the site, ascending by identifier.
    pub fn active_supervisors_for_site(&self, site_id: &SiteId) -> Vec<SupervisorId> {
        self.assignments
            .keys()
            .filter(|(s, _)| s == site_id)
            .filter(|(_, sup_id)| {
                self.supervisors
                    .get(sup_id)
                    .is_some_and(|s| s.status == RecordStatus::Active)
            })
            .map(|(_, sup_id)| sup_id.clone())
            .collect()
    }

    pub fn sites_assigned_to_supervisor(&self, supervisor_id: &SupervisorId) -> Vec<SiteId> {
        self.assignments
            .keys()
            .filter(|(_, sup_id)| sup_id == supervisor_id)
            .map(|(site_id, _)| site_id.clone())
            .collect()
    }

    // ------------------------
    // Worker queries.
    // ------------------------

    pub fn active_workers_in_site(&self, site_id: &SiteId) -> Vec<&WorkerRecord> {
        self.workers
            .values()
            .filter(|w| &w.site_id == site_id && w.status == RecordStatus::Active)
            .collect()
    }

    pub fn active_worker_count_in_site_for(
        &self,
        site_id: &SiteId,
        supervisor_id: &SupervisorId,
    ) -> u32 {
        self.workers
            .values()
            .filter(|w| {
                &w.site_id == site_id
                    && w.status == RecordStatus::Active
                    && w.supervisor_id.as_ref() == Some(supervisor_id)
            })
            .count() as u32
    }

    pub fn active_unassigned_worker_ids_in_site(&self, site_id: &SiteId) -> Vec<WorkerId> {
        self.workers
            .values()
            .filter(|w| {
                &w.site_id == site_id
                    && w.status == RecordStatus::Active
                    && w.supervisor_id.is_none()
            })
            .map(|w| w.worker_id.clone())
            .collect()
    }

    pub fn active_worker_ids_in_site_referencing(
        &self,
        site_id: &SiteId,
        supervisor_id: &SupervisorId,
    ) -> Vec<WorkerId> {
        self.workers
            .values()
            .filter(|w| {
                &w.site_id == site_id
                    && w.status == RecordStatus::Active
                    && w.supervisor_id.as_ref() == Some(supervisor_id)
            })
            .map(|w| w.worker_id.clone())
            .collect()
    }

    // ------------------------
    // Gated worker mutations. Callers run the assignment validator first;
    // these enforce referential and tenant integrity only.
    // ------------------------

    pub fn worker_set_supervisor(
        &mut self,
        worker_id: &WorkerId,
        supervisor_id: Option<SupervisorId>,
        now: MonotonicTimeNs,
    ) -> Result<(), StorageError> {
        let tenant_id = self
            .workers
            .get(worker_id)
            .ok_or_else(|| StorageError::ForeignKeyViolation {
                table: "workers",
                key: worker_id.as_str().to_string(),
            })?
            .tenant_id
            .clone();
        if let Some(sup_id) = &supervisor_id {
            let sup = self.supervisors.get(sup_id).ok_or_else(|| {
                StorageError::ForeignKeyViolation {
                    table: "supervisors",
                    key: sup_id.as_str().to_string(),
                }
            })?;
            if sup.tenant_id != tenant_id {
                return Err(StorageError::TenantScopeViolation {
                    table: "workers",
                    key: worker_id.as_str().to_string(),
                });
            }
        }
        let worker = self
            .workers
            .get_mut(worker_id)
            .expect("worker presence checked in read-set");
        worker.supervisor_id = supervisor_id;
        worker.updated_at = now;
        Ok(())
    }

    pub fn worker_move_site(
        &mut self,
        worker_id: &WorkerId,
        new_site_id: &SiteId,
        supervisor_id: Option<SupervisorId>,
        now: MonotonicTimeNs,
    ) -> Result<(), StorageError> {
        let tenant_id = self
            .workers
            .get(worker_id)
            .ok_or_else(|| StorageError::ForeignKeyViolation {
                table: "workers",
                key: worker_id.as_str().to_string(),
            })?
            .tenant_id
            .clone();
        let site = self
            .sites
            .get(new_site_id)
            .ok_or_else(|| StorageError::ForeignKeyViolation {
                table: "sites",
                key: new_site_id.as_str().to_string(),
            })?;
        if site.tenant_id != tenant_id {
            return Err(StorageError::TenantScopeViolation {
                table: "workers",
                key: worker_id.as_str().to_string(),
            });
        }
        if let Some(sup_id) = &supervisor_id {
            let sup = self.supervisors.get(sup_id).ok_or_else(|| {
                StorageError::ForeignKeyViolation {
                    table: "supervisors",
                    key: sup_id.as_str().to_string(),
                }
            })?;
            if sup.tenant_id != tenant_id {
                return Err(StorageError::TenantScopeViolation {
                    table: "workers",
                    key: worker_id.as_str().to_string(),
                });
            }
        }
        let worker = self
            .workers
            .get_mut(worker_id)
            .expect("worker presence checked in read-set");
        worker.site_id = new_site_id.clone();
        worker.supervisor_id = supervisor_id;
        worker.updated_at = now;
        Ok(())
    }

    /// Status flips never touch the supervisor reference: an inactive
    /// worker's reference is preserved history.
    pub fn worker_set_status(
        &mut self,
        worker_id: &WorkerId,
        status: RecordStatus,
        now: MonotonicTimeNs,
    ) -> Result<(), StorageError> {
        let worker = self.workers.get_mut(worker_id).ok_or_else(|| {
            StorageError::ForeignKeyViolation {
                table: "workers",
                key: worker_id.as_str().to_string(),
            }
        })?;
        worker.status = status;
        worker.updated_at = now;
        Ok(())
    }

    // ------------------------
    // Audit ledger (append-only).
    // ------------------------

    pub fn append_audit_event(
        &mut self,
        input: AssignmentAuditEventInput,
    ) -> Result<AssignmentAuditEventId, StorageError> {
        input.validate()?;

        if let Some(k) = &input.idempotency_key {
            let idx = (input.tenant_id.clone(), input.site_id.clone(), k.clone());
            if let Some(existing) = self.audit_idempotency_index.get(&idx) {
                // Deterministic no-op on retry: return the original event_id.
                return Ok(*existing);
            }
        }

        let event_id = AssignmentAuditEventId(self.next_audit_event_id);
        self.next_audit_event_id = self.next_audit_event_id.saturating_add(1);

        let digest = assignment_state_digest_hex(&input.changes);
        let ev = AssignmentAuditEvent::from_input_v1(event_id, digest, input)?;

        if let Some(k) = &ev.idempotency_key {
            self.audit_idempotency_index.insert(
                (ev.tenant_id.clone(), ev.site_id.clone(), k.clone()),
                ev.event_id,
            );
        }

        self.audit_events.push(ev);
        Ok(event_id)
    }

    /// Test probe: the ledger accepts no in-place writes.
    pub fn attempt_overwrite_audit_event(
        &mut self,
        _event_id: AssignmentAuditEventId,
    ) -> Result<(), StorageError> {
        Err(StorageError::AppendOnlyViolation {
            table: "assignment_audit_events",
        })
    }

    pub fn audit_rows(&self) -> &[AssignmentAuditEvent] {
        &self.audit_events
    }

    pub fn audit_rows_by_site(&self, site_id: &SiteId) -> Vec<&AssignmentAuditEvent> {
        self.audit_events
            .iter()
            .filter(|e| &e.site_id == site_id)
            .collect()
    }

    pub fn audit_rows_by_tenant(&self, tenant_id: &TenantId) -> Vec<&AssignmentAuditEvent> {
        self.audit_events
            .iter()
            .filter(|e| &e.tenant_id == tenant_id)
            .collect()
    }

    pub fn audit_rows_by_actor(&self, actor: &ActorId) -> Vec<&AssignmentAuditEvent> {
        self.audit_events
            .iter()
            .filter(|e| &e.actor == actor)
            .collect()
    }

    pub fn audit_rows_by_action(&self, action: AuditAction) -> Vec<&AssignmentAuditEvent> {
        self.audit_events
            .iter()
            .filter(|e| e.action == action)
            .collect()
    }

    // ------------------------
    // Bulk assignment commits. Each is one atomic transaction: validate the
    // full read-set, stage the audit event, then apply the write-set.
    // ------------------------

    fn site_tenant(&self, site_id: &SiteId) -> Result<TenantId, StorageError> {
        Ok(self
            .sites
            .get(site_id)
            .ok_or_else(|| StorageError::ForeignKeyViolation {
                table: "sites",
                key: site_id.as_str().to_string(),
            })?
            .tenant_id
            .clone())
    }

    fn verify_changes_match_store(
        &self,
        site_id: &SiteId,
        changes: &[WorkerAssignmentChange],
    ) -> Result<(), StorageError> {
        for c in changes {
            let worker = self.workers.get(&c.worker_id).ok_or_else(|| {
                StorageError::ForeignKeyViolation {
                    table: "workers",
                    key: c.worker_id.as_str().to_string(),
                }
            })?;
            if &worker.site_id != site_id
                || worker.status != RecordStatus::Active
                || worker.supervisor_id != c.supervisor_before
            {
                return Err(StorageError::StaleState {
                    table: "workers",
                    key: c.worker_id.as_str().to_string(),
                });
            }
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn bulk_worker_reference_commit(
        &mut self,
        action: AuditAction,
        now: MonotonicTimeNs,
        site_id: &SiteId,
        changes: Vec<WorkerAssignmentChange>,
        removed_supervisor_id: Option<SupervisorId>,
        target_supervisor_id: Option<SupervisorId>,
        actor: ActorId,
        reason_code: ReasonCodeId,
        reason: &str,
        correlation_id: CorrelationId,
        idempotency_key: Option<String>,
    ) -> Result<(u32, Option<AssignmentAuditEventId>), StorageError> {
        let tenant_id = self.site_tenant(site_id)?;
        if changes.is_empty() {
            return Ok((0, None));
        }
        self.verify_changes_match_store(site_id, &changes)?;

        let updates: Vec<(WorkerId, Option<SupervisorId>)> = changes
            .iter()
            .map(|c| (c.worker_id.clone(), c.supervisor_after.clone()))
            .collect();
        let affected = changes.len() as u32;

        let input = AssignmentAuditEventInput::v1(
            now,
            tenant_id,
            site_id.clone(),
            action,
            actor,
            reason_code,
            reason.to_string(),
            removed_supervisor_id,
            target_supervisor_id,
            changes,
            correlation_id,
            idempotency_key,
        )?;
        let event_id = self.append_audit_event(input)?;

        for (worker_id, supervisor_after) in updates {
            let worker = self
                .workers
                .get_mut(&worker_id)
                .expect("worker presence verified in read-set");
            worker.supervisor_id = supervisor_after;
            worker.updated_at = now;
        }

        Ok((affected, Some(event_id)))
    }

    /// First-supervisor sweep: every active, unassigned worker in the site
    /// gets `target_supervisor_id`. One audit event for the whole sweep;
    /// no event when there is nothing to sweep.
    #[allow(clippy::too_many_arguments)]
    pub fn auto_assign_unassigned_workers_commit(
        &mut self,
        now: MonotonicTimeNs,
        site_id: &SiteId,
        target_supervisor_id: &SupervisorId,
        actor: ActorId,
        correlation_id: CorrelationId,
        idempotency_key: Option<String>,
    ) -> Result<(u32, Option<AssignmentAuditEventId>), StorageError> {
        const AUTO_ASSIGN_SWEEP: ReasonCodeId = ReasonCodeId(0x4141_0001);

        if let Some(k) = &idempotency_key {
            if let Some(replay) = self
                .autoassign_replay_index
                .get(&(site_id.clone(), k.clone()))
            {
                return Ok(*replay);
            }
        }

        let target = self.supervisors.get(target_supervisor_id).ok_or_else(|| {
            StorageError::ForeignKeyViolation {
                table: "supervisors",
                key: target_supervisor_id.as_str().to_string(),
            }
        })?;
        if target.status != RecordStatus::Active {
            return Err(StorageError::StaleState {
                table: "supervisors",
                key: target_supervisor_id.as_str().to_string(),
            });
        }

        let mut changes = Vec::new();
        for worker_id in self.active_unassigned_worker_ids_in_site(site_id) {
            changes.push(WorkerAssignmentChange::v1(
                worker_id,
                None,
                Some(target_supervisor_id.clone()),
            )?);
        }

        let result = self.bulk_worker_reference_commit(
            AuditAction::AutoAssign,
            now,
            site_id,
            changes,
            None,
            Some(target_supervisor_id.clone()),
            actor,
            AUTO_ASSIGN_SWEEP,
            "first supervisor added to site",
            correlation_id,
            idempotency_key.clone(),
        )?;

        if let Some(k) = idempotency_key {
            self.autoassign_replay_index
                .insert((site_id.clone(), k), result);
        }
        Ok(result)
    }

    /// Last-supervisor clear: the removed supervisor's workers in the site
    /// drop to a null reference and the assignment row is deleted, in one
    /// transaction. Fails closed when another active supervisor remains.
    #[allow(clippy::too_many_arguments)]
    pub fn site_removal_clear_commit(
        &mut self,
        now: MonotonicTimeNs,
        site_id: &SiteId,
        removed_supervisor_id: &SupervisorId,
        actor: ActorId,
        correlation_id: CorrelationId,
        idempotency_key: Option<String>,
    ) -> Result<(u32, Option<AssignmentAuditEventId>), StorageError> {
        const AUTO_UNASSIGN_LAST: ReasonCodeId = ReasonCodeId(0x524D_0001);

        if self
            .assignment_row(site_id, removed_supervisor_id)
            .is_none()
        {
            return Err(StorageError::ForeignKeyViolation {
                table: "supervisor_site_assignments",
                key: format!("{}:{}", site_id.as_str(), removed_supervisor_id.as_str()),
            });
        }
        let remaining: Vec<SupervisorId> = self
            .active_supervisors_for_site(site_id)
            .into_iter()
            .filter(|s| s != removed_supervisor_id)
            .collect();
        if !remaining.is_empty() {
            return Err(StorageError::StaleState {
                table: "supervisor_site_assignments",
                key: site_id.as_str().to_string(),
            });
        }

        let mut changes = Vec::new();
        for worker_id in self.active_worker_ids_in_site_referencing(site_id, removed_supervisor_id)
        {
            changes.push(WorkerAssignmentChange::v1(
                worker_id,
                Some(removed_supervisor_id.clone()),
                None,
            )?);
        }

        let result = self.bulk_worker_reference_commit(
            AuditAction::AutoUnassign,
            now,
            site_id,
            changes,
            Some(removed_supervisor_id.clone()),
            None,
            actor,
            AUTO_UNASSIGN_LAST,
            "last supervisor removed from site",
            correlation_id,
            idempotency_key,
        )?;

        self.delete_assignment_row(site_id, removed_supervisor_id)?;
        Ok(result)
    }

    /// Removal with remaining coverage: the removed supervisor's workers in
    /// the site move to `target_supervisor_id` and the assignment row is
    /// deleted, in one transaction.
    #[allow(clippy::too_many_arguments)]
    pub fn site_removal_reassign_commit(
        &mut self,
        now: MonotonicTimeNs,
        site_id: &SiteId,
        removed_supervisor_id: &SupervisorId,
        target_supervisor_id: &SupervisorId,
        actor: ActorId,
        correlation_id: CorrelationId,
        idempotency_key: Option<String>,
    ) -> Result<(u32, Option<AssignmentAuditEventId>), StorageError> {
        const AUTO_REASSIGN_LEAST_LOADED: ReasonCodeId = ReasonCodeId(0x524D_0002);

        if self
            .assignment_row(site_id, removed_supervisor_id)
            .is_none()
        {
            return Err(StorageError::ForeignKeyViolation {
                table: "supervisor_site_assignments",
                key: format!("{}:{}", site_id.as_str(), removed_supervisor_id.as_str()),
            });
        }
        let target_assigned = self
            .active_supervisors_for_site(site_id)
            .iter()
            .any(|s| s == target_supervisor_id);
        if !target_assigned || target_supervisor_id == removed_supervisor_id {
            return Err(StorageError::StaleState {
                table: "supervisor_site_assignments",
                key: format!("{}:{}", site_id.as_str(), target_supervisor_id.as_str()),
            });
        }

        let mut changes = Vec::new();
        for worker_id in self.active_worker_ids_in_site_referencing(site_id, removed_supervisor_id)
        {
            changes.push(WorkerAssignmentChange::v1(
                worker_id,
                Some(removed_supervisor_id.clone()),
                Some(target_supervisor_id.clone()),
            )?);
        }

        let result = self.bulk_worker_reference_commit(
            AuditAction::AutoReassign,
            now,
            site_id,
            changes,
            Some(removed_supervisor_id.clone()),
            Some(target_supervisor_id.clone()),
            actor,
            AUTO_REASSIGN_LEAST_LOADED,
            "supervisor removed, reassigned to least-loaded supervisor",
            correlation_id,
            idempotency_key,
        )?;

        self.delete_assignment_row(site_id, removed_supervisor_id)?;
        Ok(result)
    }

    /// Explicit repair: applies caller-computed changes for one site under a
    /// single `OrphanRepair` audit event.
    #[allow(clippy::too_many_arguments)]
    pub fn repair_site_commit(
        &mut self,
        now: MonotonicTimeNs,
        site_id: &SiteId,
        changes: Vec<WorkerAssignmentChange>,
        actor: ActorId,
        correlation_id: CorrelationId,
        idempotency_key: Option<String>,
    ) -> Result<(u32, Option<AssignmentAuditEventId>), StorageError> {
        const REPAIR_APPLIED: ReasonCodeId = ReasonCodeId(0x5250_0001);

        if let Some(k) = &idempotency_key {
            if let Some(replay) = self.repair_replay_index.get(&(site_id.clone(), k.clone())) {
                return Ok(*replay);
            }
        }

        for c in &changes {
            if let Some(sup_id) = &c.supervisor_after {
                let sup = self.supervisors.get(sup_id).ok_or_else(|| {
                    StorageError::ForeignKeyViolation {
                        table: "supervisors",
                        key: sup_id.as_str().to_string(),
                    }
                })?;
                if sup.status != RecordStatus::Active {
                    return Err(StorageError::StaleState {
                        table: "supervisors",
                        key: sup_id.as_str().to_string(),
                    });
                }
            }
        }

        let result = self.bulk_worker_reference_commit(
            AuditAction::OrphanRepair,
            now,
            site_id,
            changes,
            None,
            None,
            actor,
            REPAIR_APPLIED,
            "integrity repair applied",
            correlation_id,
            idempotency_key.clone(),
        )?;

        if let Some(k) = idempotency_key {
            self.repair_replay_index
                .insert((site_id.clone(), k), result);
        }
        Ok(result)
    }

    /// Replay record for the composite assign-to-site action; consulted and
    /// written by the auto-assignment runtime.
    pub fn assign_site_replay(
        &self,
        site_id: &SiteId,
        supervisor_id: &SupervisorId,
        idempotency_key: &str,
    ) -> Option<(bool, u32, Option<AssignmentAuditEventId>)> {
        self.assign_site_replay_index
            .get(&(
                site_id.clone(),
                supervisor_id.clone(),
                idempotency_key.to_string(),
            ))
            .copied()
    }

    pub fn record_assign_site_replay(
        &mut self,
        site_id: &SiteId,
        supervisor_id: &SupervisorId,
        idempotency_key: String,
        result: (bool, u32, Option<AssignmentAuditEventId>),
    ) {
        self.assign_site_replay_index.insert(
            (site_id.clone(), supervisor_id.clone(), idempotency_key),
            result,
        );
    }

    // ------------------------
    // Integrity-scan queries (read-only).
    // ------------------------

    fn worker_rows_filtered(
        &self,
        site_filter: Option<&SiteId>,
        pred: impl Fn(&WorkerRecord) -> bool,
    ) -> Vec<&WorkerRecord> {
        self.workers
            .values()
            .filter(|w| w.status == RecordStatus::Active)
            .filter(|w| site_filter.map_or(true, |s| &w.site_id == s))
            .filter(|w| pred(w))
            .collect()
    }

    /// Active workers with a null reference in a site that has at least one
    /// active supervisor assignment.
    pub fn orphan_worker_rows(&self, site_filter: Option<&SiteId>) -> Vec<&WorkerRecord> {
        self.worker_rows_filtered(site_filter, |w| {
            w.supervisor_id.is_none() && self.active_assignment_count(&w.site_id) >= 1
        })
    }

    /// Active workers whose referenced supervisor has no assignment row for
    /// the worker's site.
    pub fn dangling_reference_worker_rows(
        &self,
        site_filter: Option<&SiteId>,
    ) -> Vec<&WorkerRecord> {
        self.worker_rows_filtered(site_filter, |w| {
            w.supervisor_id
                .as_ref()
                .is_some_and(|sup_id| self.assignment_row(&w.site_id, sup_id).is_none())
        })
    }

    /// Active workers referencing a now-inactive supervisor. Report-only.
    pub fn inactive_supervisor_reference_worker_rows(
        &self,
        site_filter: Option<&SiteId>,
    ) -> Vec<&WorkerRecord> {
        self.worker_rows_filtered(site_filter, |w| {
            w.supervisor_id.as_ref().is_some_and(|sup_id| {
                self.supervisors
                    .get(sup_id)
                    .is_some_and(|s| s.status == RecordStatus::Inactive)
            })
        })
    }

    pub fn site_is_consistent(&self, site_id: &SiteId) -> bool {
        self.orphan_worker_rows(Some(site_id)).is_empty()
            && self.dangling_reference_worker_rows(Some(site_id)).is_empty()
            && self
                .inactive_supervisor_reference_worker_rows(Some(site_id))
                .is_empty()
    }
}
