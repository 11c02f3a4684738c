#![forbid(unsafe_code)]

use roster_kernel_contracts::audit::{
    AssignmentAuditEvent, AssignmentAuditEventId, AssignmentAuditEventInput, AuditAction,
};
use roster_kernel_contracts::org::{ActorId, SiteId, SupervisorId, TenantId, WorkerId};
use roster_kernel_contracts::RecordStatus;

use crate::store::{
    RosterStore, SiteRecord, StorageError, SupervisorRecord, SupervisorSiteAssignmentRecord,
    WorkerRecord,
};

/// Typed repository interface for directory rows (sites, supervisors, workers).
pub trait RosterDirectoryRepo {
    fn insert_site_row(&mut self, record: SiteRecord) -> Result<(), StorageError>;
    fn insert_supervisor_row(&mut self, record: SupervisorRecord) -> Result<(), StorageError>;
    fn insert_worker_row(&mut self, record: WorkerRecord) -> Result<(), StorageError>;

    fn site_row(&self, site_id: &SiteId) -> Option<&SiteRecord>;
    fn supervisor_row(&self, supervisor_id: &SupervisorId) -> Option<&SupervisorRecord>;
    fn worker_row(&self, worker_id: &WorkerId) -> Option<&WorkerRecord>;

    fn supervisor_set_status(
        &mut self,
        supervisor_id: &SupervisorId,
        status: RecordStatus,
    ) -> Result<(), StorageError>;
}

/// Typed repository interface for the supervisor-site join table.
pub trait SupervisorSiteAssignmentRepo {
    fn insert_assignment_row(
        &mut self,
        record: SupervisorSiteAssignmentRecord,
    ) -> Result<(), StorageError>;
    fn delete_assignment_row(
        &mut self,
        site_id: &SiteId,
        supervisor_id: &SupervisorId,
    ) -> Result<(), StorageError>;
    fn assignment_row(
        &self,
        site_id: &SiteId,
        supervisor_id: &SupervisorId,
    ) -> Option<&SupervisorSiteAssignmentRecord>;
    fn active_assignment_count(&self, site_id: &SiteId) -> u32;
    fn active_supervisors_for_site(&self, site_id: &SiteId) -> Vec<SupervisorId>;
    fn sites_assigned_to_supervisor(&self, supervisor_id: &SupervisorId) -> Vec<SiteId>;
}

/// Typed repository interface for append-only assignment audit persistence.
pub trait AssignmentAuditRepo {
    fn append_audit_event(
        &mut self,
        input: AssignmentAuditEventInput,
    ) -> Result<AssignmentAuditEventId, StorageError>;
    fn audit_rows(&self) -> &[AssignmentAuditEvent];
    fn audit_rows_by_site(&self, site_id: &SiteId) -> Vec<&AssignmentAuditEvent>;
    fn audit_rows_by_tenant(&self, tenant_id: &TenantId) -> Vec<&AssignmentAuditEvent>;
    fn audit_rows_by_actor(&self, actor: &ActorId) -> Vec<&AssignmentAuditEvent>;
    fn audit_rows_by_action(&self, action: AuditAction) -> Vec<&AssignmentAuditEvent>;
}

/// Typed repository interface for the read-only integrity scan.
pub trait IntegrityScanRepo {
    fn orphan_worker_rows(&self, site_filter: Option<&SiteId>) -> Vec<&WorkerRecord>;
    fn dangling_reference_worker_rows(&self, site_filter: Option<&SiteId>)
        -> Vec<&WorkerRecord>;
    fn inactive_supervisor_reference_worker_rows(
        &self,
        site_filter: Option<&SiteId>,
    ) -> Vec<&WorkerRecord>;
    fn site_is_consistent(&self, site_id: &SiteId) -> bool;
}

impl RosterDirectoryRepo for RosterStore {
    fn insert_site_row(&mut self, record: SiteRecord) -> Result<(), StorageError> {
        RosterStore::insert_site_row(self, record)
    }

    fn insert_supervisor_row(&mut self, record: SupervisorRecord) -> Result<(), StorageError> {
        RosterStore::insert_supervisor_row(self, record)
    }

    fn insert_worker_row(&mut self, record: WorkerRecord) -> Result<(), StorageError> {
        RosterStore::insert_worker_row(self, record)
    }

    fn site_row(&self, site_id: &SiteId) -> Option<&SiteRecord> {
        RosterStore::site_row(self, site_id)
    }

    fn supervisor_row(&self, supervisor_id: &SupervisorId) -> Option<&SupervisorRecord> {
        RosterStore::supervisor_row(self, supervisor_id)
    }

    fn worker_row(&self, worker_id: &WorkerId) -> Option<&WorkerRecord> {
        RosterStore::worker_row(self, worker_id)
    }

    fn supervisor_set_status(
        &mut self,
        supervisor_id: &SupervisorId,
        status: RecordStatus,
    ) -> Result<(), StorageError> {
        RosterStore::supervisor_set_status(self, supervisor_id, status)
    }
}

impl SupervisorSiteAssignmentRepo for RosterStore {
    fn insert_assignment_row(
        &mut self,
        record: SupervisorSiteAssignmentRecord,
    ) -> Result<(), StorageError> {
        RosterStore::insert_assignment_row(self, record)
    }

    fn delete_assignment_row(
        &mut self,
        site_id: &SiteId,
        supervisor_id: &SupervisorId,
    ) -> Result<(), StorageError> {
        RosterStore::delete_assignment_row(self, site_id, supervisor_id)
    }

    fn assignment_row(
        &self,
        site_id: &SiteId,
        supervisor_id: &SupervisorId,
    ) -> Option<&SupervisorSiteAssignmentRecord> {
        RosterStore::assignment_row(self, site_id, supervisor_id)
    }

    fn active_assignment_count(&self, site_id: &SiteId) -> u32 {
        RosterStore::active_assignment_count(self, site_id)
    }

    fn active_supervisors_for_site(&self, site_id: &SiteId) -> Vec<SupervisorId> {
        RosterStore::active_supervisors_for_site(self, site_id)
    }

    fn sites_assigned_to_supervisor(&self, supervisor_id: &SupervisorId) -> Vec<SiteId> {
        RosterStore::sites_assigned_to_supervisor(self, supervisor_id)
    }
}

impl AssignmentAuditRepo for RosterStore {
    fn append_audit_event(
        &mut self,
        input: AssignmentAuditEventInput,
    ) -> Result<AssignmentAuditEventId, StorageError> {
        RosterStore::append_audit_event(self, input)
    }

    fn audit_rows(&self) -> &[AssignmentAuditEvent] {
        RosterStore::audit_rows(self)
    }

    fn audit_rows_by_site(&self, site_id: &SiteId) -> Vec<&AssignmentAuditEvent> {
        RosterStore::audit_rows_by_site(self, site_id)
    }

    fn audit_rows_by_tenant(&self, tenant_id: &TenantId) -> Vec<&AssignmentAuditEvent> {
        RosterStore::audit_rows_by_tenant(self, tenant_id)
    }

    fn audit_rows_by_actor(&self, actor: &ActorId) -> Vec<&AssignmentAuditEvent> {
        RosterStore::audit_rows_by_actor(self, actor)
    }

    fn audit_rows_by_action(&self, action: AuditAction) -> Vec<&AssignmentAuditEvent> {
        RosterStore::audit_rows_by_action(self, action)
    }
}

impl IntegrityScanRepo for RosterStore {
    fn orphan_worker_rows(&self, site_filter: Option<&SiteId>) -> Vec<&WorkerRecord> {
        RosterStore::orphan_worker_rows(self, site_filter)
    }

    fn dangling_reference_worker_rows(
        &self,
        site_filter: Option<&SiteId>,
    ) -> Vec<&WorkerRecord> {
        RosterStore::dangling_reference_worker_rows(self, site_filter)
    }

    fn inactive_supervisor_reference_worker_rows(
        &self,
        site_filter: Option<&SiteId>,
    ) -> Vec<&WorkerRecord> {
        RosterStore::inactive_supervisor_reference_worker_rows(self, site_filter)
    }

    fn site_is_consistent(&self, site_id: &SiteId) -> bool {
        RosterStore::site_is_consistent(self, site_id)
    }
}
