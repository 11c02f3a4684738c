#![forbid(unsafe_code)]

use roster_kernel_contracts::assignment::{
    AssignSupervisorToSiteRequest, AssignSupervisorToSiteResult, AutoAssignRequest,
    AutoAssignResult,
};
use roster_kernel_contracts::{RecordStatus, Validate};
use roster_storage::store::{RosterStore, StorageError, SupervisorSiteAssignmentRecord};

pub mod reason_codes {
    use roster_kernel_contracts::ReasonCodeId;

    // Auto-assignment trigger reason-code namespace.
    pub const FIRST_SUPERVISOR_SWEEP: ReasonCodeId = ReasonCodeId(0x4141_0001);
    pub const NOT_FIRST_ASSIGNMENT: ReasonCodeId = ReasonCodeId(0x4141_0101);
}

/// First-supervisor auto-assignment.
///
/// The zero-to-one transition is detected from the prior count read before the
/// assignment row is inserted, never re-derived afterwards: a concurrent
/// second assignment can make "count after == 1" true without this being a
/// genuine first-assignment event.
#[derive(Debug, Default, Clone)]
pub struct AutoAssignRuntime;

impl AutoAssignRuntime {
    /// External "assign supervisor to site" action. Inserts the assignment
    /// row and, on the genuine zero-to-one transition, sweeps unassigned workers
    /// onto the new supervisor in the same logical operation.
    pub fn assign_supervisor_to_site(
        store: &mut RosterStore,
        req: &AssignSupervisorToSiteRequest,
    ) -> Result<AssignSupervisorToSiteResult, StorageError> {
        req.validate().map_err(StorageError::ContractViolation)?;

        if let Some(k) = &req.idempotency_key {
            if let Some((first_assignment, workers_updated, audit_event_id)) =
                store.assign_site_replay(&req.site_id, &req.supervisor_id, k)
            {
                return Ok(AssignSupervisorToSiteResult {
                    first_assignment,
                    auto_assign: first_assignment.then_some(AutoAssignResult {
                        workers_updated,
                        audit_event_id,
                    }),
                });
            }
        }

        let tenant_id = store
            .site_row(&req.site_id)
            .ok_or_else(|| StorageError::ForeignKeyViolation {
                table: "sites",
                key: req.site_id.as_str().to_string(),
            })?
            .tenant_id
            .clone();
        let supervisor = store.supervisor_row(&req.supervisor_id).ok_or_else(|| {
            StorageError::ForeignKeyViolation {
                table: "supervisors",
                key: req.supervisor_id.as_str().to_string(),
            }
        })?;
        if supervisor.status != RecordStatus::Active {
            return Err(StorageError::StaleState {
                table: "supervisors",
                key: req.supervisor_id.as_str().to_string(),
            });
        }

        // Prior count read before the insert: this is the transition check.
        let prior_count = store.active_assignment_count(&req.site_id);

        store.insert_assignment_row(SupervisorSiteAssignmentRecord::v1(
            req.site_id.clone(),
            req.supervisor_id.clone(),
            tenant_id,
            req.now_ns,
        )?)?;

        let first_assignment = prior_count == 0;
        let auto_assign = if first_assignment {
            let sweep_key = req.idempotency_key.as_ref().map(|k| format!("{k}::sweep"));
            let (workers_updated, audit_event_id) = store.auto_assign_unassigned_workers_commit(
                req.now_ns,
                &req.site_id,
                &req.supervisor_id,
                req.actor.clone(),
                req.correlation_id,
                sweep_key,
            )?;
            Some(AutoAssignResult {
                workers_updated,
                audit_event_id,
            })
        } else {
            None
        };

        if let Some(k) = &req.idempotency_key {
            store.record_assign_site_replay(
                &req.site_id,
                &req.supervisor_id,
                k.clone(),
                (
                    first_assignment,
                    auto_assign.as_ref().map_or(0, |a| a.workers_updated),
                    auto_assign.as_ref().and_then(|a| a.audit_event_id),
                ),
            );
        }

        Ok(AssignSupervisorToSiteResult {
            first_assignment,
            auto_assign,
        })
    }

    /// Direct sweep entry point for callers that observed the zero-to-one transition
    /// themselves. Fails closed unless the new supervisor is currently the
    /// site's only active assignment.
    pub fn on_first_supervisor_assigned(
        store: &mut RosterStore,
        req: &AutoAssignRequest,
    ) -> Result<AutoAssignResult, StorageError> {
        req.validate().map_err(StorageError::ContractViolation)?;

        let active = store.active_supervisors_for_site(&req.site_id);
        if active.len() != 1 || active[0] != req.new_supervisor_id {
            return Err(StorageError::StaleState {
                table: "supervisor_site_assignments",
                key: req.site_id.as_str().to_string(),
            });
        }

        let (workers_updated, audit_event_id) = store.auto_assign_unassigned_workers_commit(
            req.now_ns,
            &req.site_id,
            &req.new_supervisor_id,
            req.actor.clone(),
            req.correlation_id,
            req.idempotency_key.clone(),
        )?;

        Ok(AutoAssignResult {
            workers_updated,
            audit_event_id,
        })
    }
}
