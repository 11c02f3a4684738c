#![forbid(unsafe_code)]

use roster_kernel_contracts::assignment::{AssignmentValidationRequest, ValidationDecision};
use roster_kernel_contracts::org::WorkerId;
use roster_kernel_contracts::worker::{
    WorkerCreateRequest, WorkerMoveSiteRequest, WorkerSetSupervisorRequest, WorkerWriteOutcome,
};
use roster_kernel_contracts::{MonotonicTimeNs, RecordStatus, Validate};
use roster_storage::store::{RosterStore, StorageError, WorkerRecord};

use crate::validator::AssignmentValidator;

/// Validator-gated worker write path. Every entry point re-runs the
/// assignment validator against the effective site before any write; a
/// rejection leaves the store untouched and is returned as data.
#[derive(Debug, Default, Clone)]
pub struct WorkerWriteRuntime;

impl WorkerWriteRuntime {
    pub fn create_worker(
        store: &mut RosterStore,
        req: &WorkerCreateRequest,
    ) -> Result<WorkerWriteOutcome, StorageError> {
        req.validate().map_err(StorageError::ContractViolation)?;

        let decision = AssignmentValidator::validate(
            store,
            &AssignmentValidationRequest::v1(req.site_id.clone(), req.supervisor_id.clone())?,
        )?;
        if let ValidationDecision::Rejected(rejection) = decision {
            return Ok(WorkerWriteOutcome::Rejected(rejection));
        }

        store.insert_worker_row(WorkerRecord::v1(
            req.worker_id.clone(),
            req.tenant_id.clone(),
            req.site_id.clone(),
            req.supervisor_id.clone(),
            RecordStatus::Active,
            req.now_ns,
        )?)?;
        Ok(WorkerWriteOutcome::Committed)
    }

    /// Sets (or re-confirms) the supervisor reference. Runs on every update,
    /// including ones that change nothing, so state drift is caught; the
    /// committed no-op is idempotent.
    pub fn set_supervisor(
        store: &mut RosterStore,
        req: &WorkerSetSupervisorRequest,
    ) -> Result<WorkerWriteOutcome, StorageError> {
        req.validate().map_err(StorageError::ContractViolation)?;

        let site_id = store
            .worker_row(&req.worker_id)
            .ok_or_else(|| StorageError::ForeignKeyViolation {
                table: "workers",
                key: req.worker_id.as_str().to_string(),
            })?
            .site_id
            .clone();

        let decision = AssignmentValidator::validate(
            store,
            &AssignmentValidationRequest::v1(site_id, req.supervisor_id.clone())?,
        )?;
        if let ValidationDecision::Rejected(rejection) = decision {
            return Ok(WorkerWriteOutcome::Rejected(rejection));
        }

        store.worker_set_supervisor(&req.worker_id, req.supervisor_id.clone(), req.now_ns)?;
        Ok(WorkerWriteOutcome::Committed)
    }

    /// Moves a worker to another site. The old supervisor reference never
    /// carries over; validation runs against the destination site with the
    /// reference supplied for it (default none).
    pub fn move_site(
        store: &mut RosterStore,
        req: &WorkerMoveSiteRequest,
    ) -> Result<WorkerWriteOutcome, StorageError> {
        req.validate().map_err(StorageError::ContractViolation)?;

        if store.worker_row(&req.worker_id).is_none() {
            return Err(StorageError::ForeignKeyViolation {
                table: "workers",
                key: req.worker_id.as_str().to_string(),
            });
        }

        let decision = AssignmentValidator::validate(
            store,
            &AssignmentValidationRequest::v1(req.new_site_id.clone(), req.supervisor_id.clone())?,
        )?;
        if let ValidationDecision::Rejected(rejection) = decision {
            return Ok(WorkerWriteOutcome::Rejected(rejection));
        }

        store.worker_move_site(
            &req.worker_id,
            &req.new_site_id,
            req.supervisor_id.clone(),
            req.now_ns,
        )?;
        Ok(WorkerWriteOutcome::Committed)
    }

    /// Soft-deletes a worker. The supervisor reference is untouched: an
    /// inactive worker's reference is preserved history even if that
    /// supervisor is later deactivated.
    pub fn deactivate_worker(
        store: &mut RosterStore,
        worker_id: &WorkerId,
        now_ns: MonotonicTimeNs,
    ) -> Result<(), StorageError> {
        store.worker_set_status(worker_id, RecordStatus::Inactive, now_ns)
    }
}
