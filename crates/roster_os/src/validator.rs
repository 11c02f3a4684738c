#![forbid(unsafe_code)]

use roster_kernel_contracts::assignment::{
    AssignmentRejection, AssignmentValidationRequest, ValidationDecision,
};
use roster_kernel_contracts::{RecordStatus, Validate};
use roster_storage::store::{RosterStore, StorageError};

pub mod reason_codes {
    use roster_kernel_contracts::ReasonCodeId;

    // Assignment validator reason-code namespace.
    pub const VALIDATION_ACCEPTED: ReasonCodeId = ReasonCodeId(0x5641_0001);
    pub const SITE_HAS_NO_SUPERVISORS: ReasonCodeId = ReasonCodeId(0x5641_0101);
    pub const SUPERVISOR_REQUIRED: ReasonCodeId = ReasonCodeId(0x5641_0102);
    pub const SUPERVISOR_INACTIVE: ReasonCodeId = ReasonCodeId(0x5641_0103);
    pub const SUPERVISOR_NOT_ASSIGNED_TO_SITE: ReasonCodeId = ReasonCodeId(0x5641_0104);
}

pub fn rejection_reason_code(
    rejection: AssignmentRejection,
) -> roster_kernel_contracts::ReasonCodeId {
    match rejection {
        AssignmentRejection::SiteHasNoSupervisors => reason_codes::SITE_HAS_NO_SUPERVISORS,
        AssignmentRejection::SupervisorRequired => reason_codes::SUPERVISOR_REQUIRED,
        AssignmentRejection::SupervisorInactive => reason_codes::SUPERVISOR_INACTIVE,
        AssignmentRejection::SupervisorNotAssignedToSite => {
            reason_codes::SUPERVISOR_NOT_ASSIGNED_TO_SITE
        }
    }
}

/// Pure decision function gating every write that sets a worker's supervisor
/// reference. No side effects; reads and decision share one store view.
///
/// The request's site is always the effective context: a site move validates
/// against the destination site with whatever reference the caller supplies,
/// never against the worker's previous site.
#[derive(Debug, Default, Clone)]
pub struct AssignmentValidator;

impl AssignmentValidator {
    pub fn validate(
        store: &RosterStore,
        req: &AssignmentValidationRequest,
    ) -> Result<ValidationDecision, StorageError> {
        req.validate().map_err(StorageError::ContractViolation)?;

        let site = store
            .site_row(&req.site_id)
            .ok_or_else(|| StorageError::ForeignKeyViolation {
                table: "sites",
                key: req.site_id.as_str().to_string(),
            })?;

        let active_count = store.active_assignment_count(&req.site_id);

        let Some(sup_id) = &req.proposed_supervisor_id else {
            if active_count == 0 {
                return Ok(ValidationDecision::Accepted);
            }
            return Ok(ValidationDecision::Rejected(
                AssignmentRejection::SupervisorRequired,
            ));
        };

        if active_count == 0 {
            return Ok(ValidationDecision::Rejected(
                AssignmentRejection::SiteHasNoSupervisors,
            ));
        }

        let Some(sup) = store.supervisor_row(sup_id) else {
            return Ok(ValidationDecision::Rejected(
                AssignmentRejection::SupervisorNotAssignedToSite,
            ));
        };
        if sup.status != RecordStatus::Active {
            return Ok(ValidationDecision::Rejected(
                AssignmentRejection::SupervisorInactive,
            ));
        }
        if sup.tenant_id != site.tenant_id
            || store.assignment_row(&req.site_id, sup_id).is_none()
        {
            return Ok(ValidationDecision::Rejected(
                AssignmentRejection::SupervisorNotAssignedToSite,
            ));
        }

        Ok(ValidationDecision::Accepted)
    }
}
