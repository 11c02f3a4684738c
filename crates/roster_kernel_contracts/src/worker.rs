#![forbid(unsafe_code)]

use crate::assignment::AssignmentRejection;
use crate::org::{SiteId, SupervisorId, TenantId, WorkerId};
use crate::{ContractViolation, MonotonicTimeNs, SchemaVersion, Validate};

pub const WORKER_CONTRACT_VERSION: SchemaVersion = SchemaVersion(1);

/// Worker-CRUD surface gated by the assignment validator. Field-level
/// validation beyond the supervisor reference (names, contact data) belongs
/// to the surrounding application, not this core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerCreateRequest {
    pub schema_version: SchemaVersion,
    pub now_ns: MonotonicTimeNs,
    pub worker_id: WorkerId,
    pub tenant_id: TenantId,
    pub site_id: SiteId,
    pub supervisor_id: Option<SupervisorId>,
}

impl WorkerCreateRequest {
    pub fn v1(
        now_ns: MonotonicTimeNs,
        worker_id: WorkerId,
        tenant_id: TenantId,
        site_id: SiteId,
        supervisor_id: Option<SupervisorId>,
    ) -> Result<Self, ContractViolation> {
        let r = Self {
            schema_version: WORKER_CONTRACT_VERSION,
            now_ns,
            worker_id,
            tenant_id,
            site_id,
            supervisor_id,
        };
        r.validate()?;
        Ok(r)
    }
}

impl Validate for WorkerCreateRequest {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.schema_version != WORKER_CONTRACT_VERSION {
            return Err(ContractViolation::InvalidValue {
                field: "worker_create_request.schema_version",
                reason: "must match WORKER_CONTRACT_VERSION",
            });
        }
        if self.now_ns.0 == 0 {
            return Err(ContractViolation::InvalidValue {
                field: "worker_create_request.now_ns",
                reason: "must be > 0",
            });
        }
        self.worker_id.validate()?;
        self.tenant_id.validate()?;
        self.site_id.validate()?;
        if let Some(s) = &self.supervisor_id {
            s.validate()?;
        }
        Ok(())
    }
}

/// Update of an existing worker's supervisor reference, or a no-op touch
/// re-validated against current site state to catch drift.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerSetSupervisorRequest {
    pub schema_version: SchemaVersion,
    pub now_ns: MonotonicTimeNs,
    pub worker_id: WorkerId,
    pub supervisor_id: Option<SupervisorId>,
}

impl WorkerSetSupervisorRequest {
    pub fn v1(
        now_ns: MonotonicTimeNs,
        worker_id: WorkerId,
        supervisor_id: Option<SupervisorId>,
    ) -> Result<Self, ContractViolation> {
        let r = Self {
            schema_version: WORKER_CONTRACT_VERSION,
            now_ns,
            worker_id,
            supervisor_id,
        };
        r.validate()?;
        Ok(r)
    }
}

impl Validate for WorkerSetSupervisorRequest {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.schema_version != WORKER_CONTRACT_VERSION {
            return Err(ContractViolation::InvalidValue {
                field: "worker_set_supervisor_request.schema_version",
                reason: "must match WORKER_CONTRACT_VERSION",
            });
        }
        if self.now_ns.0 == 0 {
            return Err(ContractViolation::InvalidValue {
                field: "worker_set_supervisor_request.now_ns",
                reason: "must be > 0",
            });
        }
        self.worker_id.validate()?;
        if let Some(s) = &self.supervisor_id {
            s.validate()?;
        }
        Ok(())
    }
}

/// Site move. The previous supervisor reference never carries over; the
/// supplied reference (default none) is validated against the new site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerMoveSiteRequest {
    pub schema_version: SchemaVersion,
    pub now_ns: MonotonicTimeNs,
    pub worker_id: WorkerId,
    pub new_site_id: SiteId,
    pub supervisor_id: Option<SupervisorId>,
}

impl WorkerMoveSiteRequest {
    pub fn v1(
        now_ns: MonotonicTimeNs,
        worker_id: WorkerId,
        new_site_id: SiteId,
        supervisor_id: Option<SupervisorId>,
    ) -> Result<Self, ContractViolation> {
        let r = Self {
            schema_version: WORKER_CONTRACT_VERSION,
            now_ns,
            worker_id,
            new_site_id,
            supervisor_id,
        };
        r.validate()?;
        Ok(r)
    }
}

impl Validate for WorkerMoveSiteRequest {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.schema_version != WORKER_CONTRACT_VERSION {
            return Err(ContractViolation::InvalidValue {
                field: "worker_move_site_request.schema_version",
                reason: "must match WORKER_CONTRACT_VERSION",
            });
        }
        if self.now_ns.0 == 0 {
            return Err(ContractViolation::InvalidValue {
                field: "worker_move_site_request.now_ns",
                reason: "must be > 0",
            });
        }
        self.worker_id.validate()?;
        self.new_site_id.validate()?;
        if let Some(s) = &self.supervisor_id {
            s.validate()?;
        }
        Ok(())
    }
}

/// Outcome of a gated worker write. A rejection mutates nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerWriteOutcome {
    Committed,
    Rejected(AssignmentRejection),
}

impl WorkerWriteOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, WorkerWriteOutcome::Committed)
    }
}
