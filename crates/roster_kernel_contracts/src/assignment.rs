#![forbid(unsafe_code)]

use crate::audit::AssignmentAuditEventId;
use crate::org::{ActorId, CorrelationId, SiteId, SupervisorId};
use crate::{ContractViolation, MonotonicTimeNs, ReasonCodeId, SchemaVersion, Validate};

pub const ASSIGNMENT_CONTRACT_VERSION: SchemaVersion = SchemaVersion(1);

fn validate_idempotency_key(
    field: &'static str,
    key: &Option<String>,
) -> Result<(), ContractViolation> {
    if let Some(k) = key {
        if k.trim().is_empty() {
            return Err(ContractViolation::InvalidValue {
                field,
                reason: "must not be empty when provided",
            });
        }
        if k.len() > 128 {
            return Err(ContractViolation::InvalidValue {
                field,
                reason: "must be <= 128 chars",
            });
        }
    }
    Ok(())
}

/// Business-rule rejection of a proposed worker-to-supervisor reference.
/// Rejections are data, never errors; callers branch on the variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssignmentRejection {
    /// A supervisor reference was supplied but the site has no supervisors.
    SiteHasNoSupervisors,
    /// The site has supervisors, so a supervisor reference is mandatory.
    SupervisorRequired,
    /// The named supervisor exists but is inactive.
    SupervisorInactive,
    /// The named supervisor has no active assignment to this site.
    SupervisorNotAssignedToSite,
}

impl AssignmentRejection {
    pub fn reason_text(self) -> &'static str {
        match self {
            AssignmentRejection::SiteHasNoSupervisors => "site has no supervisors",
            AssignmentRejection::SupervisorRequired => "must be assigned to a supervisor",
            AssignmentRejection::SupervisorInactive => "supervisor inactive",
            AssignmentRejection::SupervisorNotAssignedToSite => {
                "supervisor not assigned to this site"
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationDecision {
    Accepted,
    Rejected(AssignmentRejection),
}

impl ValidationDecision {
    pub fn is_accepted(&self) -> bool {
        matches!(self, ValidationDecision::Accepted)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignmentValidationRequest {
    pub schema_version: SchemaVersion,
    pub site_id: SiteId,
    pub proposed_supervisor_id: Option<SupervisorId>,
}

impl AssignmentValidationRequest {
    pub fn v1(
        site_id: SiteId,
        proposed_supervisor_id: Option<SupervisorId>,
    ) -> Result<Self, ContractViolation> {
        let r = Self {
            schema_version: ASSIGNMENT_CONTRACT_VERSION,
            site_id,
            proposed_supervisor_id,
        };
        r.validate()?;
        Ok(r)
    }
}

impl Validate for AssignmentValidationRequest {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.schema_version != ASSIGNMENT_CONTRACT_VERSION {
            return Err(ContractViolation::InvalidValue {
                field: "assignment_validation_request.schema_version",
                reason: "must match ASSIGNMENT_CONTRACT_VERSION",
            });
        }
        self.site_id.validate()?;
        if let Some(s) = &self.proposed_supervisor_id {
            s.validate()?;
        }
        Ok(())
    }
}

/// External "assign supervisor to site" action. The runtime reads the prior
/// active-assignment count inside the same commit and fires the first-assignment
/// sweep only on the genuine zero-to-one transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignSupervisorToSiteRequest {
    pub schema_version: SchemaVersion,
    pub now_ns: MonotonicTimeNs,
    pub correlation_id: CorrelationId,
    pub site_id: SiteId,
    pub supervisor_id: SupervisorId,
    pub actor: ActorId,
    pub idempotency_key: Option<String>,
}

impl AssignSupervisorToSiteRequest {
    pub fn v1(
        now_ns: MonotonicTimeNs,
        correlation_id: CorrelationId,
        site_id: SiteId,
        supervisor_id: SupervisorId,
        actor: ActorId,
        idempotency_key: Option<String>,
    ) -> Result<Self, ContractViolation> {
        let r = Self {
            schema_version: ASSIGNMENT_CONTRACT_VERSION,
            now_ns,
            correlation_id,
            site_id,
            supervisor_id,
            actor,
            idempotency_key,
        };
        r.validate()?;
        Ok(r)
    }
}

impl Validate for AssignSupervisorToSiteRequest {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.schema_version != ASSIGNMENT_CONTRACT_VERSION {
            return Err(ContractViolation::InvalidValue {
                field: "assign_supervisor_to_site_request.schema_version",
                reason: "must match ASSIGNMENT_CONTRACT_VERSION",
            });
        }
        if self.now_ns.0 == 0 {
            return Err(ContractViolation::InvalidValue {
                field: "assign_supervisor_to_site_request.now_ns",
                reason: "must be > 0",
            });
        }
        self.correlation_id.validate()?;
        self.site_id.validate()?;
        self.supervisor_id.validate()?;
        self.actor.validate()?;
        validate_idempotency_key(
            "assign_supervisor_to_site_request.idempotency_key",
            &self.idempotency_key,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutoAssignResult {
    pub workers_updated: u32,
    pub audit_event_id: Option<AssignmentAuditEventId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignSupervisorToSiteResult {
    /// True iff this assignment was the site's zero-to-one transition.
    pub first_assignment: bool,
    pub auto_assign: Option<AutoAssignResult>,
}

/// Direct invocation of the first-supervisor sweep. The caller is responsible
/// for having observed the zero-to-one transition before invoking this; the runtime
/// re-checks against the store and refuses when the precondition does not hold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutoAssignRequest {
    pub schema_version: SchemaVersion,
    pub now_ns: MonotonicTimeNs,
    pub correlation_id: CorrelationId,
    pub site_id: SiteId,
    pub new_supervisor_id: SupervisorId,
    pub actor: ActorId,
    pub idempotency_key: Option<String>,
}

impl AutoAssignRequest {
    pub fn v1(
        now_ns: MonotonicTimeNs,
        correlation_id: CorrelationId,
        site_id: SiteId,
        new_supervisor_id: SupervisorId,
        actor: ActorId,
        idempotency_key: Option<String>,
    ) -> Result<Self, ContractViolation> {
        let r = Self {
            schema_version: ASSIGNMENT_CONTRACT_VERSION,
            now_ns,
            correlation_id,
            site_id,
            new_supervisor_id,
            actor,
            idempotency_key,
        };
        r.validate()?;
        Ok(r)
    }
}

impl Validate for AutoAssignRequest {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.schema_version != ASSIGNMENT_CONTRACT_VERSION {
            return Err(ContractViolation::InvalidValue {
                field: "auto_assign_request.schema_version",
                reason: "must match ASSIGNMENT_CONTRACT_VERSION",
            });
        }
        if self.now_ns.0 == 0 {
            return Err(ContractViolation::InvalidValue {
                field: "auto_assign_request.now_ns",
                reason: "must be > 0",
            });
        }
        self.correlation_id.validate()?;
        self.site_id.validate()?;
        self.new_supervisor_id.validate()?;
        self.actor.validate()?;
        validate_idempotency_key("auto_assign_request.idempotency_key", &self.idempotency_key)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoveFromSiteRequest {
    pub schema_version: SchemaVersion,
    pub supervisor_id: SupervisorId,
    pub site_id: SiteId,
}

impl RemoveFromSiteRequest {
    pub fn v1(supervisor_id: SupervisorId, site_id: SiteId) -> Result<Self, ContractViolation> {
        let r = Self {
            schema_version: ASSIGNMENT_CONTRACT_VERSION,
            supervisor_id,
            site_id,
        };
        r.validate()?;
        Ok(r)
    }
}

impl Validate for RemoveFromSiteRequest {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.schema_version != ASSIGNMENT_CONTRACT_VERSION {
            return Err(ContractViolation::InvalidValue {
                field: "remove_from_site_request.schema_version",
                reason: "must match ASSIGNMENT_CONTRACT_VERSION",
            });
        }
        self.supervisor_id.validate()?;
        self.site_id.validate()
    }
}

/// Single-site unassignment outcome. Blocking is the expected path when the
/// supervisor still has active workers in the site; nothing is mutated then.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveFromSiteResult {
    Removed,
    Blocked { blocking_worker_count: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeactivateSupervisorRequest {
    pub schema_version: SchemaVersion,
    pub now_ns: MonotonicTimeNs,
    pub correlation_id: CorrelationId,
    pub supervisor_id: SupervisorId,
    pub actor: ActorId,
    pub idempotency_key: Option<String>,
}

impl DeactivateSupervisorRequest {
    pub fn v1(
        now_ns: MonotonicTimeNs,
        correlation_id: CorrelationId,
        supervisor_id: SupervisorId,
        actor: ActorId,
        idempotency_key: Option<String>,
    ) -> Result<Self, ContractViolation> {
        let r = Self {
            schema_version: ASSIGNMENT_CONTRACT_VERSION,
            now_ns,
            correlation_id,
            supervisor_id,
            actor,
            idempotency_key,
        };
        r.validate()?;
        Ok(r)
    }
}

impl Validate for DeactivateSupervisorRequest {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.schema_version != ASSIGNMENT_CONTRACT_VERSION {
            return Err(ContractViolation::InvalidValue {
                field: "deactivate_supervisor_request.schema_version",
                reason: "must match ASSIGNMENT_CONTRACT_VERSION",
            });
        }
        if self.now_ns.0 == 0 {
            return Err(ContractViolation::InvalidValue {
                field: "deactivate_supervisor_request.now_ns",
                reason: "must be > 0",
            });
        }
        self.correlation_id.validate()?;
        self.supervisor_id.validate()?;
        self.actor.validate()?;
        validate_idempotency_key(
            "deactivate_supervisor_request.idempotency_key",
            &self.idempotency_key,
        )
    }
}

/// Per-site outcome of a full supervisor deactivation. Each site commits in
/// its own transaction; a failed site never rolls back a committed one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SiteRemovalOutcome {
    /// The removed supervisor was the site's last; worker references cleared.
    Cleared {
        affected_count: u32,
        audit_event_id: Option<AssignmentAuditEventId>,
    },
    /// Remaining supervisors exist; workers moved to the least-loaded one.
    Reassigned {
        affected_count: u32,
        target_supervisor_id: SupervisorId,
        audit_event_id: Option<AssignmentAuditEventId>,
    },
    /// The site's transaction failed; other sites are unaffected.
    Failed { reason_code: ReasonCodeId },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PerSiteReassignment {
    pub site_id: SiteId,
    pub outcome: SiteRemovalOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeactivateSupervisorResult {
    pub supervisor_id: SupervisorId,
    pub per_site: Vec<PerSiteReassignment>,
    pub supervisor_deactivated: bool,
}
