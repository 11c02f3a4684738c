#![forbid(unsafe_code)]

use serde::Serialize;

use crate::org::{ActorId, CorrelationId, SiteId, SupervisorId, TenantId, WorkerId};
use crate::{ContractViolation, MonotonicTimeNs, ReasonCodeId, SchemaVersion, Validate};

pub const AUDIT_CONTRACT_VERSION: SchemaVersion = SchemaVersion(1);

/// Upper bound on per-event worker changes. One event covers one logical
/// unit of change (one triggering event per site), never one row.
pub const MAX_CHANGES_PER_EVENT: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct AssignmentAuditEventId(pub u64);

impl Validate for AssignmentAuditEventId {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.0 == 0 {
            return Err(ContractViolation::InvalidValue {
                field: "assignment_audit_event_id",
                reason: "must be > 0",
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum AuditAction {
    /// First supervisor added to a site; unassigned workers swept onto it.
    AutoAssign,
    /// Supervisor removed; workers moved to the least-loaded remaining one.
    AutoReassign,
    /// Last supervisor removed; worker references cleared.
    AutoUnassign,
    /// Explicit, administrator-invoked repair of scanner findings.
    OrphanRepair,
}

/// Before/after supervisor reference for a single worker within one event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkerAssignmentChange {
    pub worker_id: WorkerId,
    pub supervisor_before: Option<SupervisorId>,
    pub supervisor_after: Option<SupervisorId>,
}

impl WorkerAssignmentChange {
    pub fn v1(
        worker_id: WorkerId,
        supervisor_before: Option<SupervisorId>,
        supervisor_after: Option<SupervisorId>,
    ) -> Result<Self, ContractViolation> {
        let c = Self {
            worker_id,
            supervisor_before,
            supervisor_after,
        };
        c.validate()?;
        Ok(c)
    }
}

impl Validate for WorkerAssignmentChange {
    fn validate(&self) -> Result<(), ContractViolation> {
        self.worker_id.validate()?;
        if let Some(s) = &self.supervisor_before {
            s.validate()?;
        }
        if let Some(s) = &self.supervisor_after {
            s.validate()?;
        }
        if self.supervisor_before == self.supervisor_after {
            return Err(ContractViolation::InvalidValue {
                field: "worker_assignment_change",
                reason: "before and after states must differ",
            });
        }
        Ok(())
    }
}

fn validate_reason(field: &'static str, reason: &str) -> Result<(), ContractViolation> {
    if reason.trim().is_empty() {
        return Err(ContractViolation::InvalidValue {
            field,
            reason: "must not be empty",
        });
    }
    if reason.len() > 128 {
        return Err(ContractViolation::InvalidValue {
            field,
            reason: "must be <= 128 chars",
        });
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignmentAuditEventInput {
    pub schema_version: SchemaVersion,
    pub created_at: MonotonicTimeNs,
    pub tenant_id: TenantId,
    pub site_id: SiteId,
    pub action: AuditAction,
    pub actor: ActorId,
    pub reason_code: ReasonCodeId,
    pub reason: String,
    pub removed_supervisor_id: Option<SupervisorId>,
    pub target_supervisor_id: Option<SupervisorId>,
    pub changes: Vec<WorkerAssignmentChange>,
    pub correlation_id: CorrelationId,
    /// Optional key to detect duplicate emissions deterministically.
    pub idempotency_key: Option<String>,
}

impl AssignmentAuditEventInput {
    #[allow(clippy::too_many_arguments)]
    pub fn v1(
        created_at: MonotonicTimeNs,
        tenant_id: TenantId,
        site_id: SiteId,
        action: AuditAction,
        actor: ActorId,
        reason_code: ReasonCodeId,
        reason: String,
        removed_supervisor_id: Option<SupervisorId>,
        target_supervisor_id: Option<SupervisorId>,
        changes: Vec<WorkerAssignmentChange>,
        correlation_id: CorrelationId,
        idempotency_key: Option<String>,
    ) -> Result<Self, ContractViolation> {
        let e = Self {
            schema_version: AUDIT_CONTRACT_VERSION,
            created_at,
            tenant_id,
            site_id,
            action,
            actor,
            reason_code,
            reason,
            removed_supervisor_id,
            target_supervisor_id,
            changes,
            correlation_id,
            idempotency_key,
        };
        e.validate()?;
        Ok(e)
    }
}

fn validate_action_shape(input: &AssignmentAuditEventInput) -> Result<(), ContractViolation> {
    match input.action {
        AuditAction::AutoAssign => {
            let Some(target) = &input.target_supervisor_id else {
                return Err(ContractViolation::InvalidValue {
                    field: "assignment_audit_event.target_supervisor_id",
                    reason: "required for auto-assign",
                });
            };
            if input.removed_supervisor_id.is_some() {
                return Err(ContractViolation::InvalidValue {
                    field: "assignment_audit_event.removed_supervisor_id",
                    reason: "must be absent for auto-assign",
                });
            }
            for c in &input.changes {
                if c.supervisor_before.is_some() || c.supervisor_after.as_ref() != Some(target) {
                    return Err(ContractViolation::InvalidValue {
                        field: "assignment_audit_event.changes",
                        reason: "auto-assign changes must go from null to the target",
                    });
                }
            }
        }
        AuditAction::AutoUnassign => {
            if input.removed_supervisor_id.is_none() {
                return Err(ContractViolation::InvalidValue {
                    field: "assignment_audit_event.removed_supervisor_id",
                    reason: "required for auto-unassign",
                });
            }
            if input.target_supervisor_id.is_some() {
                return Err(ContractViolation::InvalidValue {
                    field: "assignment_audit_event.target_supervisor_id",
                    reason: "must be absent for auto-unassign",
                });
            }
            for c in &input.changes {
                if c.supervisor_after.is_some() {
                    return Err(ContractViolation::InvalidValue {
                        field: "assignment_audit_event.changes",
                        reason: "auto-unassign changes must end at null",
                    });
                }
            }
        }
        AuditAction::AutoReassign => {
            let (Some(removed), Some(target)) = (
                &input.removed_supervisor_id,
                &input.target_supervisor_id,
            ) else {
                return Err(ContractViolation::InvalidValue {
                    field: "assignment_audit_event",
                    reason: "auto-reassign requires removed and target supervisors",
                });
            };
            if removed == target {
                return Err(ContractViolation::InvalidValue {
                    field: "assignment_audit_event.target_supervisor_id",
                    reason: "must differ from removed supervisor",
                });
            }
            for c in &input.changes {
                if c.supervisor_after.as_ref() != Some(target) {
                    return Err(ContractViolation::InvalidValue {
                        field: "assignment_audit_event.changes",
                        reason: "auto-reassign changes must end at the target",
                    });
                }
            }
        }
        AuditAction::OrphanRepair => {}
    }
    Ok(())
}

impl Validate for AssignmentAuditEventInput {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.schema_version != AUDIT_CONTRACT_VERSION {
            return Err(ContractViolation::InvalidValue {
                field: "assignment_audit_event_input.schema_version",
                reason: "must match AUDIT_CONTRACT_VERSION",
            });
        }
        if self.created_at.0 == 0 {
            return Err(ContractViolation::InvalidValue {
                field: "assignment_audit_event_input.created_at",
                reason: "must be > 0",
            });
        }
        self.tenant_id.validate()?;
        self.site_id.validate()?;
        self.actor.validate()?;
        if self.reason_code.0 == 0 {
            return Err(ContractViolation::InvalidValue {
                field: "assignment_audit_event_input.reason_code",
                reason: "must be > 0",
            });
        }
        validate_reason("assignment_audit_event_input.reason", &self.reason)?;
        if let Some(s) = &self.removed_supervisor_id {
            s.validate()?;
        }
        if let Some(s) = &self.target_supervisor_id {
            s.validate()?;
        }
        if self.changes.is_empty() {
            return Err(ContractViolation::InvalidValue {
                field: "assignment_audit_event_input.changes",
                reason: "must contain at least one change",
            });
        }
        if self.changes.len() > MAX_CHANGES_PER_EVENT {
            return Err(ContractViolation::InvalidCount {
                field: "assignment_audit_event_input.changes",
                max: MAX_CHANGES_PER_EVENT,
                got: self.changes.len(),
            });
        }
        for c in &self.changes {
            c.validate()?;
        }
        validate_action_shape(self)?;
        self.correlation_id.validate()?;
        if let Some(k) = &self.idempotency_key {
            if k.trim().is_empty() {
                return Err(ContractViolation::InvalidValue {
                    field: "assignment_audit_event_input.idempotency_key",
                    reason: "must not be empty when provided",
                });
            }
            if k.len() > 128 {
                return Err(ContractViolation::InvalidValue {
                    field: "assignment_audit_event_input.idempotency_key",
                    reason: "must be <= 128 chars",
                });
            }
        }
        Ok(())
    }
}

/// Committed, immutable audit ledger row. Never updated or deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssignmentAuditEvent {
    pub schema_version: SchemaVersion,
    pub event_id: AssignmentAuditEventId,
    pub created_at: MonotonicTimeNs,
    pub tenant_id: TenantId,
    pub site_id: SiteId,
    pub action: AuditAction,
    pub actor: ActorId,
    pub reason_code: ReasonCodeId,
    pub reason: String,
    pub removed_supervisor_id: Option<SupervisorId>,
    pub target_supervisor_id: Option<SupervisorId>,
    pub changes: Vec<WorkerAssignmentChange>,
    pub correlation_id: CorrelationId,
    #[serde(skip_serializing)]
    pub idempotency_key: Option<String>,
    /// Deterministic sha-256 digest over the ordered change list. Evidence
    /// for tamper detection in exports, not a security mechanism.
    pub state_digest_hex: String,
}

impl AssignmentAuditEvent {
    pub fn from_input_v1(
        event_id: AssignmentAuditEventId,
        state_digest_hex: String,
        input: AssignmentAuditEventInput,
    ) -> Result<Self, ContractViolation> {
        input.validate()?;
        let e = Self {
            schema_version: AUDIT_CONTRACT_VERSION,
            event_id,
            created_at: input.created_at,
            tenant_id: input.tenant_id,
            site_id: input.site_id,
            action: input.action,
            actor: input.actor,
            reason_code: input.reason_code,
            reason: input.reason,
            removed_supervisor_id: input.removed_supervisor_id,
            target_supervisor_id: input.target_supervisor_id,
            changes: input.changes,
            correlation_id: input.correlation_id,
            idempotency_key: input.idempotency_key,
            state_digest_hex,
        };
        e.validate()?;
        Ok(e)
    }
}

impl Validate for AssignmentAuditEvent {
    fn validate(&self) -> Result<(), ContractViolation> {
        self.event_id.validate()?;
        if self.state_digest_hex.len() != 64
            || !self
                .state_digest_hex
                .chars()
                .all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase())
        {
            return Err(ContractViolation::InvalidValue {
                field: "assignment_audit_event.state_digest_hex",
                reason: "must be 64 lowercase hex chars",
            });
        }
        // Field-level checks are shared with the input shape.
        AssignmentAuditEventInput {
            schema_version: self.schema_version,
            created_at: self.created_at,
            tenant_id: self.tenant_id.clone(),
            site_id: self.site_id.clone(),
            action: self.action,
            actor: self.actor.clone(),
            reason_code: self.reason_code,
            reason: self.reason.clone(),
            removed_supervisor_id: self.removed_supervisor_id.clone(),
            target_supervisor_id: self.target_supervisor_id.clone(),
            changes: self.changes.clone(),
            correlation_id: self.correlation_id,
            idempotency_key: self.idempotency_key.clone(),
        }
        .validate()
    }
}
