#![forbid(unsafe_code)]

use serde::Serialize;

use crate::org::{SiteId, SupervisorId, WorkerId};
use crate::{ContractViolation, MonotonicTimeNs, SchemaVersion, Validate};

pub const REPORT_CONTRACT_VERSION: SchemaVersion = SchemaVersion(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum IntegrityFindingKind {
    /// Active worker with a null supervisor reference in a supervised site.
    Orphan,
    /// Supervisor reference points at a supervisor with no assignment row
    /// for the worker's site.
    DanglingReference,
    /// Supervisor reference points at a now-inactive supervisor. Report-only.
    InactiveSupervisorReference,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IntegrityFinding {
    pub kind: IntegrityFindingKind,
    pub worker_id: WorkerId,
    pub site_id: SiteId,
    pub supervisor_id: Option<SupervisorId>,
}

impl Validate for IntegrityFinding {
    fn validate(&self) -> Result<(), ContractViolation> {
        self.worker_id.validate()?;
        self.site_id.validate()?;
        match self.kind {
            IntegrityFindingKind::Orphan => {
                if self.supervisor_id.is_some() {
                    return Err(ContractViolation::InvalidValue {
                        field: "integrity_finding.supervisor_id",
                        reason: "must be absent for an orphan finding",
                    });
                }
            }
            IntegrityFindingKind::DanglingReference
            | IntegrityFindingKind::InactiveSupervisorReference => {
                let Some(s) = &self.supervisor_id else {
                    return Err(ContractViolation::InvalidValue {
                        field: "integrity_finding.supervisor_id",
                        reason: "required for a reference finding",
                    });
                };
                s.validate()?;
            }
        }
        Ok(())
    }
}

/// Aggregate scan output. Empty findings on a consistent store is the
/// expected common case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IntegrityReport {
    pub schema_version: SchemaVersion,
    pub scanned_at: MonotonicTimeNs,
    pub site_filter: Option<SiteId>,
    pub findings: Vec<IntegrityFinding>,
}

impl IntegrityReport {
    pub fn v1(
        scanned_at: MonotonicTimeNs,
        site_filter: Option<SiteId>,
        findings: Vec<IntegrityFinding>,
    ) -> Result<Self, ContractViolation> {
        let r = Self {
            schema_version: REPORT_CONTRACT_VERSION,
            scanned_at,
            site_filter,
            findings,
        };
        r.validate()?;
        Ok(r)
    }

    pub fn is_consistent(&self) -> bool {
        self.findings.is_empty()
    }

    pub fn findings_of_kind(&self, kind: IntegrityFindingKind) -> Vec<&IntegrityFinding> {
        self.findings.iter().filter(|f| f.kind == kind).collect()
    }
}

impl Validate for IntegrityReport {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.schema_version != REPORT_CONTRACT_VERSION {
            return Err(ContractViolation::InvalidValue {
                field: "integrity_report.schema_version",
                reason: "must match REPORT_CONTRACT_VERSION",
            });
        }
        if self.scanned_at.0 == 0 {
            return Err(ContractViolation::InvalidValue {
                field: "integrity_report.scanned_at",
                reason: "must be > 0",
            });
        }
        if let Some(s) = &self.site_filter {
            s.validate()?;
        }
        for f in &self.findings {
            f.validate()?;
            if let Some(filter) = &self.site_filter {
                if &f.site_id != filter {
                    return Err(ContractViolation::InvalidValue {
                        field: "integrity_report.findings",
                        reason: "finding outside the site filter",
                    });
                }
            }
        }
        Ok(())
    }
}
