#![forbid(unsafe_code)]

use roster_kernel_contracts::audit::{AssignmentAuditEventId, AssignmentAuditEventInput};
use roster_kernel_contracts::org::{SiteId, TenantId};
use roster_storage::store::{RosterStore, StorageError};

/// Audit runtime wrapper: a disciplined append-only writer into the
/// assignment audit ledger, plus the export surface admin tooling reads.
#[derive(Debug, Default, Clone)]
pub struct AuditRuntime;

impl AuditRuntime {
    pub fn emit(
        store: &mut RosterStore,
        input: AssignmentAuditEventInput,
    ) -> Result<AssignmentAuditEventId, StorageError> {
        store.append_audit_event(input)
    }

    /// JSON export of one tenant's ledger rows, oldest first.
    pub fn export_tenant_history_json(
        store: &RosterStore,
        tenant_id: &TenantId,
    ) -> Result<String, serde_json::Error> {
        serde_json::to_string(&store.audit_rows_by_tenant(tenant_id))
    }

    /// JSON export of one site's ledger rows, oldest first.
    pub fn export_site_history_json(
        store: &RosterStore,
        site_id: &SiteId,
    ) -> Result<String, serde_json::Error> {
        serde_json::to_string(&store.audit_rows_by_site(site_id))
    }
}
