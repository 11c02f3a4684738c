#![forbid(unsafe_code)]

use std::collections::BTreeMap;

use roster_kernel_contracts::audit::{AssignmentAuditEventId, WorkerAssignmentChange};
use roster_kernel_contracts::org::{ActorId, CorrelationId, SiteId, SupervisorId};
use roster_kernel_contracts::MonotonicTimeNs;
use roster_storage::store::{RosterStore, StorageError};

pub mod reason_codes {
    use roster_kernel_contracts::ReasonCodeId;

    // Integrity repair reason-code namespace.
    pub const REPAIR_COMMITTED: ReasonCodeId = ReasonCodeId(0x5250_0001);
    pub const NOTHING_TO_REPAIR: ReasonCodeId = ReasonCodeId(0x5250_0002);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepairOutcome {
    pub site_id: SiteId,
    pub workers_repaired: u32,
    pub audit_event_id: Option<AssignmentAuditEventId>,
}

/// Explicit, administrator-invoked repair of scanner findings for one site.
///
/// Orphans are distributed across the site's active supervisors by staged
/// load (lowest count first, ties by ascending id). Dangling references are
/// re-pointed the same way, or cleared when the site has no active
/// supervisors left. Inactive-supervisor references are review-only and
/// never touched here. The whole site repairs under one audit event.
#[derive(Debug, Default, Clone)]
pub struct RepairRuntime;

impl RepairRuntime {
    pub fn repair_site(
        store: &mut RosterStore,
        now_ns: MonotonicTimeNs,
        site_id: &SiteId,
        actor: ActorId,
        correlation_id: CorrelationId,
        idempotency_key: Option<String>,
    ) -> Result<RepairOutcome, StorageError> {
        if store.site_row(site_id).is_none() {
            return Err(StorageError::ForeignKeyViolation {
                table: "sites",
                key: site_id.as_str().to_string(),
            });
        }

        // Staged loads: committed counts plus the repairs planned below.
        let mut staged_loads: BTreeMap<SupervisorId, u32> = store
            .active_supervisors_for_site(site_id)
            .into_iter()
            .map(|sup_id| {
                let load = store.active_worker_count_in_site_for(site_id, &sup_id);
                (sup_id, load)
            })
            .collect();

        let mut changes = Vec::new();

        for orphan in store.orphan_worker_rows(Some(site_id)) {
            if let Some(target) = least_staged(&staged_loads) {
                changes.push(WorkerAssignmentChange::v1(
                    orphan.worker_id.clone(),
                    None,
                    Some(target.clone()),
                )?);
                *staged_loads.get_mut(&target).expect("target from staged map") += 1;
            }
        }

        for dangling in store.dangling_reference_worker_rows(Some(site_id)) {
            let target = least_staged(&staged_loads);
            changes.push(WorkerAssignmentChange::v1(
                dangling.worker_id.clone(),
                dangling.supervisor_id.clone(),
                target.clone(),
            )?);
            if let Some(t) = target {
                *staged_loads.get_mut(&t).expect("target from staged map") += 1;
            }
        }

        // The commit consults the replay index before the recomputed change
        // set, so a keyed retry returns the original result even though the
        // store has already converged.
        let (workers_repaired, audit_event_id) = store.repair_site_commit(
            now_ns,
            site_id,
            changes,
            actor,
            correlation_id,
            idempotency_key,
        )?;

        Ok(RepairOutcome {
            site_id: site_id.clone(),
            workers_repaired,
            audit_event_id,
        })
    }
}

fn least_staged(loads: &BTreeMap<SupervisorId, u32>) -> Option<SupervisorId> {
    let mut best: Option<(u32, &SupervisorId)> = None;
    // Ascending id iteration; strict `<` keeps the lowest id on ties.
    for (sup_id, load) in loads {
        match best {
            Some((best_load, _)) if *load >= best_load => {}
            _ => best = Some((*load, sup_id)),
        }
    }
    best.map(|(_, sup_id)| sup_id.clone())
}
