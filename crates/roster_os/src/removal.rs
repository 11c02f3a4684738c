#![forbid(unsafe_code)]

use roster_kernel_contracts::assignment::{
    DeactivateSupervisorRequest, DeactivateSupervisorResult, PerSiteReassignment,
    RemoveFromSiteRequest, RemoveFromSiteResult, SiteRemovalOutcome,
};
use roster_kernel_contracts::{RecordStatus, Validate};
use roster_storage::store::{RosterStore, StorageError};

use crate::balancer::LoadBalancer;

pub mod reason_codes {
    use roster_kernel_contracts::ReasonCodeId;

    // Removal handler reason-code namespace.
    pub const REMOVED_FROM_SITE: ReasonCodeId = ReasonCodeId(0x524D_0010);
    pub const BLOCKED_ACTIVE_WORKERS: ReasonCodeId = ReasonCodeId(0x524D_0101);
    pub const SITE_TRANSACTION_FAILED: ReasonCodeId = ReasonCodeId(0x524D_01F1);
    pub const NO_REASSIGNMENT_TARGET: ReasonCodeId = ReasonCodeId(0x524D_01F2);
}

/// Supervisor removal orchestration: single-site unassignment and full
/// deactivation with per-site repair of worker references.
#[derive(Debug, Default, Clone)]
pub struct RemovalRuntime;

impl RemovalRuntime {
    /// Unassign one supervisor from one site. This entry point never
    /// reassigns: it blocks while any active worker in the site still
    /// references the supervisor, reporting the blocking count.
    pub fn remove_from_site(
        store: &mut RosterStore,
        req: &RemoveFromSiteRequest,
    ) -> Result<RemoveFromSiteResult, StorageError> {
        req.validate().map_err(StorageError::ContractViolation)?;

        if store
            .assignment_row(&req.site_id, &req.supervisor_id)
            .is_none()
        {
            return Err(StorageError::ForeignKeyViolation {
                table: "supervisor_site_assignments",
                key: format!(
                    "{}:{}",
                    req.site_id.as_str(),
                    req.supervisor_id.as_str()
                ),
            });
        }

        let blocking_worker_count = store
            .active_worker_ids_in_site_referencing(&req.site_id, &req.supervisor_id)
            .len() as u32;
        if blocking_worker_count > 0 {
            return Ok(RemoveFromSiteResult::Blocked {
                blocking_worker_count,
            });
        }

        store.delete_assignment_row(&req.site_id, &req.supervisor_id)?;
        Ok(RemoveFromSiteResult::Removed)
    }

    /// Deactivate a supervisor everywhere. Every site the supervisor is
    /// assigned to is handled independently in its own transaction; one
    /// site's failure is reported in its result slot and never rolls back
    /// another site's committed reassignment. The supervisor record itself
    /// is flipped inactive at the end, never deleted.
    pub fn deactivate_supervisor(
        store: &mut RosterStore,
        req: &DeactivateSupervisorRequest,
    ) -> Result<DeactivateSupervisorResult, StorageError> {
        req.validate().map_err(StorageError::ContractViolation)?;

        if store.supervisor_row(&req.supervisor_id).is_none() {
            return Err(StorageError::ForeignKeyViolation {
                table: "supervisors",
                key: req.supervisor_id.as_str().to_string(),
            });
        }

        let mut per_site = Vec::new();
        for site_id in store.sites_assigned_to_supervisor(&req.supervisor_id) {
            let site_key = req
                .idempotency_key
                .as_ref()
                .map(|k| format!("{k}::{}", site_id.as_str()));

            let remaining_after_removal = store
                .active_supervisors_for_site(&site_id)
                .into_iter()
                .filter(|s| s != &req.supervisor_id)
                .count();

            let outcome = if remaining_after_removal == 0 {
                match store.site_removal_clear_commit(
                    req.now_ns,
                    &site_id,
                    &req.supervisor_id,
                    req.actor.clone(),
                    req.correlation_id,
                    site_key,
                ) {
                    Ok((affected_count, audit_event_id)) => SiteRemovalOutcome::Cleared {
                        affected_count,
                        audit_event_id,
                    },
                    Err(_) => SiteRemovalOutcome::Failed {
                        reason_code: reason_codes::SITE_TRANSACTION_FAILED,
                    },
                }
            } else {
                match LoadBalancer::least_loaded(store, &site_id, Some(&req.supervisor_id)) {
                    Ok(Some(target)) => match store.site_removal_reassign_commit(
                        req.now_ns,
                        &site_id,
                        &req.supervisor_id,
                        &target,
                        req.actor.clone(),
                        req.correlation_id,
                        site_key,
                    ) {
                        Ok((affected_count, audit_event_id)) => SiteRemovalOutcome::Reassigned {
                            affected_count,
                            target_supervisor_id: target,
                            audit_event_id,
                        },
                        Err(_) => SiteRemovalOutcome::Failed {
                            reason_code: reason_codes::SITE_TRANSACTION_FAILED,
                        },
                    },
                    Ok(None) => SiteRemovalOutcome::Failed {
                        reason_code: reason_codes::NO_REASSIGNMENT_TARGET,
                    },
                    Err(_) => SiteRemovalOutcome::Failed {
                        reason_code: reason_codes::SITE_TRANSACTION_FAILED,
                    },
                }
            };

            per_site.push(PerSiteReassignment { site_id, outcome });
        }

        store.supervisor_set_status(&req.supervisor_id, RecordStatus::Inactive)?;

        Ok(DeactivateSupervisorResult {
            supervisor_id: req.supervisor_id.clone(),
            per_site,
            supervisor_deactivated: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roster_kernel_contracts::audit::AuditAction;
    use roster_kernel_contracts::org::{
        ActorId, CorrelationId, SiteId, SupervisorId, TenantId, WorkerId,
    };
    use roster_kernel_contracts::MonotonicTimeNs;
    use roster_storage::store::{
        SiteRecord, SupervisorRecord, SupervisorSiteAssignmentRecord, WorkerRecord,
    };

    fn tenant() -> TenantId {
        TenantId::new("tenant_a").unwrap()
    }

    fn actor() -> ActorId {
        ActorId::new("admin_1").unwrap()
    }

    fn seed_site(store: &mut RosterStore, site: &str) -> SiteId {
        let site_id = SiteId::new(site).unwrap();
        store
            .insert_site_row(
                SiteRecord::v1(
                    site_id.clone(),
                    tenant(),
                    RecordStatus::Active,
                    MonotonicTimeNs(1),
                )
                .unwrap(),
            )
            .unwrap();
        site_id
    }

    fn seed_assigned_supervisor(
        store: &mut RosterStore,
        site_id: &SiteId,
        sup: &str,
    ) -> SupervisorId {
        let sup_id = SupervisorId::new(sup).unwrap();
        if store.supervisor_row(&sup_id).is_none() {
            store
                .insert_supervisor_row(
                    SupervisorRecord::v1(
                        sup_id.clone(),
                        tenant(),
                        RecordStatus::Active,
                        MonotonicTimeNs(1),
                    )
                    .unwrap(),
                )
                .unwrap();
        }
        store
            .insert_assignment_row(
                SupervisorSiteAssignmentRecord::v1(
                    site_id.clone(),
                    sup_id.clone(),
                    tenant(),
                    MonotonicTimeNs(2),
                )
                .unwrap(),
            )
            .unwrap();
        sup_id
    }

    fn seed_workers(
        store: &mut RosterStore,
        prefix: &str,
        site_id: &SiteId,
        sup_id: &SupervisorId,
        n: u32,
    ) -> Vec<WorkerId> {
        (0..n)
            .map(|i| {
                let worker_id = WorkerId::new(format!("{prefix}_{i}")).unwrap();
                store
                    .insert_worker_row(
                        WorkerRecord::v1(
                            worker_id.clone(),
                            tenant(),
                            site_id.clone(),
                            Some(sup_id.clone()),
                            RecordStatus::Active,
                            MonotonicTimeNs(3),
                        )
                        .unwrap(),
                    )
                    .unwrap();
                worker_id
            })
            .collect()
    }

    fn deactivate_req(sup_id: &SupervisorId) -> DeactivateSupervisorRequest {
        DeactivateSupervisorRequest::v1(
            MonotonicTimeNs(50),
            CorrelationId(90),
            sup_id.clone(),
            actor(),
            None,
        )
        .unwrap()
    }

    #[test]
    fn at_removal_01_remove_from_site_blocks_on_active_workers() {
        let mut store = RosterStore::new_in_memory();
        let site = seed_site(&mut store, "site_c");
        let sup = seed_assigned_supervisor(&mut store, &site, "sup_4");
        seed_workers(&mut store, "w", &site, &sup, 3);

        let before = store.clone();
        let result = RemovalRuntime::remove_from_site(
            &mut store,
            &RemoveFromSiteRequest::v1(sup.clone(), site.clone()).unwrap(),
        )
        .unwrap();

        assert_eq!(
            result,
            RemoveFromSiteResult::Blocked {
                blocking_worker_count: 3
            }
        );
        // No rows changed.
        assert!(store.assignment_row(&site, &sup).is_some());
        assert_eq!(store.audit_rows().len(), before.audit_rows().len());
        for w in before.active_workers_in_site(&site) {
            assert_eq!(
                store.worker_row(&w.worker_id).unwrap().supervisor_id,
                w.supervisor_id
            );
        }
    }

    #[test]
    fn at_removal_02_remove_from_site_deletes_row_when_unreferenced() {
        let mut store = RosterStore::new_in_memory();
        let site = seed_site(&mut store, "site_c");
        let sup = seed_assigned_supervisor(&mut store, &site, "sup_4");

        let result = RemovalRuntime::remove_from_site(
            &mut store,
            &RemoveFromSiteRequest::v1(sup.clone(), site.clone()).unwrap(),
        )
        .unwrap();

        assert_eq!(result, RemoveFromSiteResult::Removed);
        assert!(store.assignment_row(&site, &sup).is_none());
    }

    #[test]
    fn at_removal_03_deactivate_reassigns_to_least_loaded_remaining() {
        let mut store = RosterStore::new_in_memory();
        let site = seed_site(&mut store, "site_b");
        let s2 = seed_assigned_supervisor(&mut store, &site, "sup_2");
        let s3 = seed_assigned_supervisor(&mut store, &site, "sup_3");
        seed_workers(&mut store, "w2", &site, &s2, 2);
        let moved = seed_workers(&mut store, "w3", &site, &s3, 10);

        let result = RemovalRuntime::deactivate_supervisor(&mut store, &deactivate_req(&s3))
            .unwrap();

        assert_eq!(result.per_site.len(), 1);
        assert_eq!(result.per_site[0].site_id, site);
        let SiteRemovalOutcome::Reassigned {
            affected_count,
            target_supervisor_id,
            audit_event_id,
        } = &result.per_site[0].outcome
        else {
            panic!("expected reassigned outcome");
        };
        assert_eq!(*affected_count, 10);
        assert_eq!(target_supervisor_id, &s2);
        assert!(audit_event_id.is_some());

        for w in &moved {
            assert_eq!(
                store.worker_row(w).unwrap().supervisor_id,
                Some(s2.clone())
            );
        }
        assert_eq!(store.active_worker_count_in_site_for(&site, &s2), 12);
        assert_eq!(
            store.supervisor_row(&s3).unwrap().status,
            RecordStatus::Inactive
        );
        assert!(store.site_is_consistent(&site));
        assert_eq!(store.audit_rows_by_action(AuditAction::AutoReassign).len(), 1);
    }

    #[test]
    fn at_removal_04_deactivate_last_supervisor_clears_references() {
        let mut store = RosterStore::new_in_memory();
        let site = seed_site(&mut store, "site_c");
        let sup = seed_assigned_supervisor(&mut store, &site, "sup_4");
        let workers = seed_workers(&mut store, "w", &site, &sup, 3);

        let result =
            RemovalRuntime::deactivate_supervisor(&mut store, &deactivate_req(&sup)).unwrap();

        let SiteRemovalOutcome::Cleared {
            affected_count,
            audit_event_id,
        } = &result.per_site[0].outcome
        else {
            panic!("expected cleared outcome");
        };
        assert_eq!(*affected_count, 3);
        assert!(audit_event_id.is_some());
        for w in &workers {
            assert_eq!(store.worker_row(w).unwrap().supervisor_id, None);
        }
        assert!(result.supervisor_deactivated);
        assert_eq!(
            store.audit_rows_by_action(AuditAction::AutoUnassign)[0].reason,
            "last supervisor removed from site"
        );
        assert!(store.site_is_consistent(&site));
    }

    #[test]
    fn at_removal_05_per_site_semantics_are_independent() {
        let mut store = RosterStore::new_in_memory();
        // sup_1 is the last supervisor in site_a but has a co-supervisor in site_b.
        let site_a = seed_site(&mut store, "site_a");
        let site_b = seed_site(&mut store, "site_b");
        let s1 = seed_assigned_supervisor(&mut store, &site_a, "sup_1");
        seed_assigned_supervisor(&mut store, &site_b, "sup_1");
        let s2 = seed_assigned_supervisor(&mut store, &site_b, "sup_2");
        seed_workers(&mut store, "wa", &site_a, &s1, 2);
        seed_workers(&mut store, "wb", &site_b, &s1, 4);

        let result =
            RemovalRuntime::deactivate_supervisor(&mut store, &deactivate_req(&s1)).unwrap();

        assert_eq!(result.per_site.len(), 2);
        let outcome_a = &result
            .per_site
            .iter()
            .find(|p| p.site_id == site_a)
            .unwrap()
            .outcome;
        let outcome_b = &result
            .per_site
            .iter()
            .find(|p| p.site_id == site_b)
            .unwrap()
            .outcome;
        assert!(matches!(
            outcome_a,
            SiteRemovalOutcome::Cleared {
                affected_count: 2,
                ..
            }
        ));
        assert!(matches!(
            outcome_b,
            SiteRemovalOutcome::Reassigned { affected_count: 4, .. }
        ));
        assert_eq!(store.active_worker_count_in_site_for(&site_b, &s2), 4);
        assert!(store.site_is_consistent(&site_a));
        assert!(store.site_is_consistent(&site_b));
        // One audit event per site, not one global event.
        assert_eq!(store.audit_rows().len(), 2);
    }

    #[test]
    fn at_removal_06_deactivate_with_no_workers_writes_no_audit() {
        let mut store = RosterStore::new_in_memory();
        let site = seed_site(&mut store, "site_c");
        let sup = seed_assigned_supervisor(&mut store, &site, "sup_4");

        let result =
            RemovalRuntime::deactivate_supervisor(&mut store, &deactivate_req(&sup)).unwrap();

        assert!(matches!(
            result.per_site[0].outcome,
            SiteRemovalOutcome::Cleared {
                affected_count: 0,
                audit_event_id: None
            }
        ));
        assert!(store.audit_rows().is_empty());
        assert!(store.assignment_row(&site, &sup).is_none());
    }

    #[test]
    fn at_removal_07_deactivate_retry_is_a_deterministic_no_op() {
        let mut store = RosterStore::new_in_memory();
        let site = seed_site(&mut store, "site_c");
        let sup = seed_assigned_supervisor(&mut store, &site, "sup_4");
        seed_workers(&mut store, "w", &site, &sup, 3);

        RemovalRuntime::deactivate_supervisor(&mut store, &deactivate_req(&sup)).unwrap();
        let retry =
            RemovalRuntime::deactivate_supervisor(&mut store, &deactivate_req(&sup)).unwrap();

        // All assignment rows are gone; the retry sees no site work left.
        assert!(retry.per_site.is_empty());
        assert!(retry.supervisor_deactivated);
        assert_eq!(store.audit_rows().len(), 1);
    }
}
