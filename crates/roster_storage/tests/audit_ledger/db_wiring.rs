#![forbid(unsafe_code)]

use roster_kernel_contracts::audit::{
    AssignmentAuditEventInput, AuditAction, WorkerAssignmentChange,
};
use roster_kernel_contracts::org::{
    ActorId, CorrelationId, SiteId, SupervisorId, TenantId, WorkerId,
};
use roster_kernel_contracts::{MonotonicTimeNs, ReasonCodeId, RecordStatus};
use roster_storage::store::{
    assignment_state_digest_hex, RosterStore, SiteRecord, StorageError, SupervisorRecord,
    SupervisorSiteAssignmentRecord, WorkerRecord,
};

fn tenant() -> TenantId {
    TenantId::new("tenant_a").unwrap()
}

fn seeded_store(n_workers: u32) -> (RosterStore, SiteId, SupervisorId) {
    let mut s = RosterStore::new_in_memory();
    let site_id = SiteId::new("site_a").unwrap();
    let sup_id = SupervisorId::new("sup_1").unwrap();
    s.insert_site_row(
        SiteRecord::v1(
            site_id.clone(),
            tenant(),
            RecordStatus::Active,
            MonotonicTimeNs(1),
        )
        .unwrap(),
    )
    .unwrap();
    s.insert_supervisor_row(
        SupervisorRecord::v1(
            sup_id.clone(),
            tenant(),
            RecordStatus::Active,
            MonotonicTimeNs(1),
        )
        .unwrap(),
    )
    .unwrap();
    s.insert_assignment_row(
        SupervisorSiteAssignmentRecord::v1(
            site_id.clone(),
            sup_id.clone(),
            tenant(),
            MonotonicTimeNs(2),
        )
        .unwrap(),
    )
    .unwrap();
    for i in 0..n_workers {
        s.insert_worker_row(
            WorkerRecord::v1(
                WorkerId::new(format!("w{i}")).unwrap(),
                tenant(),
                site_id.clone(),
                None,
                RecordStatus::Active,
                MonotonicTimeNs(3),
            )
            .unwrap(),
        )
        .unwrap();
    }
    (s, site_id, sup_id)
}

fn event_input(
    site_id: &SiteId,
    sup_id: &SupervisorId,
    worker: &str,
    idempotency_key: Option<&str>,
) -> AssignmentAuditEventInput {
    AssignmentAuditEventInput::v1(
        MonotonicTimeNs(10),
        tenant(),
        site_id.clone(),
        AuditAction::AutoAssign,
        ActorId::new("admin_1").unwrap(),
        ReasonCodeId(0x4141_0001),
        "first supervisor added to site".to_string(),
        None,
        Some(sup_id.clone()),
        vec![WorkerAssignmentChange::v1(
            WorkerId::new(worker).unwrap(),
            None,
            Some(sup_id.clone()),
        )
        .unwrap()],
        CorrelationId(500),
        idempotency_key.map(ToString::to_string),
    )
    .unwrap()
}

#[test]
fn at_audit_ledger_db_01_event_ids_are_monotonic() {
    let (mut s, site_id, sup_id) = seeded_store(0);
    let a = s
        .append_audit_event(event_input(&site_id, &sup_id, "w1", None))
        .unwrap();
    let b = s
        .append_audit_event(event_input(&site_id, &sup_id, "w2", None))
        .unwrap();
    let c = s
        .append_audit_event(event_input(&site_id, &sup_id, "w3", None))
        .unwrap();
    assert!(a.0 < b.0 && b.0 < c.0);
    assert_eq!(s.audit_rows().len(), 3);
}

#[test]
fn at_audit_ledger_db_02_append_only_enforced() {
    let (mut s, site_id, sup_id) = seeded_store(0);
    let id = s
        .append_audit_event(event_input(&site_id, &sup_id, "w1", None))
        .unwrap();
    assert!(matches!(
        s.attempt_overwrite_audit_event(id),
        Err(StorageError::AppendOnlyViolation { .. })
    ));
}

#[test]
fn at_audit_ledger_db_03_idempotency_dedupe_works() {
    let (mut s, site_id, sup_id) = seeded_store(0);
    let a = s
        .append_audit_event(event_input(&site_id, &sup_id, "w1", Some("dup")))
        .unwrap();
    let b = s
        .append_audit_event(event_input(&site_id, &sup_id, "w1", Some("dup")))
        .unwrap();
    assert_eq!(a, b);
    assert_eq!(s.audit_rows().len(), 1);
}

#[test]
fn at_audit_ledger_db_04_one_event_per_sweep_not_per_row() {
    let (mut s, site_id, sup_id) = seeded_store(7);
    let (updated, event_id) = s
        .auto_assign_unassigned_workers_commit(
            MonotonicTimeNs(10),
            &site_id,
            &sup_id,
            ActorId::new("admin_1").unwrap(),
            CorrelationId(500),
            None,
        )
        .unwrap();
    assert_eq!(updated, 7);
    assert!(event_id.is_some());
    assert_eq!(s.audit_rows().len(), 1);
    assert_eq!(s.audit_rows()[0].changes.len(), 7);
}

#[test]
fn at_audit_ledger_db_05_recorded_digest_matches_change_list() {
    let (mut s, site_id, sup_id) = seeded_store(2);
    s.auto_assign_unassigned_workers_commit(
        MonotonicTimeNs(10),
        &site_id,
        &sup_id,
        ActorId::new("admin_1").unwrap(),
        CorrelationId(500),
        None,
    )
    .unwrap();

    let event = &s.audit_rows()[0];
    assert_eq!(
        event.state_digest_hex,
        assignment_state_digest_hex(&event.changes)
    );
}

#[test]
fn at_audit_ledger_db_06_query_surface_filters_scope() {
    let (mut s, site_id, sup_id) = seeded_store(0);
    s.append_audit_event(event_input(&site_id, &sup_id, "w1", None))
        .unwrap();

    assert_eq!(s.audit_rows_by_site(&site_id).len(), 1);
    assert_eq!(s.audit_rows_by_tenant(&tenant()).len(), 1);
    assert_eq!(
        s.audit_rows_by_actor(&ActorId::new("admin_1").unwrap()).len(),
        1
    );
    assert_eq!(s.audit_rows_by_action(AuditAction::AutoAssign).len(), 1);
    assert!(s.audit_rows_by_action(AuditAction::AutoUnassign).is_empty());
    assert!(s
        .audit_rows_by_tenant(&TenantId::new("tenant_other").unwrap())
        .is_empty());
}
