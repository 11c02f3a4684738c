#![forbid(unsafe_code)]

use roster_kernel_contracts::org::{ActorId, CorrelationId, SiteId, SupervisorId, TenantId, WorkerId};
use roster_kernel_contracts::{MonotonicTimeNs, RecordStatus};
use roster_storage::store::{
    RosterStore, SiteRecord, StorageError, SupervisorRecord, SupervisorSiteAssignmentRecord,
    WorkerRecord,
};

fn tenant(id: &str) -> TenantId {
    TenantId::new(id).unwrap()
}

fn seed_site(s: &mut RosterStore, site: &str, tenant_id: &TenantId) -> SiteId {
    let site_id = SiteId::new(site).unwrap();
    s.insert_site_row(
        SiteRecord::v1(
            site_id.clone(),
            tenant_id.clone(),
            RecordStatus::Active,
            MonotonicTimeNs(1),
        )
        .unwrap(),
    )
    .unwrap();
    site_id
}

fn seed_supervisor(s: &mut RosterStore, sup: &str, tenant_id: &TenantId) -> SupervisorId {
    let sup_id = SupervisorId::new(sup).unwrap();
    s.insert_supervisor_row(
        SupervisorRecord::v1(
            sup_id.clone(),
            tenant_id.clone(),
            RecordStatus::Active,
            MonotonicTimeNs(1),
        )
        .unwrap(),
    )
    .unwrap();
    sup_id
}

fn assign(s: &mut RosterStore, site: &SiteId, sup: &SupervisorId, tenant_id: &TenantId) {
    s.insert_assignment_row(
        SupervisorSiteAssignmentRecord::v1(
            site.clone(),
            sup.clone(),
            tenant_id.clone(),
            MonotonicTimeNs(2),
        )
        .unwrap(),
    )
    .unwrap();
}

fn seed_worker(
    s: &mut RosterStore,
    worker: &str,
    site: &SiteId,
    sup: Option<&SupervisorId>,
    tenant_id: &TenantId,
) -> WorkerId {
    let worker_id = WorkerId::new(worker).unwrap();
    s.insert_worker_row(
        WorkerRecord::v1(
            worker_id.clone(),
            tenant_id.clone(),
            site.clone(),
            sup.cloned(),
            RecordStatus::Active,
            MonotonicTimeNs(3),
        )
        .unwrap(),
    )
    .unwrap();
    worker_id
}

#[test]
fn at_assignment_core_db_01_tenant_isolation_enforced() {
    let mut s = RosterStore::new_in_memory();
    let t1 = tenant("tenant_a");
    let t2 = tenant("tenant_b");
    let site = seed_site(&mut s, "site_a", &t1);
    let sup = seed_supervisor(&mut s, "sup_b", &t2);

    let err = s
        .insert_assignment_row(
            SupervisorSiteAssignmentRecord::v1(
                site.clone(),
                sup.clone(),
                t1.clone(),
                MonotonicTimeNs(2),
            )
            .unwrap(),
        )
        .unwrap_err();
    assert!(matches!(err, StorageError::TenantScopeViolation { .. }));

    let err = s
        .insert_worker_row(
            WorkerRecord::v1(
                WorkerId::new("w1").unwrap(),
                t2.clone(),
                site,
                None,
                RecordStatus::Active,
                MonotonicTimeNs(3),
            )
            .unwrap(),
        )
        .unwrap_err();
    assert!(matches!(err, StorageError::TenantScopeViolation { .. }));
}

#[test]
fn at_assignment_core_db_02_delete_missing_assignment_is_an_fk_error() {
    let mut s = RosterStore::new_in_memory();
    let t = tenant("tenant_a");
    let site = seed_site(&mut s, "site_a", &t);
    let sup = seed_supervisor(&mut s, "sup_1", &t);

    assert!(matches!(
        s.delete_assignment_row(&site, &sup),
        Err(StorageError::ForeignKeyViolation { .. })
    ));
}

#[test]
fn at_assignment_core_db_03_clear_commit_is_atomic_on_failure() {
    let mut s = RosterStore::new_in_memory();
    let t = tenant("tenant_a");
    let site = seed_site(&mut s, "site_a", &t);
    let s1 = seed_supervisor(&mut s, "sup_1", &t);
    let s2 = seed_supervisor(&mut s, "sup_2", &t);
    assign(&mut s, &site, &s1, &t);
    assign(&mut s, &site, &s2, &t);
    let w = seed_worker(&mut s, "w1", &site, Some(&s1), &t);

    // Another active supervisor remains, so the last-supervisor clear must
    // fail closed and leave every row untouched.
    let err = s
        .site_removal_clear_commit(
            MonotonicTimeNs(10),
            &site,
            &s1,
            ActorId::new("admin_1").unwrap(),
            CorrelationId(9),
            None,
        )
        .unwrap_err();
    assert!(matches!(err, StorageError::StaleState { .. }));
    assert!(s.assignment_row(&site, &s1).is_some());
    assert_eq!(s.worker_row(&w).unwrap().supervisor_id, Some(s1));
    assert!(s.audit_rows().is_empty());
}

#[test]
fn at_assignment_core_db_04_reassign_commit_requires_assigned_target() {
    let mut s = RosterStore::new_in_memory();
    let t = tenant("tenant_a");
    let site = seed_site(&mut s, "site_a", &t);
    let s1 = seed_supervisor(&mut s, "sup_1", &t);
    let unassigned = seed_supervisor(&mut s, "sup_x", &t);
    assign(&mut s, &site, &s1, &t);
    seed_worker(&mut s, "w1", &site, Some(&s1), &t);

    let err = s
        .site_removal_reassign_commit(
            MonotonicTimeNs(10),
            &site,
            &s1,
            &unassigned,
            ActorId::new("admin_1").unwrap(),
            CorrelationId(9),
            None,
        )
        .unwrap_err();
    assert!(matches!(err, StorageError::StaleState { .. }));
    assert!(s.assignment_row(&site, &s1).is_some());
    assert!(s.audit_rows().is_empty());
}

#[test]
fn at_assignment_core_db_05_worker_move_requires_destination_site_row() {
    let mut s = RosterStore::new_in_memory();
    let t = tenant("tenant_a");
    let site = seed_site(&mut s, "site_a", &t);
    let w = seed_worker(&mut s, "w1", &site, None, &t);

    let missing = SiteId::new("site_missing").unwrap();
    let err = s
        .worker_move_site(&w, &missing, None, MonotonicTimeNs(9))
        .unwrap_err();
    assert!(matches!(
        err,
        StorageError::ForeignKeyViolation { table: "sites", .. }
    ));
    assert_eq!(s.worker_row(&w).unwrap().site_id, site);
}

#[test]
fn at_assignment_core_db_06_duplicate_directory_rows_rejected() {
    let mut s = RosterStore::new_in_memory();
    let t = tenant("tenant_a");
    let site = seed_site(&mut s, "site_a", &t);
    seed_worker(&mut s, "w1", &site, None, &t);

    let err = s
        .insert_worker_row(
            WorkerRecord::v1(
                WorkerId::new("w1").unwrap(),
                t.clone(),
                site,
                None,
                RecordStatus::Active,
                MonotonicTimeNs(4),
            )
            .unwrap(),
        )
        .unwrap_err();
    assert!(matches!(
        err,
        StorageError::DuplicateKey { table: "workers", .. }
    ));
}
