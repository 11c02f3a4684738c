#![forbid(unsafe_code)]

use roster_kernel_contracts::org::{SiteId, SupervisorId, TenantId, WorkerId};
use roster_kernel_contracts::{MonotonicTimeNs, RecordStatus};
use roster_storage::store::{
    RosterStore, SiteRecord, SupervisorRecord, SupervisorSiteAssignmentRecord, WorkerRecord,
};

fn tenant() -> TenantId {
    TenantId::new("tenant_a").unwrap()
}

fn seed_site(s: &mut RosterStore, site: &str) -> SiteId {
    let site_id = SiteId::new(site).unwrap();
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
    site_id
}

fn seed_supervisor(s: &mut RosterStore, sup: &str) -> SupervisorId {
    let sup_id = SupervisorId::new(sup).unwrap();
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
    sup_id
}

fn assign(s: &mut RosterStore, site: &SiteId, sup: &SupervisorId) {
    s.insert_assignment_row(
        SupervisorSiteAssignmentRecord::v1(
            site.clone(),
            sup.clone(),
            tenant(),
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
) -> WorkerId {
    let worker_id = WorkerId::new(worker).unwrap();
    s.insert_worker_row(
        WorkerRecord::v1(
            worker_id.clone(),
            tenant(),
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
fn at_integrity_scan_db_01_consistent_store_yields_zero_rows() {
    let mut s = RosterStore::new_in_memory();
    let site = seed_site(&mut s, "site_a");
    let sup = seed_supervisor(&mut s, "sup_1");
    assign(&mut s, &site, &sup);
    seed_worker(&mut s, "w1", &site, Some(&sup));

    assert!(s.orphan_worker_rows(None).is_empty());
    assert!(s.dangling_reference_worker_rows(None).is_empty());
    assert!(s.inactive_supervisor_reference_worker_rows(None).is_empty());
    assert!(s.site_is_consistent(&site));
}

#[test]
fn at_integrity_scan_db_02_orphan_requires_supervised_site() {
    let mut s = RosterStore::new_in_memory();
    let supervised = seed_site(&mut s, "site_a");
    let unsupervised = seed_site(&mut s, "site_b");
    let sup = seed_supervisor(&mut s, "sup_1");
    assign(&mut s, &supervised, &sup);
    let orphan = seed_worker(&mut s, "w1", &supervised, None);
    seed_worker(&mut s, "w2", &unsupervised, None);

    let rows = s.orphan_worker_rows(None);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].worker_id, orphan);
    assert!(!s.site_is_consistent(&supervised));
    assert!(s.site_is_consistent(&unsupervised));
}

#[test]
fn at_integrity_scan_db_03_inactive_workers_never_reported() {
    let mut s = RosterStore::new_in_memory();
    let site = seed_site(&mut s, "site_a");
    let sup = seed_supervisor(&mut s, "sup_1");
    assign(&mut s, &site, &sup);
    let w = seed_worker(&mut s, "w1", &site, None);
    s.worker_set_status(&w, RecordStatus::Inactive, MonotonicTimeNs(5))
        .unwrap();

    assert!(s.orphan_worker_rows(None).is_empty());
}

#[test]
fn at_integrity_scan_db_04_dangling_and_inactive_reference_classification() {
    let mut s = RosterStore::new_in_memory();
    let site = seed_site(&mut s, "site_a");
    let assigned = seed_supervisor(&mut s, "sup_1");
    let unassigned = seed_supervisor(&mut s, "sup_2");
    assign(&mut s, &site, &assigned);
    let dangling = seed_worker(&mut s, "w_dangling", &site, Some(&unassigned));
    let referenced = seed_worker(&mut s, "w_inactive_ref", &site, Some(&assigned));
    s.supervisor_set_status(&assigned, RecordStatus::Inactive)
        .unwrap();

    let dangling_rows = s.dangling_reference_worker_rows(None);
    assert_eq!(dangling_rows.len(), 1);
    assert_eq!(dangling_rows[0].worker_id, dangling);

    let inactive_rows = s.inactive_supervisor_reference_worker_rows(None);
    assert_eq!(inactive_rows.len(), 1);
    assert_eq!(inactive_rows[0].worker_id, referenced);
}

#[test]
fn at_integrity_scan_db_05_site_filter_scopes_rows() {
    let mut s = RosterStore::new_in_memory();
    let site_a = seed_site(&mut s, "site_a");
    let site_b = seed_site(&mut s, "site_b");
    let sup_a = seed_supervisor(&mut s, "sup_1");
    let sup_b = seed_supervisor(&mut s, "sup_2");
    assign(&mut s, &site_a, &sup_a);
    assign(&mut s, &site_b, &sup_b);
    seed_worker(&mut s, "w1", &site_a, None);
    seed_worker(&mut s, "w2", &site_b, None);

    assert_eq!(s.orphan_worker_rows(Some(&site_a)).len(), 1);
    assert_eq!(s.orphan_worker_rows(Some(&site_b)).len(), 1);
    assert_eq!(s.orphan_worker_rows(None).len(), 2);
}

#[test]
fn at_integrity_scan_db_06_queries_are_read_only_and_idempotent() {
    let mut s = RosterStore::new_in_memory();
    let site = seed_site(&mut s, "site_a");
    let sup = seed_supervisor(&mut s, "sup_1");
    assign(&mut s, &site, &sup);
    seed_worker(&mut s, "w1", &site, None);

    let first: Vec<WorkerId> = s
        .orphan_worker_rows(None)
        .into_iter()
        .map(|w| w.worker_id.clone())
        .collect();
    let second: Vec<WorkerId> = s
        .orphan_worker_rows(None)
        .into_iter()
        .map(|w| w.worker_id.clone())
        .collect();
    assert_eq!(first, second);
    assert!(s.audit_rows().is_empty());
}
