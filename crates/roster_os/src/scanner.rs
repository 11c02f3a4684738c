#![forbid(unsafe_code)]

use roster_kernel_contracts::org::SiteId;
use roster_kernel_contracts::report::{IntegrityFinding, IntegrityFindingKind, IntegrityReport};
use roster_kernel_contracts::MonotonicTimeNs;
use roster_storage::store::{RosterStore, StorageError, WorkerRecord};

/// Read-only integrity auditor. Finds workers whose assignment state
/// violates the site invariants; never mutates anything. Repair is a
/// separate, explicit, audited operation.
#[derive(Debug, Default, Clone)]
pub struct IntegrityScanner;

impl IntegrityScanner {
    fn check_filter(
        store: &RosterStore,
        site_filter: Option<&SiteId>,
    ) -> Result<(), StorageError> {
        if let Some(site_id) = site_filter {
            if store.site_row(site_id).is_none() {
                return Err(StorageError::ForeignKeyViolation {
                    table: "sites",
                    key: site_id.as_str().to_string(),
                });
            }
        }
        Ok(())
    }

    /// Active workers with a null supervisor reference while their site has
    /// one or more active supervisor assignments.
    pub fn find_orphans(
        store: &RosterStore,
        site_filter: Option<&SiteId>,
    ) -> Result<Vec<WorkerRecord>, StorageError> {
        Self::check_filter(store, site_filter)?;
        Ok(store
            .orphan_worker_rows(site_filter)
            .into_iter()
            .cloned()
            .collect())
    }

    /// Active workers whose reference points at a supervisor with no
    /// assignment row for the worker's site. Stronger violation than a
    /// plain orphan.
    pub fn find_dangling_references(
        store: &RosterStore,
        site_filter: Option<&SiteId>,
    ) -> Result<Vec<WorkerRecord>, StorageError> {
        Self::check_filter(store, site_filter)?;
        Ok(store
            .dangling_reference_worker_rows(site_filter)
            .into_iter()
            .cloned()
            .collect())
    }

    /// Active workers referencing a now-inactive supervisor. Flagged for
    /// review only; the worker's own lifecycle is independent.
    pub fn find_inactive_supervisor_references(
        store: &RosterStore,
        site_filter: Option<&SiteId>,
    ) -> Result<Vec<WorkerRecord>, StorageError> {
        Self::check_filter(store, site_filter)?;
        Ok(store
            .inactive_supervisor_reference_worker_rows(site_filter)
            .into_iter()
            .cloned()
            .collect())
    }

    /// Aggregate report over all three queries, exportable for admin
    /// tooling. Zero findings on a consistent store is the expected common
    /// case.
    pub fn scan(
        store: &RosterStore,
        scanned_at: MonotonicTimeNs,
        site_filter: Option<&SiteId>,
    ) -> Result<IntegrityReport, StorageError> {
        Self::check_filter(store, site_filter)?;

        let mut findings = Vec::new();
        for w in store.orphan_worker_rows(site_filter) {
            findings.push(IntegrityFinding {
                kind: IntegrityFindingKind::Orphan,
                worker_id: w.worker_id.clone(),
                site_id: w.site_id.clone(),
                supervisor_id: None,
            });
        }
        for w in store.dangling_reference_worker_rows(site_filter) {
            findings.push(IntegrityFinding {
                kind: IntegrityFindingKind::DanglingReference,
                worker_id: w.worker_id.clone(),
                site_id: w.site_id.clone(),
                supervisor_id: w.supervisor_id.clone(),
            });
        }
        for w in store.inactive_supervisor_reference_worker_rows(site_filter) {
            findings.push(IntegrityFinding {
                kind: IntegrityFindingKind::InactiveSupervisorReference,
                worker_id: w.worker_id.clone(),
                site_id: w.site_id.clone(),
                supervisor_id: w.supervisor_id.clone(),
            });
        }

        IntegrityReport::v1(scanned_at, site_filter.cloned(), findings)
            .map_err(StorageError::ContractViolation)
    }
}
