#![forbid(unsafe_code)]

use roster_kernel_contracts::org::{SiteId, SupervisorId};
use roster_storage::store::{RosterStore, StorageError};

/// Least-loaded supervisor selection for reassignment targets.
///
/// Load is the candidate's active-worker count *within the site only*;
/// cross-site workers for the same supervisor are irrelevant. Ties break by
/// ascending supervisor identifier so selection is reproducible in tests.
#[derive(Debug, Default, Clone)]
pub struct LoadBalancer;

impl LoadBalancer {
    pub fn least_loaded(
        store: &RosterStore,
        site_id: &SiteId,
        excluding: Option<&SupervisorId>,
    ) -> Result<Option<SupervisorId>, StorageError> {
        if store.site_row(site_id).is_none() {
            return Err(StorageError::ForeignKeyViolation {
                table: "sites",
                key: site_id.as_str().to_string(),
            });
        }

        let mut best: Option<(u32, SupervisorId)> = None;
        // Candidates arrive in ascending id order; strict `<` keeps the
        // lowest id on ties.
        for candidate in store.active_supervisors_for_site(site_id) {
            if excluding == Some(&candidate) {
                continue;
            }
            let load = store.active_worker_count_in_site_for(site_id, &candidate);
            match &best {
                Some((best_load, _)) if load >= *best_load => {}
                _ => best = Some((load, candidate)),
            }
        }
        Ok(best.map(|(_, supervisor_id)| supervisor_id))
    }
}
