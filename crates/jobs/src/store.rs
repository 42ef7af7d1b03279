//! Job record storage.

use std::collections::HashMap;
use std::sync::RwLock;

use stockplan_core::{DomainError, DomainResult, TenantId};
use stockplan_inventory::InventoryItemId;

use crate::job::{Job, JobId};

/// Tenant-isolated store of job records and their recorded actual usage.
///
/// Jobs are never physically deleted; terminal jobs stay queryable forever.
/// Actuals are retained after completion so a void of a partially completed
/// job can reverse the consumption.
#[derive(Debug, Default)]
pub struct JobStore {
    jobs: RwLock<HashMap<JobId, Job>>,
    actuals: RwLock<HashMap<(TenantId, JobId), Vec<(InventoryItemId, i64)>>>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, job: Job) -> DomainResult<()> {
        use stockplan_core::Entity;
        let mut jobs = self.jobs.write().unwrap();
        let id = *job.id();
        if jobs.contains_key(&id) {
            return Err(DomainError::conflict(format!("job {id} already exists")));
        }
        jobs.insert(id, job);
        Ok(())
    }

    /// Fetch a job, enforcing tenant isolation: a job belonging to another
    /// tenant is indistinguishable from an absent one.
    pub fn get(&self, tenant_id: TenantId, job_id: JobId) -> DomainResult<Job> {
        let jobs = self.jobs.read().unwrap();
        match jobs.get(&job_id) {
            Some(job) if job.tenant_id() == tenant_id => Ok(job.clone()),
            _ => Err(DomainError::NotFound),
        }
    }

    pub fn update(&self, job: &Job) -> DomainResult<()> {
        use stockplan_core::Entity;
        let mut jobs = self.jobs.write().unwrap();
        let id = *job.id();
        if !jobs.contains_key(&id) {
            return Err(DomainError::NotFound);
        }
        jobs.insert(id, job.clone());
        Ok(())
    }

    /// Replace the job's recorded actual usage.
    pub fn record_actuals(
        &self,
        tenant_id: TenantId,
        job_id: JobId,
        usage: Vec<(InventoryItemId, i64)>,
    ) {
        let mut actuals = self.actuals.write().unwrap();
        actuals.insert((tenant_id, job_id), usage);
    }

    pub fn actuals_for_job(
        &self,
        tenant_id: TenantId,
        job_id: JobId,
    ) -> Option<Vec<(InventoryItemId, i64)>> {
        let actuals = self.actuals.read().unwrap();
        actuals.get(&(tenant_id, job_id)).cloned()
    }

    /// Remove the actuals record (after a void has reversed them).
    pub fn clear_actuals(&self, tenant_id: TenantId, job_id: JobId) {
        let mut actuals = self.actuals.write().unwrap();
        actuals.remove(&(tenant_id, job_id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockplan_core::AggregateId;

    fn test_job(tenant: TenantId) -> Job {
        Job::new(JobId::new(AggregateId::new()), tenant, "Deck repair", "").unwrap()
    }

    #[test]
    fn get_is_tenant_isolated() {
        use stockplan_core::Entity;
        let store = JobStore::new();
        let tenant = TenantId::new();
        let job = test_job(tenant);
        let id = *job.id();
        store.insert(job).unwrap();

        assert!(store.get(tenant, id).is_ok());
        assert_eq!(store.get(TenantId::new(), id), Err(DomainError::NotFound));
    }

    #[test]
    fn duplicate_insert_is_a_conflict() {
        let store = JobStore::new();
        let job = test_job(TenantId::new());
        store.insert(job.clone()).unwrap();
        assert!(matches!(
            store.insert(job),
            Err(DomainError::ConcurrencyConflict(_))
        ));
    }

    #[test]
    fn actuals_round_trip_and_clear() {
        let store = JobStore::new();
        let tenant = TenantId::new();
        let job_id = JobId::new(AggregateId::new());
        let item = InventoryItemId::new(AggregateId::new());

        assert!(store.actuals_for_job(tenant, job_id).is_none());
        store.record_actuals(tenant, job_id, vec![(item, 4)]);
        assert_eq!(store.actuals_for_job(tenant, job_id), Some(vec![(item, 4)]));

        store.clear_actuals(tenant, job_id);
        assert!(store.actuals_for_job(tenant, job_id).is_none());
    }
}
