use std::collections::HashMap;
use std::sync::RwLock;

use stockplan_core::TenantId;
use stockplan_inventory::InventoryItemId;

use crate::job::JobId;

/// Reserved-but-unconsumed quantity per (job, item).
///
/// A pure store: it does not police which job statuses may hold rows. That
/// invariant — rows exist exactly while the job is approved/in-progress —
/// is enforced by the lifecycle controller, the only writer. All writes to
/// an item's rows happen while the controller holds that item's row lock,
/// which is what makes `reserved_by_others` safe as an authoritative read
/// under the same lock.
#[derive(Debug, Default)]
pub struct AllocationLedger {
    rows: RwLock<HashMap<(TenantId, JobId, InventoryItemId), i64>>,
}

impl AllocationLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or replace the reservation for (job, item).
    pub fn upsert(
        &self,
        tenant_id: TenantId,
        job_id: JobId,
        item_id: InventoryItemId,
        qty_allocated: i64,
    ) {
        debug_assert!(qty_allocated >= 0);
        let mut rows = self.rows.write().unwrap();
        rows.insert((tenant_id, job_id, item_id), qty_allocated);
    }

    /// Drop every reservation held by a job (it completed or was voided).
    pub fn delete_for_job(&self, tenant_id: TenantId, job_id: JobId) {
        let mut rows = self.rows.write().unwrap();
        rows.retain(|(t, j, _), _| !(*t == tenant_id && *j == job_id));
    }

    /// Total quantity of `item_id` reserved by jobs other than `job_id`.
    ///
    /// The excluded job's own rows never count against it, so re-approval
    /// after a BOM edit sees only competing demand.
    pub fn reserved_by_others(
        &self,
        tenant_id: TenantId,
        item_id: InventoryItemId,
        excluding_job: JobId,
    ) -> i64 {
        let rows = self.rows.read().unwrap();
        rows.iter()
            .filter(|((t, j, i), _)| *t == tenant_id && *i == item_id && *j != excluding_job)
            .map(|(_, qty)| *qty)
            .sum()
    }

    /// Current reservations held by a job, as (item, qty) pairs.
    pub fn allocations_for_job(
        &self,
        tenant_id: TenantId,
        job_id: JobId,
    ) -> Vec<(InventoryItemId, i64)> {
        let rows = self.rows.read().unwrap();
        let mut out: Vec<_> = rows
            .iter()
            .filter(|((t, j, _), _)| *t == tenant_id && *j == job_id)
            .map(|((_, _, i), qty)| (*i, *qty))
            .collect();
        out.sort_by_key(|(i, _)| *i);
        out
    }

    /// Total reserved quantity for an item across all jobs (reporting).
    pub fn total_reserved(&self, tenant_id: TenantId, item_id: InventoryItemId) -> i64 {
        let rows = self.rows.read().unwrap();
        rows.iter()
            .filter(|((t, _, i), _)| *t == tenant_id && *i == item_id)
            .map(|(_, qty)| *qty)
            .sum()
    }
}
