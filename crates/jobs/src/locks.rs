use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use uuid::Uuid;

use stockplan_inventory::InventoryItemId;

use crate::job::JobId;

/// Per-row exclusive lock table.
///
/// Hands out `Arc<Mutex<()>>` handles keyed by row id. An operation locks
/// the job row first, then every referenced inventory item row in ascending
/// item-id order, and only then performs the reads its decision depends on.
/// The fixed ordering is what prevents deadlock between two operations whose
/// item sets overlap but were supplied in different orders.
#[derive(Debug, Default)]
pub struct RowLocks {
    table: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl RowLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn handle(&self, key: Uuid) -> Arc<Mutex<()>> {
        let mut table = self.table.lock().unwrap();
        table.entry(key).or_default().clone()
    }

    /// Handle for a job row. Lock this before any item row.
    pub fn job_handle(&self, job_id: JobId) -> Arc<Mutex<()>> {
        self.handle(*job_id.0.as_uuid())
    }

    /// Handles for a set of item rows, deduplicated and in ascending id
    /// order. Lock them in the returned order.
    pub fn item_handles(&self, items: &[InventoryItemId]) -> Vec<Arc<Mutex<()>>> {
        let mut sorted: Vec<InventoryItemId> = items.to_vec();
        sorted.sort();
        sorted.dedup();
        sorted
            .into_iter()
            .map(|item| self.handle(*item.0.as_uuid()))
            .collect()
    }
}

/// Lock a slice of handles in order, returning the guards.
///
/// The guards borrow the handles, so callers keep the `Vec` of handles alive
/// for the duration of the operation scope.
pub fn lock_all(handles: &[Arc<Mutex<()>>]) -> Vec<MutexGuard<'_, ()>> {
    handles.iter().map(|h| h.lock().unwrap()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockplan_core::AggregateId;

    #[test]
    fn same_row_yields_the_same_mutex() {
        let locks = RowLocks::new();
        let job = JobId::new(AggregateId::new());

        let a = locks.job_handle(job);
        let b = locks.job_handle(job);
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn item_handles_are_sorted_and_deduplicated() {
        let locks = RowLocks::new();
        let x = InventoryItemId::new(AggregateId::from_uuid(Uuid::from_u128(9)));
        let y = InventoryItemId::new(AggregateId::from_uuid(Uuid::from_u128(3)));

        let handles = locks.item_handles(&[x, y, x]);
        assert_eq!(handles.len(), 2);

        // First handle corresponds to the smaller id regardless of input order.
        let y_first = locks.item_handles(&[y]);
        assert!(Arc::ptr_eq(&handles[0], &y_first[0]));
    }

    #[test]
    fn overlapping_sets_lock_in_the_same_order() {
        let locks = RowLocks::new();
        let items: Vec<_> = (1..=4u128)
            .map(|n| InventoryItemId::new(AggregateId::from_uuid(Uuid::from_u128(n))))
            .collect();

        let forward = locks.item_handles(&items);
        let mut reversed = items.clone();
        reversed.reverse();
        let backward = locks.item_handles(&reversed);

        for (a, b) in forward.iter().zip(backward.iter()) {
            assert!(Arc::ptr_eq(a, b));
        }
    }

    #[test]
    fn guards_exclude_each_other() {
        let locks = Arc::new(RowLocks::new());
        let job = JobId::new(AggregateId::new());

        let handle = locks.job_handle(job);
        let guard = handle.lock().unwrap();

        let contender = locks.job_handle(job);
        assert!(contender.try_lock().is_err());
        drop(guard);
        assert!(contender.try_lock().is_ok());
    }
}
