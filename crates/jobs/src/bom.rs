use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use stockplan_core::TenantId;
use stockplan_inventory::InventoryItemId;

use crate::job::JobId;

/// Upper bound on a planned quantity. Keeps whole-unit plans exactly
/// representable in both `f64` and `i64`.
pub const MAX_PLANNED_QTY: f64 = 1e15;

/// Planned quantity of one item a job intends to consume.
///
/// Quantities may be fractional while planning; approval requires them to be
/// whole numbers (reservations are integral units of stock).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BomLine {
    pub job_id: JobId,
    pub item_id: InventoryItemId,
    pub qty_planned: f64,
}

impl BomLine {
    /// The planned quantity as whole units, if it is integral and within
    /// [`MAX_PLANNED_QTY`]. A cast outside that range would saturate.
    pub fn whole_units(&self) -> Option<i64> {
        if self.qty_planned.fract() == 0.0
            && self.qty_planned > 0.0
            && self.qty_planned <= MAX_PLANNED_QTY
        {
            Some(self.qty_planned as i64)
        } else {
            None
        }
    }
}

/// Advisory availability preview returned from a BOM edit.
///
/// Computed without locks; may be stale relative to concurrent activity.
/// Only `approve_job` makes an authoritative determination.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BomLinePreview {
    /// `on_hand - reserved_by_other_jobs` at the time of the read.
    pub available: f64,
    /// `max(qty_planned - available, 0)`.
    pub shortfall: f64,
}

/// Planned quantity per (job, item), unique per pair.
///
/// The store holds plain plan data; which job states admit edits is enforced
/// by the lifecycle controller, the sole writer. Lines are kept per job in
/// item-id order so lock acquisition over a job's BOM is deterministic.
#[derive(Debug, Default)]
pub struct BomStore {
    lines: RwLock<HashMap<(TenantId, JobId), BTreeMap<InventoryItemId, f64>>>,
}

impl BomStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or update the planned quantity for (job, item).
    pub fn upsert_line(
        &self,
        tenant_id: TenantId,
        job_id: JobId,
        item_id: InventoryItemId,
        qty_planned: f64,
    ) {
        let mut lines = self.lines.write().unwrap();
        lines
            .entry((tenant_id, job_id))
            .or_default()
            .insert(item_id, qty_planned);
    }

    /// All lines for a job, in ascending item-id order.
    pub fn lines_for_job(&self, tenant_id: TenantId, job_id: JobId) -> Vec<BomLine> {
        let lines = self.lines.read().unwrap();
        lines
            .get(&(tenant_id, job_id))
            .map(|per_item| {
                per_item
                    .iter()
                    .map(|(item_id, qty)| BomLine {
                        job_id,
                        item_id: *item_id,
                        qty_planned: *qty,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}
