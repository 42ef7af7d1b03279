use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockplan_core::{AggregateId, TenantId};
use stockplan_inventory::InventoryItemId;

use crate::job::JobId;

/// Shortfall record identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShortfallId(pub AggregateId);

impl core::fmt::Display for ShortfallId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShortfallStatus {
    /// Unmet demand currently standing between the job and approval.
    Active,
    /// Demand was met (stock arrived, plan shrank, or the job approved).
    Resolved,
    /// The job was voided; the demand no longer exists.
    Canceled,
}

/// Recorded unmet demand for an item on a job.
///
/// Current-state record, not an append-only log: rows are never deleted,
/// their status is mutated in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shortfall {
    pub id: ShortfallId,
    pub tenant_id: TenantId,
    pub job_id: JobId,
    pub item_id: InventoryItemId,
    pub qty_missing: i64,
    pub status: ShortfallStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Tracks shortfall records with a structural guarantee: at most one
/// *active* row per (job, item).
///
/// The active-row index is part of the structure, not application logic —
/// `upsert_active` can only ever update the one indexed row or create the
/// first one, so a duplicate active pair cannot be represented.
#[derive(Debug, Default)]
pub struct ShortfallTracker {
    rows: RwLock<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    records: HashMap<ShortfallId, Shortfall>,
    /// (tenant, job, item) -> the single active record for that pair.
    active: HashMap<(TenantId, JobId, InventoryItemId), ShortfallId>,
}

impl ShortfallTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record unmet demand for (job, item): updates the active row in place
    /// if one exists, otherwise inserts a new one. Returns the record id.
    pub fn upsert_active(
        &self,
        tenant_id: TenantId,
        job_id: JobId,
        item_id: InventoryItemId,
        qty_missing: i64,
    ) -> ShortfallId {
        debug_assert!(qty_missing > 0);
        let mut inner = self.rows.write().unwrap();
        let key = (tenant_id, job_id, item_id);

        if let Some(id) = inner.active.get(&key).copied() {
            if let Some(record) = inner.records.get_mut(&id) {
                record.qty_missing = qty_missing;
                record.updated_at = Utc::now();
                return id;
            }
        }

        let id = ShortfallId(AggregateId::new());
        let now = Utc::now();
        inner.records.insert(
            id,
            Shortfall {
                id,
                tenant_id,
                job_id,
                item_id,
                qty_missing,
                status: ShortfallStatus::Active,
                created_at: now,
                updated_at: now,
            },
        );
        inner.active.insert(key, id);
        id
    }

    /// Resolve the active shortfall for (job, item), if any.
    pub fn resolve_active(&self, tenant_id: TenantId, job_id: JobId, item_id: InventoryItemId) {
        self.close(tenant_id, job_id, Some(item_id), ShortfallStatus::Resolved);
    }

    /// Resolve every active shortfall for a job (it approved cleanly).
    pub fn resolve_all_active(&self, tenant_id: TenantId, job_id: JobId) {
        self.close(tenant_id, job_id, None, ShortfallStatus::Resolved);
    }

    /// Cancel every active shortfall for a job (it was voided). Canceled,
    /// not resolved: the demand went away without being met.
    pub fn cancel_active(&self, tenant_id: TenantId, job_id: JobId) {
        self.close(tenant_id, job_id, None, ShortfallStatus::Canceled);
    }

    fn close(
        &self,
        tenant_id: TenantId,
        job_id: JobId,
        item_id: Option<InventoryItemId>,
        to: ShortfallStatus,
    ) {
        let mut inner = self.rows.write().unwrap();
        let keys: Vec<_> = inner
            .active
            .keys()
            .filter(|(t, j, i)| {
                *t == tenant_id && *j == job_id && item_id.is_none_or(|item| *i == item)
            })
            .copied()
            .collect();

        for key in keys {
            if let Some(id) = inner.active.remove(&key) {
                if let Some(record) = inner.records.get_mut(&id) {
                    record.status = to;
                    record.updated_at = Utc::now();
                }
            }
        }
    }

    /// Active shortfalls for a job, in item-id order.
    pub fn active_for_job(&self, tenant_id: TenantId, job_id: JobId) -> Vec<Shortfall> {
        let inner = self.rows.read().unwrap();
        let mut out: Vec<_> = inner
            .active
            .iter()
            .filter(|((t, j, _), _)| *t == tenant_id && *j == job_id)
            .filter_map(|(_, id)| inner.records.get(id).cloned())
            .collect();
        out.sort_by_key(|s| s.item_id);
        out
    }

    /// Every record ever created for a job, resolved/canceled included.
    pub fn history_for_job(&self, tenant_id: TenantId, job_id: JobId) -> Vec<Shortfall> {
        let inner = self.rows.read().unwrap();
        let mut out: Vec<_> = inner
            .records
            .values()
            .filter(|s| s.tenant_id == tenant_id && s.job_id == job_id)
            .cloned()
            .collect();
        out.sort_by_key(|s| (s.item_id, s.created_at));
        out
    }
}
