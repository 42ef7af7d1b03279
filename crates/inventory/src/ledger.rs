use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use stockplan_core::{AggregateId, DomainError, DomainResult, TenantId};

/// Inventory item identifier (tenant-scoped at the ledger boundary).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InventoryItemId(pub AggregateId);

impl InventoryItemId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for InventoryItemId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Authoritative on-hand quantity store.
///
/// The ledger itself is a dumb quantity store: callers are responsible for
/// serializing access to a row before making authoritative decisions from
/// its value. The engine does that with its row-lock table; an unlocked
/// `on_hand` read is an advisory hint only.
pub trait InventoryLedger: Send + Sync {
    /// Existence + tenant-ownership check.
    fn exists(&self, tenant_id: TenantId, item_id: InventoryItemId) -> bool;

    /// Current on-hand quantity. `NotFound` covers both absent items and
    /// cross-tenant access.
    fn on_hand(&self, tenant_id: TenantId, item_id: InventoryItemId) -> DomainResult<i64>;

    /// Add `delta` (may be negative) to on-hand. Rejects any adjustment
    /// that would take stock below zero.
    fn adjust(
        &self,
        tenant_id: TenantId,
        item_id: InventoryItemId,
        delta: i64,
    ) -> DomainResult<i64>;
}

impl<L> InventoryLedger for Arc<L>
where
    L: InventoryLedger + ?Sized,
{
    fn exists(&self, tenant_id: TenantId, item_id: InventoryItemId) -> bool {
        (**self).exists(tenant_id, item_id)
    }

    fn on_hand(&self, tenant_id: TenantId, item_id: InventoryItemId) -> DomainResult<i64> {
        (**self).on_hand(tenant_id, item_id)
    }

    fn adjust(
        &self,
        tenant_id: TenantId,
        item_id: InventoryItemId,
        delta: i64,
    ) -> DomainResult<i64> {
        (**self).adjust(tenant_id, item_id, delta)
    }
}

/// In-memory ledger for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryInventoryLedger {
    rows: RwLock<HashMap<(TenantId, InventoryItemId), i64>>,
}

impl InMemoryInventoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Seed an item with an initial on-hand quantity (receiving workflows
    /// live outside this engine).
    pub fn put(&self, tenant_id: TenantId, item_id: InventoryItemId, quantity: i64) {
        let mut rows = self.rows.write().unwrap();
        rows.insert((tenant_id, item_id), quantity);
    }
}

impl InventoryLedger for InMemoryInventoryLedger {
    fn exists(&self, tenant_id: TenantId, item_id: InventoryItemId) -> bool {
        let rows = self.rows.read().unwrap();
        rows.contains_key(&(tenant_id, item_id))
    }

    fn on_hand(&self, tenant_id: TenantId, item_id: InventoryItemId) -> DomainResult<i64> {
        let rows = self.rows.read().unwrap();
        rows.get(&(tenant_id, item_id))
            .copied()
            .ok_or(DomainError::NotFound)
    }

    fn adjust(
        &self,
        tenant_id: TenantId,
        item_id: InventoryItemId,
        delta: i64,
    ) -> DomainResult<i64> {
        let mut rows = self.rows.write().unwrap();
        let qty = rows
            .get_mut(&(tenant_id, item_id))
            .ok_or(DomainError::NotFound)?;

        let next = *qty + delta;
        if next < 0 {
            return Err(DomainError::insufficient(format!(
                "item {item_id}: on-hand {qty}, requested delta {delta}"
            )));
        }

        *qty = next;
        Ok(next)
    }
}
