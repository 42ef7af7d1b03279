//! `stockplan-inventory` — the inventory ledger boundary.
//!
//! The ledger is authoritative for on-hand quantity per item, scoped to a
//! tenant. The allocation engine consumes it; it does not own it. Mutation
//! happens only from job completion (consumption) and void-after-partial-
//! completion (compensating reversal), always under the engine's row locks.

pub mod ledger;

pub use ledger::{InMemoryInventoryLedger, InventoryItemId, InventoryLedger};
