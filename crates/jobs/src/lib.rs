//! `stockplan-jobs` — job-based inventory allocation and reservation engine.
//!
//! Plans material requirements per job (BOM lines), reserves on-hand stock
//! against approved jobs (allocations), tracks unmet demand deterministically
//! (shortfalls), and irreversibly consumes stock on completion.
//!
//! The guarded invariant: for every item, the sum of allocated quantity
//! across approved/in-progress jobs never exceeds the item's on-hand
//! quantity. The lifecycle controller enforces it with exclusive row locks
//! taken in deterministic order before any authoritative read.

pub mod allocation;
pub mod bom;
pub mod events;
pub mod job;
pub mod locks;
pub mod service;
pub mod shortfall;
pub mod store;

pub use allocation::AllocationLedger;
pub use bom::{BomLine, BomLinePreview, BomStore, MAX_PLANNED_QTY};
pub use events::{JobEvent, JobEventKind};
pub use job::{Job, JobId, JobStatus};
pub use locks::RowLocks;
pub use service::{ActualLine, BlockedOutcome, JobOutcome, JobReadiness, JobService, ShortfallDetail};
pub use shortfall::{Shortfall, ShortfallId, ShortfallStatus, ShortfallTracker};
pub use store::JobStore;
