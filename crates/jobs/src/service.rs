//! Job lifecycle controller.
//!
//! Orchestrates create / BOM-edit / quote / approve / start / complete /
//! void as atomic operations composing the BOM store, allocation ledger,
//! shortfall tracker and job store, plus the external inventory ledger,
//! permission and event collaborators.
//!
//! Every mutating operation follows the same discipline: authorize, lock
//! the job row, lock the referenced item rows in sorted order, run every
//! check, and only then write. An error anywhere before the write phase
//! leaves no partial state.

use std::collections::HashSet;

use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};

use stockplan_auth::{JOBS_APPROVE, JOBS_WRITE, Permission, Principal, authorize};
use stockplan_core::{AggregateId, DomainError, DomainResult, Entity};
use stockplan_events::EventBus;
use stockplan_inventory::{InventoryItemId, InventoryLedger};

use crate::allocation::AllocationLedger;
use crate::bom::{BomLine, BomLinePreview, BomStore, MAX_PLANNED_QTY};
use crate::events::{JobEvent, JobEventKind};
use crate::job::{Job, JobId, JobStatus};
use crate::locks::{RowLocks, lock_all};
use crate::shortfall::ShortfallTracker;
use crate::store::JobStore;

/// Per-item breakdown of an approval-time deficit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ShortfallDetail {
    pub item_id: InventoryItemId,
    pub required: i64,
    pub available: i64,
    pub missing: i64,
}

/// A blocked (not failed) approval: the job stays in its planning state and
/// the caller gets the full deficit breakdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockedOutcome {
    pub reason: String,
    pub shortfalls: Vec<ShortfallDetail>,
}

/// Structured result of a lifecycle operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobOutcome {
    pub job_id: JobId,
    pub status: JobStatus,
    /// True when the job was already in the target state and the call was a
    /// safe retry; nothing changed.
    pub idempotent: bool,
    pub blocked: Option<BlockedOutcome>,
}

impl JobOutcome {
    fn of(job: &Job) -> Self {
        Self {
            job_id: *job.id(),
            status: job.status(),
            idempotent: false,
            blocked: None,
        }
    }

    fn idempotent(job: &Job) -> Self {
        Self {
            idempotent: true,
            ..Self::of(job)
        }
    }
}

/// Actual usage of one item, reported at completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActualLine {
    pub item_id: InventoryItemId,
    pub qty_used: i64,
}

/// Read-only readiness report for a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobReadiness {
    pub job_id: JobId,
    pub status: JobStatus,
    pub active_shortfalls: usize,
    /// Every BOM item has an allocation covering its planned quantity.
    pub fully_allocated: bool,
    pub ready: bool,
}

/// The lifecycle controller. Generic over the two external seams: the
/// inventory ledger it consumes and the event bus it emits to.
pub struct JobService<L, B> {
    ledger: L,
    bus: B,
    jobs: JobStore,
    bom: BomStore,
    allocations: AllocationLedger,
    shortfalls: ShortfallTracker,
    locks: RowLocks,
}

impl<L, B> JobService<L, B>
where
    L: InventoryLedger,
    B: EventBus<JobEvent>,
{
    pub fn new(ledger: L, bus: B) -> Self {
        Self {
            ledger,
            bus,
            jobs: JobStore::new(),
            bom: BomStore::new(),
            allocations: AllocationLedger::new(),
            shortfalls: ShortfallTracker::new(),
            locks: RowLocks::new(),
        }
    }

    /// The shortfall tracker is independently queryable for reporting.
    pub fn shortfalls(&self) -> &ShortfallTracker {
        &self.shortfalls
    }

    /// The allocation ledger, exposed read-only for reporting.
    pub fn allocations(&self) -> &AllocationLedger {
        &self.allocations
    }

    pub fn get_job(&self, principal: &Principal, job_id: JobId) -> DomainResult<Job> {
        self.check(principal, &JOBS_WRITE)?;
        self.jobs.get(principal.active_tenant_id, job_id)
    }

    /// Create a new job in `Draft`.
    pub fn create_job(
        &self,
        principal: &Principal,
        name: &str,
        notes: &str,
    ) -> DomainResult<JobOutcome> {
        self.check(principal, &JOBS_WRITE)?;
        let tenant_id = principal.active_tenant_id;

        let job = Job::new(JobId::new(AggregateId::new()), tenant_id, name, notes)?;
        self.jobs.insert(job.clone())?;

        info!(tenant = %tenant_id, job = %job.id(), "job created");
        self.emit(JobEvent::new(
            JobEventKind::Created,
            tenant_id,
            *job.id(),
            principal.actor_id,
        ));

        Ok(JobOutcome::of(&job))
    }

    /// Insert or update a BOM line, returning an **advisory, unlocked**
    /// availability preview.
    ///
    /// The preview may be stale relative to concurrent activity; only
    /// `approve_job` makes an authoritative determination.
    pub fn upsert_bom_line(
        &self,
        principal: &Principal,
        job_id: JobId,
        item_id: InventoryItemId,
        qty_planned: f64,
    ) -> DomainResult<BomLinePreview> {
        self.check(principal, &JOBS_WRITE)?;
        let tenant_id = principal.active_tenant_id;

        if !(qty_planned.is_finite() && qty_planned > 0.0) {
            return Err(DomainError::validation(
                "planned quantity must be a positive number",
            ));
        }
        if qty_planned > MAX_PLANNED_QTY {
            return Err(DomainError::validation(format!(
                "planned quantity exceeds the maximum of {MAX_PLANNED_QTY}",
            )));
        }

        // The status gate and the BOM write must be serialized against
        // approval, which snapshots the BOM under the same job lock.
        let job_lock = self.locks.job_handle(job_id);
        {
            let _job_guard = job_lock.lock().unwrap();

            let job = self.jobs.get(tenant_id, job_id)?;
            if !job.status().is_planning() {
                return Err(DomainError::invalid_transition(format!(
                    "job {job_id}: BOM is editable only while draft or quoted, not {}",
                    job.status()
                )));
            }
            if !self.ledger.exists(tenant_id, item_id) {
                return Err(DomainError::NotFound);
            }

            self.bom.upsert_line(tenant_id, job_id, item_id, qty_planned);
        }

        // Advisory hint, deliberately read without locks.
        let on_hand = self.ledger.on_hand(tenant_id, item_id)?;
        let reserved = self.allocations.reserved_by_others(tenant_id, item_id, job_id);
        let available = (on_hand - reserved) as f64;
        Ok(BomLinePreview {
            available,
            shortfall: (qty_planned - available).max(0.0),
        })
    }

    /// Move a draft job to `Quoted`. Idempotent on an already-quoted job.
    pub fn quote_job(&self, principal: &Principal, job_id: JobId) -> DomainResult<JobOutcome> {
        self.check(principal, &JOBS_WRITE)?;
        let tenant_id = principal.active_tenant_id;

        let job_lock = self.locks.job_handle(job_id);
        let _job_guard = job_lock.lock().unwrap();

        let mut job = self.jobs.get(tenant_id, job_id)?;
        if job.status() == JobStatus::Quoted {
            return Ok(JobOutcome::idempotent(&job));
        }

        job.transition_to(JobStatus::Quoted)?;
        self.jobs.update(&job)?;

        info!(tenant = %tenant_id, job = %job_id, "job quoted");
        self.emit(JobEvent::new(
            JobEventKind::Quoted,
            tenant_id,
            job_id,
            principal.actor_id,
        ));

        Ok(JobOutcome::of(&job))
    }

    /// Approve a job: the authoritative fulfillability check.
    ///
    /// Under the job lock and per-item locks (sorted order), recomputes
    /// availability excluding the job's own reservations. A deficit is a
    /// successful *blocked* outcome, not an error — unless the caller
    /// asserted fulfillability via `was_fulfillable_hint`, in which case the
    /// disagreement is surfaced as `ConcurrencyConflict`.
    pub fn approve_job(
        &self,
        principal: &Principal,
        job_id: JobId,
        was_fulfillable_hint: bool,
    ) -> DomainResult<JobOutcome> {
        self.check(principal, &JOBS_APPROVE)?;
        let tenant_id = principal.active_tenant_id;

        let job_lock = self.locks.job_handle(job_id);
        let _job_guard = job_lock.lock().unwrap();

        let mut job = self.jobs.get(tenant_id, job_id)?;
        if job.status() == JobStatus::Approved {
            // Safe retry after a lost response; stale shortfalls from an
            // earlier blocked attempt are cleaned up here.
            self.shortfalls.resolve_all_active(tenant_id, job_id);
            return Ok(JobOutcome::idempotent(&job));
        }
        if !job.status().is_planning() {
            return Err(DomainError::invalid_transition(format!(
                "job {job_id}: cannot approve from {}",
                job.status()
            )));
        }

        let lines = self.bom.lines_for_job(tenant_id, job_id);

        // Reservations are integral units; fractional plans block approval.
        let mut requirements: Vec<(BomLine, i64)> = Vec::with_capacity(lines.len());
        for line in lines {
            let required = line.whole_units().ok_or_else(|| {
                DomainError::validation(format!(
                    "item {}: planned quantity {} must be a whole number to approve",
                    line.item_id, line.qty_planned
                ))
            })?;
            requirements.push((line, required));
        }

        let item_ids: Vec<InventoryItemId> =
            requirements.iter().map(|(l, _)| l.item_id).collect();
        let item_handles = self.locks.item_handles(&item_ids);
        let _item_guards = lock_all(&item_handles);

        // Authoritative availability, now that the rows cannot move.
        let mut details: Vec<ShortfallDetail> = Vec::with_capacity(requirements.len());
        for (line, required) in &requirements {
            let on_hand = self.ledger.on_hand(tenant_id, line.item_id)?;
            let reserved = self
                .allocations
                .reserved_by_others(tenant_id, line.item_id, job_id);
            let available = on_hand - reserved;
            details.push(ShortfallDetail {
                item_id: line.item_id,
                required: *required,
                available,
                missing: (required - available).max(0),
            });
        }

        if details.iter().any(|d| d.missing > 0) {
            if was_fulfillable_hint {
                // The caller decided from an advisory preview; availability
                // moved underneath it. Abort with nothing written.
                return Err(DomainError::conflict(format!(
                    "job {job_id}: availability changed since the advisory check"
                )));
            }

            for d in &details {
                if d.missing > 0 {
                    self.shortfalls
                        .upsert_active(tenant_id, job_id, d.item_id, d.missing);
                } else {
                    self.shortfalls.resolve_active(tenant_id, job_id, d.item_id);
                }
            }

            info!(tenant = %tenant_id, job = %job_id, short_items = details.iter().filter(|d| d.missing > 0).count(), "approval blocked by shortfall");
            let mut outcome = JobOutcome::of(&job);
            outcome.blocked = Some(BlockedOutcome {
                reason: "insufficient available inventory".to_string(),
                shortfalls: details,
            });
            return Ok(outcome);
        }

        // Fulfillable: reserve and approve.
        job.transition_to(JobStatus::Approved)?;
        self.jobs.update(&job)?;
        for (line, required) in &requirements {
            self.allocations
                .upsert(tenant_id, job_id, line.item_id, *required);
        }
        self.shortfalls.resolve_all_active(tenant_id, job_id);

        info!(tenant = %tenant_id, job = %job_id, items = requirements.len(), "job approved, inventory reserved");
        self.emit(JobEvent::new(
            JobEventKind::Approved,
            tenant_id,
            job_id,
            principal.actor_id,
        ));
        self.emit(
            JobEvent::new(
                JobEventKind::InventoryReserved,
                tenant_id,
                job_id,
                principal.actor_id,
            )
            .with_metadata(json!({
                "items": requirements
                    .iter()
                    .map(|(l, q)| json!({ "item_id": l.item_id, "qty": q }))
                    .collect::<Vec<_>>(),
            })),
        );

        Ok(JobOutcome::of(&job))
    }

    /// Move an approved job to `InProgress`. Allocations are untouched.
    pub fn start_job(&self, principal: &Principal, job_id: JobId) -> DomainResult<JobOutcome> {
        self.check(principal, &JOBS_APPROVE)?;
        let tenant_id = principal.active_tenant_id;

        let job_lock = self.locks.job_handle(job_id);
        let _job_guard = job_lock.lock().unwrap();

        let mut job = self.jobs.get(tenant_id, job_id)?;
        if job.status() == JobStatus::InProgress {
            return Ok(JobOutcome::idempotent(&job));
        }

        job.transition_to(JobStatus::InProgress)?;
        self.jobs.update(&job)?;

        info!(tenant = %tenant_id, job = %job_id, "job started");
        self.emit(JobEvent::new(
            JobEventKind::Started,
            tenant_id,
            job_id,
            principal.actor_id,
        ));

        Ok(JobOutcome::of(&job))
    }

    /// Complete a job, consuming inventory by actual usage.
    ///
    /// `actuals` must be an exact bijection onto the job's BOM item set:
    /// no missing items, no extras, no duplicates, no negative quantities.
    /// If any actual exceeds current on-hand the whole operation aborts
    /// with `InsufficientInventory` — completion never partially applies
    /// or silently clips.
    pub fn complete_job(
        &self,
        principal: &Principal,
        job_id: JobId,
        actuals: &[ActualLine],
    ) -> DomainResult<JobOutcome> {
        self.check(principal, &JOBS_APPROVE)?;
        let tenant_id = principal.active_tenant_id;

        let job_lock = self.locks.job_handle(job_id);
        let _job_guard = job_lock.lock().unwrap();

        let mut job = self.jobs.get(tenant_id, job_id)?;
        if job.status() == JobStatus::Completed {
            return Ok(JobOutcome::idempotent(&job));
        }
        if !job.status().holds_reservation() {
            return Err(DomainError::invalid_transition(format!(
                "job {job_id}: cannot complete from {}",
                job.status()
            )));
        }

        let bom_items: HashSet<InventoryItemId> = self
            .bom
            .lines_for_job(tenant_id, job_id)
            .iter()
            .map(|l| l.item_id)
            .collect();

        let mut seen: HashSet<InventoryItemId> = HashSet::with_capacity(actuals.len());
        for actual in actuals {
            if actual.qty_used < 0 {
                return Err(DomainError::validation(format!(
                    "item {}: actual usage cannot be negative",
                    actual.item_id
                )));
            }
            if !seen.insert(actual.item_id) {
                return Err(DomainError::validation(format!(
                    "item {}: duplicate actual usage entry",
                    actual.item_id
                )));
            }
            if !bom_items.contains(&actual.item_id) {
                return Err(DomainError::validation(format!(
                    "item {}: not on the job's bill of materials",
                    actual.item_id
                )));
            }
        }
        if seen.len() != bom_items.len() {
            return Err(DomainError::validation(
                "actuals must cover every item on the bill of materials",
            ));
        }

        let item_ids: Vec<InventoryItemId> = actuals.iter().map(|a| a.item_id).collect();
        let item_handles = self.locks.item_handles(&item_ids);
        let _item_guards = lock_all(&item_handles);

        // Check the whole batch before touching anything.
        for actual in actuals {
            let on_hand = self.ledger.on_hand(tenant_id, actual.item_id)?;
            if actual.qty_used > on_hand {
                return Err(DomainError::insufficient(format!(
                    "item {}: actual usage {} exceeds on-hand {}",
                    actual.item_id, actual.qty_used, on_hand
                )));
            }
        }

        // Consume. Checks above ran under the same locks, so these cannot
        // fail part-way through.
        for actual in actuals {
            self.ledger.adjust(tenant_id, actual.item_id, -actual.qty_used)?;
        }
        self.jobs.record_actuals(
            tenant_id,
            job_id,
            actuals.iter().map(|a| (a.item_id, a.qty_used)).collect(),
        );
        self.allocations.delete_for_job(tenant_id, job_id);
        self.shortfalls.resolve_all_active(tenant_id, job_id);
        job.transition_to(JobStatus::Completed)?;
        self.jobs.update(&job)?;

        info!(tenant = %tenant_id, job = %job_id, items = actuals.len(), "job completed, inventory consumed");
        self.emit(JobEvent::new(
            JobEventKind::Completed,
            tenant_id,
            job_id,
            principal.actor_id,
        ));
        self.emit(
            JobEvent::new(
                JobEventKind::InventoryConsumed,
                tenant_id,
                job_id,
                principal.actor_id,
            )
            .with_metadata(json!({
                "items": actuals
                    .iter()
                    .map(|a| json!({ "item_id": a.item_id, "qty": a.qty_used }))
                    .collect::<Vec<_>>(),
            })),
        );

        Ok(JobOutcome::of(&job))
    }

    /// Void a job. Completed work can never be voided; a partially completed
    /// job (actuals already recorded) gets a compensating reversal of its
    /// consumption.
    pub fn void_job(&self, principal: &Principal, job_id: JobId) -> DomainResult<JobOutcome> {
        self.check(principal, &JOBS_APPROVE)?;
        let tenant_id = principal.active_tenant_id;

        let job_lock = self.locks.job_handle(job_id);
        let _job_guard = job_lock.lock().unwrap();

        let mut job = self.jobs.get(tenant_id, job_id)?;
        if job.status() == JobStatus::Voided {
            return Ok(JobOutcome::idempotent(&job));
        }
        // Also rejects Completed: that edge does not exist in the lifecycle.
        job.transition_to(JobStatus::Voided)?;

        let recorded = self.jobs.actuals_for_job(tenant_id, job_id);
        let mut touched: Vec<InventoryItemId> = self
            .bom
            .lines_for_job(tenant_id, job_id)
            .iter()
            .map(|l| l.item_id)
            .collect();
        if let Some(usage) = &recorded {
            touched.extend(usage.iter().map(|(item, _)| *item));
        }
        let item_handles = self.locks.item_handles(&touched);
        let _item_guards = lock_all(&item_handles);

        let mut reversed = 0usize;
        if let Some(usage) = recorded {
            // Compensating entry: put consumed stock back.
            for (item_id, qty_used) in &usage {
                self.ledger.adjust(tenant_id, *item_id, *qty_used)?;
            }
            self.jobs.clear_actuals(tenant_id, job_id);
            reversed = usage.len();
        }

        self.allocations.delete_for_job(tenant_id, job_id);
        self.shortfalls.cancel_active(tenant_id, job_id);
        self.jobs.update(&job)?;

        info!(tenant = %tenant_id, job = %job_id, reversed_items = reversed, "job voided");
        self.emit(
            JobEvent::new(JobEventKind::Voided, tenant_id, job_id, principal.actor_id)
                .with_metadata(json!({ "reversed_items": reversed })),
        );

        Ok(JobOutcome::of(&job))
    }

    /// Read-only readiness report: no mutation, no locks.
    pub fn job_readiness(
        &self,
        principal: &Principal,
        job_id: JobId,
    ) -> DomainResult<JobReadiness> {
        self.check(principal, &JOBS_WRITE)?;
        let tenant_id = principal.active_tenant_id;

        let job = self.jobs.get(tenant_id, job_id)?;
        let active = self.shortfalls.active_for_job(tenant_id, job_id).len();

        let lines = self.bom.lines_for_job(tenant_id, job_id);
        let allocations: std::collections::HashMap<InventoryItemId, i64> = self
            .allocations
            .allocations_for_job(tenant_id, job_id)
            .into_iter()
            .collect();
        let fully_allocated = !lines.is_empty()
            && lines.iter().all(|line| {
                allocations
                    .get(&line.item_id)
                    .is_some_and(|qty| (*qty as f64) >= line.qty_planned)
            });

        Ok(JobReadiness {
            job_id,
            status: job.status(),
            active_shortfalls: active,
            fully_allocated,
            ready: job.status() == JobStatus::Approved && active == 0 && fully_allocated,
        })
    }

    fn check(&self, principal: &Principal, required: &Permission) -> DomainResult<()> {
        authorize(principal, required).map_err(|_| DomainError::PermissionDenied)
    }

    fn emit(&self, event: JobEvent) {
        // Fire-and-forget: a sink failure never rolls back the operation.
        if let Err(err) = self.bus.publish(event) {
            warn!(?err, "failed to publish job lifecycle event");
        }
    }
}
