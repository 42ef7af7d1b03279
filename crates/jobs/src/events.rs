use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockplan_core::{ActorId, TenantId};
use stockplan_events::{Event, TenantScoped};

use crate::job::JobId;

/// What happened to the job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobEventKind {
    Created,
    Quoted,
    Approved,
    /// On-hand stock was reserved against the job's BOM.
    InventoryReserved,
    Started,
    Completed,
    /// Reserved stock was physically consumed (irreversible).
    InventoryConsumed,
    Voided,
}

/// Lifecycle event emitted by the allocation engine.
///
/// Emission is fire-and-forget: the engine's stores, not the event stream,
/// are authoritative for current state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobEvent {
    pub kind: JobEventKind,
    pub tenant_id: TenantId,
    pub job_id: JobId,
    pub actor: ActorId,
    pub metadata: serde_json::Value,
    pub occurred_at: DateTime<Utc>,
}

impl JobEvent {
    pub fn new(kind: JobEventKind, tenant_id: TenantId, job_id: JobId, actor: ActorId) -> Self {
        Self {
            kind,
            tenant_id,
            job_id,
            actor,
            metadata: serde_json::Value::Null,
            occurred_at: Utc::now(),
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

impl Event for JobEvent {
    fn event_type(&self) -> &'static str {
        match self.kind {
            JobEventKind::Created => "jobs.job.created",
            JobEventKind::Quoted => "jobs.job.quoted",
            JobEventKind::Approved => "jobs.job.approved",
            JobEventKind::InventoryReserved => "jobs.job.inventory_reserved",
            JobEventKind::Started => "jobs.job.started",
            JobEventKind::Completed => "jobs.job.completed",
            JobEventKind::InventoryConsumed => "jobs.job.inventory_consumed",
            JobEventKind::Voided => "jobs.job.voided",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }
}

impl TenantScoped for JobEvent {
    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}
