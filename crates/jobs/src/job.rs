use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockplan_core::{AggregateId, DomainError, DomainResult, Entity, TenantId};

/// Job identifier (tenant-scoped via `tenant_id` on the record).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub AggregateId);

impl JobId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for JobId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Job status lifecycle.
///
/// `Draft`/`Quoted` are the planning states (BOM editable). `Approved` and
/// `InProgress` hold an active reservation. `Completed` and `Voided` are
/// terminal and accept no further transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Draft,
    Quoted,
    Approved,
    InProgress,
    Completed,
    Voided,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Voided)
    }

    /// Planning states: the only states in which BOM lines exist/are editable.
    pub fn is_planning(self) -> bool {
        matches!(self, JobStatus::Draft | JobStatus::Quoted)
    }

    /// States whose presence implies allocation rows in the ledger.
    pub fn holds_reservation(self) -> bool {
        matches!(self, JobStatus::Approved | JobStatus::InProgress)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Draft => "draft",
            JobStatus::Quoted => "quoted",
            JobStatus::Approved => "approved",
            JobStatus::InProgress => "in_progress",
            JobStatus::Completed => "completed",
            JobStatus::Voided => "voided",
        }
    }

    /// Whether the lifecycle admits a direct `from → to` edge.
    pub fn can_transition_to(self, to: JobStatus) -> bool {
        use JobStatus::*;
        match (self, to) {
            (Draft, Quoted) => true,
            (Draft | Quoted, Approved) => true,
            (Approved, InProgress) => true,
            (Approved | InProgress, Completed) => true,
            (Draft | Quoted | Approved | InProgress, Voided) => true,
            _ => false,
        }
    }
}

impl core::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A job: the unit of work that plans, reserves and eventually consumes
/// inventory. Never physically deleted; terminal states are kept forever.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    id: JobId,
    tenant_id: TenantId,
    name: String,
    notes: String,
    status: JobStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Job {
    pub fn new(
        id: JobId,
        tenant_id: TenantId,
        name: impl Into<String>,
        notes: impl Into<String>,
    ) -> DomainResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::validation("job name cannot be empty"));
        }

        let now = Utc::now();
        Ok(Self {
            id,
            tenant_id,
            name,
            notes: notes.into(),
            status: JobStatus::Draft,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn notes(&self) -> &str {
        &self.notes
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Move the job to `to`, enforcing the lifecycle edges.
    pub fn transition_to(&mut self, to: JobStatus) -> DomainResult<()> {
        if !self.status.can_transition_to(to) {
            return Err(DomainError::invalid_transition(format!(
                "job {}: {} -> {}",
                self.id, self.status, to
            )));
        }
        self.status = to;
        self.updated_at = Utc::now();
        Ok(())
    }
}

impl Entity for Job {
    type Id = JobId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_job() -> Job {
        Job::new(
            JobId::new(AggregateId::new()),
            TenantId::new(),
            "Front porch rebuild",
            "",
        )
        .unwrap()
    }

    #[test]
    fn new_job_starts_draft() {
        let job = test_job();
        assert_eq!(job.status(), JobStatus::Draft);
        assert!(job.status().is_planning());
    }

    #[test]
    fn empty_name_is_rejected() {
        let err = Job::new(JobId::new(AggregateId::new()), TenantId::new(), "  ", "").unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn full_lifecycle_draft_to_completed() {
        let mut job = test_job();
        job.transition_to(JobStatus::Quoted).unwrap();
        job.transition_to(JobStatus::Approved).unwrap();
        job.transition_to(JobStatus::InProgress).unwrap();
        job.transition_to(JobStatus::Completed).unwrap();
        assert!(job.status().is_terminal());
    }

    #[test]
    fn quoted_can_skip_straight_to_approved() {
        let mut job = test_job();
        job.transition_to(JobStatus::Approved).unwrap();
        assert!(job.status().holds_reservation());
    }

    #[test]
    fn any_non_terminal_state_can_be_voided() {
        for status in [
            JobStatus::Draft,
            JobStatus::Quoted,
            JobStatus::Approved,
            JobStatus::InProgress,
        ] {
            assert!(status.can_transition_to(JobStatus::Voided), "{status}");
        }
    }

    #[test]
    fn terminal_states_accept_no_transitions() {
        for from in [JobStatus::Completed, JobStatus::Voided] {
            for to in [
                JobStatus::Draft,
                JobStatus::Quoted,
                JobStatus::Approved,
                JobStatus::InProgress,
                JobStatus::Completed,
                JobStatus::Voided,
            ] {
                assert!(!from.can_transition_to(to), "{from} -> {to}");
            }
        }
    }

    #[test]
    fn completed_job_cannot_be_voided() {
        let mut job = test_job();
        job.transition_to(JobStatus::Approved).unwrap();
        job.transition_to(JobStatus::Completed).unwrap();

        let err = job.transition_to(JobStatus::Voided).unwrap_err();
        assert!(matches!(err, DomainError::InvalidStateTransition(_)));
        assert_eq!(job.status(), JobStatus::Completed);
    }
}
