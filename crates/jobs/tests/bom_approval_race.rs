//! Black-box test for BOM-edit / approval serialization: once a job is
//! approved, its allocation must equal its BOM, so an edit racing an
//! approval must either land before the BOM snapshot or be rejected.

use std::sync::Arc;
use std::thread;

use stockplan_auth::{JOBS_APPROVE, JOBS_WRITE, Principal};
use stockplan_core::{ActorId, AggregateId, TenantId};
use stockplan_events::InMemoryEventBus;
use stockplan_inventory::{InMemoryInventoryLedger, InventoryItemId};
use stockplan_jobs::{JobEvent, JobService, JobStatus};

type Service = JobService<Arc<InMemoryInventoryLedger>, Arc<InMemoryEventBus<JobEvent>>>;

#[test]
fn bom_edit_racing_approval_never_leaves_a_stale_allocation() {
    const TRIALS: usize = 200;

    for trial in 0..TRIALS {
        let ledger = InMemoryInventoryLedger::arc();
        let bus = Arc::new(InMemoryEventBus::new());
        let tenant = TenantId::new();
        let principal = Principal::with_permissions(
            ActorId::new(),
            tenant,
            vec![JOBS_WRITE, JOBS_APPROVE],
        );
        let service: Arc<Service> = Arc::new(JobService::new(ledger.clone(), bus));

        let item = InventoryItemId::new(AggregateId::new());
        ledger.put(tenant, item, 20);

        let job = service
            .create_job(&principal, "race", "")
            .unwrap()
            .job_id;
        service
            .upsert_bom_line(&principal, job, item, 5.0)
            .unwrap();

        let approver = {
            let service = Arc::clone(&service);
            let principal = principal.clone();
            thread::spawn(move || service.approve_job(&principal, job, false))
        };
        let editor = {
            let service = Arc::clone(&service);
            let principal = principal.clone();
            thread::spawn(move || service.upsert_bom_line(&principal, job, item, 9.0))
        };

        let approved = approver.join().unwrap().unwrap();
        let edit = editor.join().unwrap();
        assert_eq!(approved.status, JobStatus::Approved);

        // Whichever side won the race, the approved job's allocation must
        // match the BOM it was approved against.
        let allocated: i64 = service
            .allocations()
            .allocations_for_job(tenant, job)
            .iter()
            .map(|(_, qty)| *qty)
            .sum();
        match edit {
            // Edit landed before the snapshot: allocation reflects it.
            Ok(_) => assert_eq!(allocated, 9, "trial {trial}: edit won but allocation is stale"),
            // Edit arrived after approval and was rejected.
            Err(err) => {
                assert_eq!(allocated, 5, "trial {trial}: rejected edit still took effect");
                assert!(matches!(
                    err,
                    stockplan_core::DomainError::InvalidStateTransition(_)
                ));
            }
        }

        let readiness = service.job_readiness(&principal, job).unwrap();
        assert!(
            readiness.fully_allocated,
            "trial {trial}: approved job's BOM diverged from its allocation"
        );
    }
}
