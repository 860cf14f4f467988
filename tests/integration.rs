//! Integration tests for the priority queue and workflow job catalog,
//! covering the engine's ordering and cascade-cancellation guarantees.

use std::time::Duration;

use steam_server_runner::queue::PriorityQueue;
use steam_server_runner::workflow::{JobId, WorkflowJob};

fn job(id: JobId) -> WorkflowJob {
    WorkflowJob::new(id, Vec::new())
}

/// P1: a higher-priority job enqueued after a lower-priority one still
/// dequeues first.
#[test]
fn higher_priority_job_runs_before_lower_priority_job() {
    let queue = PriorityQueue::new();
    queue.enqueue(job(JobId::Update)); // priority 5
    queue.enqueue(job(JobId::Start)); // priority 1

    let first = queue.get(Duration::from_millis(100)).unwrap();
    assert_eq!(first.id, Some(JobId::Start));

    let second = queue.get(Duration::from_millis(100)).unwrap();
    assert_eq!(second.id, Some(JobId::Update));
}

/// P2: jobs of equal priority execute in enqueue order.
#[test]
fn equal_priority_jobs_run_in_fifo_order() {
    let queue = PriorityQueue::new();
    queue.enqueue(job(JobId::Oom));
    queue.enqueue(job(JobId::Oom));
    queue.enqueue(job(JobId::Oom));

    for _ in 0..3 {
        let dequeued = queue.get(Duration::from_millis(100)).unwrap();
        assert_eq!(dequeued.id, Some(JobId::Oom));
    }
    assert!(queue.get(Duration::from_millis(20)).is_none());
}

/// P3: after a job at priority p completes, any job enqueued during its
/// execution with strictly lower priority (higher numeric value) is pruned.
#[test]
fn cascade_prunes_jobs_enqueued_during_execution() {
    let queue = PriorityQueue::new();

    // Simulate OOM (priority 4) being dequeued and running.
    queue.enqueue(job(JobId::Oom));
    let running = queue.get(Duration::from_millis(100)).unwrap();
    assert_eq!(running.id, Some(JobId::Oom));

    // While OOM "runs", an UPDATE (priority 5) gets enqueued by the scheduler.
    queue.enqueue(job(JobId::Update));
    // And a RESTART (priority 3) also arrives -- higher priority than OOM,
    // so it must survive the cascade.
    queue.enqueue(job(JobId::Restart));

    queue.prune_lower_priority(running.priority);

    let next = queue.get(Duration::from_millis(100)).unwrap();
    assert_eq!(next.id, Some(JobId::Restart));
    assert!(
        queue.get(Duration::from_millis(20)).is_none(),
        "UPDATE should have been pruned as lower priority than the just-completed OOM job"
    );
}

/// P4/S5: after the sentinel is enqueued, no job enqueued before it runs;
/// the worker drains straight to the sentinel.
#[test]
fn sentinel_clears_all_pending_jobs() {
    let queue = PriorityQueue::new();
    queue.enqueue(job(JobId::Start));
    queue.enqueue(job(JobId::Restart));
    queue.enqueue(job(JobId::Update));

    queue.enqueue(WorkflowJob::sentinel());

    let dequeued = queue.get(Duration::from_millis(100)).unwrap();
    assert!(dequeued.is_sentinel);
    assert!(queue.is_empty());
}

/// The job catalog assigns the fixed priority ordering from the data model:
/// START < UPDATE_START < RESTART < OOM < UPDATE < STOP.
#[test]
fn catalog_priority_ordering_matches_data_model() {
    let priorities: Vec<u8> = [
        JobId::Start,
        JobId::UpdateStart,
        JobId::Restart,
        JobId::Oom,
        JobId::Update,
        JobId::Stop,
    ]
    .iter()
    .map(|id| id.priority())
    .collect();

    let mut sorted = priorities.clone();
    sorted.sort_unstable();
    assert_eq!(priorities, sorted, "catalog priorities must already be ascending");
}
