//! Priority queue with cascading cancellation and sentinel-based drain (C8).
//!
//! Entries are ordered by `(priority ascending, insertion-sequence
//! ascending)` per the design notes' recommendation to carry an explicit
//! sequence counter rather than relying on job-value comparison.

use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

use crate::workflow::WorkflowJob;

struct Entry {
    priority: u8,
    sequence: u64,
    job: WorkflowJob,
}

/// Metadata about the queue's head, returned by [`PriorityQueue::peek`]
/// without taking ownership of the job (tasks are not `Clone`).
pub struct PeekInfo {
    pub priority: u8,
    pub is_sentinel: bool,
    pub name: String,
}

struct State {
    entries: Vec<Entry>,
    next_sequence: u64,
}

pub struct PriorityQueue {
    state: Mutex<State>,
    not_empty: Condvar,
}

impl PriorityQueue {
    pub fn new() -> Self {
        PriorityQueue {
            state: Mutex::new(State { entries: Vec::new(), next_sequence: 0 }),
            not_empty: Condvar::new(),
        }
    }

    /// Insert `job`. A sentinel drains every non-sentinel entry first, then
    /// takes the queue, so no real job runs after it once delivered.
    pub fn enqueue(&self, job: WorkflowJob) {
        let mut state = self.state.lock().expect("queue lock poisoned");
        if job.is_sentinel {
            state.entries.clear();
        }
        let sequence = state.next_sequence;
        state.next_sequence += 1;
        let entry = Entry { priority: job.priority, sequence, job };

        let position = state
            .entries
            .iter()
            .position(|e| (e.priority, e.sequence) > (entry.priority, entry.sequence))
            .unwrap_or(state.entries.len());
        state.entries.insert(position, entry);

        self.not_empty.notify_one();
    }

    /// Blocking pop of the lowest `(priority, sequence)` entry; `None` if
    /// `timeout` elapses with the queue empty.
    pub fn get(&self, timeout: Duration) -> Option<WorkflowJob> {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock().expect("queue lock poisoned");
        loop {
            if !state.entries.is_empty() {
                return Some(state.entries.remove(0).job);
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return None;
            }
            let (guard, result) = self
                .not_empty
                .wait_timeout(state, remaining)
                .expect("queue condvar poisoned");
            state = guard;
            if result.timed_out() && state.entries.is_empty() {
                return None;
            }
        }
    }

    /// Remove every entry with priority strictly greater (lower real
    /// priority) than `base`'s, preserving the sentinel if present.
    pub fn prune_lower_priority(&self, base_priority: u8) {
        let mut state = self.state.lock().expect("queue lock poisoned");
        state
            .entries
            .retain(|e| e.priority <= base_priority || e.job.is_sentinel);
    }

    pub fn peek(&self) -> Option<PeekInfo> {
        let state = self.state.lock().expect("queue lock poisoned");
        state.entries.first().map(|e| PeekInfo {
            priority: e.priority,
            is_sentinel: e.job.is_sentinel,
            name: e.job.name.clone(),
        })
    }

    pub fn is_empty(&self) -> bool {
        let state = self.state.lock().expect("queue lock poisoned");
        state.entries.is_empty()
    }
}

impl Default for PriorityQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::JobId;

    fn job(id: JobId) -> WorkflowJob {
        WorkflowJob::new(id, Vec::new())
    }

    #[test]
    fn dequeues_in_priority_order_regardless_of_insertion_order() {
        let queue = PriorityQueue::new();
        queue.enqueue(job(JobId::Update)); // priority 5
        queue.enqueue(job(JobId::Start)); // priority 1
        let first = queue.get(Duration::from_millis(10)).unwrap();
        assert_eq!(first.id, Some(JobId::Start));
    }

    #[test]
    fn equal_priority_breaks_tie_by_insertion_order() {
        let queue = PriorityQueue::new();
        queue.enqueue(job(JobId::Start));
        queue.enqueue(job(JobId::Start));
        let first = queue.get(Duration::from_millis(10)).unwrap();
        let second = queue.get(Duration::from_millis(10)).unwrap();
        assert_eq!(first.id, Some(JobId::Start));
        assert_eq!(second.id, Some(JobId::Start));
    }

    #[test]
    fn get_times_out_on_empty_queue() {
        let queue = PriorityQueue::new();
        assert!(queue.get(Duration::from_millis(20)).is_none());
    }

    #[test]
    fn prune_removes_strictly_lower_priority_entries() {
        let queue = PriorityQueue::new();
        queue.enqueue(job(JobId::Oom)); // priority 4
        queue.enqueue(job(JobId::Update)); // priority 5, should be pruned
        queue.prune_lower_priority(JobId::Restart.priority()); // base priority 3
        assert!(queue.is_empty());
    }

    #[test]
    fn prune_preserves_sentinel() {
        let queue = PriorityQueue::new();
        queue.enqueue(job(JobId::Update));
        queue.enqueue(WorkflowJob::sentinel());
        queue.prune_lower_priority(JobId::Start.priority());
        let peeked = queue.peek().unwrap();
        assert!(peeked.is_sentinel);
    }

    #[test]
    fn sentinel_drains_pending_non_sentinel_entries() {
        let queue = PriorityQueue::new();
        queue.enqueue(job(JobId::Start));
        queue.enqueue(job(JobId::Update));
        queue.enqueue(WorkflowJob::sentinel());
        let dequeued = queue.get(Duration::from_millis(10)).unwrap();
        assert!(dequeued.is_sentinel);
        assert!(queue.is_empty());
    }
}
